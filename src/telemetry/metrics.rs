//! Prometheus metrics

use ::metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Order placement to confirmed fill
    OrderExecution,
    /// One tick batch across all lanes
    TickBatch,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Realized equity
    Equity,
    /// Equity including unrealized P&L
    MarkedEquity,
    /// Drawdown from peak marked equity
    DrawdownPct,
    /// Committed notional across open positions
    OpenExposure,
    /// Open position count
    OpenPositions,
    /// Realized P&L for the current trading day
    DailyPnl,
    /// Streak-driven risk multiplier
    RiskMultiplier,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    RiskRejection,
    StaleSkip,
    PositionOpened,
    PositionClosed,
    ExecutionRetry,
    InvariantViolation,
}

impl LatencyMetric {
    fn name(self) -> &'static str {
        match self {
            LatencyMetric::OrderExecution => "swing_order_execution_latency_ms",
            LatencyMetric::TickBatch => "swing_tick_batch_latency_ms",
        }
    }
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::Equity => "swing_equity_usd",
            GaugeMetric::MarkedEquity => "swing_marked_equity_usd",
            GaugeMetric::DrawdownPct => "swing_drawdown_pct",
            GaugeMetric::OpenExposure => "swing_open_exposure_usd",
            GaugeMetric::OpenPositions => "swing_open_positions",
            GaugeMetric::DailyPnl => "swing_daily_pnl_usd",
            GaugeMetric::RiskMultiplier => "swing_risk_multiplier",
        }
    }
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            CounterMetric::RiskRejection => "swing_risk_rejections_total",
            CounterMetric::StaleSkip => "swing_stale_skips_total",
            CounterMetric::PositionOpened => "swing_positions_opened_total",
            CounterMetric::PositionClosed => "swing_positions_closed_total",
            CounterMetric::ExecutionRetry => "swing_execution_retries_total",
            CounterMetric::InvariantViolation => "swing_invariant_violations_total",
        }
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    histogram!(metric.name()).record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    gauge!(metric.name()).set(value);
}

/// Increment a counter, labelled by reason, symbol or order purpose
pub fn increment_counter(metric: CounterMetric, label: &str) {
    counter!(metric.name(), "label" => label.to_string()).increment(1);
}
