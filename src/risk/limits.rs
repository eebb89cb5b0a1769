//! Daily loss and drawdown controls

use super::{DayClose, DrawdownTransition};
use crate::config::RiskConfig;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Trading day a timestamp belongs to, given the UTC reset hour
pub fn trading_day(now: DateTime<Utc>, reset_hour_utc: u32) -> NaiveDate {
    (now - Duration::hours(i64::from(reset_hour_utc))).date_naive()
}

/// Realized PnL for the current trading day
#[derive(Debug, Clone)]
pub struct DailyLedger {
    pub day: NaiveDate,
    /// Capital at the start of the day
    pub start_capital: Decimal,
    /// Realized PnL booked today
    pub realized: Decimal,
    /// Positions opened today
    pub trades: u32,
}

impl DailyLedger {
    pub fn new(now: DateTime<Utc>, reset_hour_utc: u32, capital: Decimal) -> Self {
        Self {
            day: trading_day(now, reset_hour_utc),
            start_capital: capital,
            realized: dec!(0),
            trades: 0,
        }
    }

    /// Start a new day if `now` crossed the boundary; returns the day that ended
    pub fn roll(
        &mut self,
        now: DateTime<Utc>,
        reset_hour_utc: u32,
        capital: Decimal,
    ) -> Option<DayClose> {
        let today = trading_day(now, reset_hour_utc);
        if today <= self.day {
            return None;
        }
        let closed = DayClose {
            day: self.day,
            realized_pnl: self.realized,
            start_capital: self.start_capital,
        };
        self.day = today;
        self.start_capital = capital;
        self.realized = dec!(0);
        self.trades = 0;
        Some(closed)
    }

    pub fn record(&mut self, pnl: Decimal) {
        self.realized += pnl;
    }

    pub fn record_entry(&mut self) {
        self.trades = self.trades.saturating_add(1);
    }

    /// Loss as a positive amount, zero when the day is flat or up
    pub fn loss(&self) -> Decimal {
        (-self.realized).max(dec!(0))
    }

    pub fn loss_limit(&self, max_daily_loss_pct: Decimal) -> Decimal {
        self.start_capital * max_daily_loss_pct
    }

    /// Reaching the limit exactly counts as breached
    pub fn limit_reached(&self, max_daily_loss_pct: Decimal) -> bool {
        let loss = self.loss();
        loss > dec!(0) && loss >= self.loss_limit(max_daily_loss_pct)
    }
}

/// Monitors drawdown and pauses entries until equity recovers
#[derive(Debug, Clone)]
pub struct DrawdownMonitor {
    /// Peak equity value
    pub peak_equity: Decimal,
    /// Current equity value
    pub current_equity: Decimal,
    pub paused_since: Option<DateTime<Utc>>,
    /// Start of the current continuous recovery stretch while paused
    pub recovered_since: Option<DateTime<Utc>>,
}

impl DrawdownMonitor {
    /// Create a new drawdown monitor
    pub fn new(initial_equity: Decimal) -> Self {
        Self {
            peak_equity: initial_equity,
            current_equity: initial_equity,
            paused_since: None,
            recovered_since: None,
        }
    }

    /// Get current drawdown from peak
    pub fn current_drawdown(&self) -> Decimal {
        if self.peak_equity <= dec!(0) {
            return dec!(0);
        }
        ((self.peak_equity - self.current_equity) / self.peak_equity).max(dec!(0))
    }

    pub fn is_paused(&self) -> bool {
        self.paused_since.is_some()
    }

    /// Update with new equity value
    pub fn update(
        &mut self,
        equity: Decimal,
        now: DateTime<Utc>,
        limits: &RiskConfig,
    ) -> Option<DrawdownTransition> {
        self.current_equity = equity;
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        self.refresh(now, limits)
    }

    /// Re-check pause and recovery at `now` without a new equity figure
    pub fn refresh(&mut self, now: DateTime<Utc>, limits: &RiskConfig) -> Option<DrawdownTransition> {
        let drawdown = self.current_drawdown();

        if self.paused_since.is_none() {
            if drawdown > limits.max_drawdown_pct {
                self.paused_since = Some(now);
                self.recovered_since = None;
                tracing::warn!(%drawdown, "Drawdown limit exceeded, pausing entries");
                return Some(DrawdownTransition::Paused { drawdown });
            }
            return None;
        }

        if drawdown > limits.drawdown_recovery_pct {
            self.recovered_since = None;
            return None;
        }

        let since = *self.recovered_since.get_or_insert(now);
        if now - since >= Duration::days(limits.drawdown_recovery_days) {
            self.paused_since = None;
            self.recovered_since = None;
            tracing::info!(%drawdown, "Drawdown recovered, resuming entries");
            return Some(DrawdownTransition::Resumed { drawdown });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn limits() -> RiskConfig {
        RiskConfig {
            max_drawdown_pct: dec!(0.15),
            drawdown_recovery_pct: dec!(0.10),
            drawdown_recovery_days: 1,
            ..RiskConfig::default()
        }
    }

    #[test]
    fn test_drawdown_monitor() {
        let now = Utc::now();
        let mut monitor = DrawdownMonitor::new(dec!(1000));

        monitor.update(dec!(1100), now, &limits()); // New peak
        assert_eq!(monitor.peak_equity, dec!(1100));
        assert_eq!(monitor.current_drawdown(), dec!(0));

        monitor.update(dec!(990), now, &limits()); // Drawdown
        assert_eq!(monitor.current_drawdown(), dec!(0.10)); // 10%
        assert!(!monitor.is_paused());
    }

    #[test]
    fn test_pause_and_recovery() {
        let start = Utc::now();
        let mut monitor = DrawdownMonitor::new(dec!(1000));

        let transition = monitor.update(dec!(840), start, &limits());
        assert!(matches!(transition, Some(DrawdownTransition::Paused { .. })));
        assert!(monitor.is_paused());

        // Back to 9% drawdown, but only for half a day
        monitor.update(dec!(910), start + Duration::hours(1), &limits());
        monitor.refresh(start + Duration::hours(13), &limits());
        assert!(monitor.is_paused());

        // Dips again -> recovery clock restarts
        monitor.update(dec!(880), start + Duration::hours(14), &limits());
        monitor.update(dec!(920), start + Duration::hours(15), &limits());
        assert!(monitor
            .refresh(start + Duration::hours(38), &limits())
            .is_none());

        let transition = monitor.refresh(start + Duration::hours(39), &limits());
        assert!(matches!(transition, Some(DrawdownTransition::Resumed { .. })));
        assert!(!monitor.is_paused());
    }

    #[test]
    fn test_trading_day_respects_reset_hour() {
        let before = Utc.with_ymd_and_hms(2024, 3, 2, 5, 59, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 3, 2, 6, 0, 0).unwrap();
        assert_eq!(trading_day(before, 6), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(trading_day(after, 6), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn test_daily_ledger_limit_and_roll() {
        let day1 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut ledger = DailyLedger::new(day1, 0, dec!(10000));

        ledger.record(dec!(-300));
        assert!(!ledger.limit_reached(dec!(0.05)));
        ledger.record(dec!(-200));
        // Exactly 5% of 10,000
        assert!(ledger.limit_reached(dec!(0.05)));

        assert!(ledger.roll(day1 + Duration::hours(6), 0, dec!(9500)).is_none());
        let closed = ledger.roll(day1 + Duration::hours(12), 0, dec!(9500)).unwrap();
        assert_eq!(closed.realized_pnl, dec!(-500));
        assert_eq!(closed.day, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(ledger.start_capital, dec!(9500));
        assert!(!ledger.limit_reached(dec!(0.05)));
    }
}
