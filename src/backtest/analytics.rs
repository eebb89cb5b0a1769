//! Replay analytics and reporting

use crate::position::TradeOutcome;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Engine activity counted during a replay
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityCounts {
    pub signals: usize,
    pub entries: usize,
    pub rejections: usize,
    pub stale_skips: usize,
    pub entry_cancellations: usize,
    pub exits_pending: usize,
    pub blacklists: usize,
    pub pyramid_adds: usize,
    /// Positions still live when the input ended
    pub open_positions: usize,
}

/// Summary statistics from a replay
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub initial_capital: Decimal,
    pub final_equity: Decimal,
    /// Realized P&L net of fees
    pub net_pnl: Decimal,
    pub net_pnl_pct: Decimal,
    pub total_trades: usize,
    pub wins: usize,
    pub win_rate: Decimal,
    /// Gross profit over gross loss; absent without losing trades
    pub profit_factor: Option<Decimal>,
    pub avg_trade_pnl: Decimal,
    pub avg_trade_duration_secs: i64,
    /// Worst peak-to-trough drop of marked equity
    pub max_drawdown_pct: Decimal,
    pub fees: Decimal,
    pub activity: ActivityCounts,
}

/// Largest fractional drop from a running peak
pub fn max_drawdown(curve: &[Decimal]) -> Decimal {
    let mut peak = Decimal::ZERO;
    let mut worst = Decimal::ZERO;
    for &equity in curve {
        peak = peak.max(equity);
        if peak > Decimal::ZERO {
            worst = worst.max((peak - equity) / peak);
        }
    }
    worst
}

impl ReplaySummary {
    pub fn compute(
        initial_capital: Decimal,
        final_equity: Decimal,
        outcomes: &[TradeOutcome],
        equity_curve: &[Decimal],
        fees: Decimal,
        activity: ActivityCounts,
    ) -> Self {
        let total_trades = outcomes.len();
        let net_pnl: Decimal = outcomes.iter().map(|o| o.pnl).sum();
        let wins = outcomes.iter().filter(|o| o.pnl > Decimal::ZERO).count();
        let gross_profit: Decimal = outcomes
            .iter()
            .filter(|o| o.pnl > Decimal::ZERO)
            .map(|o| o.pnl)
            .sum();
        let gross_loss: Decimal = outcomes
            .iter()
            .filter(|o| o.pnl < Decimal::ZERO)
            .map(|o| -o.pnl)
            .sum();

        let (win_rate, avg_trade_pnl, avg_trade_duration_secs) = if total_trades > 0 {
            let count = Decimal::from(total_trades);
            let duration: i64 = outcomes.iter().map(|o| o.duration_secs).sum();
            (
                Decimal::from(wins) / count,
                net_pnl / count,
                duration / total_trades as i64,
            )
        } else {
            (dec!(0), dec!(0), 0)
        };

        let net_pnl_pct = if initial_capital > Decimal::ZERO {
            net_pnl / initial_capital
        } else {
            dec!(0)
        };

        Self {
            initial_capital,
            final_equity,
            net_pnl,
            net_pnl_pct,
            total_trades,
            wins,
            win_rate,
            profit_factor: (gross_loss > Decimal::ZERO).then(|| gross_profit / gross_loss),
            avg_trade_pnl,
            avg_trade_duration_secs,
            max_drawdown_pct: max_drawdown(equity_curve),
            fees,
            activity,
        }
    }

    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        let profit_factor = self
            .profit_factor
            .map(|pf| format!("{:.2}", pf))
            .unwrap_or_else(|| "n/a".to_string());
        format!(
            r#"
══════════════════════════════════════════════════════
               REPLAY RESULTS
══════════════════════════════════════════════════════

PERFORMANCE
───────────────────────────────────────────────────────
Initial Capital:  {:.2}
Final Equity:     {:.2}
Net P&L:          {:+.2} ({:+.2}%)
Max Drawdown:     {:.2}%
Win Rate:         {:.1}% ({}/{})
Profit Factor:    {}
Avg Trade P&L:    {:+.2}
Fees Paid:        {:.2}

ACTIVITY
───────────────────────────────────────────────────────
Signals:          {}
Entries:          {}
Pyramid Adds:     {}
Rejections:       {}
Stale Skips:      {}
Cancelled:        {}
Exits Pending:    {}
Blacklistings:    {}
Still Open:       {}
Avg Duration:     {}s
══════════════════════════════════════════════════════
"#,
            self.initial_capital,
            self.final_equity,
            self.net_pnl,
            self.net_pnl_pct * dec!(100),
            self.max_drawdown_pct * dec!(100),
            self.win_rate * dec!(100),
            self.wins,
            self.total_trades,
            profit_factor,
            self.avg_trade_pnl,
            self.fees,
            self.activity.signals,
            self.activity.entries,
            self.activity.pyramid_adds,
            self.activity.rejections,
            self.activity.stale_skips,
            self.activity.entry_cancellations,
            self.activity.exits_pending,
            self.activity.blacklists,
            self.activity.open_positions,
            self.avg_trade_duration_secs,
        )
    }
}
