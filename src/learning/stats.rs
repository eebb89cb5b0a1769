//! Per-symbol performance statistics

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Summary of a window of trade returns (fractions of cost basis)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowSummary {
    pub trades: usize,
    pub win_rate: Decimal,
    /// Mean return of winning trades
    pub avg_win: Decimal,
    /// Mean magnitude of losing trades (positive)
    pub avg_loss: Decimal,
    /// Mean return per trade
    pub expectancy: Decimal,
}

impl WindowSummary {
    pub fn from_returns<'a>(returns: impl IntoIterator<Item = &'a Decimal>) -> Self {
        let mut trades = 0usize;
        let mut wins = 0usize;
        let mut win_sum = Decimal::ZERO;
        let mut loss_sum = Decimal::ZERO;

        for r in returns {
            trades += 1;
            if *r > Decimal::ZERO {
                wins += 1;
                win_sum += *r;
            } else {
                loss_sum += -*r;
            }
        }

        if trades == 0 {
            return Self::default();
        }

        let losses = trades - wins;
        let n = Decimal::from(trades);
        Self {
            trades,
            win_rate: Decimal::from(wins) / n,
            avg_win: if wins > 0 {
                win_sum / Decimal::from(wins)
            } else {
                Decimal::ZERO
            },
            avg_loss: if losses > 0 {
                loss_sum / Decimal::from(losses)
            } else {
                Decimal::ZERO
            },
            expectancy: (win_sum - loss_sum) / n,
        }
    }
}

/// Immutable snapshot of what the engine has learned about one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolPerformanceStats {
    pub symbol: String,
    /// Monotonic per symbol; 0 means nothing learned yet
    pub version: u64,
    /// Outcomes processed over the symbol's lifetime
    pub total_trades: usize,
    /// Long-window figures, used by the sizer
    pub win_rate: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub long_expectancy: Decimal,
    /// Short-window figures, used for blacklisting
    pub short_win_rate: Decimal,
    pub short_expectancy: Decimal,
    pub confidence_multiplier: Decimal,
    pub blacklist_strikes: u32,
    pub trades_since_blacklist: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SymbolPerformanceStats {
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            version: 0,
            total_trades: 0,
            win_rate: Decimal::ZERO,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            long_expectancy: Decimal::ZERO,
            short_win_rate: Decimal::ZERO,
            short_expectancy: Decimal::ZERO,
            confidence_multiplier: Decimal::ONE,
            blacklist_strikes: 0,
            trades_since_blacklist: 0,
            updated_at: None,
        }
    }
}
