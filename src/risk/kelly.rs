//! Kelly criterion position sizing

use crate::learning::SymbolPerformanceStats;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Kelly criterion calculator for win/loss return distributions
#[derive(Debug, Clone)]
pub struct KellyCalculator {
    /// Kelly fraction (e.g., 0.25 for quarter Kelly)
    pub fraction: Decimal,
}

impl KellyCalculator {
    /// Create a new Kelly calculator
    pub fn new(fraction: Decimal) -> Self {
        Self { fraction }
    }

    /// Full Kelly edge
    ///
    /// With average win `W` and average loss `L` as fractions of notional:
    /// - `f* = (p*W - q*L) / W`
    ///
    /// Returns `None` when `W <= 0` (no usable payoff estimate).
    pub fn edge(&self, win_rate: Decimal, avg_win: Decimal, avg_loss: Decimal) -> Option<Decimal> {
        if avg_win <= dec!(0) {
            return None;
        }
        let p = win_rate.clamp(dec!(0), Decimal::ONE);
        let q = Decimal::ONE - p;
        Some((p * avg_win - q * avg_loss.abs()) / avg_win)
    }

    /// Fractional Kelly edge for a symbol's long-window stats
    pub fn calculate(&self, stats: &SymbolPerformanceStats) -> Option<Decimal> {
        self.edge(stats.win_rate, stats.avg_win, stats.avg_loss)
            .map(|edge| edge * self.fraction)
    }
}

impl Default for KellyCalculator {
    fn default() -> Self {
        Self::new(dec!(0.25))
    }
}
