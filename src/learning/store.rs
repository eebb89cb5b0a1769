//! Versioned stats store
//!
//! Readers grab an `Arc` snapshot and never block the learner for longer
//! than a map lookup.

use super::SymbolPerformanceStats;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared store of per-symbol snapshots plus the portfolio risk multiplier
#[derive(Debug)]
pub struct StatsStore {
    symbols: RwLock<HashMap<String, Arc<SymbolPerformanceStats>>>,
    risk_multiplier: RwLock<Decimal>,
}

impl Default for StatsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsStore {
    pub fn new() -> Self {
        Self {
            symbols: RwLock::new(HashMap::new()),
            risk_multiplier: RwLock::new(Decimal::ONE),
        }
    }

    /// Latest snapshot for `symbol`
    pub fn get(&self, symbol: &str) -> Option<Arc<SymbolPerformanceStats>> {
        self.symbols.read().get(symbol).cloned()
    }

    /// Swap in a new snapshot; older versions are ignored
    pub fn publish(&self, stats: SymbolPerformanceStats) -> Arc<SymbolPerformanceStats> {
        let mut symbols = self.symbols.write();
        if let Some(current) = symbols.get(&stats.symbol) {
            if current.version >= stats.version {
                tracing::debug!(
                    symbol = %stats.symbol,
                    current = current.version,
                    offered = stats.version,
                    "Ignoring stale stats snapshot"
                );
                return Arc::clone(current);
            }
        }
        let snapshot = Arc::new(stats);
        symbols.insert(snapshot.symbol.clone(), Arc::clone(&snapshot));
        snapshot
    }

    pub fn all(&self) -> Vec<Arc<SymbolPerformanceStats>> {
        let mut all: Vec<_> = self.symbols.read().values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }

    pub fn risk_multiplier(&self) -> Decimal {
        *self.risk_multiplier.read()
    }

    pub fn set_risk_multiplier(&self, value: Decimal) {
        *self.risk_multiplier.write() = value;
    }
}
