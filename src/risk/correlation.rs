//! Pairwise symbol correlations
//!
//! Built-in estimates for the major pairs, overridable from configuration.
//! Lookups are symmetric and ignore the quote currency.

use crate::config::CorrelationEntry;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

const DEFAULT_CORRELATION: Decimal = dec!(0.5);

const BUILTIN: &[(&str, &str, Decimal)] = &[
    ("BTC", "ETH", dec!(0.85)),
    ("BTC", "SOL", dec!(0.75)),
    ("ETH", "SOL", dec!(0.80)),
    ("BTC", "BNB", dec!(0.70)),
    ("BTC", "XRP", dec!(0.65)),
    ("BTC", "ADA", dec!(0.60)),
    ("BTC", "DOGE", dec!(0.55)),
];

fn base_asset(symbol: &str) -> &str {
    symbol.split(['/', '-', '_']).next().unwrap_or(symbol)
}

fn key(a: &str, b: &str) -> (String, String) {
    let (a, b) = (base_asset(a).to_uppercase(), base_asset(b).to_uppercase());
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone)]
pub struct CorrelationTable {
    pairs: HashMap<(String, String), Decimal>,
    default: Decimal,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::with_overrides(&[])
    }
}

impl CorrelationTable {
    pub fn with_overrides(overrides: &[CorrelationEntry]) -> Self {
        let mut pairs = HashMap::new();
        for (a, b, value) in BUILTIN {
            pairs.insert(key(a, b), *value);
        }
        for entry in overrides {
            pairs.insert(key(&entry.a, &entry.b), entry.value);
        }
        Self {
            pairs,
            default: DEFAULT_CORRELATION,
        }
    }

    pub fn get(&self, a: &str, b: &str) -> Decimal {
        if base_asset(a).eq_ignore_ascii_case(base_asset(b)) {
            return Decimal::ONE;
        }
        self.pairs.get(&key(a, b)).copied().unwrap_or(self.default)
    }
}
