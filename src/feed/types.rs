//! Price feed types

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single market observation for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Trading symbol (e.g., "BTC/USDT")
    pub symbol: String,
    /// Last traded price
    pub price: Decimal,
    /// Time the price was observed at the source
    pub timestamp: DateTime<Utc>,
    /// Current volatility estimate as a fraction (0.1 = 10%)
    #[serde(default)]
    pub volatility: Decimal,
    /// Average true range in price units, when the collector provides it
    #[serde(default)]
    pub atr: Option<Decimal>,
}

impl PriceTick {
    pub fn new(symbol: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
            volatility: Decimal::ZERO,
            atr: None,
        }
    }

    pub fn with_volatility(mut self, volatility: Decimal) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn with_atr(mut self, atr: Decimal) -> Self {
        self.atr = Some(atr);
        self
    }

    /// Age of the observation; future-dated ticks count as zero age
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).max(Duration::zero())
    }

    /// Whether the tick is recent enough to act upon
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.price > Decimal::ZERO && self.age(now) <= max_age
    }
}
