//! Trading fee model

use crate::config::ExecutionConfig;
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Taker fees plus margin opening and rollover charges
#[derive(Debug, Clone)]
pub struct FeeSchedule {
    pub taker_fee: Decimal,
    pub margin: bool,
    pub margin_opening_fee: Decimal,
    pub rollover_fee: Decimal,
    pub rollover_interval: Duration,
}

impl FeeSchedule {
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            taker_fee: config.taker_fee,
            margin: config.margin,
            margin_opening_fee: config.margin_opening_fee,
            rollover_fee: config.rollover_fee,
            rollover_interval: Duration::hours(config.rollover_interval_hours),
        }
    }

    /// Fee on an entry or pyramid fill
    pub fn entry_fee(&self, notional: Decimal) -> Decimal {
        let mut fee = notional * self.taker_fee;
        if self.margin {
            fee += notional * self.margin_opening_fee;
        }
        fee
    }

    /// Fee on an exit fill
    pub fn exit_fee(&self, notional: Decimal) -> Decimal {
        notional * self.taker_fee
    }

    /// Rollover charged per full interval held on margin
    pub fn rollover(&self, cost_basis: Decimal, held: Duration) -> Decimal {
        if !self.margin || self.rollover_interval <= Duration::zero() || held <= Duration::zero() {
            return dec!(0);
        }
        let periods = held.num_seconds() / self.rollover_interval.num_seconds();
        cost_basis * self.rollover_fee * Decimal::from(periods)
    }
}
