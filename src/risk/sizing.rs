//! Position sizing
//!
//! Fractional Kelly on the symbol's learned return distribution, damped by
//! volatility and scaled by signal confidence. Symbols without enough history
//! fall back to fixed-risk sizing off the default stop distance.

use super::KellyCalculator;
use crate::config::{ConfidenceTier, Config};
use crate::learning::SymbolPerformanceStats;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Where a size came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingBasis {
    Kelly,
    Fallback,
}

/// Why the sizer returned zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DeclineReason {
    NegativeEdge { edge: Decimal },
    BelowConfidence { confidence: Decimal },
    BelowMinimum { notional: Decimal, minimum: Decimal },
    InvalidPrice { price: Decimal },
}

impl std::fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclineReason::NegativeEdge { edge } => write!(f, "negative edge ({edge})"),
            DeclineReason::BelowConfidence { confidence } => {
                write!(f, "confidence {confidence} below every tier")
            }
            DeclineReason::BelowMinimum { notional, minimum } => {
                write!(f, "notional {notional} below minimum {minimum}")
            }
            DeclineReason::InvalidPrice { price } => write!(f, "invalid price {price}"),
        }
    }
}

/// Fraction of equity to commit, with its derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeDecision {
    pub size_pct: Decimal,
    pub basis: SizingBasis,
    /// Fractional Kelly before volatility and confidence scaling
    pub kelly: Option<Decimal>,
    pub vol_adjustment: Decimal,
    pub confidence_scale: Decimal,
    pub risk_multiplier: Decimal,
    pub declined: Option<DeclineReason>,
}

/// Concrete order size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSize {
    pub notional: Decimal,
    pub quantity: Decimal,
}

#[derive(Debug, Clone)]
pub struct PositionSizer {
    kelly: KellyCalculator,
    tiers: Vec<ConfidenceTier>,
    min_kelly_trades: usize,
    max_position_pct: Decimal,
    risk_per_trade: Decimal,
    default_stop_loss_pct: Decimal,
    min_trade_value: Decimal,
}

impl PositionSizer {
    pub fn from_config(config: &Config) -> Self {
        let mut tiers = config.sizing.confidence_tiers.clone();
        tiers.sort_by(|a, b| b.min_confidence.cmp(&a.min_confidence));
        Self {
            kelly: KellyCalculator::new(config.sizing.kelly_fraction),
            tiers,
            min_kelly_trades: config.sizing.min_kelly_trades,
            max_position_pct: config.risk.max_position_pct,
            risk_per_trade: config.risk.risk_per_trade,
            default_stop_loss_pct: config.position.default_stop_loss_pct,
            min_trade_value: config.risk.min_trade_value,
        }
    }

    pub fn max_position_pct(&self) -> Decimal {
        self.max_position_pct
    }

    /// Multiplier of the highest tier `confidence` reaches, zero below all
    pub fn confidence_scale(&self, confidence: Decimal) -> Decimal {
        self.tiers
            .iter()
            .find(|tier| confidence >= tier.min_confidence)
            .map(|tier| tier.multiplier)
            .unwrap_or(dec!(0))
    }

    fn declined(&self, basis: SizingBasis, kelly: Option<Decimal>, reason: DeclineReason) -> SizeDecision {
        SizeDecision {
            size_pct: dec!(0),
            basis,
            kelly,
            vol_adjustment: Decimal::ONE,
            confidence_scale: dec!(0),
            risk_multiplier: Decimal::ONE,
            declined: Some(reason),
        }
    }

    /// Size as a fraction of equity, clamped to `[0, max_position_pct]`
    pub fn size_pct(
        &self,
        confidence: Decimal,
        stats: Option<&SymbolPerformanceStats>,
        volatility: Decimal,
        risk_multiplier: Decimal,
    ) -> SizeDecision {
        let scale = self.confidence_scale(confidence);
        let risk_multiplier = risk_multiplier.max(dec!(0));

        let kelly_stats = stats.filter(|s| s.total_trades >= self.min_kelly_trades);
        let kelly = kelly_stats.and_then(|s| self.kelly.calculate(s));

        let (basis, raw, vol_adjustment) = match kelly {
            Some(fractional) => {
                if fractional <= dec!(0) {
                    return self.declined(
                        SizingBasis::Kelly,
                        Some(fractional),
                        DeclineReason::NegativeEdge { edge: fractional },
                    );
                }
                // Volatility too large to represent sizes to nothing
                let vol_adjustment = Decimal::ONE
                    .checked_add(volatility.max(dec!(0)))
                    .map_or(Decimal::ZERO, |divisor| Decimal::ONE / divisor);
                (SizingBasis::Kelly, fractional * vol_adjustment, vol_adjustment)
            }
            None => {
                let fixed = if self.default_stop_loss_pct > dec!(0) {
                    (self.risk_per_trade / self.default_stop_loss_pct).min(self.max_position_pct)
                } else {
                    self.max_position_pct
                };
                (SizingBasis::Fallback, fixed, Decimal::ONE)
            }
        };

        if scale <= dec!(0) {
            return self.declined(basis, kelly, DeclineReason::BelowConfidence { confidence });
        }

        let size_pct = (raw * scale * risk_multiplier).clamp(dec!(0), self.max_position_pct);
        SizeDecision {
            size_pct,
            basis,
            kelly,
            vol_adjustment,
            confidence_scale: scale,
            risk_multiplier,
            declined: None,
        }
    }

    /// Convert a size into notional and quantity, capped at `cap_notional`
    pub fn size_order(
        &self,
        decision: &SizeDecision,
        equity: Decimal,
        cap_notional: Decimal,
        price: Decimal,
    ) -> Result<OrderSize, DeclineReason> {
        if let Some(reason) = &decision.declined {
            return Err(reason.clone());
        }
        if price <= dec!(0) {
            return Err(DeclineReason::InvalidPrice { price });
        }

        let notional = (decision.size_pct * equity).min(cap_notional).max(dec!(0));
        if notional < self.min_trade_value {
            return Err(DeclineReason::BelowMinimum {
                notional,
                minimum: self.min_trade_value,
            });
        }

        Ok(OrderSize {
            notional,
            quantity: notional / price,
        })
    }
}
