//! Signal types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Profit when price rises
    Long,
    /// Profit when price falls
    Short,
}

impl Side {
    /// +1 for long, -1 for short
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => Decimal::ONE,
            Side::Short => Decimal::NEGATIVE_ONE,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Directional bias reported by the signal source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
    Hold,
}

impl Direction {
    /// Tradable side, if any
    pub fn side(&self) -> Option<Side> {
        match self {
            Direction::Long => Some(Side::Long),
            Direction::Short => Some(Side::Short),
            Direction::Hold => None,
        }
    }
}

/// Raw signal as delivered by the signal boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalInput {
    pub symbol: String,
    /// Blended confidence score, nominally in `[0, 1]`
    pub raw_confidence: Decimal,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
}

impl SignalInput {
    pub fn new(
        symbol: impl Into<String>,
        raw_confidence: Decimal,
        direction: Direction,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            raw_confidence,
            direction,
            timestamp,
        }
    }
}

/// A signal that cleared intake and may be sent to the risk evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub symbol: String,
    pub side: Side,
    pub raw_confidence: Decimal,
    /// Raw confidence times the symbol multiplier, capped at 1
    pub adjusted_confidence: Decimal,
    /// Multiplier applied
    pub multiplier: Decimal,
    /// Version of the stats snapshot the multiplier came from (0 = none)
    pub stats_version: u64,
}

/// Why intake turned a signal into a hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HoldReason {
    /// Source itself said hold
    NoDirection,
    /// Adjusted confidence under the configured minimum
    BelowThreshold {
        adjusted: Decimal,
        threshold: Decimal,
    },
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldReason::NoDirection => write!(f, "hold: no direction"),
            HoldReason::BelowThreshold {
                adjusted,
                threshold,
            } => write!(
                f,
                "hold: confidence {:.3} below minimum {:.3}",
                adjusted, threshold
            ),
        }
    }
}

/// Result of signal intake
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeDecision {
    Trade(TradeIntent),
    Hold(HoldReason),
}

impl IntakeDecision {
    pub fn is_hold(&self) -> bool {
        matches!(self, IntakeDecision::Hold(_))
    }
}
