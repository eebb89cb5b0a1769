//! Results returned by the engine

use super::EngineError;
use crate::feed::PriceTick;
use crate::position::{Position, TradeOutcome};
use crate::risk::DeclineReason;
use crate::signal::{HoldReason, SignalInput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a signal that was not rejected
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Hold(HoldReason),
    /// Sizer produced nothing worth trading; reservation released
    Declined(DeclineReason),
    Opened(Box<Position>),
    /// Entry fill never confirmed; order cancelled and reservation released
    EntryCancelled { reason: String },
    /// A position is already live; the confidence is kept for pyramiding
    PositionLive { confidence: Option<rust_decimal::Decimal> },
}

/// A soft or hard error attributed to one symbol
#[derive(Debug, PartialEq)]
pub struct LaneError {
    pub symbol: String,
    pub error: EngineError,
}

/// Summary of one tick batch
#[derive(Debug, Default, PartialEq)]
pub struct TickReport {
    pub ticks: usize,
    pub stale: usize,
    pub stop_moves: usize,
    pub pyramids: usize,
    pub exits_pending: usize,
    pub closed: Vec<TradeOutcome>,
    pub errors: Vec<LaneError>,
}

impl TickReport {
    pub fn merge(&mut self, other: TickReport) {
        self.ticks += other.ticks;
        self.stale += other.stale;
        self.stop_moves += other.stop_moves;
        self.pyramids += other.pyramids;
        self.exits_pending += other.exits_pending;
        self.closed.extend(other.closed);
        self.errors.extend(other.errors);
    }

    pub fn has_hard_errors(&self) -> bool {
        self.errors.iter().any(|e| !e.error.is_soft())
    }
}

/// Input accepted by the engine's run loop, one JSON object per line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineInput {
    Tick(PriceTick),
    Signal(SignalInput),
    Close {
        symbol: String,
        timestamp: DateTime<Utc>,
    },
}

impl EngineInput {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            EngineInput::Tick(tick) => tick.timestamp,
            EngineInput::Signal(signal) => signal.timestamp,
            EngineInput::Close { timestamp, .. } => *timestamp,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            EngineInput::Tick(tick) => &tick.symbol,
            EngineInput::Signal(signal) => &signal.symbol,
            EngineInput::Close { symbol, .. } => symbol,
        }
    }
}
