//! Position types

use crate::execution::OrderId;
use crate::signal::Side;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Position identifier
pub type PositionId = Uuid;

/// Why a position left the market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Initial protective stop crossed
    StopLoss,
    /// Stop crossed after it was lifted to breakeven
    BreakevenStop,
    /// Stop crossed after trailing activated
    TrailingStop,
    TakeProfit,
    MaxHoldingTime,
    /// Close command from outside the engine
    External,
    /// Entry never confirmed
    Cancelled,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::BreakevenStop => "breakeven_stop",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::MaxHoldingTime => "max_holding_time",
            ExitReason::External => "external",
            ExitReason::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Lifecycle state of a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PositionState {
    /// Entry order sent, fill not yet confirmed
    Opening {
        order_id: OrderId,
        requested_qty: Decimal,
        attempts: u32,
    },
    Open,
    /// Add-on order for the given level in flight
    PyramidPending {
        order_id: OrderId,
        level: u32,
        requested_qty: Decimal,
    },
    /// Exit triggered; waiting for the exit fill
    Closing {
        reason: ExitReason,
        trigger_price: Decimal,
        attempts: u32,
        pending_confirmation: bool,
    },
    Closed {
        reason: ExitReason,
        exit_price: Option<Decimal>,
        exit_time: DateTime<Utc>,
    },
}

impl PositionState {
    pub fn status(&self) -> PositionStatus {
        match self {
            PositionState::Opening { .. } => PositionStatus::Opening,
            PositionState::Open => PositionStatus::Open,
            PositionState::PyramidPending { .. } => PositionStatus::PyramidPending,
            PositionState::Closing { .. } => PositionStatus::Closing,
            PositionState::Closed { .. } => PositionStatus::Closed,
        }
    }
}

/// Flat status label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Opening,
    Open,
    PyramidPending,
    Closing,
    Closed,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One confirmed pyramid add
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyramidAdd {
    pub level: u32,
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// A position owned by one symbol lane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Position identifier
    pub id: PositionId,
    pub symbol: String,
    pub side: Side,
    /// Weighted-average entry price
    pub entry_price: Decimal,
    /// Time of the confirmed entry fill
    pub entry_time: DateTime<Utc>,
    /// Quantity currently held
    pub quantity: Decimal,
    /// Quantity of the initial fill; pyramid adds scale from it
    pub initial_quantity: Decimal,
    /// Total quantity bought (long) or sold (short) on entry and adds
    pub acquired_quantity: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    /// Best price seen in the trade's favor
    pub high_water: Decimal,
    pub pyramid_level: u32,
    pub adds: Vec<PyramidAdd>,
    pub state: PositionState,
    /// Gross realized PnL on closed quantity
    pub gross_realized: Decimal,
    /// Net realized PnL (gross minus all fees so far)
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub fees_paid: Decimal,
    /// Adjusted confidence the entry was taken with
    pub entry_confidence: Decimal,
    /// Capital slot held in the risk budget
    pub reserved_notional: Decimal,
    pub breakeven_armed: bool,
    pub trailing_active: bool,
    pub last_price: Option<Decimal>,
    /// Timestamp of the last tick applied
    pub last_tick_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Position {
    pub fn status(&self) -> PositionStatus {
        self.state.status()
    }

    /// Entry notional of the quantity still held
    pub fn notional(&self) -> Decimal {
        self.entry_price * self.quantity
    }

    /// Entry notional of everything acquired
    pub fn cost_basis(&self) -> Decimal {
        self.entry_price * self.acquired_quantity
    }

    /// Favorable move from `reference` to `price` as a fraction
    pub fn favorable_move(&self, reference: Decimal, price: Decimal) -> Decimal {
        if reference.is_zero() {
            return Decimal::ZERO;
        }
        self.side.sign() * (price - reference) / reference
    }

    /// Mark-to-market PnL at `price`
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        self.side.sign() * (price - self.entry_price) * self.quantity
    }

    /// Whether the position currently holds market exposure
    pub fn is_live(&self) -> bool {
        matches!(
            self.state,
            PositionState::Open
                | PositionState::PyramidPending { .. }
                | PositionState::Closing { .. }
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, PositionState::Closed { .. })
    }

    pub fn holding_time(&self, now: DateTime<Utc>) -> Duration {
        now - self.entry_time
    }
}

/// A closed position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPosition {
    /// Final position record
    pub position: Position,
    /// Price of the final exit fill
    pub exit_price: Decimal,
    /// Exit timestamp
    pub exit_time: DateTime<Utc>,
    /// Realized PnL net of fees
    pub realized_pnl: Decimal,
    /// Total fees paid
    pub fees: Decimal,
    pub reason: ExitReason,
}

/// Closed-trade result consumed by the learning loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    /// Unique key; outcomes are deduplicated on it
    pub position_id: PositionId,
    pub symbol: String,
    pub side: Side,
    /// Net PnL in quote currency
    pub pnl: Decimal,
    /// Net PnL as a fraction of cost basis
    pub pnl_pct: Decimal,
    pub duration_secs: i64,
    pub entry_confidence: Decimal,
    pub exit_reason: ExitReason,
    pub closed_at: DateTime<Utc>,
}

impl TradeOutcome {
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_secs)
    }

    pub fn is_win(&self) -> bool {
        self.pnl_pct > Decimal::ZERO
    }
}

/// Illegal or unsafe lifecycle operations
#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: PositionStatus,
        action: &'static str,
    },
    #[error("tick at {received} is not newer than last applied tick at {last}")]
    OutOfOrder {
        last: DateTime<Utc>,
        received: DateTime<Utc>,
    },
    #[error("invalid fill: {0}")]
    InvalidFill(String),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
