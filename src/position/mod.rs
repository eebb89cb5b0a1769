//! Position lifecycle module
//!
//! Position state machine, stop management and pyramiding

mod lifecycle;
mod types;

pub use lifecycle::{take_profit_pct, ExitProgress, StopMove, StopMoveKind, TickOutcome};
pub use types::{
    ClosedPosition, ExitReason, LifecycleError, Position, PositionId, PositionState,
    PositionStatus, PyramidAdd, TradeOutcome,
};
