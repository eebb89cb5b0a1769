//! Engine module
//!
//! Coordinator that owns the per-symbol lanes and drives signals and ticks
//! through risk, sizing, execution, lifecycle and learning.

mod coordinator;
mod error;
mod lane;
mod report;

pub use coordinator::Engine;
pub use error::EngineError;
pub use report::{EngineInput, LaneError, SignalOutcome, TickReport};
