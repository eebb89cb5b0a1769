//! Signal intake module
//!
//! Normalizes confidence scores from the external signal source

mod intake;
mod types;

pub use intake::SignalIntake;
pub use types::{Direction, HoldReason, IntakeDecision, Side, SignalInput, TradeIntent};
