//! Risk management module
//!
//! Entry evaluation, position sizing, exposure and loss controls

mod actor;
mod budget;
mod correlation;
mod kelly;
mod limits;
mod sizing;
mod types;

pub use actor::RiskBudgetHandle;
pub use budget::RiskBudget;
pub use correlation::CorrelationTable;
pub use kelly::KellyCalculator;
pub use limits::{trading_day, DailyLedger, DrawdownMonitor};
pub use sizing::{DeclineReason, OrderSize, PositionSizer, SizeDecision, SizingBasis};
pub use types::{
    BudgetError, BudgetSnapshot, DayClose, DrawdownTransition, RejectReason, Reservation,
    ReservationId, RiskDecision,
};
