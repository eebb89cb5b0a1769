//! Engine error type

use crate::execution::ExecutionError;
use crate::position::LifecycleError;
use crate::risk::{BudgetError, RejectReason};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures surfaced by the engine coordinator
///
/// Soft errors are contained to one symbol and reported; they never stop
/// other symbols from being processed.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("{0}")]
    RiskRejected(RejectReason),
    #[error("execution timed out after {attempts} attempt(s)")]
    ExecutionTimeout { attempts: u32 },
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("stale price for {symbol}: {age_secs}s old")]
    StaleData { symbol: String, age_secs: i64 },
    #[error("no price seen yet for {0}")]
    NoMarketData(String),
    #[error("{0} is not in the configured universe")]
    UnknownSymbol(String),
    #[error("tick at {received} is not newer than {last}")]
    OutOfOrder {
        last: DateTime<Utc>,
        received: DateTime<Utc>,
    },
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error(transparent)]
    Lifecycle(LifecycleError),
    #[error("risk budget unavailable")]
    BudgetUnavailable,
}

impl EngineError {
    /// Expected outcomes of normal operation
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            EngineError::RiskRejected(_)
                | EngineError::StaleData { .. }
                | EngineError::NoMarketData(_)
                | EngineError::OutOfOrder { .. }
        )
    }

    /// Stable label for metrics and reports
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::RiskRejected(reason) => reason.code(),
            EngineError::ExecutionTimeout { .. } => "execution_timeout",
            EngineError::ExecutionFailed(_) => "execution_failed",
            EngineError::StaleData { .. } => "stale_data",
            EngineError::NoMarketData(_) => "no_market_data",
            EngineError::UnknownSymbol(_) => "unknown_symbol",
            EngineError::OutOfOrder { .. } => "out_of_order",
            EngineError::InvariantViolation(_) => "invariant_violation",
            EngineError::Lifecycle(_) => "lifecycle",
            EngineError::BudgetUnavailable => "budget_unavailable",
        }
    }
}

impl From<ExecutionError> for EngineError {
    fn from(error: ExecutionError) -> Self {
        match error {
            ExecutionError::Timeout { attempts } => EngineError::ExecutionTimeout { attempts },
            ExecutionError::Failed { reason, .. } => EngineError::ExecutionFailed(reason),
            ExecutionError::Rejected(reason) => {
                EngineError::ExecutionFailed(format!("rejected: {reason}"))
            }
        }
    }
}

impl From<LifecycleError> for EngineError {
    fn from(error: LifecycleError) -> Self {
        match error {
            LifecycleError::OutOfOrder { last, received } => {
                EngineError::OutOfOrder { last, received }
            }
            LifecycleError::InvariantViolation(detail) => EngineError::InvariantViolation(detail),
            other => EngineError::Lifecycle(other),
        }
    }
}

impl From<BudgetError> for EngineError {
    fn from(error: BudgetError) -> Self {
        match error {
            BudgetError::Unavailable => EngineError::BudgetUnavailable,
            other => EngineError::InvariantViolation(other.to_string()),
        }
    }
}
