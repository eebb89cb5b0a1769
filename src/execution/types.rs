//! Execution types

use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Order identifier
pub type OrderId = Uuid;

/// Exchange-level order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Side that opens or adds to a position
    pub fn entry(side: Side) -> Self {
        match side {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    /// Side that flattens a position
    pub fn exit(side: Side) -> Self {
        match side {
            Side::Long => OrderSide::Sell,
            Side::Short => OrderSide::Buy,
        }
    }
}

/// What an order is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPurpose {
    Entry,
    PyramidAdd,
    Exit,
}

impl OrderPurpose {
    pub fn label(&self) -> &'static str {
        match self {
            OrderPurpose::Entry => "entry",
            OrderPurpose::PyramidAdd => "pyramid_add",
            OrderPurpose::Exit => "exit",
        }
    }
}

/// An order to be submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Client-assigned id; gateways must treat repeats idempotently
    pub client_order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Price the decision was made at
    pub reference_price: Decimal,
    pub purpose: OrderPurpose,
}

impl OrderRequest {
    pub fn new(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        reference_price: Decimal,
        purpose: OrderPurpose,
    ) -> Self {
        Self {
            client_order_id: Uuid::new_v4(),
            symbol: symbol.into(),
            side,
            quantity,
            reference_price,
            purpose,
        }
    }
}

/// A fill (executed trade)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Order ID
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    /// Fill price
    pub price: Decimal,
    /// Filled quantity
    pub quantity: Decimal,
    /// Fill timestamp
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// Gateway answer to a place or confirm request
#[derive(Debug, Clone, PartialEq)]
pub enum OrderResult {
    /// Confirmed execution
    Filled(Fill),
    /// Accepted but not yet confirmed
    Pending(OrderId),
    /// Definitively not executed
    Failed(String),
}

/// Execution boundary failures after retries
#[derive(Debug, Error, PartialEq)]
pub enum ExecutionError {
    /// A single call exceeded its timeout; outcome unknown
    #[error("execution timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },
    /// Retry budget exhausted without confirmation
    #[error("execution failed after {attempts} attempt(s): {reason}")]
    Failed {
        reason: String,
        attempts: u32,
        /// True when the last answer was a timeout or pending, not a rejection
        outcome_unknown: bool,
    },
    /// Venue explicitly refused the order
    #[error("order rejected: {0}")]
    Rejected(String),
}

impl ExecutionError {
    /// Gateway calls made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            ExecutionError::Timeout { attempts } | ExecutionError::Failed { attempts, .. } => {
                *attempts
            }
            ExecutionError::Rejected(_) => 1,
        }
    }

    /// True when the venue may still have accepted the order
    pub fn outcome_unknown(&self) -> bool {
        match self {
            ExecutionError::Timeout { .. } => true,
            ExecutionError::Failed {
                outcome_unknown, ..
            } => *outcome_unknown,
            ExecutionError::Rejected(_) => false,
        }
    }
}
