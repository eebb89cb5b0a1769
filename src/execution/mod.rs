//! Execution module
//!
//! Gateway boundary (paper and live), order routing with timeouts and
//! retries, and fee accounting

mod fees;
mod paper;
mod router;
mod types;

pub use fees::FeeSchedule;
pub use paper::{FillBehavior, PaperGateway};
pub use router::{OrderRouter, RetryPolicy};
pub use types::{
    ExecutionError, Fill, OrderId, OrderPurpose, OrderRequest, OrderResult, OrderSide,
};

use async_trait::async_trait;

/// Trait for execution gateway implementations
///
/// Implementations must treat a repeated `client_order_id` idempotently: a
/// re-placed order returns the original order's state instead of trading
/// twice.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Submit an order
    async fn place_order(&self, request: OrderRequest) -> anyhow::Result<OrderResult>;
    /// Poll an order that was accepted but not yet confirmed
    async fn confirm_order(&self, id: OrderId) -> anyhow::Result<OrderResult>;
    /// Cancel an order
    async fn cancel_order(&self, id: OrderId) -> anyhow::Result<()>;
}
