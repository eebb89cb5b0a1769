//! Paper trading gateway

use super::{ExecutionGateway, Fill, OrderId, OrderRequest, OrderResult, OrderSide};
use crate::clock::Clock;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// How the paper venue answers orders
#[derive(Debug, Clone, PartialEq)]
pub enum FillBehavior {
    /// Fill on placement
    Immediate,
    /// Report pending until polled this many times
    Delayed { confirmations: u32 },
    /// Sleep before answering any call
    Unresponsive { delay: Duration },
    /// Refuse every order
    Reject(String),
}

#[derive(Debug, Clone)]
struct PaperOrder {
    request: OrderRequest,
    polls_left: u32,
    result: OrderResult,
}

/// Paper trading gateway with simulated fills
///
/// Fills are shifted against the order by the configured slippage. Orders
/// are keyed by client order id so a re-placed order never fills twice.
pub struct PaperGateway {
    slippage: Decimal,
    clock: Arc<dyn Clock>,
    behavior: RwLock<FillBehavior>,
    orders: Arc<RwLock<HashMap<OrderId, PaperOrder>>>,
    fills: Arc<RwLock<Vec<Fill>>>,
}

impl PaperGateway {
    /// Create a new paper trading gateway
    pub fn new(slippage: Decimal, clock: Arc<dyn Clock>) -> Self {
        Self {
            slippage,
            clock,
            behavior: RwLock::new(FillBehavior::Immediate),
            orders: Arc::new(RwLock::new(HashMap::new())),
            fills: Arc::new(RwLock::new(vec![])),
        }
    }

    pub fn with_behavior(self, behavior: FillBehavior) -> Self {
        Self {
            behavior: RwLock::new(behavior),
            ..self
        }
    }

    pub async fn set_behavior(&self, behavior: FillBehavior) {
        *self.behavior.write().await = behavior;
    }

    /// All fills so far
    pub async fn fills(&self) -> Vec<Fill> {
        self.fills.read().await.clone()
    }

    fn fill_price(&self, request: &OrderRequest) -> Decimal {
        match request.side {
            OrderSide::Buy => request.reference_price * (Decimal::ONE + self.slippage),
            OrderSide::Sell => request.reference_price * (Decimal::ONE - self.slippage),
        }
    }

    async fn execute(&self, request: &OrderRequest) -> Fill {
        let fill = Fill {
            order_id: request.client_order_id,
            symbol: request.symbol.clone(),
            side: request.side,
            price: self.fill_price(request),
            quantity: request.quantity,
            timestamp: self.clock.now(),
        };
        self.fills.write().await.push(fill.clone());
        tracing::info!(
            order_id = %fill.order_id,
            symbol = %fill.symbol,
            side = ?fill.side,
            price = %fill.price,
            quantity = %fill.quantity,
            "Paper order filled"
        );
        fill
    }

    async fn stall(&self) {
        let behavior = self.behavior.read().await.clone();
        if let FillBehavior::Unresponsive { delay } = behavior {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ExecutionGateway for PaperGateway {
    async fn place_order(&self, request: OrderRequest) -> anyhow::Result<OrderResult> {
        self.stall().await;

        if let Some(existing) = self.orders.read().await.get(&request.client_order_id) {
            tracing::debug!(order_id = %request.client_order_id, "Duplicate placement, returning original state");
            return Ok(existing.result.clone());
        }

        let behavior = self.behavior.read().await.clone();
        let (result, polls_left) = match behavior {
            FillBehavior::Immediate | FillBehavior::Unresponsive { .. } => {
                (OrderResult::Filled(self.execute(&request).await), 0)
            }
            FillBehavior::Delayed { confirmations } if confirmations > 0 => {
                (OrderResult::Pending(request.client_order_id), confirmations)
            }
            FillBehavior::Delayed { .. } => (OrderResult::Filled(self.execute(&request).await), 0),
            FillBehavior::Reject(reason) => (OrderResult::Failed(reason), 0),
        };

        self.orders.write().await.insert(
            request.client_order_id,
            PaperOrder {
                request,
                polls_left,
                result: result.clone(),
            },
        );
        Ok(result)
    }

    async fn confirm_order(&self, id: OrderId) -> anyhow::Result<OrderResult> {
        self.stall().await;

        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown order {id}"))?;

        if let OrderResult::Pending(_) = order.result {
            order.polls_left = order.polls_left.saturating_sub(1);
            if order.polls_left == 0 {
                order.result = OrderResult::Filled(self.execute(&order.request).await);
            }
        }
        Ok(order.result.clone())
    }

    async fn cancel_order(&self, id: OrderId) -> anyhow::Result<()> {
        let mut orders = self.orders.write().await;
        if let Some(order) = orders.get_mut(&id) {
            if let OrderResult::Pending(_) = order.result {
                order.result = OrderResult::Failed("cancelled".to_string());
            }
        }
        tracing::info!(%id, "Paper order cancelled");
        Ok(())
    }
}
