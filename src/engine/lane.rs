//! Per-symbol lane state

use crate::execution::{OrderPurpose, OrderRequest, OrderSide};
use crate::feed::PriceTick;
use crate::position::Position;
use rust_decimal::Decimal;

/// Everything the engine tracks for one symbol
///
/// A lane lives behind its own async mutex; holding the lock is the only way
/// to touch the symbol's position.
#[derive(Debug)]
pub(crate) struct Lane {
    pub symbol: String,
    pub position: Option<Position>,
    /// Most recent tick seen, used as the reference price for new orders
    pub last_tick: Option<PriceTick>,
    /// Latest same-side adjusted confidence, gates pyramid adds
    pub confidence: Option<Decimal>,
    /// Exit order re-placed under the same id until it is confirmed
    pub pending_exit: Option<OrderRequest>,
}

impl Lane {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            position: None,
            last_tick: None,
            confidence: None,
            pending_exit: None,
        }
    }

    /// Remember `tick` if it is newer than the last one seen
    pub fn observe(&mut self, tick: &PriceTick) {
        let newer = self
            .last_tick
            .as_ref()
            .map_or(true, |last| tick.timestamp > last.timestamp);
        if newer {
            self.last_tick = Some(tick.clone());
        }
    }

    pub fn live_position(&self) -> Option<&Position> {
        self.position.as_ref().filter(|p| p.is_live())
    }

    /// Exit order for the remaining quantity, reusing an unconfirmed one
    pub fn exit_request(&mut self, price: Decimal) -> Option<OrderRequest> {
        if let Some(pending) = &self.pending_exit {
            return Some(pending.clone());
        }
        let position = self.position.as_ref()?;
        let request = OrderRequest::new(
            position.symbol.clone(),
            OrderSide::exit(position.side),
            position.quantity,
            price,
            OrderPurpose::Exit,
        );
        self.pending_exit = Some(request.clone());
        Some(request)
    }

    /// Forget a closed position
    pub fn clear(&mut self) {
        self.position = None;
        self.confidence = None;
        self.pending_exit = None;
    }
}
