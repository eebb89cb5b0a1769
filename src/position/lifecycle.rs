//! Position lifecycle transitions
//!
//! Every mutation of a [`Position`] goes through the functions in this file.
//! Stops only ever move through [`Position::ratchet_stop`], which refuses to
//! loosen them.

use super::{
    ClosedPosition, ExitReason, LifecycleError, Position, PositionState, PositionStatus,
    PyramidAdd, TradeOutcome,
};
use crate::config::PositionConfig;
use crate::execution::{Fill, OrderId};
use crate::feed::PriceTick;
use crate::signal::Side;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What moved a stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMoveKind {
    Breakeven,
    Trailing,
    PyramidReset,
}

/// A stop adjustment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopMove {
    pub from: Decimal,
    pub to: Decimal,
    pub kind: StopMoveKind,
}

/// Result of evaluating a tick against an open position
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Still open; stop may have been tightened
    Held { stop_moved: Option<StopMove> },
    /// Exit condition met; position is now `Closing`
    ExitTriggered {
        reason: ExitReason,
        price: Decimal,
        stop_moved: Option<StopMove>,
    },
}

/// Result of an exit fill
#[derive(Debug, Clone, PartialEq)]
pub enum ExitProgress {
    /// Part of the quantity was closed; the rest still needs an exit
    Partial { remaining: Decimal },
    Closed(Box<ClosedPosition>, TradeOutcome),
}

/// Take-profit distance for an entry at `price`, scaled by ATR when available
pub fn take_profit_pct(rules: &PositionConfig, price: Decimal, atr: Option<Decimal>) -> Decimal {
    match atr {
        Some(atr) if atr > Decimal::ZERO && price > Decimal::ZERO => {
            let atr_pct = atr / price;
            if atr_pct < rules.atr_low_threshold {
                rules.take_profit_low_vol_pct
            } else if atr_pct <= rules.atr_high_threshold {
                rules.take_profit_normal_vol_pct
            } else {
                rules.take_profit_high_vol_pct
            }
        }
        _ => rules.default_take_profit_pct,
    }
}

fn validate_fill(fill: &Fill) -> Result<(), LifecycleError> {
    if fill.quantity <= Decimal::ZERO {
        return Err(LifecycleError::InvalidFill(format!(
            "non-positive quantity {}",
            fill.quantity
        )));
    }
    if fill.price <= Decimal::ZERO {
        return Err(LifecycleError::InvalidFill(format!(
            "non-positive price {}",
            fill.price
        )));
    }
    Ok(())
}

impl Position {
    /// New position waiting for its entry fill
    #[allow(clippy::too_many_arguments)]
    pub fn opening(
        symbol: impl Into<String>,
        side: Side,
        order_id: OrderId,
        requested_qty: Decimal,
        reference_price: Decimal,
        entry_confidence: Decimal,
        reserved_notional: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            symbol: symbol.into(),
            side,
            entry_price: reference_price,
            entry_time: now,
            quantity: Decimal::ZERO,
            initial_quantity: Decimal::ZERO,
            acquired_quantity: Decimal::ZERO,
            stop_loss: Decimal::ZERO,
            take_profit: Decimal::ZERO,
            high_water: reference_price,
            pyramid_level: 0,
            adds: Vec::new(),
            state: PositionState::Opening {
                order_id,
                requested_qty,
                attempts: 0,
            },
            gross_realized: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            fees_paid: Decimal::ZERO,
            entry_confidence,
            reserved_notional,
            breakeven_armed: false,
            trailing_active: false,
            last_price: None,
            last_tick_at: None,
            created_at: now,
        }
    }

    fn expect(&self, status: PositionStatus, action: &'static str) -> Result<(), LifecycleError> {
        if self.status() != status {
            return Err(LifecycleError::InvalidTransition {
                from: self.status(),
                action,
            });
        }
        Ok(())
    }

    fn refresh_realized(&mut self) {
        self.realized_pnl = self.gross_realized - self.fees_paid;
    }

    /// Record a confirmation attempt on an entry that has not filled yet
    pub fn note_entry_attempts(&mut self, count: u32) {
        if let PositionState::Opening { attempts, .. } = &mut self.state {
            *attempts += count;
        }
    }

    /// `Opening -> Open` on a confirmed entry fill
    pub fn confirm_open(
        &mut self,
        fill: &Fill,
        entry_fees: Decimal,
        rules: &PositionConfig,
        atr: Option<Decimal>,
    ) -> Result<(), LifecycleError> {
        self.expect(PositionStatus::Opening, "confirm entry fill")?;
        validate_fill(fill)?;

        let sign = self.side.sign();
        let tp_pct = take_profit_pct(rules, fill.price, atr);

        self.entry_price = fill.price;
        self.entry_time = fill.timestamp;
        self.quantity = fill.quantity;
        self.initial_quantity = fill.quantity;
        self.acquired_quantity = fill.quantity;
        self.stop_loss = fill.price * (Decimal::ONE - sign * rules.default_stop_loss_pct);
        self.take_profit = fill.price * (Decimal::ONE + sign * tp_pct);
        self.high_water = fill.price;
        self.fees_paid += entry_fees;
        self.refresh_realized();
        self.last_price = Some(fill.price);
        self.unrealized_pnl = Decimal::ZERO;
        self.state = PositionState::Open;
        Ok(())
    }

    /// `Opening -> Closed(Cancelled)` when the entry could not be confirmed
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.expect(PositionStatus::Opening, "cancel entry")?;
        self.state = PositionState::Closed {
            reason: ExitReason::Cancelled,
            exit_price: None,
            exit_time: now,
        };
        Ok(())
    }

    /// Tighten the stop to `candidate`; returns whether it moved
    pub fn ratchet_stop(&mut self, candidate: Decimal) -> bool {
        let tighter = match self.side {
            Side::Long => candidate > self.stop_loss,
            Side::Short => candidate < self.stop_loss,
        };
        if tighter {
            self.stop_loss = candidate;
        }
        tighter
    }

    fn accept_tick(&mut self, tick: &PriceTick) -> Result<(), LifecycleError> {
        if let Some(last) = self.last_tick_at {
            if tick.timestamp <= last {
                return Err(LifecycleError::OutOfOrder {
                    last,
                    received: tick.timestamp,
                });
            }
        }
        self.last_tick_at = Some(tick.timestamp);
        self.last_price = Some(tick.price);
        self.high_water = match self.side {
            Side::Long => self.high_water.max(tick.price),
            Side::Short => self.high_water.min(tick.price),
        };
        self.unrealized_pnl = self.pnl_at(tick.price);
        Ok(())
    }

    /// Update marks for a position that is not evaluated for exits (closing)
    pub fn mark(&mut self, tick: &PriceTick) -> Result<(), LifecycleError> {
        if !self.is_live() {
            return Err(LifecycleError::InvalidTransition {
                from: self.status(),
                action: "mark price",
            });
        }
        self.accept_tick(tick)
    }

    fn stop_reason(&self) -> ExitReason {
        if self.trailing_active && self.favorable_move(self.entry_price, self.stop_loss) > Decimal::ZERO
        {
            ExitReason::TrailingStop
        } else if self.breakeven_armed {
            ExitReason::BreakevenStop
        } else {
            ExitReason::StopLoss
        }
    }

    fn exit_condition(&self, tick: &PriceTick, rules: &PositionConfig) -> Option<ExitReason> {
        let price = tick.price;
        let stop_hit = match self.side {
            Side::Long => price <= self.stop_loss,
            Side::Short => price >= self.stop_loss,
        };
        if stop_hit {
            return Some(self.stop_reason());
        }

        let target_hit = match self.side {
            Side::Long => price >= self.take_profit,
            Side::Short => price <= self.take_profit,
        };
        if target_hit {
            return Some(ExitReason::TakeProfit);
        }

        if rules.max_holding_hours > 0
            && self.holding_time(tick.timestamp) > Duration::hours(rules.max_holding_hours)
        {
            return Some(ExitReason::MaxHoldingTime);
        }
        None
    }

    /// Evaluate a fresh tick: breakeven, trailing, then exit conditions
    pub fn on_tick(
        &mut self,
        tick: &PriceTick,
        rules: &PositionConfig,
    ) -> Result<TickOutcome, LifecycleError> {
        self.expect(PositionStatus::Open, "evaluate tick")?;
        self.accept_tick(tick)?;

        let price = tick.price;
        let stop_before = self.stop_loss;
        let mut kind = None;
        let gain = self.favorable_move(self.entry_price, price);

        if !self.breakeven_armed && gain >= rules.breakeven_trigger_pct {
            self.breakeven_armed = true;
            if self.ratchet_stop(self.entry_price) {
                kind = Some(StopMoveKind::Breakeven);
            }
        }

        if gain > rules.trailing_stop_activation_pct {
            self.trailing_active = true;
        }
        if self.trailing_active {
            let candidate =
                price * (Decimal::ONE - self.side.sign() * rules.trailing_stop_distance_pct);
            if self.ratchet_stop(candidate) {
                kind = Some(StopMoveKind::Trailing);
            }
        }

        let stop_moved = kind.map(|kind| StopMove {
            from: stop_before,
            to: self.stop_loss,
            kind,
        });

        if let Some(reason) = self.exit_condition(tick, rules) {
            self.state = PositionState::Closing {
                reason,
                trigger_price: price,
                attempts: 0,
                pending_confirmation: false,
            };
            return Ok(TickOutcome::ExitTriggered {
                reason,
                price,
                stop_moved,
            });
        }

        Ok(TickOutcome::Held { stop_moved })
    }

    /// Quantity for the next pyramid add, if the trend condition holds
    pub fn pyramid_quantity(
        &self,
        price: Decimal,
        confidence: Decimal,
        rules: &PositionConfig,
    ) -> Option<Decimal> {
        if self.status() != PositionStatus::Open
            || self.pyramid_level >= rules.pyramiding_max_levels
            || confidence < rules.pyramid_min_confidence
        {
            return None;
        }

        // Before any add the entry price is the initial fill price
        let reference = self
            .adds
            .last()
            .map(|add| add.price)
            .unwrap_or(self.entry_price);
        if self.favorable_move(reference, price) < rules.pyramid_trigger_pct {
            return None;
        }

        let mut quantity = self.initial_quantity;
        for _ in 0..=self.pyramid_level {
            quantity *= rules.pyramid_size_ratio;
        }
        (quantity > Decimal::ZERO).then_some(quantity)
    }

    /// `Open -> PyramidPending`
    pub fn begin_pyramid(
        &mut self,
        order_id: OrderId,
        requested_qty: Decimal,
    ) -> Result<(), LifecycleError> {
        self.expect(PositionStatus::Open, "add to position")?;
        self.state = PositionState::PyramidPending {
            order_id,
            level: self.pyramid_level + 1,
            requested_qty,
        };
        Ok(())
    }

    /// `PyramidPending -> Open` with a confirmed add
    ///
    /// Recomputes the weighted-average entry and lifts the stop to at least
    /// the new average entry.
    pub fn confirm_pyramid(
        &mut self,
        fill: &Fill,
        fees: Decimal,
    ) -> Result<Option<StopMove>, LifecycleError> {
        let level = match self.state {
            PositionState::PyramidPending { level, .. } => level,
            _ => {
                return Err(LifecycleError::InvalidTransition {
                    from: self.status(),
                    action: "confirm pyramid fill",
                })
            }
        };
        validate_fill(fill)?;

        let total = self.quantity + fill.quantity;
        self.entry_price = (self.entry_price * self.quantity + fill.price * fill.quantity) / total;
        self.quantity = total;
        self.acquired_quantity += fill.quantity;
        self.pyramid_level = level;
        self.adds.push(PyramidAdd {
            level,
            price: fill.price,
            quantity: fill.quantity,
            timestamp: fill.timestamp,
        });
        self.fees_paid += fees;
        self.refresh_realized();

        let stop_before = self.stop_loss;
        self.breakeven_armed = true;
        let moved = self.ratchet_stop(self.entry_price).then(|| StopMove {
            from: stop_before,
            to: self.stop_loss,
            kind: StopMoveKind::PyramidReset,
        });

        self.unrealized_pnl = self.pnl_at(self.last_price.unwrap_or(fill.price));
        self.state = PositionState::Open;
        Ok(moved)
    }

    /// `PyramidPending -> Open` when the add did not fill
    pub fn abort_pyramid(&mut self) -> Result<(), LifecycleError> {
        self.expect(PositionStatus::PyramidPending, "abort pyramid add")?;
        self.state = PositionState::Open;
        Ok(())
    }

    /// `Open -> Closing` on an external close command
    ///
    /// Already-closing positions are left untouched.
    pub fn request_close(&mut self, reason: ExitReason, price: Decimal) -> Result<(), LifecycleError> {
        match self.state {
            PositionState::Open => {
                self.state = PositionState::Closing {
                    reason,
                    trigger_price: price,
                    attempts: 0,
                    pending_confirmation: false,
                };
                Ok(())
            }
            PositionState::Closing { .. } => Ok(()),
            _ => Err(LifecycleError::InvalidTransition {
                from: self.status(),
                action: "close position",
            }),
        }
    }

    /// Exit could not be confirmed; stay `Closing` and retry next tick
    pub fn exit_unconfirmed(&mut self) -> Result<u32, LifecycleError> {
        match &mut self.state {
            PositionState::Closing {
                attempts,
                pending_confirmation,
                ..
            } => {
                *attempts += 1;
                *pending_confirmation = true;
                Ok(*attempts)
            }
            _ => Err(LifecycleError::InvalidTransition {
                from: self.status(),
                action: "mark exit unconfirmed",
            }),
        }
    }

    /// Apply a confirmed exit fill; `Closing -> Closed` once flat
    pub fn confirm_close(
        &mut self,
        fill: &Fill,
        exit_fees: Decimal,
    ) -> Result<ExitProgress, LifecycleError> {
        let reason = match self.state {
            PositionState::Closing { reason, .. } => reason,
            _ => {
                return Err(LifecycleError::InvalidTransition {
                    from: self.status(),
                    action: "confirm exit fill",
                })
            }
        };
        validate_fill(fill)?;

        let closed_qty = fill.quantity.min(self.quantity);
        self.gross_realized += self.side.sign() * (fill.price - self.entry_price) * closed_qty;
        self.fees_paid += exit_fees;
        self.refresh_realized();
        self.quantity -= closed_qty;

        if self.quantity > Decimal::ZERO {
            self.unrealized_pnl = self.pnl_at(fill.price);
            if let PositionState::Closing {
                pending_confirmation,
                ..
            } = &mut self.state
            {
                *pending_confirmation = true;
            }
            return Ok(ExitProgress::Partial {
                remaining: self.quantity,
            });
        }

        self.unrealized_pnl = Decimal::ZERO;
        self.last_price = Some(fill.price);
        self.state = PositionState::Closed {
            reason,
            exit_price: Some(fill.price),
            exit_time: fill.timestamp,
        };

        let cost = self.cost_basis();
        let pnl_pct = if cost > Decimal::ZERO {
            self.realized_pnl / cost
        } else {
            Decimal::ZERO
        };
        let outcome = TradeOutcome {
            position_id: self.id,
            symbol: self.symbol.clone(),
            side: self.side,
            pnl: self.realized_pnl,
            pnl_pct,
            duration_secs: (fill.timestamp - self.entry_time).num_seconds(),
            entry_confidence: self.entry_confidence,
            exit_reason: reason,
            closed_at: fill.timestamp,
        };
        let closed = ClosedPosition {
            position: self.clone(),
            exit_price: fill.price,
            exit_time: fill.timestamp,
            realized_pnl: self.realized_pnl,
            fees: self.fees_paid,
            reason,
        };
        Ok(ExitProgress::Closed(Box::new(closed), outcome))
    }
}
