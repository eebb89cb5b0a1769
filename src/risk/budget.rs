//! Portfolio risk budget
//!
//! Process-wide counters behind every entry decision: equity, daily loss,
//! drawdown pause, open exposure, reservations, cooldowns, blacklists and
//! per-symbol halts. The budget itself is plain synchronous state; it is
//! owned by a single task (see [`super::RiskBudgetHandle`]) so every decision
//! observes the latest committed figures.

use super::{
    BudgetError, BudgetSnapshot, CorrelationTable, DailyLedger, DayClose, DrawdownMonitor,
    DrawdownTransition, RejectReason, Reservation, ReservationId, RiskDecision,
};
use crate::config::{ExecutionMode, RiskConfig};
use crate::position::PositionId;
use crate::signal::Side;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Exposure {
    symbol: String,
    side: Side,
    notional: Decimal,
}

#[derive(Debug)]
pub struct RiskBudget {
    limits: RiskConfig,
    max_open_positions: usize,
    correlations: CorrelationTable,
    /// Initial capital plus realized PnL
    equity: Decimal,
    unrealized: Decimal,
    daily: DailyLedger,
    drawdown: DrawdownMonitor,
    exposures: HashMap<PositionId, Exposure>,
    reservations: HashMap<ReservationId, Reservation>,
    last_trade: HashMap<String, DateTime<Utc>>,
    blacklist: HashMap<String, DateTime<Utc>>,
    halted: HashMap<String, String>,
    closed_days: Vec<DayClose>,
}

impl RiskBudget {
    pub fn new(
        limits: RiskConfig,
        mode: &ExecutionMode,
        initial_capital: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            max_open_positions: limits.max_open_positions_for(mode),
            correlations: CorrelationTable::with_overrides(&limits.correlations),
            daily: DailyLedger::new(now, limits.daily_reset_hour_utc, initial_capital),
            drawdown: DrawdownMonitor::new(initial_capital),
            limits,
            equity: initial_capital,
            unrealized: dec!(0),
            exposures: HashMap::new(),
            reservations: HashMap::new(),
            last_trade: HashMap::new(),
            blacklist: HashMap::new(),
            halted: HashMap::new(),
            closed_days: Vec::new(),
        }
    }

    pub fn equity(&self) -> Decimal {
        self.equity
    }

    /// Total notional the portfolio may carry
    pub fn exposure_ceiling(&self) -> Decimal {
        self.limits.max_portfolio_exposure_pct * self.equity
    }

    fn open_exposure(&self) -> Decimal {
        self.exposures.values().map(|e| e.notional).sum()
    }

    fn reserved(&self) -> Decimal {
        self.reservations.values().map(|r| r.notional).sum()
    }

    /// Open exposure plus outstanding reservations
    pub fn committed(&self) -> Decimal {
        self.open_exposure() + self.reserved()
    }

    fn entry_reservations(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.values().filter(|r| r.position_id.is_none())
    }

    fn live_count(&self) -> usize {
        self.exposures.len() + self.entry_reservations().count()
    }

    fn symbol_live(&self, symbol: &str) -> bool {
        self.exposures.values().any(|e| e.symbol == symbol)
            || self.entry_reservations().any(|r| r.symbol == symbol)
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        if let Some(closed) = self
            .daily
            .roll(now, self.limits.daily_reset_hour_utc, self.equity)
        {
            tracing::info!(
                day = %closed.day,
                realized = %closed.realized_pnl,
                "Trading day closed"
            );
            self.closed_days.push(closed);
        }
    }

    /// Halt, blacklist and cooldown checks for one symbol
    fn symbol_gate(&mut self, symbol: &str, now: DateTime<Utc>) -> Result<(), RejectReason> {
        if let Some(reason) = self.halted.get(symbol) {
            return Err(RejectReason::Halted {
                reason: reason.clone(),
            });
        }

        if let Some(until) = self.blacklist.get(symbol).copied() {
            if now < until {
                return Err(RejectReason::Blacklisted { until });
            }
            self.blacklist.remove(symbol);
            tracing::info!(symbol, "Blacklist expired");
        }

        if let Some(last) = self.last_trade.get(symbol) {
            let until = *last + Duration::minutes(self.limits.cooldown_minutes);
            if now < until {
                return Err(RejectReason::Cooldown { until });
            }
        }
        Ok(())
    }

    /// Daily loss and drawdown checks
    fn account_gate(&mut self, now: DateTime<Utc>) -> Result<(), RejectReason> {
        if self.daily.limit_reached(self.limits.max_daily_loss_pct) {
            return Err(RejectReason::DailyLossLimit {
                loss: self.daily.loss(),
                limit: self.daily.loss_limit(self.limits.max_daily_loss_pct),
            });
        }

        self.drawdown.refresh(now, &self.limits);
        if self.drawdown.is_paused() {
            return Err(RejectReason::DrawdownPaused {
                drawdown: self.drawdown.current_drawdown(),
            });
        }
        Ok(())
    }

    /// Same-side positions correlated with `symbol`: (positions, notional)
    fn correlated_book(&self, symbol: &str, side: Side) -> (usize, Decimal) {
        let threshold = self.limits.max_correlation;
        let correlated =
            |other: &str, other_side: Side| other_side == side && self.correlations.get(symbol, other) >= threshold;

        let mut count = 0;
        let mut notional = dec!(0);
        for exposure in self.exposures.values() {
            if correlated(&exposure.symbol, exposure.side) {
                count += 1;
                notional += exposure.notional;
            }
        }
        for reservation in self.reservations.values() {
            if correlated(&reservation.symbol, reservation.side) {
                if reservation.position_id.is_none() {
                    count += 1;
                }
                notional += reservation.notional;
            }
        }
        (count, notional)
    }

    fn correlated_headroom(&self, notional: Decimal) -> Decimal {
        self.limits.max_correlated_exposure_pct * self.equity - notional
    }

    /// Evaluate an entry; on allow a reservation is held for the symbol
    pub fn evaluate(&mut self, symbol: &str, side: Side, now: DateTime<Utc>) -> RiskDecision {
        match self.check_entry(symbol, side, now) {
            Ok(notional) => {
                let reservation = Reservation {
                    id: Uuid::new_v4(),
                    symbol: symbol.to_string(),
                    side,
                    notional,
                    position_id: None,
                    created_at: now,
                };
                self.reservations.insert(reservation.id, reservation.clone());
                tracing::debug!(
                    symbol,
                    reservation_id = %reservation.id,
                    notional = %notional,
                    "Capital reserved"
                );
                RiskDecision::Allow(reservation)
            }
            Err(reason) => {
                tracing::debug!(symbol, reason = %reason, "Entry rejected");
                RiskDecision::Reject(reason)
            }
        }
    }

    fn check_entry(&mut self, symbol: &str, side: Side, now: DateTime<Utc>) -> Result<Decimal, RejectReason> {
        self.roll(now);

        self.symbol_gate(symbol, now)?;
        if self.symbol_live(symbol) {
            return Err(RejectReason::PositionExists);
        }

        self.account_gate(now)?;

        if let Some(limit) = self.limits.max_daily_trades {
            // In-flight entries count against the day
            let started = self.daily.trades as usize + self.entry_reservations().count();
            if started >= limit as usize {
                return Err(RejectReason::MaxDailyTrades { limit });
            }
        }

        if self.live_count() >= self.max_open_positions {
            return Err(RejectReason::MaxOpenPositions {
                limit: self.max_open_positions,
            });
        }

        let (count, correlated) = self.correlated_book(symbol, side);
        if count >= self.limits.max_correlated_positions {
            return Err(RejectReason::CorrelatedPositions {
                count,
                limit: self.limits.max_correlated_positions,
            });
        }
        let correlated_headroom = self.correlated_headroom(correlated);
        if correlated_headroom < self.limits.min_trade_value {
            return Err(RejectReason::CorrelatedExposure {
                headroom: correlated_headroom,
            });
        }

        let headroom = self.exposure_ceiling() - self.committed();
        if headroom < self.limits.min_trade_value {
            return Err(RejectReason::InsufficientHeadroom { headroom });
        }

        Ok((self.limits.max_position_pct * self.equity)
            .min(headroom)
            .min(correlated_headroom))
    }

    /// Evaluate a pyramid add of `notional` to a live position
    pub fn request_pyramid(
        &mut self,
        position_id: PositionId,
        notional: Decimal,
        now: DateTime<Utc>,
    ) -> RiskDecision {
        let Some(exposure) = self.exposures.get(&position_id).cloned() else {
            return RiskDecision::Reject(RejectReason::NoPosition);
        };
        self.roll(now);

        if let Err(reason) = self.check_pyramid(&exposure, notional, now) {
            return RiskDecision::Reject(reason);
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            symbol: exposure.symbol,
            side: exposure.side,
            notional,
            position_id: Some(position_id),
            created_at: now,
        };
        self.reservations.insert(reservation.id, reservation.clone());
        RiskDecision::Allow(reservation)
    }

    fn check_pyramid(
        &mut self,
        exposure: &Exposure,
        notional: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), RejectReason> {
        if let Some(reason) = self.halted.get(&exposure.symbol) {
            return Err(RejectReason::Halted {
                reason: reason.clone(),
            });
        }
        if let Some(until) = self.blacklist.get(&exposure.symbol).copied() {
            if now < until {
                return Err(RejectReason::Blacklisted { until });
            }
        }
        self.account_gate(now)?;

        let (_, correlated) = self.correlated_book(&exposure.symbol, exposure.side);
        let correlated_headroom = self.correlated_headroom(correlated);
        if correlated_headroom < notional {
            return Err(RejectReason::CorrelatedExposure {
                headroom: correlated_headroom,
            });
        }
        let headroom = self.exposure_ceiling() - self.committed();
        if headroom < notional {
            return Err(RejectReason::InsufficientHeadroom { headroom });
        }
        Ok(())
    }

    /// Shrink a reservation to what the sizer actually needs
    pub fn resize(&mut self, id: ReservationId, notional: Decimal) -> Result<Reservation, BudgetError> {
        let reservation = self
            .reservations
            .get_mut(&id)
            .ok_or(BudgetError::UnknownReservation(id))?;
        reservation.notional = notional.max(dec!(0)).min(reservation.notional);
        Ok(reservation.clone())
    }

    /// Drop a reservation without trading
    pub fn release(&mut self, id: ReservationId) -> Option<Reservation> {
        let released = self.reservations.remove(&id);
        if let Some(reservation) = &released {
            tracing::debug!(symbol = %reservation.symbol, reservation_id = %id, "Reservation released");
        }
        released
    }

    /// Convert a reservation into open exposure once its fill is confirmed
    ///
    /// The exposure is recorded even when it breaches the ceiling; in that
    /// case the symbol is halted and an error returned.
    pub fn commit(
        &mut self,
        id: ReservationId,
        position_id: PositionId,
        notional: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), BudgetError> {
        let reservation = self
            .reservations
            .remove(&id)
            .ok_or(BudgetError::UnknownReservation(id))?;

        match reservation.position_id {
            Some(existing) => {
                if let Some(exposure) = self.exposures.get_mut(&existing) {
                    exposure.notional += notional;
                }
            }
            None => {
                self.exposures.insert(
                    position_id,
                    Exposure {
                        symbol: reservation.symbol.clone(),
                        side: reservation.side,
                        notional,
                    },
                );
                self.last_trade.insert(reservation.symbol.clone(), now);
                self.daily.record_entry();
            }
        }

        let total = self.committed();
        let ceiling = self.exposure_ceiling();
        if notional > reservation.notional && total > ceiling {
            let reason = format!("exposure {total} exceeds ceiling {ceiling}");
            tracing::error!(symbol = %reservation.symbol, %total, %ceiling, "Exposure ceiling breached on commit");
            self.halted.insert(reservation.symbol, reason);
            return Err(BudgetError::ExposureCeiling { total, ceiling });
        }
        Ok(())
    }

    /// Book a closed position's net PnL and free its exposure
    pub fn record_close(
        &mut self,
        position_id: PositionId,
        realized_pnl: Decimal,
        now: DateTime<Utc>,
    ) -> Option<DrawdownTransition> {
        self.roll(now);
        if let Some(exposure) = self.exposures.remove(&position_id) {
            self.last_trade.insert(exposure.symbol, now);
        }
        self.equity += realized_pnl;
        self.daily.record(realized_pnl);
        self.drawdown
            .update(self.equity + self.unrealized, now, &self.limits)
    }

    /// Update the mark-to-market part of equity
    pub fn mark_equity(&mut self, unrealized: Decimal, now: DateTime<Utc>) -> Option<DrawdownTransition> {
        self.roll(now);
        self.unrealized = unrealized;
        self.drawdown
            .update(self.equity + self.unrealized, now, &self.limits)
    }

    pub fn blacklist(&mut self, symbol: &str, until: DateTime<Utc>) {
        let entry = self.blacklist.entry(symbol.to_string()).or_insert(until);
        if until > *entry {
            *entry = until;
        }
    }

    pub fn halt(&mut self, symbol: &str, reason: impl Into<String>) {
        self.halted.insert(symbol.to_string(), reason.into());
    }

    /// Days that ended since the last call
    pub fn take_closed_days(&mut self, now: DateTime<Utc>) -> Vec<DayClose> {
        self.roll(now);
        std::mem::take(&mut self.closed_days)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> BudgetSnapshot {
        let mut blacklisted: Vec<_> = self
            .blacklist
            .iter()
            .filter(|(_, until)| **until > now)
            .map(|(symbol, until)| (symbol.clone(), *until))
            .collect();
        blacklisted.sort();
        let mut halted: Vec<_> = self
            .halted
            .iter()
            .map(|(symbol, reason)| (symbol.clone(), reason.clone()))
            .collect();
        halted.sort();

        BudgetSnapshot {
            equity: self.equity,
            marked_equity: self.equity + self.unrealized,
            peak_equity: self.drawdown.peak_equity,
            drawdown: self.drawdown.current_drawdown(),
            drawdown_paused: self.drawdown.is_paused(),
            day: self.daily.day,
            day_start_capital: self.daily.start_capital,
            daily_realized: self.daily.realized,
            daily_trades: self.daily.trades,
            open_exposure: self.open_exposure(),
            reserved: self.reserved(),
            open_positions: self.exposures.len(),
            reservations: self.reservations.len(),
            blacklisted,
            halted,
        }
    }
}
