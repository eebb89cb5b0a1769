//! Engine coordinator
//!
//! Wires signal intake, the risk budget, sizing, execution, the position
//! lifecycle and the learning loop together:
//! 1. A signal is normalized, checked against the risk budget and sized
//! 2. The entry is routed and, once filled, committed to the budget
//! 3. Each tick batch re-evaluates every live position concurrently
//! 4. Closed positions feed the learner, which can blacklist the symbol
//!
//! Each symbol owns a lane behind its own async mutex. Lanes never share
//! state except through the budget actor and the stats store.

use super::lane::Lane;
use super::{EngineError, EngineInput, LaneError, SignalOutcome, TickReport};
use crate::clock::Clock;
use crate::config::{Config, ConfigError, MAX_PRICE_AGE_SECS};
use crate::events::{EngineEvent, EventEnvelope, EventSink, PositionChange};
use crate::execution::{
    ExecutionGateway, FeeSchedule, OrderPurpose, OrderRequest, OrderRouter, OrderSide, RetryPolicy,
};
use crate::feed::PriceTick;
use crate::learning::{AutoLearner, StatsStore, StreakTracker};
use crate::position::{
    ClosedPosition, ExitProgress, ExitReason, Position, PositionStatus, StopMove, TickOutcome,
    TradeOutcome,
};
use crate::risk::{
    BudgetError, BudgetSnapshot, DrawdownTransition, PositionSizer, RejectReason, RiskBudget,
    RiskBudgetHandle, RiskDecision,
};
use crate::signal::{IntakeDecision, Side, SignalInput, SignalIntake};
use crate::telemetry::{
    increment_counter, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric,
};
use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use parking_lot::Mutex as SyncMutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};

/// Delivery attempts per event before it is dropped with an error log
const EMIT_ATTEMPTS: u32 = 3;

fn as_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Risk and position lifecycle engine
pub struct Engine {
    config: Config,
    clock: Arc<dyn Clock>,
    budget: RiskBudgetHandle,
    router: OrderRouter,
    fees: FeeSchedule,
    intake: SignalIntake,
    sizer: PositionSizer,
    learner: AutoLearner,
    streak: SyncMutex<StreakTracker>,
    lanes: HashMap<String, Arc<Mutex<Lane>>>,
    sink: Arc<dyn EventSink>,
    sequence: AtomicU64,
}

impl Engine {
    /// Build an engine and spawn its risk budget task
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        gateway: Arc<dyn ExecutionGateway>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let budget = RiskBudget::new(
            config.risk.clone(),
            &config.execution.mode,
            config.engine.initial_capital,
            clock.now(),
        );
        let (budget, _task) = RiskBudgetHandle::spawn(budget);

        let lanes = config
            .engine
            .symbols
            .iter()
            .map(|symbol| (symbol.clone(), Arc::new(Mutex::new(Lane::new(symbol.clone())))))
            .collect();

        tracing::info!(
            symbols = config.engine.symbols.len(),
            capital = %config.engine.initial_capital,
            mode = ?config.execution.mode,
            "Engine initialized"
        );

        Ok(Self {
            router: OrderRouter::new(gateway, RetryPolicy::from_config(&config.execution)),
            fees: FeeSchedule::from_config(&config.execution),
            intake: SignalIntake::new(config.sizing.min_signal_confidence),
            sizer: PositionSizer::from_config(&config),
            learner: AutoLearner::new(config.learning.clone(), Arc::new(StatsStore::new())),
            streak: SyncMutex::new(StreakTracker::new(&config.learning)),
            lanes,
            budget,
            clock,
            sink,
            config,
            sequence: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn budget(&self) -> &RiskBudgetHandle {
        &self.budget
    }

    /// Published per-symbol performance snapshots
    pub fn stats(&self) -> &Arc<StatsStore> {
        self.learner.store()
    }

    pub async fn snapshot(&self) -> Result<BudgetSnapshot, EngineError> {
        Ok(self.budget.snapshot(self.clock.now()).await?)
    }

    /// Current position for a symbol, if one is live
    pub async fn position(&self, symbol: &str) -> Option<Position> {
        let lane = self.lanes.get(symbol)?;
        let lane = lane.lock().await;
        lane.live_position().cloned()
    }

    /// All live positions, ordered by symbol
    pub async fn open_positions(&self) -> Vec<Position> {
        let mut symbols: Vec<_> = self.lanes.keys().collect();
        symbols.sort();
        let mut positions = Vec::new();
        for symbol in symbols {
            if let Some(position) = self.position(symbol).await {
                positions.push(position);
            }
        }
        positions
    }

    fn lane(&self, symbol: &str) -> Result<&Arc<Mutex<Lane>>, EngineError> {
        self.lanes
            .get(symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))
    }

    fn max_price_age(&self) -> Duration {
        let secs = self.config.engine.max_price_age_secs.min(MAX_PRICE_AGE_SECS);
        Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1_000))
    }

    fn slippage_buffer(&self) -> Decimal {
        Decimal::ONE + self.config.execution.slippage_estimate.max(Decimal::ZERO)
    }

    async fn emit(&self, event: EngineEvent) {
        let envelope = EventEnvelope {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp: self.clock.now(),
            event,
        };
        for attempt in 1..=EMIT_ATTEMPTS {
            match self.sink.emit(&envelope).await {
                Ok(()) => return,
                Err(e) => tracing::warn!(
                    kind = envelope.event.kind(),
                    sequence = envelope.sequence,
                    attempt,
                    error = %e,
                    "Event sink rejected event"
                ),
            }
        }
        tracing::error!(
            kind = envelope.event.kind(),
            sequence = envelope.sequence,
            "Event dropped after retries"
        );
    }

    /// Halt new entries for a symbol and report the violation
    async fn violation(&self, symbol: &str, detail: String) -> EngineError {
        tracing::error!(symbol, %detail, "Invariant violation, halting symbol");
        increment_counter(CounterMetric::InvariantViolation, symbol);
        if let Err(e) = self.budget.halt(symbol, detail.clone()).await {
            tracing::error!(symbol, error = %e, "Could not halt symbol");
        }
        self.emit(EngineEvent::InvariantViolation {
            symbol: symbol.to_string(),
            detail: detail.clone(),
        })
        .await;
        EngineError::InvariantViolation(detail)
    }

    async fn committed(&self, symbol: &str, result: Result<(), BudgetError>) -> Result<(), EngineError> {
        match result {
            Ok(()) => Ok(()),
            Err(BudgetError::Unavailable) => Err(EngineError::BudgetUnavailable),
            Err(other) => Err(self.violation(symbol, other.to_string()).await),
        }
    }

    async fn stale_skip(&self, tick: &PriceTick, now: DateTime<Utc>) -> EngineError {
        let age_secs = tick.age(now).num_seconds();
        tracing::warn!(
            symbol = %tick.symbol,
            age_secs,
            max_age_secs = self.config.engine.max_price_age_secs,
            "Stale price, skipping"
        );
        increment_counter(CounterMetric::StaleSkip, &tick.symbol);
        self.emit(EngineEvent::StaleDataSkip {
            symbol: tick.symbol.clone(),
            age_secs,
            max_age_secs: self.config.engine.max_price_age_secs,
        })
        .await;
        EngineError::StaleData {
            symbol: tick.symbol.clone(),
            age_secs,
        }
    }

    async fn rejected(&self, symbol: &str, side: Side, reason: RejectReason) -> EngineError {
        tracing::info!(symbol, ?side, %reason, "Entry rejected by risk limits");
        increment_counter(CounterMetric::RiskRejection, reason.code());
        self.emit(EngineEvent::RiskLimitRejected {
            symbol: symbol.to_string(),
            side,
            code: reason.code().to_string(),
            reason: reason.to_string(),
        })
        .await;
        EngineError::RiskRejected(reason)
    }

    async fn drawdown_changed(&self, transition: DrawdownTransition) {
        match transition {
            DrawdownTransition::Paused { drawdown } => {
                tracing::warn!(%drawdown, "Drawdown limit exceeded, entries paused")
            }
            DrawdownTransition::Resumed { drawdown } => {
                tracing::info!(%drawdown, "Drawdown recovered, entries resumed")
            }
        }
        self.emit(EngineEvent::DrawdownChanged { transition }).await;
    }

    async fn position_updated(&self, position: &Position, change: PositionChange) {
        self.emit(EngineEvent::PositionUpdated {
            position: Box::new(position.clone()),
            change,
        })
        .await;
    }

    async fn stop_moved(&self, position: &Position, moved: StopMove, report: &mut TickReport) {
        tracing::debug!(
            position_id = %position.id,
            symbol = %position.symbol,
            from = %moved.from,
            to = %moved.to,
            kind = ?moved.kind,
            "Stop tightened"
        );
        report.stop_moves += 1;
        self.position_updated(position, PositionChange::StopMoved(moved))
            .await;
    }

    /// Turn a signal into an entry, if every gate allows it
    pub async fn on_signal(&self, input: SignalInput) -> Result<SignalOutcome, EngineError> {
        let lane = self.lane(&input.symbol)?;
        let mut guard = lane.lock().await;
        let lane = &mut *guard;
        let now = self.clock.now();
        let symbol = input.symbol.clone();
        let stats = self.learner.store().get(&symbol);

        let intent = match self.intake.evaluate(&input, stats.as_deref()) {
            IntakeDecision::Hold(reason) => {
                tracing::debug!(%symbol, %reason, "Signal held");
                lane.confidence = None;
                return Ok(SignalOutcome::Hold(reason));
            }
            IntakeDecision::Trade(intent) => intent,
        };

        if let Some(side) = lane.live_position().map(|p| p.side) {
            let confidence = (side == intent.side).then_some(intent.adjusted_confidence);
            lane.confidence = confidence;
            return Ok(SignalOutcome::PositionLive { confidence });
        }

        let tick = lane
            .last_tick
            .clone()
            .ok_or_else(|| EngineError::NoMarketData(symbol.clone()))?;
        if !tick.is_fresh(now, self.max_price_age()) {
            return Err(self.stale_skip(&tick, now).await);
        }

        let reservation = match self.budget.evaluate(&symbol, intent.side, now).await? {
            RiskDecision::Allow(reservation) => reservation,
            RiskDecision::Reject(reason) => {
                return Err(self.rejected(&symbol, intent.side, reason).await)
            }
        };

        let equity = self.budget.snapshot(now).await?.equity;
        let decision = self.sizer.size_pct(
            intent.adjusted_confidence,
            stats.as_deref(),
            tick.volatility,
            self.learner.store().risk_multiplier(),
        );
        let cap = reservation.notional / self.slippage_buffer();
        let order = match self.sizer.size_order(&decision, equity, cap, tick.price) {
            Ok(order) => order,
            Err(reason) => {
                self.budget.release(reservation.id).await?;
                tracing::info!(%symbol, %reason, "Entry declined by sizer");
                return Ok(SignalOutcome::Declined(reason));
            }
        };
        self.budget
            .resize(reservation.id, order.notional * self.slippage_buffer())
            .await?;

        let request = OrderRequest::new(
            symbol.clone(),
            OrderSide::entry(intent.side),
            order.quantity,
            tick.price,
            OrderPurpose::Entry,
        );
        let mut position = Position::opening(
            symbol.clone(),
            intent.side,
            request.client_order_id,
            order.quantity,
            tick.price,
            intent.adjusted_confidence,
            order.notional,
            now,
        );
        tracing::info!(
            %symbol,
            side = ?intent.side,
            confidence = %intent.adjusted_confidence,
            size_pct = %decision.size_pct,
            basis = ?decision.basis,
            notional = %order.notional,
            quantity = %order.quantity,
            "Placing entry"
        );

        let fill = match self.router.execute(&request).await {
            Ok(fill) => fill,
            Err(error) => {
                position.note_entry_attempts(error.attempts());
                self.router.cancel(request.client_order_id).await;
                self.budget.release(reservation.id).await?;
                position.cancel(now)?;
                let reason = error.to_string();
                tracing::warn!(%symbol, position_id = %position.id, %reason, "Entry not confirmed, cancelled");
                self.emit(EngineEvent::EntryCancelled {
                    symbol,
                    position_id: position.id,
                    reason: reason.clone(),
                })
                .await;
                return Ok(SignalOutcome::EntryCancelled { reason });
            }
        };

        let entry_fees = self.fees.entry_fee(fill.notional());
        if let Err(e) = position.confirm_open(&fill, entry_fees, &self.config.position, tick.atr) {
            self.budget.release(reservation.id).await?;
            return Err(self.violation(&symbol, e.to_string()).await);
        }
        let commit = self
            .budget
            .commit(reservation.id, position.id, fill.notional(), now)
            .await;

        lane.position = Some(position.clone());
        lane.confidence = Some(intent.adjusted_confidence);
        lane.pending_exit = None;

        increment_counter(CounterMetric::PositionOpened, &symbol);
        tracing::info!(
            position_id = %position.id,
            %symbol,
            side = ?position.side,
            entry = %position.entry_price,
            quantity = %position.quantity,
            stop_loss = %position.stop_loss,
            take_profit = %position.take_profit,
            "Position opened"
        );
        self.emit(EngineEvent::PositionOpened {
            position: Box::new(position.clone()),
        })
        .await;

        self.committed(&symbol, commit).await?;
        Ok(SignalOutcome::Opened(Box::new(position)))
    }

    /// Evaluate a batch of ticks; symbols are processed concurrently
    pub async fn on_ticks(&self, ticks: Vec<PriceTick>) -> TickReport {
        let started = Instant::now();
        let now = self.clock.now();

        let mut by_symbol: HashMap<String, Vec<PriceTick>> = HashMap::new();
        for tick in ticks {
            if self.lanes.contains_key(&tick.symbol) {
                by_symbol.entry(tick.symbol.clone()).or_default().push(tick);
            } else {
                tracing::debug!(symbol = %tick.symbol, "Tick for unconfigured symbol ignored");
            }
        }

        let lanes = by_symbol
            .into_iter()
            .map(|(symbol, ticks)| self.process_lane(symbol, ticks, now));
        let mut report = TickReport::default();
        for lane_report in join_all(lanes).await {
            report.merge(lane_report);
        }

        if let Err(error) = self.settle(now).await {
            tracing::error!(error = %error, "Failed to settle tick batch");
            report.errors.push(LaneError {
                symbol: "*".to_string(),
                error,
            });
        }

        record_latency(LatencyMetric::TickBatch, started.elapsed());
        report
    }

    async fn process_lane(&self, symbol: String, ticks: Vec<PriceTick>, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        let Some(lane) = self.lanes.get(&symbol) else {
            return report;
        };
        let mut guard = lane.lock().await;

        for tick in ticks {
            report.ticks += 1;
            if let Err(error) = self.apply_tick(&mut guard, &tick, now, &mut report).await {
                if error.is_soft() {
                    tracing::debug!(%symbol, error = %error, "Tick skipped");
                } else {
                    tracing::warn!(%symbol, error = %error, "Tick processing failed");
                }
                report.errors.push(LaneError {
                    symbol: symbol.clone(),
                    error,
                });
            }
        }
        report
    }

    async fn apply_tick(
        &self,
        lane: &mut Lane,
        tick: &PriceTick,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), EngineError> {
        lane.observe(tick);
        let Some(status) = lane.live_position().map(|p| p.status()) else {
            return Ok(());
        };

        if !tick.is_fresh(now, self.max_price_age()) {
            report.stale += 1;
            return Err(self.stale_skip(tick, now).await);
        }

        match status {
            PositionStatus::Open => self.evaluate_open(lane, tick, now, report).await,
            PositionStatus::Closing => {
                if let Some(position) = lane.position.as_mut() {
                    position.mark(tick)?;
                }
                self.drive_exit(lane, tick.price, now, report).await
            }
            _ => Ok(()),
        }
    }

    async fn evaluate_open(
        &self,
        lane: &mut Lane,
        tick: &PriceTick,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), EngineError> {
        let Some(position) = lane.position.as_mut() else {
            return Ok(());
        };

        match position.on_tick(tick, &self.config.position)? {
            TickOutcome::Held { stop_moved } => {
                if let Some(moved) = stop_moved {
                    self.stop_moved(position, moved, report).await;
                }
                match lane.confidence {
                    Some(confidence) => self.try_pyramid(lane, tick, confidence, now, report).await,
                    None => Ok(()),
                }
            }
            TickOutcome::ExitTriggered {
                reason,
                price,
                stop_moved,
            } => {
                if let Some(moved) = stop_moved {
                    self.stop_moved(position, moved, report).await;
                }
                tracing::info!(
                    position_id = %position.id,
                    symbol = %position.symbol,
                    %reason,
                    %price,
                    "Exit triggered"
                );
                self.drive_exit(lane, price, now, report).await
            }
        }
    }

    async fn try_pyramid(
        &self,
        lane: &mut Lane,
        tick: &PriceTick,
        confidence: Decimal,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), EngineError> {
        let Some(position) = lane.position.as_mut() else {
            return Ok(());
        };
        let Some(quantity) = position.pyramid_quantity(tick.price, confidence, &self.config.position)
        else {
            return Ok(());
        };

        let reserve = quantity * tick.price * self.slippage_buffer();
        let reservation = match self.budget.request_pyramid(position.id, reserve, now).await? {
            RiskDecision::Allow(reservation) => reservation,
            RiskDecision::Reject(reason) => {
                tracing::debug!(symbol = %position.symbol, %reason, "Pyramid add refused");
                return Ok(());
            }
        };

        let request = OrderRequest::new(
            position.symbol.clone(),
            OrderSide::entry(position.side),
            quantity,
            tick.price,
            OrderPurpose::PyramidAdd,
        );
        if let Err(e) = position.begin_pyramid(request.client_order_id, quantity) {
            self.budget.release(reservation.id).await?;
            return Err(e.into());
        }

        let fill = match self.router.execute(&request).await {
            Ok(fill) => fill,
            Err(error) => {
                self.router.cancel(request.client_order_id).await;
                self.budget.release(reservation.id).await?;
                position.abort_pyramid()?;
                tracing::warn!(symbol = %position.symbol, error = %error, "Pyramid add not confirmed, aborted");
                return Err(error.into());
            }
        };

        let fees = self.fees.entry_fee(fill.notional());
        let moved = position.confirm_pyramid(&fill, fees)?;
        let commit = self
            .budget
            .commit(reservation.id, position.id, fill.notional(), now)
            .await;

        report.pyramids += 1;
        tracing::info!(
            position_id = %position.id,
            symbol = %position.symbol,
            level = position.pyramid_level,
            price = %fill.price,
            quantity = %fill.quantity,
            average_entry = %position.entry_price,
            "Pyramid add filled"
        );
        self.position_updated(
            position,
            PositionChange::PyramidFilled {
                level: position.pyramid_level,
                price: fill.price,
                quantity: fill.quantity,
            },
        )
        .await;
        if let Some(moved) = moved {
            self.stop_moved(position, moved, report).await;
        }

        let symbol = position.symbol.clone();
        self.committed(&symbol, commit).await
    }

    /// Send (or re-send) the exit order of a closing position
    async fn drive_exit(
        &self,
        lane: &mut Lane,
        price: Decimal,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), EngineError> {
        let Some(request) = lane.exit_request(price) else {
            return Ok(());
        };
        let Some(position) = lane.position.as_mut() else {
            return Ok(());
        };

        let fill = match self.router.execute(&request).await {
            Ok(fill) => fill,
            Err(error) => {
                let attempts = position.exit_unconfirmed()?;
                report.exits_pending += 1;
                // A refused order id is cached by the venue; only an unknown
                // outcome may be retried under the same id
                if !error.outcome_unknown() {
                    lane.pending_exit = None;
                }
                tracing::warn!(
                    position_id = %position.id,
                    symbol = %position.symbol,
                    attempts,
                    error = %error,
                    "Exit not confirmed, will retry on next tick"
                );
                self.emit(EngineEvent::ExitPending {
                    symbol: position.symbol.clone(),
                    position_id: position.id,
                    attempts,
                    reason: error.to_string(),
                })
                .await;
                return Err(error.into());
            }
        };
        lane.pending_exit = None;

        let mut exit_fees = self.fees.exit_fee(fill.notional());
        if fill.quantity >= position.quantity {
            exit_fees += self
                .fees
                .rollover(position.cost_basis(), fill.timestamp - position.entry_time);
        }

        match position.confirm_close(&fill, exit_fees)? {
            ExitProgress::Partial { remaining } => {
                tracing::info!(symbol = %position.symbol, %remaining, "Exit partially filled");
                self.position_updated(position, PositionChange::PartialExit { remaining })
                    .await;
                Ok(())
            }
            ExitProgress::Closed(closed, outcome) => {
                lane.clear();
                self.finish_close(closed, outcome, now, report).await
            }
        }
    }

    async fn finish_close(
        &self,
        closed: Box<ClosedPosition>,
        outcome: TradeOutcome,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), EngineError> {
        let transition = self
            .budget
            .record_close(outcome.position_id, outcome.pnl, now)
            .await?;

        increment_counter(CounterMetric::PositionClosed, &outcome.exit_reason.to_string());
        tracing::info!(
            position_id = %outcome.position_id,
            symbol = %outcome.symbol,
            reason = %outcome.exit_reason,
            exit_price = %closed.exit_price,
            pnl = %outcome.pnl,
            pnl_pct = %outcome.pnl_pct,
            fees = %closed.fees,
            "Position closed"
        );
        self.emit(EngineEvent::PositionClosed { closed }).await;
        self.emit(EngineEvent::TradeOutcome {
            outcome: outcome.clone(),
        })
        .await;
        if let Some(transition) = transition {
            self.drawdown_changed(transition).await;
        }

        if let Some(update) = self.learner.process(&outcome, now) {
            if update.multiplier_changed() {
                tracing::info!(
                    symbol = %outcome.symbol,
                    from = %update.previous_multiplier,
                    to = %update.snapshot.confidence_multiplier,
                    "Confidence multiplier adjusted"
                );
            }
            if let Some(decision) = update.blacklist {
                self.budget.blacklist(&decision.symbol, decision.until).await?;
                tracing::warn!(
                    symbol = %decision.symbol,
                    until = %decision.until,
                    strikes = decision.strikes,
                    short_win_rate = %decision.short_win_rate,
                    "Symbol blacklisted"
                );
                self.emit(EngineEvent::SymbolBlacklisted { decision }).await;
            }
        }

        report.closed.push(outcome);
        Ok(())
    }

    /// Mark equity, close finished days and publish gauges
    async fn settle(&self, now: DateTime<Utc>) -> Result<(), EngineError> {
        let mut unrealized = Decimal::ZERO;
        for lane in self.lanes.values() {
            let lane = lane.lock().await;
            if let Some(position) = lane.live_position() {
                unrealized += position.unrealized_pnl;
            }
        }

        if let Some(transition) = self.budget.mark_equity(unrealized, now).await? {
            self.drawdown_changed(transition).await;
        }

        for day in self.budget.take_closed_days(now).await? {
            tracing::info!(day = %day.day, pnl = %day.realized_pnl, "Trading day closed");
            let adjustment = self.streak.lock().record_day(day.realized_pnl);
            if let Some(adjustment) = adjustment {
                self.learner.store().set_risk_multiplier(adjustment.to);
                self.emit(EngineEvent::RiskMultiplierChanged { adjustment }).await;
            }
        }

        let snapshot = self.budget.snapshot(now).await?;
        set_gauge(GaugeMetric::Equity, as_f64(snapshot.equity));
        set_gauge(GaugeMetric::MarkedEquity, as_f64(snapshot.marked_equity));
        set_gauge(GaugeMetric::DrawdownPct, as_f64(snapshot.drawdown));
        set_gauge(GaugeMetric::OpenExposure, as_f64(snapshot.open_exposure));
        set_gauge(GaugeMetric::OpenPositions, snapshot.open_positions as f64);
        set_gauge(GaugeMetric::DailyPnl, as_f64(snapshot.daily_realized));
        set_gauge(
            GaugeMetric::RiskMultiplier,
            as_f64(self.learner.store().risk_multiplier()),
        );
        Ok(())
    }

    /// Close a live position on request from outside the engine
    pub async fn close_position(&self, symbol: &str) -> Result<Option<TradeOutcome>, EngineError> {
        let lane = self.lane(symbol)?;
        let mut guard = lane.lock().await;
        let lane = &mut *guard;
        let now = self.clock.now();

        if lane.live_position().is_none() {
            return Err(EngineError::RiskRejected(RejectReason::NoPosition));
        }
        let price = lane
            .last_tick
            .as_ref()
            .map(|tick| tick.price)
            .ok_or_else(|| EngineError::NoMarketData(symbol.to_string()))?;

        if let Some(position) = lane.position.as_mut() {
            position.request_close(ExitReason::External, price)?;
            tracing::info!(position_id = %position.id, symbol, %price, "External close requested");
        }

        let mut report = TickReport::default();
        self.drive_exit(lane, price, now, &mut report).await?;
        Ok(report.closed.pop())
    }

    /// Dispatch one input
    pub async fn handle(&self, input: EngineInput) -> TickReport {
        match input {
            EngineInput::Tick(tick) => self.on_ticks(vec![tick]).await,
            EngineInput::Signal(signal) => {
                let symbol = signal.symbol.clone();
                let mut report = TickReport::default();
                match self.on_signal(signal).await {
                    Ok(outcome) => tracing::debug!(%symbol, ?outcome, "Signal handled"),
                    Err(error) => report.errors.push(LaneError { symbol, error }),
                }
                report
            }
            EngineInput::Close { symbol, .. } => {
                let mut report = TickReport::default();
                match self.close_position(&symbol).await {
                    Ok(Some(outcome)) => report.closed.push(outcome),
                    Ok(None) => {}
                    Err(error) => report.errors.push(LaneError { symbol, error }),
                }
                report
            }
        }
    }

    /// Consume inputs until the channel closes
    ///
    /// Ticks that are already queued are evaluated together as one batch;
    /// signals and close commands are handled in arrival order.
    pub async fn run(&self, mut inputs: mpsc::Receiver<EngineInput>) -> TickReport {
        let mut total = TickReport::default();
        let mut ticks = Vec::new();

        while let Some(first) = inputs.recv().await {
            let mut next = Some(first);
            while let Some(input) = next.take() {
                match input {
                    EngineInput::Tick(tick) => ticks.push(tick),
                    other => {
                        if !ticks.is_empty() {
                            total.merge(self.on_ticks(std::mem::take(&mut ticks)).await);
                        }
                        total.merge(self.handle(other).await);
                    }
                }
                next = inputs.try_recv().ok();
            }
            if !ticks.is_empty() {
                total.merge(self.on_ticks(std::mem::take(&mut ticks)).await);
            }
        }

        tracing::info!(
            ticks = total.ticks,
            closed = total.closed.len(),
            errors = total.errors.len(),
            "Engine input closed"
        );
        total
    }
}
