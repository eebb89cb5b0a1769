//! Replay simulator
//!
//! Drives a full [`Engine`] from recorded inputs with a paper gateway and a
//! manual clock that jumps to each input's timestamp.

use super::{ActivityCounts, EventStream, ReplayConfig, ReplayResult, ReplaySummary};
use crate::clock::ManualClock;
use crate::config::Config;
use crate::engine::{Engine, EngineInput};
use crate::events::{EngineEvent, MemorySink};
use crate::execution::PaperGateway;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Runs a replay through the engine
pub struct ReplaySimulator {
    config: Config,
}

impl ReplaySimulator {
    /// Create a new simulator; `replay` overrides parts of `config`
    pub fn new(mut config: Config, replay: &ReplayConfig) -> Self {
        if let Some(capital) = replay.initial_capital {
            config.engine.initial_capital = capital;
        }
        Self { config }
    }

    /// Load `replay.input` and run it
    pub async fn run_file(&self, replay: &ReplayConfig) -> anyhow::Result<ReplayResult> {
        let events = EventStream::from_path(&replay.input, replay.start_time, replay.end_time)?;
        self.run(events).await
    }

    /// Run the given inputs
    pub async fn run(&self, events: EventStream) -> anyhow::Result<ReplayResult> {
        let mut events = events.peekable();
        let start = events
            .peek()
            .map(EngineInput::timestamp)
            .unwrap_or_else(chrono::Utc::now);

        let clock = Arc::new(ManualClock::new(start));
        let gateway = Arc::new(PaperGateway::new(
            self.config.execution.slippage_estimate,
            clock.clone(),
        ));
        let sink = Arc::new(MemorySink::new());
        let engine = Engine::new(self.config.clone(), clock.clone(), gateway, sink.clone())?;

        let initial_capital = self.config.engine.initial_capital;
        let mut equity_curve = vec![initial_capital];
        let mut outcomes = Vec::new();
        let mut activity = ActivityCounts::default();
        let mut processed = 0usize;

        for event in events {
            clock.set(event.timestamp());
            if matches!(event, EngineInput::Signal(_)) {
                activity.signals += 1;
            }
            let report = engine.handle(event).await;
            processed += 1;

            activity.pyramid_adds += report.pyramids;
            activity.exits_pending += report.exits_pending;
            outcomes.extend(report.closed);
            for error in report.errors.iter().filter(|e| !e.error.is_soft()) {
                tracing::warn!(symbol = %error.symbol, error = %error.error, "Replay step failed");
            }

            let snapshot = engine.snapshot().await?;
            equity_curve.push(snapshot.marked_equity);
        }

        let snapshot = engine.snapshot().await?;
        let mut fees = Decimal::ZERO;
        for envelope in sink.events() {
            match envelope.event {
                EngineEvent::PositionOpened { .. } => activity.entries += 1,
                EngineEvent::RiskLimitRejected { .. } => activity.rejections += 1,
                EngineEvent::StaleDataSkip { .. } => activity.stale_skips += 1,
                EngineEvent::EntryCancelled { .. } => activity.entry_cancellations += 1,
                EngineEvent::SymbolBlacklisted { .. } => activity.blacklists += 1,
                EngineEvent::PositionClosed { closed } => fees += closed.fees,
                _ => {}
            }
        }
        activity.open_positions = engine.open_positions().await.len();

        tracing::info!(
            events = processed,
            trades = outcomes.len(),
            equity = %snapshot.equity,
            "Replay finished"
        );

        let summary = ReplaySummary::compute(
            initial_capital,
            snapshot.equity,
            &outcomes,
            &equity_curve,
            fees,
            activity,
        );
        Ok(ReplayResult {
            summary,
            outcomes,
            events: sink.events(),
        })
    }
}
