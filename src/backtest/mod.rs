//! Replay module
//!
//! Replays recorded ticks and signals through the engine with a paper
//! gateway and reports the results

mod analytics;
mod replay;
mod simulator;

pub use analytics::{max_drawdown, ActivityCounts, ReplaySummary};
pub use replay::EventStream;
pub use simulator::ReplaySimulator;

use crate::events::EventEnvelope;
use crate::position::TradeOutcome;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::path::PathBuf;

/// Replay configuration
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// JSON-lines file of engine inputs
    pub input: PathBuf,
    /// Start time filter
    pub start_time: Option<DateTime<Utc>>,
    /// End time filter
    pub end_time: Option<DateTime<Utc>>,
    /// Overrides `engine.initial_capital`
    pub initial_capital: Option<Decimal>,
}

/// Complete replay results
#[derive(Debug, Clone)]
pub struct ReplayResult {
    pub summary: ReplaySummary,
    pub outcomes: Vec<TradeOutcome>,
    /// Every event the engine emitted, in order
    pub events: Vec<EventEnvelope>,
}
