//! Engine event stream
//!
//! Every state change the engine makes is published as an [`EngineEvent`]
//! wrapped in a sequenced [`EventEnvelope`]. Delivery is at-least-once;
//! consumers deduplicate on `sequence`.

use crate::learning::{BlacklistDecision, RiskAdjustment};
use crate::position::{ClosedPosition, Position, PositionId, StopMove, TradeOutcome};
use crate::risk::DrawdownTransition;
use crate::signal::Side;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// What changed on a live position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum PositionChange {
    StopMoved(StopMove),
    PyramidFilled {
        level: u32,
        price: Decimal,
        quantity: Decimal,
    },
    PartialExit {
        remaining: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    PositionOpened {
        position: Box<Position>,
    },
    PositionUpdated {
        position: Box<Position>,
        change: PositionChange,
    },
    PositionClosed {
        closed: Box<ClosedPosition>,
    },
    TradeOutcome {
        outcome: TradeOutcome,
    },
    RiskLimitRejected {
        symbol: String,
        side: Side,
        code: String,
        reason: String,
    },
    StaleDataSkip {
        symbol: String,
        age_secs: i64,
        max_age_secs: u64,
    },
    EntryCancelled {
        symbol: String,
        position_id: PositionId,
        reason: String,
    },
    ExitPending {
        symbol: String,
        position_id: PositionId,
        attempts: u32,
        reason: String,
    },
    InvariantViolation {
        symbol: String,
        detail: String,
    },
    SymbolBlacklisted {
        decision: BlacklistDecision,
    },
    RiskMultiplierChanged {
        adjustment: RiskAdjustment,
    },
    DrawdownChanged {
        transition: DrawdownTransition,
    },
}

impl EngineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::PositionOpened { .. } => "position_opened",
            EngineEvent::PositionUpdated { .. } => "position_updated",
            EngineEvent::PositionClosed { .. } => "position_closed",
            EngineEvent::TradeOutcome { .. } => "trade_outcome",
            EngineEvent::RiskLimitRejected { .. } => "risk_limit_rejected",
            EngineEvent::StaleDataSkip { .. } => "stale_data_skip",
            EngineEvent::EntryCancelled { .. } => "entry_cancelled",
            EngineEvent::ExitPending { .. } => "exit_pending",
            EngineEvent::InvariantViolation { .. } => "invariant_violation",
            EngineEvent::SymbolBlacklisted { .. } => "symbol_blacklisted",
            EngineEvent::RiskMultiplierChanged { .. } => "risk_multiplier_changed",
            EngineEvent::DrawdownChanged { .. } => "drawdown_changed",
        }
    }
}

/// Sequenced, timestamped event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: EngineEvent,
}

/// Destination for engine events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, envelope: &EventEnvelope) -> anyhow::Result<()>;
}

/// Forwards events into a tokio channel
pub struct ChannelSink {
    tx: mpsc::Sender<EventEnvelope>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<EventEnvelope>) -> Self {
        Self { tx }
    }

    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<EventEnvelope>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        self.tx
            .send(envelope.clone())
            .await
            .map_err(|_| anyhow::anyhow!("event channel closed"))
    }
}

/// Append-only JSON-lines journal
pub struct JsonlJournal {
    path: PathBuf,
    file: tokio::sync::Mutex<tokio::fs::File>,
}

impl JsonlJournal {
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        tracing::info!(path = %path.display(), "Event journal opened");
        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a journal back
    pub async fn read_all(path: impl AsRef<Path>) -> anyhow::Result<Vec<EventEnvelope>> {
        let content = tokio::fs::read_to_string(path).await?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl EventSink for JsonlJournal {
    async fn emit(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(envelope)?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps events in memory; used by replay and tests
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<EventEnvelope>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events.lock().clone()
    }

    /// Events of one kind, in emission order
    pub fn of_kind(&self, kind: &str) -> Vec<EngineEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event.kind() == kind)
            .map(|e| e.event.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn emit(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        self.events.lock().push(envelope.clone());
        Ok(())
    }
}
