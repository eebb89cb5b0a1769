//! Single-owner task around the [`RiskBudget`]
//!
//! All budget reads and writes are messages to one task, answered over a
//! oneshot channel. Callers hold a cheap cloneable [`RiskBudgetHandle`].

use super::{
    BudgetError, BudgetSnapshot, DayClose, DrawdownTransition, Reservation, ReservationId,
    RiskBudget, RiskDecision,
};
use crate::position::PositionId;
use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const COMMAND_BUFFER: usize = 1_024;

enum BudgetCommand {
    Evaluate {
        symbol: String,
        side: Side,
        now: DateTime<Utc>,
        reply: oneshot::Sender<RiskDecision>,
    },
    RequestPyramid {
        position_id: PositionId,
        notional: Decimal,
        now: DateTime<Utc>,
        reply: oneshot::Sender<RiskDecision>,
    },
    Resize {
        id: ReservationId,
        notional: Decimal,
        reply: oneshot::Sender<Result<Reservation, BudgetError>>,
    },
    Release {
        id: ReservationId,
        reply: oneshot::Sender<Option<Reservation>>,
    },
    Commit {
        id: ReservationId,
        position_id: PositionId,
        notional: Decimal,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Result<(), BudgetError>>,
    },
    RecordClose {
        position_id: PositionId,
        realized_pnl: Decimal,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Option<DrawdownTransition>>,
    },
    MarkEquity {
        unrealized: Decimal,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Option<DrawdownTransition>>,
    },
    Blacklist {
        symbol: String,
        until: DateTime<Utc>,
        reply: oneshot::Sender<()>,
    },
    Halt {
        symbol: String,
        reason: String,
        reply: oneshot::Sender<()>,
    },
    TakeClosedDays {
        now: DateTime<Utc>,
        reply: oneshot::Sender<Vec<DayClose>>,
    },
    Snapshot {
        now: DateTime<Utc>,
        reply: oneshot::Sender<BudgetSnapshot>,
    },
}

fn apply(budget: &mut RiskBudget, command: BudgetCommand) {
    // A dropped receiver only means the caller went away
    match command {
        BudgetCommand::Evaluate {
            symbol,
            side,
            now,
            reply,
        } => {
            let _ = reply.send(budget.evaluate(&symbol, side, now));
        }
        BudgetCommand::RequestPyramid {
            position_id,
            notional,
            now,
            reply,
        } => {
            let _ = reply.send(budget.request_pyramid(position_id, notional, now));
        }
        BudgetCommand::Resize {
            id,
            notional,
            reply,
        } => {
            let _ = reply.send(budget.resize(id, notional));
        }
        BudgetCommand::Release { id, reply } => {
            let _ = reply.send(budget.release(id));
        }
        BudgetCommand::Commit {
            id,
            position_id,
            notional,
            now,
            reply,
        } => {
            let _ = reply.send(budget.commit(id, position_id, notional, now));
        }
        BudgetCommand::RecordClose {
            position_id,
            realized_pnl,
            now,
            reply,
        } => {
            let _ = reply.send(budget.record_close(position_id, realized_pnl, now));
        }
        BudgetCommand::MarkEquity {
            unrealized,
            now,
            reply,
        } => {
            let _ = reply.send(budget.mark_equity(unrealized, now));
        }
        BudgetCommand::Blacklist {
            symbol,
            until,
            reply,
        } => {
            budget.blacklist(&symbol, until);
            let _ = reply.send(());
        }
        BudgetCommand::Halt {
            symbol,
            reason,
            reply,
        } => {
            budget.halt(&symbol, reason);
            let _ = reply.send(());
        }
        BudgetCommand::TakeClosedDays { now, reply } => {
            let _ = reply.send(budget.take_closed_days(now));
        }
        BudgetCommand::Snapshot { now, reply } => {
            let _ = reply.send(budget.snapshot(now));
        }
    }
}

/// Cloneable request/response handle to the budget task
#[derive(Clone)]
pub struct RiskBudgetHandle {
    tx: mpsc::Sender<BudgetCommand>,
}

impl RiskBudgetHandle {
    /// Move `budget` into its own task
    pub fn spawn(budget: RiskBudget) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(async move {
            let mut budget = budget;
            while let Some(command) = rx.recv().await {
                apply(&mut budget, command);
            }
            tracing::debug!("Risk budget task stopped");
        });
        (Self { tx }, task)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> BudgetCommand,
    ) -> Result<T, BudgetError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| BudgetError::Unavailable)?;
        rx.await.map_err(|_| BudgetError::Unavailable)
    }

    pub async fn evaluate(
        &self,
        symbol: &str,
        side: Side,
        now: DateTime<Utc>,
    ) -> Result<RiskDecision, BudgetError> {
        let symbol = symbol.to_string();
        self.request(|reply| BudgetCommand::Evaluate {
            symbol,
            side,
            now,
            reply,
        })
        .await
    }

    pub async fn request_pyramid(
        &self,
        position_id: PositionId,
        notional: Decimal,
        now: DateTime<Utc>,
    ) -> Result<RiskDecision, BudgetError> {
        self.request(|reply| BudgetCommand::RequestPyramid {
            position_id,
            notional,
            now,
            reply,
        })
        .await
    }

    pub async fn resize(&self, id: ReservationId, notional: Decimal) -> Result<Reservation, BudgetError> {
        self.request(|reply| BudgetCommand::Resize {
            id,
            notional,
            reply,
        })
        .await?
    }

    pub async fn release(&self, id: ReservationId) -> Result<Option<Reservation>, BudgetError> {
        self.request(|reply| BudgetCommand::Release { id, reply }).await
    }

    pub async fn commit(
        &self,
        id: ReservationId,
        position_id: PositionId,
        notional: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), BudgetError> {
        self.request(|reply| BudgetCommand::Commit {
            id,
            position_id,
            notional,
            now,
            reply,
        })
        .await?
    }

    pub async fn record_close(
        &self,
        position_id: PositionId,
        realized_pnl: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Option<DrawdownTransition>, BudgetError> {
        self.request(|reply| BudgetCommand::RecordClose {
            position_id,
            realized_pnl,
            now,
            reply,
        })
        .await
    }

    pub async fn mark_equity(
        &self,
        unrealized: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Option<DrawdownTransition>, BudgetError> {
        self.request(|reply| BudgetCommand::MarkEquity {
            unrealized,
            now,
            reply,
        })
        .await
    }

    pub async fn blacklist(&self, symbol: &str, until: DateTime<Utc>) -> Result<(), BudgetError> {
        let symbol = symbol.to_string();
        self.request(|reply| BudgetCommand::Blacklist {
            symbol,
            until,
            reply,
        })
        .await
    }

    pub async fn halt(&self, symbol: &str, reason: impl Into<String>) -> Result<(), BudgetError> {
        let symbol = symbol.to_string();
        let reason = reason.into();
        self.request(|reply| BudgetCommand::Halt {
            symbol,
            reason,
            reply,
        })
        .await
    }

    pub async fn take_closed_days(&self, now: DateTime<Utc>) -> Result<Vec<DayClose>, BudgetError> {
        self.request(|reply| BudgetCommand::TakeClosedDays { now, reply })
            .await
    }

    pub async fn snapshot(&self, now: DateTime<Utc>) -> Result<BudgetSnapshot, BudgetError> {
        self.request(|reply| BudgetCommand::Snapshot { now, reply }).await
    }
}
