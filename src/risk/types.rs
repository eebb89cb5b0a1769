//! Risk management types

use crate::position::PositionId;
use crate::signal::Side;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub type ReservationId = Uuid;

/// Capital slot held for an entry or pyramid add that is not filled yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub symbol: String,
    pub side: Side,
    pub notional: Decimal,
    /// Set for pyramid adds to an existing position
    pub position_id: Option<PositionId>,
    pub created_at: DateTime<Utc>,
}

/// Why the risk evaluator refused an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectReason {
    Halted { reason: String },
    Blacklisted { until: DateTime<Utc> },
    Cooldown { until: DateTime<Utc> },
    PositionExists,
    DailyLossLimit { loss: Decimal, limit: Decimal },
    DrawdownPaused { drawdown: Decimal },
    MaxOpenPositions { limit: usize },
    MaxDailyTrades { limit: u32 },
    CorrelatedPositions { count: usize, limit: usize },
    CorrelatedExposure { headroom: Decimal },
    InsufficientHeadroom { headroom: Decimal },
    NoPosition,
}

impl RejectReason {
    /// Stable label for metrics and journals
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::Halted { .. } => "halted",
            RejectReason::Blacklisted { .. } => "blacklisted",
            RejectReason::Cooldown { .. } => "cooldown",
            RejectReason::PositionExists => "position_exists",
            RejectReason::DailyLossLimit { .. } => "daily_loss_limit",
            RejectReason::DrawdownPaused { .. } => "drawdown_paused",
            RejectReason::MaxOpenPositions { .. } => "max_open_positions",
            RejectReason::MaxDailyTrades { .. } => "max_daily_trades",
            RejectReason::CorrelatedPositions { .. } => "correlated_positions",
            RejectReason::CorrelatedExposure { .. } => "correlated_exposure",
            RejectReason::InsufficientHeadroom { .. } => "insufficient_headroom",
            RejectReason::NoPosition => "no_position",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Halted { reason } => write!(f, "rejected: symbol halted ({reason})"),
            RejectReason::Blacklisted { until } => {
                write!(f, "rejected: symbol blacklisted until {until}")
            }
            RejectReason::Cooldown { until } => write!(f, "rejected: cooldown active until {until}"),
            RejectReason::PositionExists => write!(f, "rejected: position already open"),
            RejectReason::DailyLossLimit { loss, limit } => {
                write!(f, "rejected: daily loss limit reached ({loss} >= {limit})")
            }
            RejectReason::DrawdownPaused { drawdown } => {
                write!(f, "rejected: drawdown pause active ({drawdown})")
            }
            RejectReason::MaxOpenPositions { limit } => {
                write!(f, "rejected: max open positions reached ({limit})")
            }
            RejectReason::MaxDailyTrades { limit } => {
                write!(f, "rejected: daily trade limit reached ({limit})")
            }
            RejectReason::CorrelatedPositions { count, limit } => {
                write!(f, "rejected: too many correlated positions ({count} >= {limit})")
            }
            RejectReason::CorrelatedExposure { headroom } => {
                write!(f, "rejected: correlated exposure limit (headroom {headroom})")
            }
            RejectReason::InsufficientHeadroom { headroom } => {
                write!(f, "rejected: portfolio exposure limit (headroom {headroom})")
            }
            RejectReason::NoPosition => write!(f, "rejected: no live position"),
        }
    }
}

/// Outcome of a risk evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    Allow(Reservation),
    Reject(RejectReason),
}

impl RiskDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RiskDecision::Allow(_))
    }
}

/// A finished trading day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayClose {
    pub day: NaiveDate,
    pub realized_pnl: Decimal,
    pub start_capital: Decimal,
}

/// Drawdown pause transitions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawdownTransition {
    Paused { drawdown: Decimal },
    Resumed { drawdown: Decimal },
}

/// Risk budget failures that are not entry rejections
#[derive(Debug, Error, PartialEq)]
pub enum BudgetError {
    #[error("risk budget actor unavailable")]
    Unavailable,
    #[error("unknown reservation {0}")]
    UnknownReservation(ReservationId),
    #[error("exposure {total} exceeds ceiling {ceiling} after commit")]
    ExposureCeiling { total: Decimal, ceiling: Decimal },
}

/// Point-in-time view of the budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub equity: Decimal,
    pub marked_equity: Decimal,
    pub peak_equity: Decimal,
    pub drawdown: Decimal,
    pub drawdown_paused: bool,
    pub day: NaiveDate,
    pub day_start_capital: Decimal,
    pub daily_realized: Decimal,
    pub daily_trades: u32,
    pub open_exposure: Decimal,
    pub reserved: Decimal,
    pub open_positions: usize,
    pub reservations: usize,
    pub blacklisted: Vec<(String, DateTime<Utc>)>,
    pub halted: Vec<(String, String)>,
}
