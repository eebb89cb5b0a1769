//! Daily win/loss streak tracking
//!
//! At each daily boundary the previous day's realized PnL extends either the
//! winning or the losing streak. While a streak is at or past its threshold
//! the portfolio risk multiplier is scaled once per day.

use crate::config::LearningConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

const LOSS_SCALE: Decimal = dec!(0.8);
const WIN_SCALE: Decimal = dec!(1.1);
const RISK_FLOOR: Decimal = dec!(0.5);
const RISK_CAP: Decimal = dec!(1.5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakKind {
    Winning,
    Losing,
}

/// Risk multiplier change caused by a streak
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAdjustment {
    pub from: Decimal,
    pub to: Decimal,
    pub kind: StreakKind,
    pub days: u32,
}

#[derive(Debug, Clone)]
pub struct StreakTracker {
    loss_streak_days: u32,
    win_streak_days: u32,
    win_days: u32,
    loss_days: u32,
    multiplier: Decimal,
}

impl StreakTracker {
    pub fn new(config: &LearningConfig) -> Self {
        Self {
            loss_streak_days: config.loss_streak_days,
            win_streak_days: config.win_streak_days,
            win_days: 0,
            loss_days: 0,
            multiplier: Decimal::ONE,
        }
    }

    pub fn multiplier(&self) -> Decimal {
        self.multiplier
    }

    pub fn streaks(&self) -> (u32, u32) {
        (self.win_days, self.loss_days)
    }

    /// Close out a day; flat days leave both streaks untouched
    pub fn record_day(&mut self, day_pnl: Decimal) -> Option<RiskAdjustment> {
        if day_pnl > Decimal::ZERO {
            self.win_days += 1;
            self.loss_days = 0;
        } else if day_pnl < Decimal::ZERO {
            self.loss_days += 1;
            self.win_days = 0;
        }

        let from = self.multiplier;
        let (to, kind, days) = if self.loss_streak_days > 0 && self.loss_days >= self.loss_streak_days {
            ((from * LOSS_SCALE).max(RISK_FLOOR), StreakKind::Losing, self.loss_days)
        } else if self.win_streak_days > 0 && self.win_days >= self.win_streak_days {
            ((from * WIN_SCALE).min(RISK_CAP), StreakKind::Winning, self.win_days)
        } else {
            return None;
        };

        if to == from {
            return None;
        }
        self.multiplier = to;
        tracing::info!(%from, %to, ?kind, days, "Risk multiplier adjusted on streak");
        Some(RiskAdjustment { from, to, kind, days })
    }
}
