//! Auto-learning feedback loop
//!
//! Folds closed-trade outcomes into per-symbol statistics, nudges the
//! confidence multiplier and decides blacklisting.

use super::{StatsStore, SymbolPerformanceStats, WindowSummary};
use crate::config::LearningConfig;
use crate::position::{PositionId, TradeOutcome};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Learner verdict to suspend a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistDecision {
    pub symbol: String,
    pub until: DateTime<Utc>,
    pub duration_minutes: i64,
    /// Strike count after this decision
    pub strikes: u32,
    pub short_win_rate: Decimal,
}

/// Result of folding one new outcome
#[derive(Debug, Clone)]
pub struct LearningUpdate {
    pub snapshot: Arc<SymbolPerformanceStats>,
    pub previous_multiplier: Decimal,
    pub blacklist: Option<BlacklistDecision>,
}

impl LearningUpdate {
    pub fn multiplier_changed(&self) -> bool {
        self.snapshot.confidence_multiplier != self.previous_multiplier
    }
}

#[derive(Debug, Default)]
struct LearnerState {
    /// Position ids already folded. Grows for the life of the process,
    /// which stays small at swing-trade volume (a few dozen closes a day)
    seen: HashSet<PositionId>,
    returns: HashMap<String, VecDeque<Decimal>>,
}

pub struct AutoLearner {
    config: LearningConfig,
    store: Arc<StatsStore>,
    state: Mutex<LearnerState>,
}

impl AutoLearner {
    pub fn new(config: LearningConfig, store: Arc<StatsStore>) -> Self {
        Self {
            config,
            store,
            state: Mutex::new(LearnerState::default()),
        }
    }

    pub fn store(&self) -> &Arc<StatsStore> {
        &self.store
    }

    /// Blacklist duration for a symbol that already has `strikes` strikes
    pub fn blacklist_minutes(&self, strikes: u32) -> i64 {
        let mut minutes = self.config.blacklist_base_minutes;
        for _ in 0..strikes {
            if minutes >= self.config.blacklist_max_minutes {
                break;
            }
            minutes = minutes.saturating_mul(2);
        }
        minutes.min(self.config.blacklist_max_minutes)
    }

    /// Fold an outcome; returns `None` for an outcome already seen
    pub fn process(&self, outcome: &TradeOutcome, now: DateTime<Utc>) -> Option<LearningUpdate> {
        let mut state = self.state.lock();
        if !state.seen.insert(outcome.position_id) {
            tracing::debug!(
                position_id = %outcome.position_id,
                symbol = %outcome.symbol,
                "Duplicate trade outcome ignored"
            );
            return None;
        }

        let returns = state.returns.entry(outcome.symbol.clone()).or_default();
        returns.push_back(outcome.pnl_pct);
        while returns.len() > self.config.long_window {
            returns.pop_front();
        }
        let long = WindowSummary::from_returns(returns.iter());
        let short_skip = returns.len().saturating_sub(self.config.short_window);
        let short = WindowSummary::from_returns(returns.iter().skip(short_skip));

        let mut next = self
            .store
            .get(&outcome.symbol)
            .map(|s| (*s).clone())
            .unwrap_or_else(|| SymbolPerformanceStats::empty(outcome.symbol.clone()));
        let previous_multiplier = next.confidence_multiplier;

        next.version += 1;
        next.total_trades += 1;
        next.trades_since_blacklist += 1;
        next.win_rate = long.win_rate;
        next.avg_win = long.avg_win;
        next.avg_loss = long.avg_loss;
        next.long_expectancy = long.expectancy;
        next.short_win_rate = short.win_rate;
        next.short_expectancy = short.expectancy;
        next.updated_at = Some(now);

        if next.total_trades >= self.config.min_trades {
            let step = self.config.multiplier_step;
            if long.expectancy > Decimal::ZERO && short.expectancy > Decimal::ZERO {
                next.confidence_multiplier =
                    (next.confidence_multiplier + step).min(self.config.max_multiplier);
            } else if long.expectancy < Decimal::ZERO && short.expectancy < Decimal::ZERO {
                next.confidence_multiplier =
                    (next.confidence_multiplier - step).max(self.config.min_multiplier);
            }
        }

        let mut blacklist = None;
        if next.trades_since_blacklist >= self.config.min_trades
            && short.win_rate < self.config.blacklist_win_rate
        {
            let minutes = self.blacklist_minutes(next.blacklist_strikes);
            next.blacklist_strikes += 1;
            next.trades_since_blacklist = 0;
            blacklist = Some(BlacklistDecision {
                symbol: next.symbol.clone(),
                until: now + Duration::minutes(minutes),
                duration_minutes: minutes,
                strikes: next.blacklist_strikes,
                short_win_rate: short.win_rate,
            });
        }

        let snapshot = self.store.publish(next);
        drop(state);

        if snapshot.confidence_multiplier != previous_multiplier {
            tracing::info!(
                symbol = %snapshot.symbol,
                from = %previous_multiplier,
                to = %snapshot.confidence_multiplier,
                "Confidence multiplier adjusted"
            );
        }
        if let Some(decision) = &blacklist {
            tracing::warn!(
                symbol = %decision.symbol,
                minutes = decision.duration_minutes,
                strikes = decision.strikes,
                win_rate = %decision.short_win_rate,
                "Symbol blacklisted"
            );
        }

        Some(LearningUpdate {
            snapshot,
            previous_multiplier,
            blacklist,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::ExitReason;
    use crate::signal::Side;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn outcome(symbol: &str, pnl_pct: Decimal) -> TradeOutcome {
        TradeOutcome {
            position_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side: Side::Long,
            pnl: pnl_pct * dec!(1000),
            pnl_pct,
            duration_secs: 3600,
            entry_confidence: dec!(0.7),
            exit_reason: ExitReason::TakeProfit,
            closed_at: Utc::now(),
        }
    }

    fn learner() -> AutoLearner {
        AutoLearner::new(LearningConfig::default(), Arc::new(StatsStore::new()))
    }

    #[test]
    fn test_duplicate_outcome_is_ignored() {
        let learner = learner();
        let now = Utc::now();
        let trade = outcome("BTC/USDT", dec!(0.03));

        assert!(learner.process(&trade, now).is_some());
        let before = learner.store().get("BTC/USDT").unwrap();
        assert!(learner.process(&trade, now).is_none());
        let after = learner.store().get("BTC/USDT").unwrap();
        assert_eq!(before, after);
        assert_eq!(after.total_trades, 1);
    }

    #[test]
    fn test_versions_increase() {
        let learner = learner();
        let now = Utc::now();
        for expected in 1..=3 {
            let update = learner.process(&outcome("ETH/USDT", dec!(0.01)), now).unwrap();
            assert_eq!(update.snapshot.version, expected);
        }
    }

    #[test]
    fn test_multiplier_waits_for_min_trades() {
        let learner = learner();
        let now = Utc::now();
        for _ in 0..9 {
            let update = learner.process(&outcome("SOL/USDT", dec!(0.02)), now).unwrap();
            assert!(!update.multiplier_changed());
        }
        let update = learner.process(&outcome("SOL/USDT", dec!(0.02)), now).unwrap();
        assert_eq!(update.snapshot.confidence_multiplier, dec!(1.1));
    }

    #[test]
    fn test_multiplier_bounded() {
        let learner = learner();
        let now = Utc::now();
        for _ in 0..40 {
            learner.process(&outcome("SOL/USDT", dec!(0.02)), now);
        }
        assert_eq!(learner.store().get("SOL/USDT").unwrap().confidence_multiplier, dec!(1.5));

        for _ in 0..120 {
            learner.process(&outcome("ADA/USDT", dec!(-0.02)), now);
        }
        assert_eq!(learner.store().get("ADA/USDT").unwrap().confidence_multiplier, dec!(0.5));
    }

    #[test]
    fn test_mixed_windows_leave_multiplier() {
        let learner = learner();
        let now = Utc::now();
        // Long window strongly positive
        for _ in 0..20 {
            learner.process(&outcome("XRP/USDT", dec!(0.05)), now);
        }
        let before = learner.store().get("XRP/USDT").unwrap().confidence_multiplier;
        // A few losers turn the short window negative but not the long one
        let mut last = None;
        for _ in 0..6 {
            last = learner.process(&outcome("XRP/USDT", dec!(-0.09)), now);
        }
        let update = last.unwrap();
        assert!(update.snapshot.short_expectancy < Decimal::ZERO);
        assert!(update.snapshot.long_expectancy > Decimal::ZERO);
        assert!(!update.multiplier_changed());
        assert!(update.snapshot.confidence_multiplier >= before);
    }

    #[test]
    fn test_blacklist_with_exponential_duration() {
        let learner = learner();
        let now = Utc::now();

        let mut first = None;
        for i in 0..10 {
            // 3 wins out of 10 -> 30% win rate
            let pnl = if i < 3 { dec!(0.01) } else { dec!(-0.01) };
            first = learner.process(&outcome("DOGE/USDT", pnl), now);
        }
        let decision = first.unwrap().blacklist.unwrap();
        assert_eq!(decision.duration_minutes, 240);
        assert_eq!(decision.strikes, 1);
        assert_eq!(decision.until, now + Duration::minutes(240));

        // Needs another min_trades outcomes before the next strike
        for _ in 0..9 {
            let update = learner.process(&outcome("DOGE/USDT", dec!(-0.01)), now).unwrap();
            assert!(update.blacklist.is_none());
        }
        let second = learner.process(&outcome("DOGE/USDT", dec!(-0.01)), now).unwrap();
        let decision = second.blacklist.unwrap();
        assert_eq!(decision.duration_minutes, 480);
        assert_eq!(decision.strikes, 2);
    }

    #[test]
    fn test_blacklist_duration_capped() {
        let learner = learner();
        assert_eq!(learner.blacklist_minutes(0), 240);
        assert_eq!(learner.blacklist_minutes(1), 480);
        assert_eq!(learner.blacklist_minutes(5), 7680);
        assert_eq!(learner.blacklist_minutes(6), 10080);
        assert_eq!(learner.blacklist_minutes(60), 10080);
    }

    #[test]
    fn test_healthy_symbol_not_blacklisted() {
        let learner = learner();
        let now = Utc::now();
        for i in 0..30 {
            let pnl = if i % 2 == 0 { dec!(0.02) } else { dec!(-0.01) };
            let update = learner.process(&outcome("BNB/USDT", pnl), now).unwrap();
            assert!(update.blacklist.is_none());
        }
    }

    #[test]
    fn test_long_window_is_bounded() {
        let learner = learner();
        let now = Utc::now();
        for _ in 0..50 {
            learner.process(&outcome("AVAX/USDT", dec!(-0.01)), now);
        }
        for _ in 0..50 {
            learner.process(&outcome("AVAX/USDT", dec!(0.01)), now);
        }
        let stats = learner.store().get("AVAX/USDT").unwrap();
        assert_eq!(stats.win_rate, dec!(1));
        assert_eq!(stats.total_trades, 100);
    }
}
