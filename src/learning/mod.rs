//! Auto-learning module
//!
//! Per-symbol performance statistics, confidence multipliers, blacklisting
//! and streak-based risk scaling

mod learner;
mod stats;
mod store;
mod streak;

pub use learner::{AutoLearner, BlacklistDecision, LearningUpdate};
pub use stats::{SymbolPerformanceStats, WindowSummary};
pub use store::StatsStore;
pub use streak::{RiskAdjustment, StreakKind, StreakTracker};
