//! Signal intake adapter
//!
//! Turns a raw signal into a typed trade intent by applying the symbol's
//! learned confidence multiplier and the minimum-confidence gate.

use super::{HoldReason, IntakeDecision, SignalInput, TradeIntent};
use crate::learning::SymbolPerformanceStats;
use rust_decimal::Decimal;

/// Pure confidence normalizer
#[derive(Debug, Clone)]
pub struct SignalIntake {
    min_signal_confidence: Decimal,
}

impl SignalIntake {
    pub fn new(min_signal_confidence: Decimal) -> Self {
        Self {
            min_signal_confidence,
        }
    }

    /// Evaluate a signal against the symbol's current stats snapshot
    pub fn evaluate(
        &self,
        input: &SignalInput,
        stats: Option<&SymbolPerformanceStats>,
    ) -> IntakeDecision {
        let Some(side) = input.direction.side() else {
            return IntakeDecision::Hold(HoldReason::NoDirection);
        };

        let raw = input.raw_confidence.clamp(Decimal::ZERO, Decimal::ONE);
        if raw != input.raw_confidence {
            tracing::warn!(
                symbol = %input.symbol,
                raw_confidence = %input.raw_confidence,
                "Signal confidence outside [0, 1], clamped"
            );
        }

        let (multiplier, stats_version) = stats
            .map(|s| (s.confidence_multiplier, s.version))
            .unwrap_or((Decimal::ONE, 0));
        let adjusted = (raw * multiplier).min(Decimal::ONE).max(Decimal::ZERO);

        if adjusted < self.min_signal_confidence {
            return IntakeDecision::Hold(HoldReason::BelowThreshold {
                adjusted,
                threshold: self.min_signal_confidence,
            });
        }

        IntakeDecision::Trade(TradeIntent {
            symbol: input.symbol.clone(),
            side,
            raw_confidence: raw,
            adjusted_confidence: adjusted,
            multiplier,
            stats_version,
        })
    }
}
