//! Property tests for the pure risk components

use crate::support::{at, t0};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use swing_risk::config::{Config, ExecutionMode, LearningConfig, PositionConfig, RiskConfig};
use swing_risk::execution::{Fill, OrderSide};
use swing_risk::feed::PriceTick;
use swing_risk::learning::{AutoLearner, StatsStore, SymbolPerformanceStats};
use swing_risk::position::{ExitReason, Position, PositionStatus, TickOutcome, TradeOutcome};
use swing_risk::risk::{PositionSizer, RiskBudget, RiskDecision};
use swing_risk::signal::{Direction, Side, SignalInput, SignalIntake};
use uuid::Uuid;

const SYMBOLS: [&str; 10] = [
    "BTC/USDT", "ETH/USDT", "BNB/USDT", "XRP/USDT", "SOL/USDT", "NEAR/USDT", "TRX/USDT",
    "DOGE/USDT", "ADA/USDT", "SUI/USDT",
];

fn bp(value: i64) -> Decimal {
    Decimal::new(value, 4)
}

fn open_position(side: Side, price: Decimal, rules: &PositionConfig) -> Position {
    let order_id = Uuid::new_v4();
    let mut position = Position::opening("BTC/USDT", side, order_id, dec!(1), price, dec!(0.8), price, t0());
    let fill = Fill {
        order_id,
        symbol: "BTC/USDT".to_string(),
        side: OrderSide::entry(side),
        price,
        quantity: dec!(1),
        timestamp: t0(),
    };
    position.confirm_open(&fill, dec!(0), rules, None).unwrap();
    position
}

fn outcome(pnl_pct_bp: i64) -> TradeOutcome {
    TradeOutcome {
        position_id: Uuid::new_v4(),
        symbol: "ETH/USDT".to_string(),
        side: Side::Long,
        pnl: bp(pnl_pct_bp) * dec!(1000),
        pnl_pct: bp(pnl_pct_bp),
        duration_secs: 3600,
        entry_confidence: dec!(0.7),
        exit_reason: if pnl_pct_bp > 0 {
            ExitReason::TakeProfit
        } else {
            ExitReason::StopLoss
        },
        closed_at: t0(),
    }
}

proptest! {
    #[test]
    fn prop_intake_holds_below_threshold(confidence in 0i64..5500, long in any::<bool>()) {
        let intake = SignalIntake::new(dec!(0.55));
        let direction = if long { Direction::Long } else { Direction::Short };
        let input = SignalInput::new("BTC/USDT", bp(confidence), direction, t0());
        prop_assert!(intake.evaluate(&input, None).is_hold());
    }

    #[test]
    fn prop_intake_trades_at_or_above_threshold(confidence in 5500i64..=10000) {
        let intake = SignalIntake::new(dec!(0.55));
        let input = SignalInput::new("BTC/USDT", bp(confidence), Direction::Long, t0());
        prop_assert!(!intake.evaluate(&input, None).is_hold());
    }

    #[test]
    fn prop_size_stays_within_bounds(
        confidence in 0i64..=10000,
        trades in 0usize..40,
        win_rate in 0i64..=10000,
        avg_win in 1i64..2000,
        avg_loss in 0i64..2000,
        volatility in 0i64..30000,
        risk_multiplier in 0i64..20000,
    ) {
        let sizer = PositionSizer::from_config(&Config::default());
        let mut stats = SymbolPerformanceStats::empty("BTC/USDT");
        stats.total_trades = trades;
        stats.win_rate = bp(win_rate);
        stats.avg_win = bp(avg_win);
        stats.avg_loss = bp(avg_loss);

        let decision = sizer.size_pct(
            bp(confidence),
            Some(&stats),
            bp(volatility),
            bp(risk_multiplier),
        );
        prop_assert!(decision.size_pct >= dec!(0));
        prop_assert!(decision.size_pct <= sizer.max_position_pct());
        if decision.declined.is_some() {
            prop_assert_eq!(decision.size_pct, dec!(0));
        }
    }

    #[test]
    fn prop_stop_only_tightens(
        long in any::<bool>(),
        path in prop::collection::vec(9000i64..11500, 1..60),
    ) {
        let rules = PositionConfig::default();
        let side = if long { Side::Long } else { Side::Short };
        let mut position = open_position(side, dec!(10000), &rules);
        let mut stop = position.stop_loss;

        for (i, price) in path.into_iter().enumerate() {
            let tick = PriceTick::new("BTC/USDT", Decimal::from(price), at(60 * (i as i64 + 1)));
            let outcome = position.on_tick(&tick, &rules).unwrap();
            match side {
                Side::Long => prop_assert!(position.stop_loss >= stop),
                Side::Short => prop_assert!(position.stop_loss <= stop),
            }
            stop = position.stop_loss;
            if matches!(outcome, TickOutcome::ExitTriggered { .. }) {
                prop_assert_eq!(position.status(), PositionStatus::Closing);
                break;
            }
        }
    }

    #[test]
    fn prop_learner_ignores_replayed_outcomes(returns in prop::collection::vec(-500i64..800, 1..30)) {
        let config = LearningConfig {
            min_trades: 5,
            ..LearningConfig::default()
        };
        let once = AutoLearner::new(config.clone(), Arc::new(StatsStore::new()));
        let twice = AutoLearner::new(config, Arc::new(StatsStore::new()));

        for pnl in returns {
            let outcome = outcome(pnl);
            prop_assert!(once.process(&outcome, t0()).is_some());
            prop_assert!(twice.process(&outcome, t0()).is_some());
            prop_assert!(twice.process(&outcome, t0()).is_none());
        }

        let a = once.store().get("ETH/USDT").unwrap();
        let b = twice.store().get("ETH/USDT").unwrap();
        prop_assert_eq!(&*a, &*b);
    }

    #[test]
    fn prop_committed_exposure_never_exceeds_ceiling(
        entries in prop::collection::vec((0usize..10, any::<bool>(), 10i64..=100), 1..40),
        close_every in 2usize..6,
    ) {
        let mut budget = RiskBudget::new(
            RiskConfig {
                cooldown_minutes: 0,
                ..RiskConfig::default()
            },
            &ExecutionMode::Paper,
            dec!(10000),
            t0(),
        );
        let mut open = Vec::new();

        for (i, (symbol, long, fraction)) in entries.into_iter().enumerate() {
            let now = at(i as i64);
            let side = if long { Side::Long } else { Side::Short };
            if let RiskDecision::Allow(reservation) = budget.evaluate(SYMBOLS[symbol], side, now) {
                let position_id = Uuid::new_v4();
                let notional = reservation.notional * Decimal::new(fraction, 2);
                prop_assert!(budget.commit(reservation.id, position_id, notional, now).is_ok());
                open.push(position_id);
            }
            prop_assert!(budget.committed() <= budget.exposure_ceiling());

            if i % close_every == 0 && !open.is_empty() {
                let position_id = open.remove(0);
                budget.record_close(position_id, dec!(0), now);
            }
        }
    }
}
