//! Worked risk scenarios run through the public API

use crate::support::{at, frictionless, impatient, Harness, BTC, ETH, SOL};
use rust_decimal_macros::dec;
use std::time::Duration;
use swing_risk::config::Config;
use swing_risk::engine::{EngineError, SignalOutcome};
use swing_risk::events::EngineEvent;
use swing_risk::execution::FillBehavior;
use swing_risk::learning::SymbolPerformanceStats;
use swing_risk::position::{ExitReason, PositionState, PositionStatus};
use swing_risk::risk::{PositionSizer, RejectReason, SizingBasis};
use swing_risk::signal::Direction;

#[test]
fn test_kelly_sizing_with_volatility_adjustment() {
    let sizer = PositionSizer::from_config(&Config::default());
    let mut stats = SymbolPerformanceStats::empty(BTC);
    stats.total_trades = 10;
    stats.win_rate = dec!(0.6);
    stats.avg_win = dec!(0.04);
    stats.avg_loss = dec!(0.02);

    // Confidence 0.7 sits in the 1.0x tier, so the Kelly size passes through
    let decision = sizer.size_pct(dec!(0.7), Some(&stats), dec!(0.1), dec!(1));
    assert_eq!(decision.basis, SizingBasis::Kelly);
    assert_eq!(decision.kelly, Some(dec!(0.1)));
    assert!((decision.size_pct - dec!(0.0909)).abs() < dec!(0.0001));
    assert!(decision.declined.is_none());
}

#[tokio::test]
async fn test_blacklisted_symbol_places_no_order() {
    let h = Harness::new(frictionless());
    h.engine
        .budget()
        .blacklist(ETH, at(0) + chrono::Duration::hours(2))
        .await
        .unwrap();
    h.tick(ETH, dec!(3000), 0).await;

    let err = h
        .signal(ETH, dec!(0.9), Direction::Long, 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::RiskRejected(RejectReason::Blacklisted { .. })
    ));
    assert!(h.gateway.fills().await.is_empty());

    let rejected = h.sink.of_kind("risk_limit_rejected");
    let EngineEvent::RiskLimitRejected { symbol, code, .. } = &rejected[0] else {
        panic!("expected a rejection event");
    };
    assert_eq!(symbol, ETH);
    assert_eq!(code, "blacklisted");
}

#[tokio::test]
async fn test_trailing_stop_ratchets_and_never_loosens() {
    let mut config = impatient(frictionless());
    config.position.pyramiding_max_levels = 0;
    let h = Harness::new(config);

    h.tick(SOL, dec!(100), 0).await;
    h.signal(SOL, dec!(0.75), Direction::Long, 1).await.unwrap();

    h.tick(SOL, dec!(103), 60).await;
    let position = h.engine.position(SOL).await.unwrap();
    assert!(position.trailing_active);
    assert_eq!(position.stop_loss, dec!(101.97));

    h.tick(SOL, dec!(102), 120).await;
    let position = h.engine.position(SOL).await.unwrap();
    assert_eq!(position.stop_loss, dec!(101.97));
    assert_eq!(position.status(), PositionStatus::Open);

    // Hold the exit unconfirmed so the Closing state is observable
    h.gateway
        .set_behavior(FillBehavior::Unresponsive {
            delay: Duration::from_millis(200),
        })
        .await;
    let report = h.tick(SOL, dec!(101.97), 180).await;
    assert_eq!(report.exits_pending, 1);

    let position = h.engine.position(SOL).await.unwrap();
    assert_eq!(position.status(), PositionStatus::Closing);
    let PositionState::Closing { reason, trigger_price, .. } = position.state else {
        panic!("expected closing state");
    };
    assert_eq!(reason, ExitReason::TrailingStop);
    assert_eq!(trigger_price, dec!(101.97));
}

#[tokio::test]
async fn test_daily_loss_limit_blocks_entries_until_reset() {
    let mut config = frictionless();
    config.risk.max_position_pct = dec!(0.2);
    let h = Harness::new(config);

    // 20 SOL stopped out 25 below entry: exactly 5% of 10000
    h.tick(SOL, dec!(100), 0).await;
    h.signal(SOL, dec!(0.75), Direction::Long, 1).await.unwrap();
    let report = h.tick(SOL, dec!(75), 60).await;
    assert_eq!(report.closed[0].pnl, dec!(-500));

    h.tick(ETH, dec!(3000), 120).await;
    h.tick(BTC, dec!(50000), 120).await;
    for symbol in [ETH, BTC] {
        let err = h
            .signal(symbol, dec!(1), Direction::Long, 121)
            .await
            .unwrap_err();
        assert!(
            matches!(err, EngineError::RiskRejected(RejectReason::DailyLossLimit { .. })),
            "{symbol}: {err}"
        );
    }
    assert!(!h.engine.snapshot().await.unwrap().drawdown_paused);

    // Midnight UTC starts a new trading day
    let next_day = 12 * 3600;
    h.tick(ETH, dec!(3000), next_day + 60).await;
    let outcome = h
        .signal(ETH, dec!(0.8), Direction::Long, next_day + 61)
        .await
        .unwrap();
    assert!(matches!(outcome, SignalOutcome::Opened(_)));

    let snapshot = h.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.day_start_capital, dec!(9500));
    assert_eq!(snapshot.daily_realized, dec!(0));
}
