//! End-to-end integration tests

use crate::support::{at, frictionless, impatient, t0, Harness, BTC, ETH, SOL};
use rust_decimal_macros::dec;
use std::io::Cursor;
use std::time::Duration;
use swing_risk::backtest::{EventStream, ReplayConfig, ReplaySimulator};
use swing_risk::config::Config;
use swing_risk::engine::{EngineError, EngineInput, SignalOutcome};
use swing_risk::events::{EngineEvent, JsonlJournal};
use swing_risk::execution::FillBehavior;
use swing_risk::feed::PriceTick;
use swing_risk::position::{ExitReason, PositionStatus};
use swing_risk::risk::{DeclineReason, RejectReason};
use swing_risk::signal::{Direction, SignalInput};
use tokio::sync::mpsc;

#[test]
fn test_config_example_loads() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    config.validate().unwrap();
    assert_eq!(config.engine.initial_capital, dec!(10000));
    assert_eq!(config.engine.symbols.len(), 10);
    assert_eq!(config.risk.max_position_pct, dec!(0.15));
    assert_eq!(config.sizing.confidence_tiers.len(), 4);
}

#[tokio::test]
async fn test_long_round_trip_to_take_profit() {
    let h = Harness::new(frictionless());
    h.tick(BTC, dec!(50000), 0).await;

    let outcome = h.signal(BTC, dec!(0.75), Direction::Long, 1).await.unwrap();
    let SignalOutcome::Opened(position) = outcome else {
        panic!("expected an entry, got {:?}", outcome);
    };
    assert_eq!(position.entry_price, dec!(50000));
    assert_eq!(position.quantity, dec!(0.03));
    assert_eq!(position.stop_loss, dec!(48750));
    assert_eq!(position.take_profit, dec!(52250));

    let snapshot = h.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.open_exposure, dec!(1500));
    assert_eq!(snapshot.open_positions, 1);
    assert_eq!(snapshot.reservations, 0);

    let report = h.tick(BTC, dec!(52300), 600).await;
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.stop_moves, 1);
    assert_eq!(report.closed.len(), 1);
    let trade = &report.closed[0];
    assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
    assert_eq!(trade.pnl, dec!(69));
    assert_eq!(trade.pnl_pct, dec!(0.046));
    assert_eq!(trade.duration_secs, 599);

    assert!(h.engine.open_positions().await.is_empty());
    let snapshot = h.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.equity, dec!(10069));
    assert_eq!(snapshot.open_exposure, dec!(0));

    assert_eq!(h.count("position_opened"), 1);
    assert_eq!(h.count("position_updated"), 1);
    assert_eq!(h.count("position_closed"), 1);
    assert_eq!(h.count("trade_outcome"), 1);

    let stats = h.engine.stats().get(BTC).unwrap();
    assert_eq!(stats.total_trades, 1);
    assert_eq!(stats.version, 1);
}

#[tokio::test]
async fn test_fees_are_netted_from_realized_pnl() {
    let mut config = frictionless();
    config.execution.taker_fee = dec!(0.001);
    let h = Harness::new(config);

    h.tick(BTC, dec!(50000), 0).await;
    h.signal(BTC, dec!(0.75), Direction::Long, 1).await.unwrap();
    let report = h.tick(BTC, dec!(52300), 600).await;

    // 1.5 on entry, 1.569 on exit
    assert_eq!(report.closed[0].pnl, dec!(65.931));
    let closed = h.sink.of_kind("position_closed");
    let EngineEvent::PositionClosed { closed } = &closed[0] else {
        panic!("expected a close event");
    };
    assert_eq!(closed.fees, dec!(3.069));
    assert_eq!(h.engine.snapshot().await.unwrap().equity, dec!(10065.931));
}

#[tokio::test]
async fn test_cooldown_blocks_reentry_after_close() {
    let h = Harness::new(frictionless());
    h.tick(BTC, dec!(50000), 0).await;
    h.signal(BTC, dec!(0.75), Direction::Long, 1).await.unwrap();
    h.tick(BTC, dec!(52300), 600).await;

    h.tick(BTC, dec!(52400), 650).await;
    let err = h
        .signal(BTC, dec!(0.9), Direction::Long, 660)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::RiskRejected(RejectReason::Cooldown { .. })
    ));
    assert!(err.is_soft());
    assert_eq!(h.count("risk_limit_rejected"), 1);

    // Cooldown is 30 minutes from the close
    h.tick(BTC, dec!(52400), 600 + 1801).await;
    let outcome = h
        .signal(BTC, dec!(0.9), Direction::Long, 600 + 1802)
        .await
        .unwrap();
    assert!(matches!(outcome, SignalOutcome::Opened(_)));
}

#[tokio::test]
async fn test_signal_without_market_data() {
    let h = Harness::new(frictionless());
    let err = h
        .signal(ETH, dec!(0.8), Direction::Long, 0)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NoMarketData(ETH.to_string()));

    let err = h
        .signal("PEPE/USDT", dec!(0.8), Direction::Long, 0)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::UnknownSymbol("PEPE/USDT".to_string()));
}

#[tokio::test]
async fn test_stale_price_blocks_entry() {
    let h = Harness::new(frictionless());
    h.tick(ETH, dec!(3000), 0).await;

    let err = h
        .signal(ETH, dec!(0.8), Direction::Long, 121)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StaleData { .. }));
    assert_eq!(h.count("stale_data_skip"), 1);
    assert!(h.gateway.fills().await.is_empty());
}

#[tokio::test]
async fn test_hold_and_low_confidence_signals() {
    let h = Harness::new(frictionless());
    h.tick(ETH, dec!(3000), 0).await;

    let outcome = h.signal(ETH, dec!(0.9), Direction::Hold, 1).await.unwrap();
    assert!(matches!(outcome, SignalOutcome::Hold(_)));
    let outcome = h.signal(ETH, dec!(0.54), Direction::Long, 2).await.unwrap();
    assert!(matches!(outcome, SignalOutcome::Hold(_)));

    assert!(h.sink.is_empty());
    assert_eq!(h.engine.snapshot().await.unwrap().reservations, 0);
}

#[tokio::test]
async fn test_sizer_decline_releases_reservation() {
    let mut config = frictionless();
    config.risk.min_trade_value = dec!(2000);
    let h = Harness::new(config);
    h.tick(ETH, dec!(3000), 0).await;

    let outcome = h.signal(ETH, dec!(0.8), Direction::Long, 1).await.unwrap();
    assert!(matches!(
        outcome,
        SignalOutcome::Declined(DeclineReason::BelowMinimum { .. })
    ));
    let snapshot = h.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.reservations, 0);
    assert_eq!(snapshot.reserved, dec!(0));
    assert!(h.gateway.fills().await.is_empty());
}

#[tokio::test]
async fn test_unconfirmed_entry_is_cancelled() {
    let h = Harness::new(impatient(frictionless()));
    h.gateway
        .set_behavior(FillBehavior::Unresponsive {
            delay: Duration::from_millis(200),
        })
        .await;
    h.tick(BTC, dec!(50000), 0).await;

    let outcome = h.signal(BTC, dec!(0.8), Direction::Long, 1).await.unwrap();
    assert!(matches!(outcome, SignalOutcome::EntryCancelled { .. }));

    let snapshot = h.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.reservations, 0);
    assert_eq!(snapshot.open_positions, 0);
    assert!(h.engine.position(BTC).await.is_none());
    assert_eq!(h.count("entry_cancelled"), 1);
    assert_eq!(h.count("position_opened"), 0);
}

#[tokio::test]
async fn test_unconfirmed_exit_is_retried_on_next_tick() {
    let h = Harness::new(impatient(frictionless()));
    h.tick(BTC, dec!(50000), 0).await;
    h.signal(BTC, dec!(0.75), Direction::Long, 1).await.unwrap();

    h.gateway
        .set_behavior(FillBehavior::Unresponsive {
            delay: Duration::from_millis(200),
        })
        .await;
    let report = h.tick(BTC, dec!(48700), 300).await;
    assert_eq!(report.exits_pending, 1);
    assert!(report.closed.is_empty());
    assert!(report.has_hard_errors());
    assert_eq!(h.count("exit_pending"), 1);

    let position = h.engine.position(BTC).await.unwrap();
    assert_eq!(position.status(), PositionStatus::Closing);
    // Exposure stays booked until the exit is confirmed
    assert_eq!(h.engine.snapshot().await.unwrap().open_exposure, dec!(1500));

    h.gateway.set_behavior(FillBehavior::Immediate).await;
    let report = h.tick(BTC, dec!(48600), 360).await;
    assert_eq!(report.closed.len(), 1);
    let trade = &report.closed[0];
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    // Re-sent order keeps the original reference price
    assert_eq!(trade.pnl, dec!(-39));

    let fills = h.gateway.fills().await;
    assert_eq!(fills.len(), 2);
    assert_eq!(h.engine.snapshot().await.unwrap().equity, dec!(9961));
}

#[tokio::test]
async fn test_rejected_exit_is_rebuilt_after_venue_recovers() {
    let h = Harness::new(impatient(frictionless()));
    h.tick(BTC, dec!(50000), 0).await;
    h.signal(BTC, dec!(0.75), Direction::Long, 1).await.unwrap();

    h.gateway
        .set_behavior(FillBehavior::Reject("venue halted".into()))
        .await;
    let report = h.tick(BTC, dec!(48700), 300).await;
    assert_eq!(report.exits_pending, 1);
    assert!(report.closed.is_empty());
    assert!(matches!(
        report.errors[0].error,
        EngineError::ExecutionFailed(_)
    ));
    assert_eq!(
        h.engine.position(BTC).await.unwrap().status(),
        PositionStatus::Closing
    );

    // A refused id is never re-sent; the next tick prices a fresh order
    h.gateway.set_behavior(FillBehavior::Immediate).await;
    let report = h.tick(BTC, dec!(48600), 360).await;
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.closed.len(), 1);
    assert_eq!(report.closed[0].exit_reason, ExitReason::StopLoss);
    assert_eq!(report.closed[0].pnl, dec!(-42));

    assert!(h.engine.position(BTC).await.is_none());
    let snapshot = h.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.open_exposure, dec!(0));
    assert_eq!(snapshot.equity, dec!(9958));
}

#[tokio::test]
async fn test_rejected_pyramid_add_leaves_position_intact() {
    let h = Harness::new(frictionless());
    h.tick(BTC, dec!(50000), 0).await;
    h.signal(BTC, dec!(0.8), Direction::Long, 1).await.unwrap();

    h.gateway
        .set_behavior(FillBehavior::Reject("insufficient margin".into()))
        .await;
    let report = h.tick(BTC, dec!(51000), 300).await;
    assert_eq!(report.pyramids, 0);
    assert!(report
        .errors
        .iter()
        .any(|e| matches!(e.error, EngineError::ExecutionFailed(_))));

    let position = h.engine.position(BTC).await.unwrap();
    assert_eq!(position.status(), PositionStatus::Open);
    assert_eq!(position.pyramid_level, 0);
    assert_eq!(position.quantity, dec!(0.03));
    assert!(position.adds.is_empty());

    // The add's reservation is handed back
    let snapshot = h.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.reservations, 0);
    assert_eq!(snapshot.open_exposure, dec!(1500));
    assert_eq!(h.gateway.fills().await.len(), 1);
}

#[tokio::test]
async fn test_pyramid_add_lifts_stop_to_average_entry() {
    let h = Harness::new(frictionless());
    h.tick(BTC, dec!(50000), 0).await;
    h.signal(BTC, dec!(0.8), Direction::Long, 1).await.unwrap();

    let report = h.tick(BTC, dec!(51000), 300).await;
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.pyramids, 1);
    assert_eq!(report.stop_moves, 2);

    let position = h.engine.position(BTC).await.unwrap();
    assert_eq!(position.pyramid_level, 1);
    assert_eq!(position.quantity, dec!(0.045));
    assert_eq!(position.adds.len(), 1);
    assert_eq!(position.adds[0].quantity, dec!(0.015));
    assert!(position.entry_price > dec!(50333) && position.entry_price < dec!(50334));
    assert_eq!(position.stop_loss, position.entry_price);

    let snapshot = h.engine.snapshot().await.unwrap();
    assert_eq!(snapshot.open_exposure, dec!(2265));
    assert_eq!(snapshot.open_positions, 1);
}

#[tokio::test]
async fn test_stale_tick_skips_exit_evaluation() {
    let h = Harness::new(frictionless());
    h.tick(BTC, dec!(50000), 0).await;
    h.signal(BTC, dec!(0.75), Direction::Long, 1).await.unwrap();

    h.clock.set(at(600));
    let report = h
        .engine
        .on_ticks(vec![PriceTick::new(BTC, dec!(40000), at(60))])
        .await;
    assert_eq!(report.stale, 1);
    assert!(report.closed.is_empty());
    assert!(!report.has_hard_errors());
    assert_eq!(h.count("stale_data_skip"), 1);

    let position = h.engine.position(BTC).await.unwrap();
    assert_eq!(position.status(), PositionStatus::Open);
    assert_eq!(position.stop_loss, dec!(48750));
}

#[tokio::test]
async fn test_out_of_order_tick_is_rejected() {
    let h = Harness::new(frictionless());
    h.tick(BTC, dec!(50000), 0).await;
    h.signal(BTC, dec!(0.75), Direction::Long, 1).await.unwrap();
    h.tick(BTC, dec!(50100), 120).await;

    let report = h
        .engine
        .on_ticks(vec![PriceTick::new(BTC, dec!(40000), at(90))])
        .await;
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(report.errors[0].error, EngineError::OutOfOrder { .. }));

    let position = h.engine.position(BTC).await.unwrap();
    assert_eq!(position.status(), PositionStatus::Open);
    assert_eq!(position.last_price, Some(dec!(50100)));
}

#[tokio::test]
async fn test_external_close() {
    let h = Harness::new(frictionless());
    h.tick(ETH, dec!(3000), 0).await;
    h.signal(ETH, dec!(0.75), Direction::Short, 1).await.unwrap();
    h.tick(ETH, dec!(2970), 60).await;

    let trade = h.engine.close_position(ETH).await.unwrap().unwrap();
    assert_eq!(trade.exit_reason, ExitReason::External);
    // Short 0.5 ETH from 3000 to 2970
    assert_eq!(trade.pnl, dec!(15));

    let err = h.engine.close_position(ETH).await.unwrap_err();
    assert_eq!(err, EngineError::RiskRejected(RejectReason::NoPosition));
}

#[tokio::test]
async fn test_learner_blacklists_losing_symbol() {
    let mut config = frictionless();
    config.risk.cooldown_minutes = 0;
    config.learning.min_trades = 3;
    config.learning.short_window = 3;
    config.learning.long_window = 10;
    let h = Harness::new(config);

    for round in 0..3 {
        let base = round * 600;
        h.tick(SOL, dec!(100), base).await;
        let outcome = h.signal(SOL, dec!(0.75), Direction::Long, base + 1).await.unwrap();
        assert!(matches!(outcome, SignalOutcome::Opened(_)), "round {round}");
        let report = h.tick(SOL, dec!(97), base + 120).await;
        assert_eq!(report.closed.len(), 1, "round {round}");
        assert_eq!(report.closed[0].exit_reason, ExitReason::StopLoss);
        assert!(report.closed[0].pnl < dec!(0));
    }
    assert_eq!(h.sink.of_kind("trade_outcome").len(), 3);

    assert_eq!(h.count("symbol_blacklisted"), 1);
    let stats = h.engine.stats().get(SOL).unwrap();
    assert_eq!(stats.total_trades, 3);
    assert_eq!(stats.blacklist_strikes, 1);
    assert_eq!(stats.confidence_multiplier, dec!(0.9));

    h.tick(SOL, dec!(100), 1800).await;
    let err = h
        .signal(SOL, dec!(0.95), Direction::Long, 1801)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::RiskRejected(RejectReason::Blacklisted { .. })
    ));
    assert_eq!(h.gateway.fills().await.len(), 6);
}

#[tokio::test]
async fn test_run_consumes_queued_inputs() {
    let h = Harness::new(frictionless());
    let (tx, rx) = mpsc::channel(16);

    tx.send(EngineInput::Tick(PriceTick::new(BTC, dec!(50000), t0())))
        .await
        .unwrap();
    tx.send(EngineInput::Signal(SignalInput::new(
        BTC,
        dec!(0.75),
        Direction::Long,
        t0(),
    )))
    .await
    .unwrap();
    tx.send(EngineInput::Tick(PriceTick::new(BTC, dec!(50100), at(5))))
        .await
        .unwrap();
    tx.send(EngineInput::Close {
        symbol: BTC.to_string(),
        timestamp: at(10),
    })
    .await
    .unwrap();
    drop(tx);

    h.clock.set(at(10));
    let report = h.engine.run(rx).await;
    assert_eq!(report.ticks, 2);
    assert_eq!(report.closed.len(), 1);
    assert_eq!(report.closed[0].exit_reason, ExitReason::External);
    assert_eq!(report.closed[0].pnl, dec!(3));
}

#[tokio::test]
async fn test_journal_records_sequenced_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal").join("events.jsonl");
    let journal = std::sync::Arc::new(JsonlJournal::open(&path).await.unwrap());

    let clock = std::sync::Arc::new(swing_risk::clock::ManualClock::new(t0()));
    let gateway = std::sync::Arc::new(swing_risk::execution::PaperGateway::new(
        dec!(0),
        clock.clone(),
    ));
    let engine =
        swing_risk::engine::Engine::new(frictionless(), clock.clone(), gateway, journal).unwrap();

    engine
        .on_ticks(vec![PriceTick::new(BTC, dec!(50000), t0())])
        .await;
    engine
        .on_signal(SignalInput::new(BTC, dec!(0.75), Direction::Long, t0()))
        .await
        .unwrap();
    clock.set(at(600));
    engine
        .on_ticks(vec![PriceTick::new(BTC, dec!(52300), at(600))])
        .await;

    let events = JsonlJournal::read_all(&path).await.unwrap();
    let kinds: Vec<_> = events.iter().map(|e| e.event.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "position_opened",
            "position_updated",
            "position_closed",
            "trade_outcome"
        ]
    );
    assert!(events.windows(2).all(|w| w[0].sequence < w[1].sequence));
    assert_eq!(events[3].timestamp, at(600));
}

#[tokio::test]
async fn test_replay_simulator_end_to_end() {
    let lines = r#"
# one winning BTC trade and a stale ETH signal
{"type":"tick","symbol":"BTC/USDT","price":"50000","timestamp":"2024-03-01T12:00:00Z"}
{"type":"signal","symbol":"BTC/USDT","raw_confidence":"0.75","direction":"long","timestamp":"2024-03-01T12:00:01Z"}
{"type":"tick","symbol":"ETH/USDT","price":"3000","timestamp":"2024-03-01T12:00:02Z"}
{"type":"tick","symbol":"BTC/USDT","price":"52300","timestamp":"2024-03-01T12:10:00Z"}
{"type":"signal","symbol":"ETH/USDT","raw_confidence":"0.8","direction":"long","timestamp":"2024-03-01T12:10:00Z"}
"#;
    let stream = EventStream::from_reader(Cursor::new(lines), None, None).unwrap();
    assert_eq!(stream.remaining(), 5);

    let replay = ReplayConfig {
        input: "unused.jsonl".into(),
        start_time: None,
        end_time: None,
        initial_capital: Some(dec!(10000)),
    };
    let result = ReplaySimulator::new(frictionless(), &replay)
        .run(stream)
        .await
        .unwrap();

    let summary = &result.summary;
    assert_eq!(summary.total_trades, 1);
    assert_eq!(summary.wins, 1);
    assert_eq!(summary.net_pnl, dec!(69));
    assert_eq!(summary.final_equity, dec!(10069));
    assert_eq!(summary.activity.signals, 2);
    assert_eq!(summary.activity.entries, 1);
    assert_eq!(summary.activity.stale_skips, 1);
    assert_eq!(summary.activity.open_positions, 0);
    assert_eq!(result.outcomes[0].exit_reason, ExitReason::TakeProfit);
    assert!(result
        .events
        .iter()
        .any(|e| e.event.kind() == "stale_data_skip"));
}
