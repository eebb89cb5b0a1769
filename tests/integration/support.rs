//! Shared harness: an engine wired to a manual clock, a paper venue and an
//! in-memory event sink

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use swing_risk::clock::ManualClock;
use swing_risk::config::Config;
use swing_risk::engine::{Engine, EngineError, SignalOutcome, TickReport};
use swing_risk::events::MemorySink;
use swing_risk::execution::PaperGateway;
use swing_risk::feed::PriceTick;
use swing_risk::signal::{Direction, SignalInput};

pub const BTC: &str = "BTC/USDT";
pub const ETH: &str = "ETH/USDT";
pub const SOL: &str = "SOL/USDT";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

/// Defaults without slippage or fees, so fills land on the reference price
pub fn frictionless() -> Config {
    let mut config = Config::default();
    config.execution.slippage_estimate = dec!(0);
    config.execution.taker_fee = dec!(0);
    config
}

/// Short timeouts for tests that exercise an unresponsive venue
pub fn impatient(mut config: Config) -> Config {
    config.execution.order_timeout_ms = 20;
    config.execution.max_retries = 1;
    config.execution.backoff_base_ms = 1;
    config.execution.backoff_max_ms = 2;
    config
}

pub struct Harness {
    pub engine: Engine,
    pub clock: Arc<ManualClock>,
    pub gateway: Arc<PaperGateway>,
    pub sink: Arc<MemorySink>,
}

impl Harness {
    /// Must be called inside a tokio runtime; the risk budget actor is spawned
    pub fn new(config: Config) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let gateway = Arc::new(PaperGateway::new(
            config.execution.slippage_estimate,
            clock.clone(),
        ));
        let sink = Arc::new(MemorySink::new());
        let engine = Engine::new(config, clock.clone(), gateway.clone(), sink.clone()).unwrap();
        Self {
            engine,
            clock,
            gateway,
            sink,
        }
    }

    /// Deliver one tick observed `secs` after `t0`, with the clock moved there
    pub async fn tick(&self, symbol: &str, price: Decimal, secs: i64) -> TickReport {
        self.clock.set(at(secs));
        self.engine
            .on_ticks(vec![PriceTick::new(symbol, price, at(secs))])
            .await
    }

    pub async fn signal(
        &self,
        symbol: &str,
        confidence: Decimal,
        direction: Direction,
        secs: i64,
    ) -> Result<SignalOutcome, EngineError> {
        self.clock.set(at(secs));
        self.engine
            .on_signal(SignalInput::new(symbol, confidence, direction, at(secs)))
            .await
    }

    pub fn count(&self, kind: &str) -> usize {
        self.sink.of_kind(kind).len()
    }
}
