//! swing-risk: risk and position lifecycle engine for crypto swing trading
//!
//! This library provides the core components for:
//! - Signal intake with learned per-symbol confidence multipliers
//! - Portfolio risk limits behind a single-owner risk budget
//! - Fractional-Kelly position sizing
//! - Position lifecycle with breakeven, trailing stops and pyramiding
//! - Auto-learning feedback, blacklisting and streak risk scaling
//! - Paper execution with timeouts, retries and fees
//! - Event journaling and offline replay
//! - Structured logging and Prometheus metrics

pub mod backtest;
pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod events;
pub mod execution;
pub mod feed;
pub mod learning;
pub mod position;
pub mod risk;
pub mod signal;
pub mod telemetry;
