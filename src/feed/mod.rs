//! Market data boundary
//!
//! Price ticks supplied by the external market-data collector. The engine
//! only consumes them; collection and indicator math live elsewhere.

mod types;

pub use types::PriceTick;
