//! Configuration types for swing-risk

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub position: PositionConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A ratio was outside `[0, 1]`
    #[error("{field} must be within [0, 1], got {value}")]
    RatioOutOfRange { field: &'static str, value: Decimal },
    /// A value that must be strictly positive was not
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: Decimal },
    /// A duration outside `0..=max`
    #[error("{field} must be within 0..={max}, got {value}")]
    DurationOutOfRange {
        field: &'static str,
        value: i64,
        max: i64,
    },
    /// Any other inconsistent combination
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Longest configurable wait, in minutes (one year)
pub const MAX_DURATION_MINUTES: i64 = 366 * 24 * 60;
/// Longest tolerated tick age
pub const MAX_PRICE_AGE_SECS: u64 = 86_400;

/// Engine-wide settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Starting equity in quote currency
    pub initial_capital: Decimal,
    /// Ticks older than this are never acted upon
    pub max_price_age_secs: u64,
    /// Tradable universe
    pub symbols: Vec<String>,
    /// Optional JSON-lines journal for emitted events
    pub event_journal: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(10000),
            max_price_age_secs: 120,
            symbols: [
                "BTC/USDT", "ETH/USDT", "BNB/USDT", "XRP/USDT", "SOL/USDT", "NEAR/USDT",
                "TRX/USDT", "DOGE/USDT", "ADA/USDT", "SUI/USDT",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            event_journal: None,
        }
    }
}

/// Portfolio risk ceilings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Maximum position as fraction of equity
    pub max_position_pct: Decimal,
    /// Smallest notional worth sending to the exchange
    pub min_trade_value: Decimal,
    /// Fraction of equity risked per trade when sizing without history
    pub risk_per_trade: Decimal,
    /// Concurrent position ceiling in paper mode
    pub max_open_positions: usize,
    /// Concurrent position ceiling in live mode
    pub max_open_positions_live: usize,
    /// Minimum minutes between trades on the same symbol
    pub cooldown_minutes: i64,
    /// Daily realized loss ceiling as fraction of day-start capital
    pub max_daily_loss_pct: Decimal,
    /// Drawdown from equity peak that pauses new entries
    pub max_drawdown_pct: Decimal,
    /// Drawdown level entries may resume at (after the recovery period)
    pub drawdown_recovery_pct: Decimal,
    /// Days drawdown must stay at or below the recovery level
    pub drawdown_recovery_days: i64,
    /// UTC hour at which daily figures reset
    pub daily_reset_hour_utc: u32,
    /// Total open notional ceiling as fraction of equity
    pub max_portfolio_exposure_pct: Decimal,
    /// Pairs at or above this correlation count as correlated
    pub max_correlation: Decimal,
    /// Same-side correlated notional ceiling as fraction of equity
    pub max_correlated_exposure_pct: Decimal,
    /// Maximum same-side correlated positions
    pub max_correlated_positions: usize,
    /// New positions allowed per trading day; unlimited when unset
    pub max_daily_trades: Option<u32>,
    /// Pairwise correlations overriding the built-in table
    pub correlations: Vec<CorrelationEntry>,
}

/// A configured pairwise correlation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorrelationEntry {
    pub a: String,
    pub b: String,
    pub value: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_pct: dec!(0.15),
            min_trade_value: dec!(100),
            risk_per_trade: dec!(0.02),
            max_open_positions: 30,
            max_open_positions_live: 15,
            cooldown_minutes: 30,
            max_daily_loss_pct: dec!(0.05),
            max_drawdown_pct: dec!(0.15),
            drawdown_recovery_pct: dec!(0.10),
            drawdown_recovery_days: 1,
            daily_reset_hour_utc: 0,
            max_portfolio_exposure_pct: dec!(0.60),
            max_correlation: dec!(0.70),
            max_correlated_exposure_pct: dec!(0.30),
            max_correlated_positions: 3,
            max_daily_trades: None,
            correlations: Vec::new(),
        }
    }
}

impl RiskConfig {
    /// Open-position ceiling for the given execution mode
    pub fn max_open_positions_for(&self, mode: &ExecutionMode) -> usize {
        match mode {
            ExecutionMode::Paper => self.max_open_positions,
            ExecutionMode::Live => self.max_open_positions_live,
        }
    }
}

/// Position sizing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Kelly fraction (e.g., 0.25 for quarter Kelly)
    pub kelly_fraction: Decimal,
    /// Trades required before Kelly sizing replaces the fallback
    pub min_kelly_trades: usize,
    /// Adjusted confidence below this is a hold
    pub min_signal_confidence: Decimal,
    /// Confidence tiers, any order; the highest matching tier wins
    pub confidence_tiers: Vec<ConfidenceTier>,
}

/// Size multiplier applied from a confidence floor upward
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfidenceTier {
    pub min_confidence: Decimal,
    pub multiplier: Decimal,
}

impl Default for SizingConfig {
    fn default() -> Self {
        let min_signal_confidence = dec!(0.55);
        Self {
            kelly_fraction: dec!(0.25),
            min_kelly_trades: 10,
            min_signal_confidence,
            confidence_tiers: vec![
                ConfidenceTier {
                    min_confidence: min_signal_confidence,
                    multiplier: dec!(0.5),
                },
                ConfidenceTier {
                    min_confidence: dec!(0.60),
                    multiplier: dec!(0.8),
                },
                ConfidenceTier {
                    min_confidence: dec!(0.70),
                    multiplier: dec!(1.0),
                },
                ConfidenceTier {
                    min_confidence: dec!(0.85),
                    multiplier: dec!(1.2),
                },
            ],
        }
    }
}

/// Position lifecycle rules
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PositionConfig {
    pub default_stop_loss_pct: Decimal,
    /// Take-profit used when no ATR is supplied
    pub default_take_profit_pct: Decimal,
    /// ATR/price below this is a calm market
    pub atr_low_threshold: Decimal,
    /// ATR/price above this is a volatile market
    pub atr_high_threshold: Decimal,
    pub take_profit_low_vol_pct: Decimal,
    pub take_profit_normal_vol_pct: Decimal,
    pub take_profit_high_vol_pct: Decimal,
    pub trailing_stop_activation_pct: Decimal,
    pub trailing_stop_distance_pct: Decimal,
    pub breakeven_trigger_pct: Decimal,
    pub pyramiding_max_levels: u32,
    /// Favorable move since the last add required for the next add
    pub pyramid_trigger_pct: Decimal,
    /// Each add is the initial quantity times ratio^level
    pub pyramid_size_ratio: Decimal,
    pub pyramid_min_confidence: Decimal,
    pub max_holding_hours: i64,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            default_stop_loss_pct: dec!(0.025),
            default_take_profit_pct: dec!(0.045),
            atr_low_threshold: dec!(0.015),
            atr_high_threshold: dec!(0.03),
            take_profit_low_vol_pct: dec!(0.03),
            take_profit_normal_vol_pct: dec!(0.045),
            take_profit_high_vol_pct: dec!(0.06),
            trailing_stop_activation_pct: dec!(0.02),
            trailing_stop_distance_pct: dec!(0.01),
            breakeven_trigger_pct: dec!(0.015),
            pyramiding_max_levels: 2,
            pyramid_trigger_pct: dec!(0.02),
            pyramid_size_ratio: dec!(0.5),
            pyramid_min_confidence: dec!(0.70),
            max_holding_hours: 72,
        }
    }
}

/// Auto-learning thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LearningConfig {
    pub short_window: usize,
    pub long_window: usize,
    /// Outcomes required before multipliers or blacklisting react
    pub min_trades: usize,
    pub blacklist_win_rate: Decimal,
    pub multiplier_step: Decimal,
    pub min_multiplier: Decimal,
    pub max_multiplier: Decimal,
    pub blacklist_base_minutes: i64,
    pub blacklist_max_minutes: i64,
    pub loss_streak_days: u32,
    pub win_streak_days: u32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            short_window: 10,
            long_window: 50,
            min_trades: 10,
            blacklist_win_rate: dec!(0.35),
            multiplier_step: dec!(0.1),
            min_multiplier: dec!(0.5),
            max_multiplier: dec!(1.5),
            blacklist_base_minutes: 240,
            blacklist_max_minutes: 10_080,
            loss_streak_days: 3,
            win_streak_days: 5,
        }
    }
}

/// Execution boundary configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
    /// Per-call timeout for gateway requests
    pub order_timeout_ms: u64,
    /// Attempts after the first before giving up
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Paper fills are shifted against the order by this fraction
    pub slippage_estimate: Decimal,
    pub taker_fee: Decimal,
    /// Margin-only opening fee
    pub margin_opening_fee: Decimal,
    /// Margin-only fee charged per full rollover interval held
    pub rollover_fee: Decimal,
    pub rollover_interval_hours: i64,
    pub margin: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Paper,
            order_timeout_ms: 5_000,
            max_retries: 3,
            backoff_base_ms: 200,
            backoff_max_ms: 5_000,
            slippage_estimate: dec!(0.0005),
            taker_fee: dec!(0.001),
            margin_opening_fee: dec!(0.0002),
            rollover_fee: dec!(0.0002),
            rollover_interval_hours: 4,
            margin: false,
        }
    }
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormatConfig,
    /// Prometheus listener port; disabled when absent
    pub metrics_port: Option<u16>,
}

/// Log output format selector
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatConfig {
    #[default]
    Pretty,
    Json,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormatConfig::Pretty,
            metrics_port: None,
        }
    }
}

fn check_ratio(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(ConfigError::RatioOutOfRange { field, value });
    }
    Ok(())
}

fn check_duration(field: &'static str, value: i64, max: i64) -> Result<(), ConfigError> {
    if !(0..=max).contains(&value) {
        return Err(ConfigError::DurationOutOfRange { field, value, max });
    }
    Ok(())
}

fn check_positive(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value <= Decimal::ZERO {
        return Err(ConfigError::NotPositive { field, value });
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run safely with
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("engine.initial_capital", self.engine.initial_capital)?;
        if self.engine.max_price_age_secs > MAX_PRICE_AGE_SECS {
            return Err(ConfigError::Invalid(format!(
                "engine.max_price_age_secs must not exceed {MAX_PRICE_AGE_SECS}"
            )));
        }

        let risk = &self.risk;
        check_ratio("risk.max_position_pct", risk.max_position_pct)?;
        check_ratio("risk.risk_per_trade", risk.risk_per_trade)?;
        check_ratio("risk.max_daily_loss_pct", risk.max_daily_loss_pct)?;
        check_ratio("risk.max_drawdown_pct", risk.max_drawdown_pct)?;
        check_ratio("risk.drawdown_recovery_pct", risk.drawdown_recovery_pct)?;
        check_ratio("risk.max_portfolio_exposure_pct", risk.max_portfolio_exposure_pct)?;
        check_ratio("risk.max_correlation", risk.max_correlation)?;
        check_ratio(
            "risk.max_correlated_exposure_pct",
            risk.max_correlated_exposure_pct,
        )?;
        if risk.drawdown_recovery_pct > risk.max_drawdown_pct {
            return Err(ConfigError::Invalid(
                "risk.drawdown_recovery_pct must not exceed risk.max_drawdown_pct".into(),
            ));
        }
        if risk.daily_reset_hour_utc > 23 {
            return Err(ConfigError::Invalid(
                "risk.daily_reset_hour_utc must be within 0..=23".into(),
            ));
        }
        check_duration("risk.cooldown_minutes", risk.cooldown_minutes, MAX_DURATION_MINUTES)?;
        check_duration(
            "risk.drawdown_recovery_days",
            risk.drawdown_recovery_days,
            MAX_DURATION_MINUTES / (24 * 60),
        )?;

        check_ratio("sizing.kelly_fraction", self.sizing.kelly_fraction)?;
        check_ratio("sizing.min_signal_confidence", self.sizing.min_signal_confidence)?;

        let position = &self.position;
        check_positive("position.default_stop_loss_pct", position.default_stop_loss_pct)?;
        check_positive(
            "position.default_take_profit_pct",
            position.default_take_profit_pct,
        )?;
        check_ratio(
            "position.trailing_stop_distance_pct",
            position.trailing_stop_distance_pct,
        )?;
        check_ratio("position.pyramid_size_ratio", position.pyramid_size_ratio)?;
        check_duration(
            "position.max_holding_hours",
            position.max_holding_hours,
            MAX_DURATION_MINUTES / 60,
        )?;

        let learning = &self.learning;
        if learning.short_window == 0 || learning.short_window > learning.long_window {
            return Err(ConfigError::Invalid(
                "learning.short_window must be within 1..=long_window".into(),
            ));
        }
        check_duration(
            "learning.blacklist_base_minutes",
            learning.blacklist_base_minutes,
            MAX_DURATION_MINUTES,
        )?;
        check_duration(
            "learning.blacklist_max_minutes",
            learning.blacklist_max_minutes,
            MAX_DURATION_MINUTES,
        )?;
        if learning.blacklist_base_minutes > learning.blacklist_max_minutes {
            return Err(ConfigError::Invalid(
                "learning.blacklist_base_minutes must not exceed learning.blacklist_max_minutes"
                    .into(),
            ));
        }
        if learning.min_multiplier > learning.max_multiplier {
            return Err(ConfigError::Invalid(
                "learning.min_multiplier must not exceed learning.max_multiplier".into(),
            ));
        }

        if self.execution.rollover_interval_hours <= 0 {
            return Err(ConfigError::Invalid(
                "execution.rollover_interval_hours must be positive".into(),
            ));
        }
        check_duration(
            "execution.rollover_interval_hours",
            self.execution.rollover_interval_hours,
            MAX_DURATION_MINUTES / 60,
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            [engine]
            initial_capital = 5000.0
            max_price_age_secs = 60
            symbols = ["BTC/USDT", "ETH/USDT"]

            [risk]
            max_position_pct = 0.10
            max_open_positions = 5
            cooldown_minutes = 15

            [sizing]
            kelly_fraction = 0.25

            [execution]
            mode = "live"

            [telemetry]
            log_level = "debug"
            log_format = "json"
            metrics_port = 9090
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.engine.initial_capital, dec!(5000));
        assert_eq!(config.engine.symbols.len(), 2);
        assert_eq!(config.risk.max_open_positions, 5);
        assert_eq!(config.risk.cooldown_minutes, 15);
        assert_eq!(config.execution.mode, ExecutionMode::Live);
        assert_eq!(config.telemetry.log_format, LogFormatConfig::Json);
        assert_eq!(config.telemetry.metrics_port, Some(9090));
        // Untouched fields keep their defaults
        assert_eq!(config.risk.max_daily_loss_pct, dec!(0.05));
        assert_eq!(config.position.pyramiding_max_levels, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.execution.mode, ExecutionMode::Paper);
        assert_eq!(config.sizing.confidence_tiers.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mode_specific_position_ceiling() {
        let risk = RiskConfig::default();
        assert_eq!(risk.max_open_positions_for(&ExecutionMode::Paper), 30);
        assert_eq!(risk.max_open_positions_for(&ExecutionMode::Live), 15);
    }

    #[test]
    fn test_correlation_entries() {
        let toml = r#"
            [[risk.correlations]]
            a = "BTC/USDT"
            b = "LINK/USDT"
            value = 0.9
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.risk.correlations.len(), 1);
        assert_eq!(config.risk.correlations[0].value, dec!(0.9));
    }

    #[test]
    fn test_validate_rejects_ratio_out_of_range() {
        let mut config = Config::default();
        config.risk.max_position_pct = dec!(1.5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RatioOutOfRange { field: "risk.max_position_pct", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_recovery_above_pause() {
        let mut config = Config::default();
        config.risk.drawdown_recovery_pct = dec!(0.20);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_bad_windows() {
        let mut config = Config::default();
        config.learning.short_window = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unbounded_durations() {
        let mut config = Config::default();
        config.risk.cooldown_minutes = i64::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DurationOutOfRange {
                field: "risk.cooldown_minutes",
                ..
            })
        ));

        let mut config = Config::default();
        config.position.max_holding_hours = i64::MAX / 2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.max_price_age_secs = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.learning.blacklist_max_minutes = i64::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.learning.blacklist_base_minutes = config.learning.blacklist_max_minutes + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.risk.cooldown_minutes = MAX_DURATION_MINUTES;
        config.engine.max_price_age_secs = MAX_PRICE_AGE_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_load_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[risk]\nmax_open_positions = 7").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.risk.max_open_positions, 7);
    }

    #[test]
    fn test_execution_mode_equality() {
        assert_eq!(ExecutionMode::Paper, ExecutionMode::Paper);
        assert_ne!(ExecutionMode::Paper, ExecutionMode::Live);
    }
}
