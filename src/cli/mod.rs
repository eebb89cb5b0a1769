//! CLI interface for swing-risk
//!
//! Provides subcommands for:
//! - `run`: Paper-trade engine inputs read from stdin
//! - `replay`: Replay a recorded input file and report the results
//! - `config`: Print the effective configuration

mod replay;
mod run;

pub use replay::ReplayArgs;
pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "swing-risk")]
#[command(about = "Risk and position lifecycle engine for crypto swing trading")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Paper-trade JSON-lines ticks and signals from stdin
    Run(RunArgs),
    /// Replay a recorded JSON-lines file
    Replay(ReplayArgs),
    /// Print the effective configuration
    Config,
}
