//! Replay command implementation

use crate::backtest::{ReplayConfig, ReplaySimulator};
use crate::config::Config;
use chrono::{DateTime, Utc};
use clap::Args;
use rust_decimal::Decimal;
use std::io::Write;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON-lines file of ticks, signals and close commands
    #[arg(short, long)]
    pub input: PathBuf,

    /// Start time filter (RFC 3339)
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,

    /// End time filter (RFC 3339)
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,

    /// Initial capital
    #[arg(long)]
    pub capital: Option<Decimal>,

    /// Print the summary as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Write every emitted event to this JSON-lines file
    #[arg(long)]
    pub events: Option<PathBuf>,
}

impl ReplayArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let replay = ReplayConfig {
            input: self.input.clone(),
            start_time: self.start,
            end_time: self.end,
            initial_capital: self.capital,
        };
        tracing::info!(input = %self.input.display(), "Running replay");

        let result = ReplaySimulator::new(config, &replay).run_file(&replay).await?;

        if let Some(path) = &self.events {
            let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
            for envelope in &result.events {
                serde_json::to_writer(&mut file, envelope)?;
                file.write_all(b"\n")?;
            }
            file.flush()?;
            tracing::info!(path = %path.display(), events = result.events.len(), "Events written");
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result.summary)?);
        } else {
            println!("{}", result.summary.format_table());
        }
        Ok(())
    }
}
