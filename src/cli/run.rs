//! Run command implementation

use crate::clock::SystemClock;
use crate::config::{Config, ExecutionMode};
use crate::engine::{Engine, EngineInput};
use crate::events::{ChannelSink, EventEnvelope, EventSink, JsonlJournal};
use crate::execution::PaperGateway;
use clap::Args;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const INPUT_BUFFER: usize = 1024;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Append emitted events to this JSON-lines file
    #[arg(short, long)]
    pub journal: Option<PathBuf>,
}

impl RunArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        if config.execution.mode == ExecutionMode::Live {
            anyhow::bail!("no live execution gateway is bundled; set execution.mode = \"paper\"");
        }

        let clock = Arc::new(SystemClock);
        let gateway = Arc::new(PaperGateway::new(
            config.execution.slippage_estimate,
            clock.clone(),
        ));

        let journal = self.journal.clone().or_else(|| config.engine.event_journal.clone());
        let (sink, printer): (Arc<dyn EventSink>, _) = match journal {
            Some(path) => (Arc::new(JsonlJournal::open(path).await?), None),
            None => {
                let (sink, events) = ChannelSink::channel(INPUT_BUFFER);
                let printer = spawn_printer(events, std::io::stdout());
                (Arc::new(sink), Some(printer))
            }
        };

        let engine = Engine::new(config, clock, gateway, sink)?;
        let (tx, rx) = mpsc::channel(INPUT_BUFFER);
        let reader = tokio::spawn(read_inputs(tx));

        tracing::info!("Reading engine inputs from stdin");
        let report = engine.run(rx).await;
        reader.await??;

        let snapshot = engine.snapshot().await?;
        tracing::info!(
            ticks = report.ticks,
            closed = report.closed.len(),
            errors = report.errors.len(),
            equity = %snapshot.equity,
            open_positions = snapshot.open_positions,
            "Run finished"
        );

        // Dropping the engine closes the event channel so the printer drains and exits
        drop(engine);
        if let Some(printer) = printer {
            printer.await?;
        }
        eprintln!("{}", serde_json::to_string_pretty(&snapshot)?);
        Ok(())
    }
}

/// Write each event as a JSON line until every sender is gone
fn spawn_printer<W>(mut events: mpsc::Receiver<EventEnvelope>, mut out: W) -> JoinHandle<W>
where
    W: Write + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(envelope) = events.recv().await {
            let written = serde_json::to_string(&envelope)
                .map_err(anyhow::Error::from)
                .and_then(|line| writeln!(out, "{line}").map_err(Into::into));
            if let Err(e) = written {
                tracing::warn!(error = %e, sequence = envelope.sequence, "Could not print event");
            }
        }
        if let Err(e) = out.flush() {
            tracing::warn!(error = %e, "Could not flush event output");
        }
        out
    })
}

/// Forward stdin lines until EOF or Ctrl-C
async fn read_inputs(tx: mpsc::Sender<EngineInput>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, draining queued inputs");
                None
            }
        };
        let Some(line) = line else {
            return Ok(());
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<EngineInput>(trimmed) {
            Ok(input) => {
                if tx.send(input).await.is_err() {
                    return Ok(());
                }
            }
            Err(e) => tracing::warn!(error = %e, "Skipping malformed input line"),
        }
    }
}
