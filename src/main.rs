use clap::Parser;
use swing_risk::cli::{Cli, Commands};
use swing_risk::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            let config: Config = toml::from_str(include_str!("../config.toml.example"))?;
            config.validate()?;
            config
        }
    };

    // Initialize telemetry
    let _telemetry = swing_risk::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(mode = ?config.execution.mode, "Starting engine");
            args.execute(config).await?;
        }
        Commands::Replay(args) => {
            args.execute(config).await?;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
