//! `taodiv` - TAO dividend API with sentiment-driven staking.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use taodiv_api::config::{Config, LoggingConfig};
use tracing::info;

#[derive(Parser)]
#[command(name = "taodiv")]
#[command(version, about = "TAO dividend API with sentiment-driven staking", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "taodiv.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server and stake workers
    Run,

    /// Create or upgrade the ledger schema
    InitDb,

    /// Print recent stake actions as JSON
    Ledger {
        /// Number of actions, newest first
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config).context("Failed to load configuration")?;
    init_logging(cli.debug, &config.logging);

    info!("taodiv {} starting with config: {}", env!("CARGO_PKG_VERSION"), cli.config);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => taodiv_api::server::run(config).await?,
        Commands::InitDb => init_db(&config).await?,
        Commands::Ledger { limit } => print_ledger(&config, limit).await?,
    }

    Ok(())
}

fn init_logging(debug: bool, logging: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    const CRATES: [&str; 5] = [
        "taodiv",
        "taodiv_api",
        "taodiv_chain",
        "taodiv_sentiment",
        "taodiv_staker",
    ];
    let directives = |level: &str| {
        let mut directives: Vec<String> =
            CRATES.iter().map(|c| format!("{}={}", c, level)).collect();
        directives.push(format!("tower_http={}", level));
        directives.join(",")
    };

    let env_filter = if debug {
        EnvFilter::new(format!("{},sqlx=debug", directives("debug")))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(&logging.level)))
    };

    let json = logging.format == "json";
    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| fmt::layer().json().with_target(true).with_line_number(true)))
        .with((!json).then(|| fmt::layer().with_target(true).with_line_number(true)))
        .init();
}

async fn init_db(config: &Config) -> Result<()> {
    let ledger = taodiv_api::server::connect_ledger(config).await?;
    let stats = ledger.stats().await?;
    info!("Ledger ready at {} ({} actions)", config.database.url, stats.total);
    ledger.close().await;
    Ok(())
}

async fn print_ledger(config: &Config, limit: u32) -> Result<()> {
    let ledger = taodiv_api::server::connect_ledger(config).await?;
    let actions = ledger.recent(limit).await?;
    println!("{}", serde_json::to_string_pretty(&actions)?);
    ledger.close().await;
    Ok(())
}
