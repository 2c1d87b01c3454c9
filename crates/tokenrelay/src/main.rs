//! tokenrelay - exchange identity-provider tokens for application tokens
//!
//! Main entry point for the tokenrelay CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, decode, exchange, login};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// tokenrelay - exchange identity-provider tokens for application tokens
#[derive(Parser)]
#[command(name = "tokenrelay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Token service base URL (overrides config)
    #[arg(long, global = true, env = "TOKENRELAY_EXCHANGE_URL")]
    pub exchange_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with an access token and store the exchanged claims
    Login(login::LoginArgs),

    /// Request a custom token directly
    Exchange(exchange::ExchangeArgs),

    /// Decode a token's claims without verifying it
    Decode(decode::DecodeArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = tokenrelay_config::load_config();
    let logging = loaded.config.logging();

    // Initialize tracing: console (human-readable) + optional rolling JSON file
    let level = if cli.verbose { "debug" } else { logging.level.as_str() };
    let filter = format!(
        "tokenrelay={level},tokenrelay_oauth={level},tokenrelay_config={level},warn"
    );

    use tracing_subscriber::prelude::*;
    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(tracing_subscriber::EnvFilter::new(&filter));

    let log_dir = tokenrelay_config::user_config_dir().map(|d| d.join("logs"));
    let (file_layer, _guard) = match log_dir.filter(|_| logging.file) {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(&dir, "tokenrelay.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "tokenrelay=trace,tokenrelay_oauth=trace,tokenrelay_config=trace,info",
                ));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let exchange_config = loaded.config.exchange();
    let exchange_url = cli
        .exchange_url
        .unwrap_or_else(|| exchange_config.effective_base_url());
    if let Some(warning) = tokenrelay_config::endpoint_warning(&exchange_url) {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        exchange_url,
        exchange: exchange_config,
        identity: loaded.config.identity(),
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Login(args) => login::run(args, &ctx).await,
        Commands::Exchange(args) => exchange::run(args, &ctx).await,
        Commands::Decode(args) => decode::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
