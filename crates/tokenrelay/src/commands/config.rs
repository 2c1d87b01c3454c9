//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use tokenrelay_config::{PROJECT_CONFIG_FILE, RelayConfig};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved configuration
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Show configuration file path
    Path,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./tokenrelay.toml) instead of user config
        #[arg(long)]
        local: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx).await,
        ConfigCommand::Which => cmd_which().await,
        ConfigCommand::Path => cmd_path().await,
        ConfigCommand::Init { local } => cmd_init(local).await,
    }
}

async fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = tokenrelay_config::load_config();
    let config = &loaded.config;

    if ctx.json_output {
        let identity = config.identity();
        let exchange = config.exchange();
        let logging = config.logging();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "identity": {
                    "default_scopes": identity.default_scopes,
                },
                "exchange": {
                    "base_url": ctx.exchange_url,
                    "timeout_secs": exchange.timeout_secs,
                    "user_agent": exchange.user_agent,
                },
                "logging": {
                    "level": logging.level,
                    "file": logging.file,
                },
            }))?
        );
        return Ok(());
    }

    println!("# tokenrelay Configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    let identity = config.identity();
    println!("Identity:");
    println!("  scopes          {}", identity.default_scopes.join(" "));
    println!();

    let exchange = config.exchange();
    println!("Token service:");
    println!("  base_url        {}", ctx.exchange_url);
    match exchange.timeout_secs {
        Some(secs) => println!("  timeout         {}s", secs),
        None => println!("  timeout         (client default)"),
    }
    println!();

    let logging = config.logging();
    println!("Logging:");
    println!("  level           {}", logging.level);
    println!(
        "  file            {}",
        if logging.file { "enabled" } else { "disabled" }
    );

    for warning in &loaded.warnings {
        println!("\nwarning: {}", warning);
    }

    Ok(())
}

async fn cmd_which() -> Result<()> {
    let loaded = tokenrelay_config::load_config();

    println!("Config file search order (later overrides earlier):\n");

    for layer in &loaded.layers {
        let status = if layer.loaded {
            "✓ loaded"
        } else if layer.path.exists() {
            "✗ skipped"
        } else {
            "· not found"
        };
        println!("  {} {}", status, layer.path.display());
    }

    println!();
    let loaded_count = loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found. Run 'tokenrelay config init' to create one.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }

    Ok(())
}

async fn cmd_path() -> Result<()> {
    if let Some(path) = tokenrelay_config::user_config_path() {
        println!("{}", path.display());
    } else {
        eprintln!("Could not determine config directory");
    }
    Ok(())
}

async fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        PathBuf::from(PROJECT_CONFIG_FILE)
    } else {
        tokenrelay_config::user_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
    };

    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    RelayConfig::with_defaults().save(&path)?;
    println!("Created {}", path.display());
    Ok(())
}
