//! CLI command handlers.

pub mod config;
pub mod decode;
pub mod exchange;
pub mod login;

use anyhow::Result;
use tokenrelay_config::{ExchangeConfig, IdentityConfig};
use tokenrelay_oauth::{Claim, TokenExchangeClient};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Base URL of the token service.
    pub exchange_url: String,
    /// Remaining exchange settings from config.
    pub exchange: ExchangeConfig,
    /// Identity provider settings from config.
    pub identity: IdentityConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Build an exchange client from the resolved settings.
    pub fn exchange_client(&self) -> Result<TokenExchangeClient> {
        let mut builder = TokenExchangeClient::builder().base_url(&self.exchange_url);
        if let Some(timeout) = self.exchange.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(agent) = &self.exchange.user_agent {
            builder = builder.user_agent(agent);
        }
        builder
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid token service URL: {}", e))
    }
}

/// Print claims as a table, or as JSON.
pub fn print_claims(claims: &[Claim], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(claims)?);
        return Ok(());
    }

    if claims.is_empty() {
        println!("(no claims)");
        return Ok(());
    }

    let width = claims
        .iter()
        .map(|c| c.claim_type.len())
        .max()
        .unwrap_or(0);
    for claim in claims {
        println!("  {:<width$}  {}", claim.claim_type, claim.value, width = width);
    }
    Ok(())
}
