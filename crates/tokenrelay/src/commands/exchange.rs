//! Exchange command - request a custom token for a user and application.

use anyhow::Result;
use clap::Args;

use tokenrelay_oauth::DecodedToken;

use super::{Context, print_claims};

/// Arguments for the exchange command.
#[derive(Args, Debug)]
pub struct ExchangeArgs {
    /// Username sent to the token service
    #[arg(long)]
    pub username: String,

    /// Application id sent to the token service
    #[arg(long)]
    pub app_id: String,

    /// Print the token's claims instead of the raw token
    #[arg(long)]
    pub decode: bool,
}

/// Run the exchange command.
pub async fn run(args: ExchangeArgs, ctx: &Context) -> Result<()> {
    let client = ctx.exchange_client()?;
    tracing::debug!(url = %client.token_url(), "using token service");

    let token = client
        .get_token(&args.username, &args.app_id)
        .await
        .map_err(|e| anyhow::anyhow!("Token exchange failed: {}", e))?
        .ok_or_else(|| anyhow::anyhow!("Token service returned no token"))?;

    if !args.decode {
        if ctx.json_output {
            println!("{}", serde_json::json!({ "token": token }));
        } else {
            println!("{}", token);
        }
        return Ok(());
    }

    let decoded = DecodedToken::decode(&token)
        .map_err(|e| anyhow::anyhow!("Token service returned an undecodable token: {}", e))?;
    print_claims(decoded.claims(), ctx.json_output)
}
