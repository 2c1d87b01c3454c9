//! Decode command - inspect a token's claims.

use anyhow::Result;
use clap::Args;

use tokenrelay_oauth::DecodedToken;

use super::{Context, print_claims};

/// Arguments for the decode command.
#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Compact JWT to decode (the signature is not checked)
    pub token: String,
}

/// Run the decode command.
pub async fn run(args: DecodeArgs, ctx: &Context) -> Result<()> {
    let decoded = DecodedToken::decode(&args.token)
        .map_err(|e| anyhow::anyhow!("Failed to decode token: {}", e))?;

    if !ctx.json_output {
        println!(
            "Algorithm: {}",
            decoded.algorithm().unwrap_or("(none declared)")
        );
        println!("Claims:");
    }
    print_claims(decoded.claims(), ctx.json_output)
}
