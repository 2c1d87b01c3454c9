//! Login command - run the sign-in exchange for an access token.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use tokenrelay_oauth::claims::create_claims_store;
use tokenrelay_oauth::{
    AccessToken, AuthBridge, AuthStateNotifier, AuthenticationState, DecodedToken,
    ExchangeOutcome, StaticAccessTokenProvider,
};

use super::{Context, print_claims};

/// Arguments for the login command.
#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Access token issued by the identity provider
    #[arg(long, env = "TOKENRELAY_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,
}

/// Run the login command.
pub async fn run(args: LoginArgs, ctx: &Context) -> Result<()> {
    let decoded = DecodedToken::decode(&args.access_token).ok();

    let mut access_token =
        AccessToken::new(args.access_token).with_scopes(ctx.identity.default_scopes.clone());
    if let Some(expires_at) = decoded.as_ref().and_then(DecodedToken::expires_at) {
        access_token = access_token.with_expiry(expires_at);
    }

    // The signed-in principal carries whatever the access token says about the user.
    let state = AuthenticationState::authenticated(
        decoded.map(DecodedToken::into_claims).unwrap_or_default(),
    );

    let notifier = AuthStateNotifier::new();
    let store = create_claims_store();
    let bridge = AuthBridge::attach(
        &notifier,
        Arc::new(StaticAccessTokenProvider::new(access_token)),
        Arc::new(ctx.exchange_client()?),
        store.clone(),
    );

    if ctx.verbose && let Some(name) = state.user.name() {
        println!("Signed in as {}", name);
    }

    notifier.notify(&state).await;

    match bridge.last_outcome() {
        Some(ExchangeOutcome::Stored { .. }) => print_claims(&store.claims(), ctx.json_output),
        Some(ExchangeOutcome::Failed(error)) => {
            Err(anyhow::anyhow!("Token exchange failed: {}", error))
        }
        Some(ExchangeOutcome::NoAccessToken) => {
            Err(anyhow::anyhow!("Access token has expired"))
        }
        Some(ExchangeOutcome::UndecodableAccessToken) => {
            Err(anyhow::anyhow!("Access token is not a decodable JWT"))
        }
        Some(ExchangeOutcome::MissingClaim(claim)) => Err(anyhow::anyhow!(
            "Access token has no '{}' claim",
            claim
        )),
        Some(ExchangeOutcome::NoCustomToken) => {
            Err(anyhow::anyhow!("Token service returned no token"))
        }
        Some(ExchangeOutcome::UndecodableCustomToken) => Err(anyhow::anyhow!(
            "Token service returned an undecodable token"
        )),
        other => Err(anyhow::anyhow!("Sign-in did not complete: {:?}", other)),
    }
}
