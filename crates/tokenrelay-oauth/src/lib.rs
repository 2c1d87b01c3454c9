//! Identity token exchange and claims cache.
//!
//! After a user signs in with the identity provider, the access token's
//! username and application id are traded for an application-specific token
//! at a custom token endpoint. The claims of that token are kept in memory
//! for the rest of the application to read.
//!
//! # Components
//!
//! - [`provider`] — Identity-provider contract and state-change notifications
//! - [`bridge`] — Listener that runs the exchange on every sign-in
//! - [`exchange`] — HTTP client for the custom token endpoint
//! - [`jwt`] — Unverified decoding of compact JWTs into claims
//! - [`claims`] — Store for the most recently exchanged claim set

pub mod bridge;
pub mod claims;
pub mod error;
pub mod exchange;
pub mod jwt;
pub mod provider;

pub use bridge::{APP_ID_CLAIM, AuthBridge, ExchangeOutcome, USERNAME_CLAIM};
pub use claims::{Claim, ClaimsStore, SharedClaimsStore};
pub use error::{OAuthError, Result};
pub use exchange::{DEFAULT_EXCHANGE_URL, TokenExchange, TokenExchangeClient};
pub use jwt::DecodedToken;
pub use provider::{
    AccessToken, AccessTokenProvider, AccessTokenResult, AuthStateListener, AuthStateNotifier,
    AuthenticationState, Principal, StaticAccessTokenProvider,
};
