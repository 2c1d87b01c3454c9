//! Bridges identity-provider sign-in to the custom token service.
//!
//! On every transition to an authenticated state the bridge fetches an access
//! token, reads the username and application id from it, trades them for a
//! custom token, and stores that token's claims.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::claims::SharedClaimsStore;
use crate::error::Result;
use crate::exchange::TokenExchange;
use crate::jwt::DecodedToken;
use crate::provider::{
    AccessTokenProvider, AuthStateListener, AuthStateNotifier, AuthenticationState,
};

/// Claim carrying the username in the identity provider's access token.
pub const USERNAME_CLAIM: &str = "unique_name";

/// Claim carrying the application id in the identity provider's access token.
pub const APP_ID_CLAIM: &str = "appid";

/// How a single state change was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The state was not authenticated; nothing was requested.
    NotAuthenticated,
    /// The provider had no access token to give.
    NoAccessToken,
    /// The access token could not be decoded.
    UndecodableAccessToken,
    /// A required claim was absent from the access token.
    MissingClaim(&'static str),
    /// The exchange endpoint succeeded without returning a token.
    NoCustomToken,
    /// The custom token could not be decoded.
    UndecodableCustomToken,
    /// Claims of the custom token were stored.
    Stored { claim_count: usize },
    /// The provider or exchange endpoint failed. Only recorded by the listener.
    Failed(String),
}

impl ExchangeOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, ExchangeOutcome::Stored { .. })
    }
}

/// Listener that performs the token exchange on sign-in.
pub struct AuthBridge {
    token_provider: Arc<dyn AccessTokenProvider>,
    exchange: Arc<dyn TokenExchange>,
    claims: SharedClaimsStore,
    last_outcome: Mutex<Option<ExchangeOutcome>>,
}

impl std::fmt::Debug for AuthBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthBridge")
            .field("claims", &self.claims)
            .finish_non_exhaustive()
    }
}

impl AuthBridge {
    pub fn new(
        token_provider: Arc<dyn AccessTokenProvider>,
        exchange: Arc<dyn TokenExchange>,
        claims: SharedClaimsStore,
    ) -> Self {
        Self {
            token_provider,
            exchange,
            claims,
            last_outcome: Mutex::new(None),
        }
    }

    /// Create a bridge and subscribe it to the notifier.
    pub fn attach(
        notifier: &AuthStateNotifier,
        token_provider: Arc<dyn AccessTokenProvider>,
        exchange: Arc<dyn TokenExchange>,
        claims: SharedClaimsStore,
    ) -> Arc<Self> {
        let bridge = Arc::new(Self::new(token_provider, exchange, claims));
        notifier.subscribe(bridge.clone());
        tracing::info!("auth bridge initialized");
        bridge
    }

    pub fn claims(&self) -> &SharedClaimsStore {
        &self.claims
    }

    /// Outcome of the most recent notification handled as a listener.
    pub fn last_outcome(&self) -> Option<ExchangeOutcome> {
        self.last_outcome.lock().clone()
    }

    /// Run the exchange flow for one state change.
    ///
    /// The claims store is written only when the whole flow succeeds.
    /// Exchange endpoint errors are returned unchanged.
    pub async fn handle_state_change(
        &self,
        state: &AuthenticationState,
    ) -> Result<ExchangeOutcome> {
        if !state.is_authenticated() {
            return Ok(ExchangeOutcome::NotAuthenticated);
        }
        tracing::info!("user is authenticated, retrieving custom token");

        let result = self.token_provider.request_access_token().await?;
        let Some(access_token) = result.token() else {
            return Ok(ExchangeOutcome::NoAccessToken);
        };
        tracing::debug!(scopes = ?access_token.granted_scopes, "access token acquired");

        let decoded = match DecodedToken::decode(&access_token.value) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!(error = %e, "access token is not a JWT");
                return Ok(ExchangeOutcome::UndecodableAccessToken);
            }
        };

        let Some(username) = decoded.claim(USERNAME_CLAIM) else {
            return Ok(ExchangeOutcome::MissingClaim(USERNAME_CLAIM));
        };
        let Some(app_id) = decoded.claim(APP_ID_CLAIM) else {
            return Ok(ExchangeOutcome::MissingClaim(APP_ID_CLAIM));
        };

        let Some(custom_token) = self.exchange.exchange(username, app_id).await? else {
            return Ok(ExchangeOutcome::NoCustomToken);
        };

        let claims = match DecodedToken::decode(&custom_token) {
            Ok(decoded) => decoded.into_claims(),
            Err(e) => {
                tracing::debug!(error = %e, "custom token is not a JWT");
                return Ok(ExchangeOutcome::UndecodableCustomToken);
            }
        };

        let claim_count = claims.len();
        tracing::debug!(
            claims = %claims.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", "),
            "custom token claims"
        );
        self.claims.set_claims(claims);
        tracing::info!(username = %username, claim_count, "stored custom token claims");

        Ok(ExchangeOutcome::Stored { claim_count })
    }
}

#[async_trait]
impl AuthStateListener for AuthBridge {
    async fn on_state_changed(&self, state: &AuthenticationState) {
        let outcome = match self.handle_state_change(state).await {
            Ok(outcome) => {
                if !matches!(
                    outcome,
                    ExchangeOutcome::Stored { .. } | ExchangeOutcome::NotAuthenticated
                ) {
                    tracing::info!(?outcome, "custom token exchange skipped");
                }
                outcome
            }
            Err(e) => {
                tracing::warn!(error = %e, "custom token exchange failed");
                ExchangeOutcome::Failed(e.to_string())
            }
        };
        *self.last_outcome.lock() = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{Claim, ClaimsStore};
    use crate::error::OAuthError;
    use crate::jwt::encode_unsigned;
    use crate::provider::{AccessToken, StaticAccessTokenProvider};
    use serde_json::json;
    use std::time::Duration;

    /// Exchange double that records its calls and replays a canned reply.
    struct MockExchange {
        calls: Mutex<Vec<(String, String)>>,
        reply: Mutex<Option<Result<Option<String>>>>,
    }

    impl MockExchange {
        fn returning(reply: Result<Option<String>>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply: Mutex::new(Some(reply)),
            })
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl TokenExchange for MockExchange {
        async fn exchange(&self, username: &str, app_id: &str) -> Result<Option<String>> {
            self.calls
                .lock()
                .push((username.to_string(), app_id.to_string()));
            self.reply
                .lock()
                .take()
                .unwrap_or_else(|| Err(OAuthError::Config("no reply left".to_string())))
        }
    }

    fn access_token_for(username: &str, app_id: &str) -> Arc<StaticAccessTokenProvider> {
        let token = encode_unsigned(&json!({ "unique_name": username, "appid": app_id }));
        Arc::new(StaticAccessTokenProvider::new(AccessToken::new(token)))
    }

    fn signed_in() -> AuthenticationState {
        AuthenticationState::authenticated(vec![Claim::new("unique_name", "alice")])
    }

    fn admin_token() -> String {
        encode_unsigned(&json!({ "role": "admin" }))
    }

    #[tokio::test]
    async fn test_exchange_called_with_token_claims() {
        let exchange = MockExchange::returning(Ok(Some(admin_token())));
        let store = Arc::new(ClaimsStore::new());
        let bridge = AuthBridge::new(access_token_for("alice", "app-1"), exchange.clone(), store);

        bridge.handle_state_change(&signed_in()).await.unwrap();

        assert_eq!(
            exchange.calls(),
            vec![("alice".to_string(), "app-1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_custom_claims_are_stored() {
        let exchange = MockExchange::returning(Ok(Some(admin_token())));
        let store = Arc::new(ClaimsStore::new());
        let bridge = AuthBridge::new(access_token_for("alice", "app-1"), exchange, store.clone());

        let outcome = bridge.handle_state_change(&signed_in()).await.unwrap();

        assert!(outcome.is_stored());
        assert_eq!(outcome, ExchangeOutcome::Stored { claim_count: 1 });
        assert_eq!(store.claims(), vec![Claim::new("role", "admin")]);
    }

    #[tokio::test]
    async fn test_http_error_leaves_store_unchanged() {
        let exchange = MockExchange::returning(Err(OAuthError::Status {
            status: 500,
            body: "boom".to_string(),
        }));
        let store = Arc::new(ClaimsStore::new());
        store.set_claims(vec![Claim::new("role", "reader")]);
        let bridge = AuthBridge::new(access_token_for("alice", "app-1"), exchange, store.clone());

        let err = bridge.handle_state_change(&signed_in()).await.unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(store.claims(), vec![Claim::new("role", "reader")]);
    }

    #[tokio::test]
    async fn test_not_authenticated_skips_exchange() {
        let exchange = MockExchange::returning(Ok(Some(admin_token())));
        let store = Arc::new(ClaimsStore::new());
        let bridge = AuthBridge::new(
            access_token_for("alice", "app-1"),
            exchange.clone(),
            store.clone(),
        );

        let outcome = bridge
            .handle_state_change(&AuthenticationState::anonymous())
            .await
            .unwrap();

        assert_eq!(outcome, ExchangeOutcome::NotAuthenticated);
        assert!(exchange.calls().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_no_access_token_stops_silently() {
        let exchange = MockExchange::returning(Ok(Some(admin_token())));
        let store = Arc::new(ClaimsStore::new());
        let bridge = AuthBridge::new(
            Arc::new(StaticAccessTokenProvider::empty()),
            exchange.clone(),
            store.clone(),
        );

        let outcome = bridge.handle_state_change(&signed_in()).await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::NoAccessToken);
        assert!(exchange.calls().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_access_token() {
        let exchange = MockExchange::returning(Ok(Some(admin_token())));
        let store = Arc::new(ClaimsStore::new());
        let provider = Arc::new(StaticAccessTokenProvider::new(AccessToken::new("opaque")));
        let bridge = AuthBridge::new(provider, exchange.clone(), store.clone());

        let outcome = bridge.handle_state_change(&signed_in()).await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::UndecodableAccessToken);
        assert!(exchange.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_claims_stop_silently() {
        let exchange = MockExchange::returning(Ok(Some(admin_token())));
        let store = Arc::new(ClaimsStore::new());
        let token = encode_unsigned(&json!({ "unique_name": "alice" }));
        let provider = Arc::new(StaticAccessTokenProvider::new(AccessToken::new(token)));
        let bridge = AuthBridge::new(provider, exchange.clone(), store.clone());

        let outcome = bridge.handle_state_change(&signed_in()).await.unwrap();
        assert_eq!(outcome, ExchangeOutcome::MissingClaim(APP_ID_CLAIM));

        let token = encode_unsigned(&json!({ "appid": "app-1" }));
        let provider = Arc::new(StaticAccessTokenProvider::new(AccessToken::new(token)));
        let bridge = AuthBridge::new(provider, exchange.clone(), store.clone());

        let outcome = bridge.handle_state_change(&signed_in()).await.unwrap();
        assert_eq!(outcome, ExchangeOutcome::MissingClaim(USERNAME_CLAIM));

        assert!(exchange.calls().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_missing_or_bad_custom_token() {
        let store = Arc::new(ClaimsStore::new());

        let exchange = MockExchange::returning(Ok(None));
        let bridge = AuthBridge::new(access_token_for("alice", "app-1"), exchange, store.clone());
        let outcome = bridge.handle_state_change(&signed_in()).await.unwrap();
        assert_eq!(outcome, ExchangeOutcome::NoCustomToken);

        let exchange = MockExchange::returning(Ok(Some("garbage".to_string())));
        let bridge = AuthBridge::new(access_token_for("alice", "app-1"), exchange, store.clone());
        let outcome = bridge.handle_state_change(&signed_in()).await.unwrap();
        assert_eq!(outcome, ExchangeOutcome::UndecodableCustomToken);

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_attach_subscribes_and_runs_on_notify() {
        let notifier = AuthStateNotifier::new();
        let exchange = MockExchange::returning(Ok(Some(admin_token())));
        let store = Arc::new(ClaimsStore::new());

        let bridge = AuthBridge::attach(
            &notifier,
            access_token_for("alice", "app-1"),
            exchange.clone(),
            store.clone(),
        );
        assert_eq!(notifier.listener_count(), 1);

        notifier.notify(&signed_in()).await;

        assert_eq!(exchange.calls().len(), 1);
        assert_eq!(bridge.claims().claim_value("role").as_deref(), Some("admin"));
        assert_eq!(
            bridge.last_outcome(),
            Some(ExchangeOutcome::Stored { claim_count: 1 })
        );
    }

    #[tokio::test]
    async fn test_listener_swallows_errors() {
        let notifier = AuthStateNotifier::new();
        let exchange = MockExchange::returning(Err(OAuthError::Status {
            status: 401,
            body: String::new(),
        }));
        let store = Arc::new(ClaimsStore::new());
        let bridge = AuthBridge::attach(
            &notifier,
            access_token_for("alice", "app-1"),
            exchange.clone(),
            store.clone(),
        );

        notifier.notify_detached(signed_in()).await.unwrap();

        assert_eq!(exchange.calls().len(), 1);
        assert!(store.is_empty());
        assert!(matches!(
            bridge.last_outcome(),
            Some(ExchangeOutcome::Failed(msg)) if msg.contains("401")
        ));
    }

    /// Exchange double whose n-th call sleeps for the n-th delay before replying.
    struct DelayedExchange {
        calls: Mutex<usize>,
        replies: Vec<(Duration, String)>,
    }

    #[async_trait]
    impl TokenExchange for DelayedExchange {
        async fn exchange(&self, _username: &str, _app_id: &str) -> Result<Option<String>> {
            let index = {
                let mut calls = self.calls.lock();
                *calls += 1;
                *calls - 1
            };
            let (delay, token) = self.replies[index].clone();
            tokio::time::sleep(delay).await;
            Ok(Some(token))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_exchanges_last_writer_wins() {
        let notifier = AuthStateNotifier::new();
        let exchange = Arc::new(DelayedExchange {
            calls: Mutex::new(0),
            replies: vec![
                (
                    Duration::from_millis(200),
                    encode_unsigned(&json!({ "role": "slow" })),
                ),
                (Duration::ZERO, encode_unsigned(&json!({ "role": "fast" }))),
            ],
        });
        let store = Arc::new(ClaimsStore::new());
        AuthBridge::attach(
            &notifier,
            access_token_for("alice", "app-1"),
            exchange.clone(),
            store.clone(),
        );

        let first = notifier.notify_detached(signed_in());
        let second = notifier.notify_detached(signed_in());
        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(*exchange.calls.lock(), 2);
        // The delayed first reply finishes last and overwrites the second.
        assert_eq!(store.claims(), vec![Claim::new("role", "slow")]);
    }
}
