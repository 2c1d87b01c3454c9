//! Identity-provider contract: authentication state, access tokens, and
//! state-change notifications.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::claims::Claim;
use crate::error::Result;

// ============================================================================
// Authentication state
// ============================================================================

/// The user as seen by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    authenticated: bool,
    claims: Vec<Claim>,
}

impl Principal {
    /// Unauthenticated principal with no claims.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Authenticated principal carrying the given claims.
    pub fn authenticated(claims: Vec<Claim>) -> Self {
        Self {
            authenticated: true,
            claims,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Value of the first claim with the given type.
    pub fn claim(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    /// Display name, taken from the usual name-bearing claims.
    pub fn name(&self) -> Option<&str> {
        ["unique_name", "name", "preferred_username"]
            .iter()
            .find_map(|t| self.claim(t))
    }
}

/// Snapshot delivered with every state-change notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationState {
    pub user: Principal,
}

impl AuthenticationState {
    pub fn anonymous() -> Self {
        Self {
            user: Principal::anonymous(),
        }
    }

    pub fn authenticated(claims: Vec<Claim>) -> Self {
        Self {
            user: Principal::authenticated(claims),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_authenticated()
    }
}

// ============================================================================
// Access tokens
// ============================================================================

/// Access token issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub granted_scopes: Vec<String>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
            granted_scopes: Vec::new(),
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.granted_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the token is past its expiry. Tokens without expiry never expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// Outcome of an access-token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTokenResult {
    /// A token is available.
    Success(AccessToken),
    /// No token without user interaction (e.g. an interactive sign-in).
    RequiresRedirect { redirect_url: Option<String> },
}

impl AccessTokenResult {
    /// The token, if the request produced one.
    pub fn token(&self) -> Option<&AccessToken> {
        match self {
            AccessTokenResult::Success(token) => Some(token),
            AccessTokenResult::RequiresRedirect { .. } => None,
        }
    }
}

/// Source of identity-provider access tokens.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn request_access_token(&self) -> Result<AccessTokenResult>;
}

/// Provider that hands out a fixed token, or none at all.
///
/// Once the token has expired the provider answers like one that needs
/// interactive sign-in.
#[derive(Debug, Clone, Default)]
pub struct StaticAccessTokenProvider {
    token: Option<AccessToken>,
}

impl StaticAccessTokenProvider {
    pub fn new(token: AccessToken) -> Self {
        Self { token: Some(token) }
    }

    /// Provider that never has a token.
    pub fn empty() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl AccessTokenProvider for StaticAccessTokenProvider {
    async fn request_access_token(&self) -> Result<AccessTokenResult> {
        Ok(match &self.token {
            Some(token) if !token.is_expired() => AccessTokenResult::Success(token.clone()),
            Some(_) => {
                tracing::debug!("static access token has expired");
                AccessTokenResult::RequiresRedirect { redirect_url: None }
            }
            None => AccessTokenResult::RequiresRedirect { redirect_url: None },
        })
    }
}

// ============================================================================
// State-change notifications
// ============================================================================

/// Receiver of authentication-state changes.
#[async_trait]
pub trait AuthStateListener: Send + Sync {
    async fn on_state_changed(&self, state: &AuthenticationState);
}

/// Event source that fans state changes out to subscribed listeners.
#[derive(Default, Clone)]
pub struct AuthStateNotifier {
    listeners: Arc<RwLock<Vec<Arc<dyn AuthStateListener>>>>,
}

impl std::fmt::Debug for AuthStateNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStateNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl AuthStateNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for all future notifications.
    pub fn subscribe(&self, listener: Arc<dyn AuthStateListener>) {
        self.listeners.write().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver a state change and wait for every listener, in subscription order.
    pub async fn notify(&self, state: &AuthenticationState) {
        let listeners = self.listeners.read().clone();
        tracing::debug!(
            authenticated = state.is_authenticated(),
            listeners = listeners.len(),
            "authentication state changed"
        );
        for listener in listeners {
            listener.on_state_changed(state).await;
        }
    }

    /// Deliver a state change on a background task.
    ///
    /// Overlapping calls are not serialized against each other.
    pub fn notify_detached(&self, state: AuthenticationState) -> JoinHandle<()> {
        let notifier = self.clone();
        tokio::spawn(async move { notifier.notify(&state).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingListener {
        authenticated: AtomicUsize,
        anonymous: AtomicUsize,
    }

    #[async_trait]
    impl AuthStateListener for CountingListener {
        async fn on_state_changed(&self, state: &AuthenticationState) {
            if state.is_authenticated() {
                self.authenticated.fetch_add(1, Ordering::SeqCst);
            } else {
                self.anonymous.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_principal_name_lookup() {
        let user = Principal::authenticated(vec![
            Claim::new("name", "Alice A."),
            Claim::new("unique_name", "alice@contoso.com"),
        ]);
        assert!(user.is_authenticated());
        assert_eq!(user.name(), Some("alice@contoso.com"));

        let user = Principal::authenticated(vec![Claim::new("preferred_username", "bob")]);
        assert_eq!(user.name(), Some("bob"));

        assert_eq!(Principal::anonymous().name(), None);
        assert!(!Principal::anonymous().is_authenticated());
    }

    #[test]
    fn test_access_token_expiry() {
        let token = AccessToken::new("t");
        assert!(!token.is_expired());

        let past = AccessToken::new("t").with_expiry(Utc::now() - chrono::Duration::minutes(1));
        assert!(past.is_expired());

        let future = AccessToken::new("t").with_expiry(Utc::now() + chrono::Duration::hours(1));
        assert!(!future.is_expired());
    }

    #[test]
    fn test_access_token_result_token() {
        let ok = AccessTokenResult::Success(AccessToken::new("abc").with_scopes(["openid"]));
        assert_eq!(ok.token().map(|t| t.value.as_str()), Some("abc"));
        assert_eq!(ok.token().unwrap().granted_scopes, vec!["openid"]);

        let redirect = AccessTokenResult::RequiresRedirect { redirect_url: None };
        assert!(redirect.token().is_none());
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticAccessTokenProvider::new(AccessToken::new("abc"));
        let result = provider.request_access_token().await.unwrap();
        assert_eq!(result.token().unwrap().value, "abc");

        let provider = StaticAccessTokenProvider::empty();
        let result = provider.request_access_token().await.unwrap();
        assert!(result.token().is_none());
    }

    #[tokio::test]
    async fn test_static_provider_withholds_expired_token() {
        let expired = AccessToken::new("abc")
            .with_scopes(["openid", "profile"])
            .with_expiry(Utc::now() - chrono::Duration::seconds(5));
        let provider = StaticAccessTokenProvider::new(expired);

        let result = provider.request_access_token().await.unwrap();
        assert_eq!(result, AccessTokenResult::RequiresRedirect { redirect_url: None });
    }

    #[tokio::test]
    async fn test_notify_reaches_every_listener() {
        let notifier = AuthStateNotifier::new();
        let first = Arc::new(CountingListener::default());
        let second = Arc::new(CountingListener::default());
        notifier.subscribe(first.clone());
        notifier.subscribe(second.clone());
        assert_eq!(notifier.listener_count(), 2);

        notifier
            .notify(&AuthenticationState::authenticated(vec![]))
            .await;
        notifier.notify(&AuthenticationState::anonymous()).await;

        for listener in [&first, &second] {
            assert_eq!(listener.authenticated.load(Ordering::SeqCst), 1);
            assert_eq!(listener.anonymous.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_notify_detached_completes() {
        let notifier = AuthStateNotifier::new();
        let listener = Arc::new(CountingListener::default());
        notifier.subscribe(listener.clone());

        notifier
            .notify_detached(AuthenticationState::authenticated(vec![]))
            .await
            .unwrap();

        assert_eq!(listener.authenticated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_notify_without_listeners() {
        let notifier = AuthStateNotifier::new();
        notifier.notify(&AuthenticationState::anonymous()).await;
        assert_eq!(notifier.listener_count(), 0);
    }
}
