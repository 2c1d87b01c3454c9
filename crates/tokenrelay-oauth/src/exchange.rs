//! Client for the custom token-issuing endpoint.
//!
//! Trades a username/application pair for an application-specific token:
//! `POST {base}/api/token?username=..&appId=..` with no body, answered by
//! `{"token": "..."}`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use url::Url;

use crate::error::{OAuthError, Result};

/// Default base URL of the token-issuing service.
pub const DEFAULT_EXCHANGE_URL: &str = "https://ownidpfa.azurewebsites.net";

/// Path of the exchange endpoint, relative to the base URL.
pub const TOKEN_PATH: &str = "api/token";

/// Exchanges identity-provider claims for a custom token.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Request a custom token for the user and application.
    ///
    /// Returns `Ok(None)` when the endpoint succeeds but sends no token.
    async fn exchange(&self, username: &str, app_id: &str) -> Result<Option<String>>;
}

/// Body returned by the exchange endpoint.
///
/// The `token` field name is matched case-insensitively; when several
/// spellings are present the first one in the document wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: Option<String>,
}

impl<'de> Deserialize<'de> for TokenResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let fields = serde_json::Map::<String, Value>::deserialize(deserializer)?;
        let token = match fields
            .into_iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("token"))
        {
            None | Some((_, Value::Null)) => None,
            Some((_, Value::String(token))) => Some(token),
            Some((key, other)) => {
                return Err(D::Error::custom(format!(
                    "field `{}` must be a string, got {}",
                    key, other
                )));
            }
        };
        Ok(Self { token })
    }
}

/// HTTP implementation of [`TokenExchange`].
#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    http: reqwest::Client,
    token_url: Url,
    timeout: Option<Duration>,
}

impl TokenExchangeClient {
    /// Create a new client builder.
    pub fn builder() -> ExchangeClientBuilder {
        ExchangeClientBuilder::new()
    }

    /// Client pointed at [`DEFAULT_EXCHANGE_URL`].
    pub fn with_defaults() -> Result<Self> {
        Self::builder().build()
    }

    /// Full URL of the exchange endpoint (without query).
    pub fn token_url(&self) -> &Url {
        &self.inner.token_url
    }

    /// Request a custom token. Any non-success status is returned as
    /// [`OAuthError::Status`]; there is no retry.
    pub async fn get_token(&self, username: &str, app_id: &str) -> Result<Option<String>> {
        tracing::debug!(
            url = %self.inner.token_url,
            username = %username,
            app_id = %app_id,
            "requesting custom token"
        );

        let mut request = self
            .inner
            .http
            .post(self.inner.token_url.clone())
            .query(&[("username", username), ("appId", app_id)]);
        if let Some(timeout) = self.inner.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OAuthError::Network(format!("Token exchange request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "token exchange rejected");
            return Err(OAuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| OAuthError::Network(format!("Failed to read token response: {}", e)))?;
        let parsed: TokenResponse = serde_json::from_slice(&body).map_err(|e| {
            OAuthError::Serialization(format!("Failed to parse token response: {}", e))
        })?;

        Ok(parsed.token)
    }
}

#[async_trait]
impl TokenExchange for TokenExchangeClient {
    async fn exchange(&self, username: &str, app_id: &str) -> Result<Option<String>> {
        self.get_token(username, app_id).await
    }
}

/// Builder for [`TokenExchangeClient`].
#[derive(Debug)]
pub struct ExchangeClientBuilder {
    base_url: String,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ExchangeClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_EXCHANGE_URL.to_string(),
            timeout: None,
            user_agent: None,
        }
    }

    /// Set the base URL of the token service.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set a per-request timeout. Unset means the HTTP stack default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<TokenExchangeClient> {
        let mut base_url = Url::parse(&self.base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let token_url = base_url.join(TOKEN_PATH)?;

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("tokenrelay/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| OAuthError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(TokenExchangeClient {
            inner: Arc::new(ClientInner {
                http,
                token_url,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ExchangeClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
