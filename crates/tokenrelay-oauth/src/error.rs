//! Error types for token exchange and decoding.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors that can occur while exchanging or decoding tokens.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Network/HTTP transport error.
    #[error("Network error: {0}")]
    Network(String),

    /// The exchange endpoint answered with a non-success status.
    #[error("Token endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Token is not a well-formed compact JWT.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Identity provider failed to produce a token.
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl OAuthError {
    /// Check if this error carries an HTTP status from the exchange endpoint.
    pub fn is_status(&self) -> bool {
        matches!(self, OAuthError::Status { .. })
    }

    /// HTTP status code, if the endpoint answered with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            OAuthError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        OAuthError::Network(e.to_string())
    }
}

impl From<url::ParseError> for OAuthError {
    fn from(e: url::ParseError) -> Self {
        OAuthError::Config(format!("Invalid URL: {}", e))
    }
}
