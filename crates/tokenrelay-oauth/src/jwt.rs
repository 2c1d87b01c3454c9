//! Unverified decoding of compact JWTs.
//!
//! Tokens handled here were already validated by the identity provider that
//! issued them. Only the header and payload are read; the signature segment
//! is never checked.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::claims::Claim;
use crate::error::{OAuthError, Result};

/// Header and flattened payload claims of a compact JWT.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    header: Map<String, Value>,
    claims: Vec<Claim>,
}

impl DecodedToken {
    /// Decode a `header.payload.signature` token without verifying it.
    pub fn decode(token: &str) -> Result<Self> {
        let parts: Vec<&str> = token.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(OAuthError::MalformedToken(format!(
                "expected 3 segments, found {}",
                parts.len()
            )));
        }

        let header = decode_object(parts[0], "header")?;
        let payload = decode_object(parts[1], "payload")?;

        Ok(Self {
            header,
            claims: flatten_claims(payload),
        })
    }

    /// Value of the first claim with the given type.
    pub fn claim(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn into_claims(self) -> Vec<Claim> {
        self.claims
    }

    pub fn header(&self) -> &Map<String, Value> {
        &self.header
    }

    /// The `alg` header parameter, if present.
    pub fn algorithm(&self) -> Option<&str> {
        self.header.get("alg").and_then(Value::as_str)
    }

    /// The `exp` claim as a timestamp. Absent or non-numeric values yield `None`.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs = self.claim("exp")?.parse::<i64>().ok()?;
        DateTime::from_timestamp(secs, 0)
    }
}

/// Build an unsecured (`alg: none`) JWT carrying the given payload.
///
/// Useful for wiring local flows and tests against [`DecodedToken::decode`].
pub fn encode_unsigned(payload: &Value) -> String {
    let header = serde_json::json!({ "alg": "none", "typ": "JWT" });
    format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

fn decode_object(segment: &str, what: &str) -> Result<Map<String, Value>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| OAuthError::MalformedToken(format!("{} is not base64url: {}", what, e)))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(OAuthError::MalformedToken(format!(
            "{} is not a JSON object",
            what
        ))),
        Err(e) => Err(OAuthError::MalformedToken(format!(
            "{} is not JSON: {}",
            what, e
        ))),
    }
}

/// One claim per property; arrays fan out into repeated claims of the same type.
fn flatten_claims(payload: Map<String, Value>) -> Vec<Claim> {
    let mut claims = Vec::with_capacity(payload.len());
    for (name, value) in payload {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(v) = claim_text(item) {
                        claims.push(Claim::new(name.clone(), v));
                    }
                }
            }
            other => {
                if let Some(v) = claim_text(other) {
                    claims.push(Claim::new(name, v));
                }
            }
        }
    }
    claims
}

fn claim_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
