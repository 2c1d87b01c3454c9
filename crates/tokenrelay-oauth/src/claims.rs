//! In-memory store for the claims of the most recently exchanged token.
//!
//! The store is an owned object: create one, wrap it in an `Arc`, and hand it
//! to every consumer that needs to read claims. Writes replace the whole set.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A typed key/value assertion taken from a decoded token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Claim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.claim_type, self.value)
    }
}

/// Holder of the current claim list.
#[derive(Debug, Default)]
pub struct ClaimsStore {
    claims: RwLock<Vec<Claim>>,
}

impl ClaimsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored claims entirely.
    pub fn set_claims(&self, claims: impl IntoIterator<Item = Claim>) {
        let claims: Vec<Claim> = claims.into_iter().collect();
        tracing::debug!(count = claims.len(), "replacing stored claims");
        *self.claims.write() = claims;
    }

    /// Snapshot of the current claims, empty if never set.
    pub fn claims(&self) -> Vec<Claim> {
        self.claims.read().clone()
    }

    /// Value of the first claim with the given type.
    pub fn claim_value(&self, claim_type: &str) -> Option<String> {
        self.claims
            .read()
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.clone())
    }

    /// Every value recorded for the given type, in order.
    pub fn claim_values(&self, claim_type: &str) -> Vec<String> {
        self.claims
            .read()
            .iter()
            .filter(|c| c.claim_type == claim_type)
            .map(|c| c.value.clone())
            .collect()
    }

    /// Drop all stored claims.
    pub fn clear(&self) {
        self.claims.write().clear();
    }

    pub fn len(&self) -> usize {
        self.claims.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.read().is_empty()
    }
}

/// Claims store shared across async contexts.
pub type SharedClaimsStore = Arc<ClaimsStore>;

/// Create an empty shared claims store.
pub fn create_claims_store() -> SharedClaimsStore {
    Arc::new(ClaimsStore::new())
}
