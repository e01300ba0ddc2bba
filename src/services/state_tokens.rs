// src/services/state_tokens.rs
//! Single-use CSRF state tokens for redirect-based login flows.
//!
//! Tokens are valid for ten minutes and consumed on first validation
//! attempt, successful or not. The store is an injected trait so tests
//! can manipulate timestamps and a shared store can replace the in-memory
//! map in multi-instance deployments.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::common::secrets::generate_state_token;

/// State token validity window
const STATE_TOKEN_TTL_MINUTES: i64 = 10;
/// How often the background sweep runs
const CLEANUP_INTERVAL_SECS: u64 = 5 * 60;

/// Storage abstraction for pending state tokens
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn insert(&self, token: String, issued_at: DateTime<Utc>);
    /// Remove and return the token's issue time. Removal is atomic with
    /// respect to concurrent callers: exactly one gets `Some`.
    async fn remove(&self, token: &str) -> Option<DateTime<Utc>>;
    /// Drop all entries older than `ttl`, returning how many were removed
    async fn purge_expired(&self, ttl: Duration) -> usize;
}

/// In-process state store backed by a single reader/writer lock
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn insert(&self, token: String, issued_at: DateTime<Utc>) {
        self.states.write().await.insert(token, issued_at);
    }

    async fn remove(&self, token: &str) -> Option<DateTime<Utc>> {
        // Existence check and delete happen under one write lock, so
        // concurrent validators of the same token cannot both win
        self.states.write().await.remove(token)
    }

    async fn purge_expired(&self, ttl: Duration) -> usize {
        let cutoff = Utc::now() - ttl;
        let mut states = self.states.write().await;
        let before = states.len();
        states.retain(|_, issued_at| *issued_at > cutoff);
        before - states.len()
    }
}

/// Issues and single-use-validates opaque state tokens
pub struct StateTokenService {
    store: Arc<dyn StateStore>,
    ttl: Duration,
}

impl StateTokenService {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            ttl: Duration::minutes(STATE_TOKEN_TTL_MINUTES),
        }
    }

    /// Create a fresh random state token and record its issue time
    pub async fn generate(&self) -> String {
        let token = generate_state_token();
        self.store.insert(token.clone(), Utc::now()).await;
        debug!("Generated login state token");
        token
    }

    /// Validate a state token. The token is consumed regardless of
    /// outcome: a second validation of the same value always fails.
    pub async fn validate(&self, token: &str) -> bool {
        let Some(issued_at) = self.store.remove(token).await else {
            warn!("State token validation failed: unknown token");
            return false;
        };

        if Utc::now() - issued_at > self.ttl {
            warn!("State token validation failed: token expired");
            return false;
        }

        debug!("State token validated and consumed");
        true
    }

    /// Start the background task that reclaims abandoned state tokens.
    /// Validation re-checks expiry inline, so this is purely space
    /// reclamation and never affects correctness.
    pub fn start_cleanup_task(service: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                let purged = service.store.purge_expired(service.ttl).await;
                if purged > 0 {
                    info!(purged, "Purged expired login state tokens");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn valid_token_validates_exactly_once() {
        let service = StateTokenService::new(Arc::new(InMemoryStateStore::new()));
        let token = service.generate().await;

        assert!(service.validate(&token).await);
        // Single use: the first validation consumed it
        assert!(!service.validate(&token).await);
    }

    #[tokio::test]
    async fn unknown_token_fails() {
        let service = StateTokenService::new(Arc::new(InMemoryStateStore::new()));
        assert!(!service.validate("deadbeef").await);
    }

    #[tokio::test]
    async fn expired_token_fails_and_is_consumed() {
        let store = Arc::new(InMemoryStateStore::new());
        let service = StateTokenService::new(store.clone());

        store
            .insert("stale".to_string(), Utc::now() - Duration::minutes(11))
            .await;

        assert!(!service.validate("stale").await);
        // Consumed by the failed validation
        assert!(store.remove("stale").await.is_none());
    }

    #[tokio::test]
    async fn purge_removes_only_expired_entries() {
        let store = Arc::new(InMemoryStateStore::new());
        let service = StateTokenService::new(store.clone());

        store
            .insert("old".to_string(), Utc::now() - Duration::minutes(30))
            .await;
        let fresh = service.generate().await;

        let purged = store.purge_expired(Duration::minutes(10)).await;
        assert_eq!(purged, 1);
        assert!(service.validate(&fresh).await);
    }

    #[tokio::test]
    async fn concurrent_validators_race_to_a_single_winner() {
        let service = Arc::new(StateTokenService::new(Arc::new(InMemoryStateStore::new())));
        let token = service.generate().await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            let token = token.clone();
            handles.push(tokio::spawn(
                async move { service.validate(&token).await },
            ));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
