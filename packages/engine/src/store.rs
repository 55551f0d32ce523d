//! Persisted-state access contract.
//!
//! The storage engine choice is out of scope; only the schema and
//! access contract matter. The engine injects a [`UserStore`] so tests
//! (and alternative backends) substitute their own. The processed
//! payment-event ledger lives with the user store because both must be
//! durable together: replaying an applied event after a restart must
//! still be a no-op.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crime_brief_models::{User, UserId};

/// Storage-layer failure.
#[derive(Debug, thiserror::Error)]
#[error("store error: {message}")]
pub struct StoreError {
    /// What failed.
    pub message: String,
}

/// User, address, and subscription records keyed by user identity,
/// plus the processed payment-event ledger.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetches a user by id.
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Inserts or replaces a user record.
    async fn upsert(&self, user: User) -> Result<(), StoreError>;

    /// Deletes a user and everything it owns (addresses and
    /// subscription). Returns whether a record existed.
    async fn delete(&self, id: UserId) -> Result<bool, StoreError>;

    /// All users entitled to reports at `now`, for scheduler fan-out.
    async fn entitled_users(&self, now: DateTime<Utc>) -> Result<Vec<User>, StoreError>;

    /// Finds the user whose subscription carries this provider
    /// correlation reference.
    async fn find_by_correlation_ref(&self, reference: &str)
    -> Result<Option<User>, StoreError>;

    /// Records a payment event id, returning `false` if it was already
    /// recorded. Must be atomic: of two concurrent calls with the same
    /// id, exactly one returns `true`.
    async fn record_event_if_new(&self, event_id: &str) -> Result<bool, StoreError>;
}

/// In-memory [`UserStore`] reference implementation.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: tokio::sync::RwLock<BTreeMap<UserId, User>>,
    processed_events: tokio::sync::Mutex<BTreeSet<String>>,
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn upsert(&self, user: User) -> Result<(), StoreError> {
        self.users.write().await.insert(user.id, user);
        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    async fn entitled_users(&self, now: DateTime<Utc>) -> Result<Vec<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|user| user.subscription.entitled_at(now))
            .cloned()
            .collect())
    }

    async fn find_by_correlation_ref(
        &self,
        reference: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.subscription.external_ref.as_deref() == Some(reference))
            .cloned())
    }

    async fn record_event_if_new(&self, event_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .processed_events
            .lock()
            .await
            .insert(event_id.to_string()))
    }
}
