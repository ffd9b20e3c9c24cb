use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::collections::{Collection, DocumentKey};
use crate::error::StoreError;
use crate::records::PlayerRecord;
use crate::store::DocumentStore;

/// How many keys the recency cache remembers.
pub const RECENCY_CAPACITY: NonZeroUsize = NonZeroUsize::new(1000).unwrap();

/// Persists snapshots and remembers when each key was last written.
///
/// The store never refuses a write for being too soon; callers ask
/// [`SnapshotStore::is_due`] and decide for themselves.
pub struct SnapshotStore<S> {
    store: S,
    recency: Mutex<LruCache<String, DateTime<Utc>>>,
}

impl<S: DocumentStore> SnapshotStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            recency: Mutex::new(LruCache::new(RECENCY_CAPACITY)),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// When this process last wrote the document, if it still remembers.
    pub fn last_update(&self, collection: Collection, key: &DocumentKey) -> Option<DateTime<Utc>> {
        self.recency().peek(&key.cache_key(collection)).copied()
    }

    pub fn is_due(&self, collection: Collection, key: &DocumentKey, interval: Duration) -> bool {
        self.is_due_at(collection, key, interval, Utc::now())
    }

    /// Whether at least `interval` has passed since the last write as of `now`.
    /// Keys that were never written, or were forgotten, are always due.
    pub fn is_due_at(
        &self,
        collection: Collection,
        key: &DocumentKey,
        interval: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(last) = self.last_update(collection, key) else {
            return true;
        };
        let interval = TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(last) >= interval
    }

    /// Upserts a document under the key fields it carries.
    pub async fn save_document(
        &self,
        collection: Collection,
        document: Value,
    ) -> Result<DocumentKey, StoreError> {
        let key = DocumentKey::from_document(collection, &document)?;
        self.store.upsert(collection, &key, document).await?;

        let cache_key = key.cache_key(collection);
        debug!("Saved {}", cache_key);
        self.recency().put(cache_key, Utc::now());
        Ok(key)
    }

    pub async fn save_player(&self, record: &PlayerRecord) -> Result<(), StoreError> {
        let document = serde_json::to_value(record).map_err(StoreError::Serialize)?;
        self.save_document(Collection::Players, document).await?;
        Ok(())
    }

    pub async fn load_player(&self, name: &str) -> Result<Option<PlayerRecord>, StoreError> {
        let found = self
            .store
            .find(Collection::Players, &DocumentKey::player(name))
            .await?;
        found
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::Deserialize)
    }

    pub async fn delete_player(&self, name: &str) -> Result<bool, StoreError> {
        let key = DocumentKey::player(name);
        let deleted = self.store.delete(Collection::Players, &key).await?;
        self.recency().pop(&key.cache_key(Collection::Players));
        Ok(deleted)
    }

    fn recency(&self) -> MutexGuard<'_, LruCache<String, DateTime<Utc>>> {
        self.recency.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
