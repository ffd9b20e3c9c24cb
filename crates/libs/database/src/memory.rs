use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::collections::{Collection, DocumentKey};
use crate::error::StoreError;
use crate::store::DocumentStore;

/// A [`DocumentStore`] that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.lock().get(&collection).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Collection, Vec<Value>>> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert(
        &self,
        collection: Collection,
        key: &DocumentKey,
        document: Value,
    ) -> Result<(), StoreError> {
        let Value::Object(fields) = document else {
            return Err(StoreError::NotAnObject(collection));
        };

        let mut collections = self.lock();
        let documents = collections.entry(collection).or_default();
        match documents.iter_mut().find(|stored| key.matches(stored)) {
            Some(Value::Object(stored)) => stored.extend(fields),
            Some(stored) => *stored = Value::Object(fields),
            None => {
                let mut created = key.to_filter();
                created.extend(fields);
                documents.push(Value::Object(created));
            }
        }
        Ok(())
    }

    async fn find(
        &self,
        collection: Collection,
        key: &DocumentKey,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self
            .lock()
            .get(&collection)
            .and_then(|documents| documents.iter().find(|stored| key.matches(stored)))
            .cloned())
    }

    async fn delete(&self, collection: Collection, key: &DocumentKey) -> Result<bool, StoreError> {
        let mut collections = self.lock();
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(false);
        };
        let before = documents.len();
        documents.retain(|stored| !key.matches(stored));
        Ok(documents.len() != before)
    }
}
