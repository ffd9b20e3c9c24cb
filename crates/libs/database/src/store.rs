use async_trait::async_trait;
use serde_json::Value;

use crate::collections::{Collection, DocumentKey};
use crate::error::StoreError;

/// A keyed document store, one collection per entity kind.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Sets the given fields on the document with this key, creating it if
    /// it doesn't exist. Fields not in `document` keep their stored value.
    async fn upsert(
        &self,
        collection: Collection,
        key: &DocumentKey,
        document: Value,
    ) -> Result<(), StoreError>;

    async fn find(
        &self,
        collection: Collection,
        key: &DocumentKey,
    ) -> Result<Option<Value>, StoreError>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: Collection, key: &DocumentKey) -> Result<bool, StoreError>;
}
