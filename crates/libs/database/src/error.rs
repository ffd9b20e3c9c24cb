use thiserror::Error;

use crate::collections::Collection;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("Could not convert document to BSON: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),
    #[error("Could not serialize record: {0}")]
    Serialize(serde_json::Error),
    #[error("Could not deserialize document: {0}")]
    Deserialize(serde_json::Error),
    #[error("Documents in {0} must be objects")]
    NotAnObject(Collection),
    #[error("Document in {collection} is missing its key field '{field}'")]
    MissingKey {
        collection: Collection,
        field: &'static str,
    },
}
