use async_trait::async_trait;
use log::{debug, info};
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::options::{ClientOptions, UpdateOptions};
use mongodb::Client;
use serde_json::Value;

use crate::collections::{Collection, DocumentKey};
use crate::error::StoreError;
use crate::store::DocumentStore;

pub const DEFAULT_URI: &str = "mongodb://localhost:27017/alclient";
const DEFAULT_DATABASE: &str = "alclient";

/// An open MongoDB connection. Opening and closing it is up to the
/// application; nothing in here is global.
#[derive(Clone)]
pub struct Database {
    client: Client,
    database: mongodb::Database,
}

impl Database {
    /// Connects and pings the server, so a bad URI fails here and not on the
    /// first write. Uses the database named in the URI, or `alclient`.
    pub async fn connect(uri: &str) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some("merchant_bot".to_string());
        let client = Client::with_options(options)?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));
        database.run_command(doc! { "ping": 1 }, None).await?;

        info!("Connected to MongoDB database '{}'", database.name());
        Ok(Self { client, database })
    }

    /// Closes this connection before opening a new one.
    pub async fn reconnect(self, uri: &str) -> Result<Self, StoreError> {
        self.disconnect().await;
        Self::connect(uri).await
    }

    pub async fn disconnect(self) {
        self.client.shutdown().await;
        info!("Disconnected from MongoDB");
    }

    fn collection(&self, collection: Collection) -> mongodb::Collection<Document> {
        self.database.collection(collection.name())
    }
}

fn filter(key: &DocumentKey) -> Result<Document, StoreError> {
    let mut filter = Document::new();
    for (field, value) in key.fields() {
        filter.insert(field.clone(), bson::to_bson(value)?);
    }
    Ok(filter)
}

fn to_json(mut document: Document) -> Value {
    document.remove("_id");
    Bson::Document(document).into_relaxed_extjson()
}

#[async_trait]
impl DocumentStore for Database {
    async fn upsert(
        &self,
        collection: Collection,
        key: &DocumentKey,
        document: Value,
    ) -> Result<(), StoreError> {
        if !document.is_object() {
            return Err(StoreError::NotAnObject(collection));
        }
        let fields = bson::to_document(&document)?;
        let options = UpdateOptions::builder().upsert(true).build();
        let result = self
            .collection(collection)
            .update_one(filter(key)?, doc! { "$set": fields }, options)
            .await?;
        debug!(
            "Upserted {} (matched {}, created {})",
            key.cache_key(collection),
            result.matched_count,
            result.upserted_id.is_some()
        );
        Ok(())
    }

    async fn find(
        &self,
        collection: Collection,
        key: &DocumentKey,
    ) -> Result<Option<Value>, StoreError> {
        let found = self
            .collection(collection)
            .find_one(filter(key)?, None)
            .await?;
        Ok(found.map(to_json))
    }

    async fn delete(&self, collection: Collection, key: &DocumentKey) -> Result<bool, StoreError> {
        let result = self
            .collection(collection)
            .delete_one(filter(key)?, None)
            .await?;
        Ok(result.deleted_count > 0)
    }
}
