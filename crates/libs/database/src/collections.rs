use serde_json::{Map, Value};
use std::fmt;

use crate::error::StoreError;

/// One collection per kind of entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Players,
    Entities,
    Banks,
    Deaths,
    Npcs,
    Respawns,
    Achievements,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Players,
        Collection::Entities,
        Collection::Banks,
        Collection::Deaths,
        Collection::Npcs,
        Collection::Respawns,
        Collection::Achievements,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Players => "players",
            Collection::Entities => "entities",
            Collection::Banks => "banks",
            Collection::Deaths => "deaths",
            Collection::Npcs => "npcs",
            Collection::Respawns => "respawns",
            Collection::Achievements => "achievements",
        }
    }

    pub fn from_name(name: &str) -> Option<Collection> {
        Self::ALL
            .into_iter()
            .find(|collection| collection.name() == name)
    }

    /// The fields that identify a document. Every document must carry all of them.
    pub fn key_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Players => &["name"],
            Collection::Entities => &["type", "serverRegion", "serverIdentifier"],
            Collection::Banks => &["owner"],
            Collection::Deaths => &["name", "time"],
            Collection::Npcs => &["name", "serverRegion", "serverIdentifier"],
            Collection::Respawns => &["type", "serverRegion", "serverIdentifier"],
            Collection::Achievements => &["name", "date"],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The natural key of a document, as ordered `(field, value)` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentKey {
    fields: Vec<(String, Value)>,
}

impl DocumentKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.push((field.to_string(), value.into()));
        self
    }

    pub fn player(name: &str) -> Self {
        Self::new().with("name", name)
    }

    /// Pulls the key fields of `collection` out of a document.
    pub fn from_document(collection: Collection, document: &Value) -> Result<Self, StoreError> {
        let object = document
            .as_object()
            .ok_or(StoreError::NotAnObject(collection))?;
        let mut key = Self::new();
        for &field in collection.key_fields() {
            let value = object
                .get(field)
                .filter(|value| !value.is_null())
                .ok_or(StoreError::MissingKey { collection, field })?;
            key = key.with(field, value.clone());
        }
        Ok(key)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.fields
            .iter()
            .all(|(field, value)| document.get(field) == Some(value))
    }

    pub fn to_filter(&self) -> Map<String, Value> {
        self.fields.iter().cloned().collect()
    }

    /// A flat string identifying the document across collections, e.g.
    /// `players:name=Seller`.
    pub fn cache_key(&self, collection: Collection) -> String {
        let fields = self
            .fields
            .iter()
            .map(|(field, value)| match value {
                Value::String(text) => format!("{}={}", field, text),
                other => format!("{}={}", field, other),
            })
            .collect::<Vec<_>>()
            .join(",");
        format!("{}:{}", collection, fields)
    }
}
