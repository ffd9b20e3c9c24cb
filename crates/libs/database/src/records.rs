use character::CharacterData;
use character::protocol::{ItemData, SlotItem, StatusInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What we remember about a character, keyed by its name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub name: String,
    pub owner: String,
    #[serde(rename = "type")]
    pub ctype: String,
    pub map: String,
    #[serde(rename = "in")]
    pub instance: String,
    pub x: f64,
    pub y: f64,
    // Snapshots are merged into the stored document, so everything that can
    // go away between two snapshots is always written, even when empty.
    #[serde(default)]
    pub items: Vec<Option<ItemData>>,
    #[serde(default)]
    pub slots: HashMap<String, Option<SlotItem>>,
    #[serde(default)]
    pub s: HashMap<String, StatusInfo>,
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub rip: bool,
    pub server_region: String,
    pub server_identifier: String,
    /// Milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aldata: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord: Option<String>,
}

impl PlayerRecord {
    pub fn from_character(
        character: &CharacterData,
        server_region: &str,
        server_identifier: &str,
        seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: character.id.clone(),
            owner: character.owner.clone(),
            ctype: character.ctype.clone(),
            map: character.map.clone(),
            instance: character.instance.clone(),
            x: character.x,
            y: character.y,
            items: character.items.clone(),
            slots: character.slots.clone(),
            s: character.s.clone(),
            party: character.party.clone(),
            rip: character.rip,
            server_region: server_region.to_string(),
            server_identifier: server_identifier.to_string(),
            last_seen: Some(seen_at.timestamp_millis()),
            aldata: None,
            discord: None,
        }
    }

    pub fn last_seen_at(&self) -> Option<DateTime<Utc>> {
        self.last_seen.and_then(DateTime::from_timestamp_millis)
    }
}
