use bot_config::BotConfig;
use character::{CharacterData, SharedState};
use chrono::Utc;
use database::{
    Collection, Database, DocumentKey, DocumentStore, PlayerRecord, SnapshotStore, StoreError,
};
use log::debug;
use std::time::Duration;

/// Snapshots of our own character, written at most once per interval.
pub struct MerchantDatabase<S> {
    snapshots: SnapshotStore<S>,
    owner: String,
    server_region: String,
    server_identifier: String,
    interval: Duration,
}

impl MerchantDatabase<Database> {
    pub async fn connect(
        uri: &str,
        bot_config: &BotConfig,
        interval: Duration,
    ) -> Result<Self, StoreError> {
        let database = Database::connect(uri).await?;
        Ok(Self::new(database, bot_config, interval))
    }

    pub async fn close(self) {
        self.snapshots.into_inner().disconnect().await;
    }
}

impl<S: DocumentStore> MerchantDatabase<S> {
    pub fn new(store: S, bot_config: &BotConfig, interval: Duration) -> Self {
        Self {
            snapshots: SnapshotStore::new(store),
            owner: bot_config.owner.clone(),
            server_region: bot_config.server_region.clone(),
            server_identifier: bot_config.server_identifier.clone(),
            interval,
        }
    }

    /// Saves the character if it is ready and its last snapshot is old
    /// enough. Returns whether anything was written.
    pub async fn persist(&self, state: &SharedState) -> Result<bool, StoreError> {
        let record = {
            let state = state.read();
            if !state.ready {
                return Ok(false);
            }
            self.record(&state.character)
        };

        let key = DocumentKey::player(&record.name);
        if !self.snapshots.is_due(Collection::Players, &key, self.interval) {
            debug!("Snapshot of {} is not due yet", record.name);
            return Ok(false);
        }
        self.snapshots.save_player(&record).await?;
        Ok(true)
    }

    /// Saves the last known character on shutdown, even when the bridge is
    /// already gone or the interval isn't up. Nothing is written if the
    /// character never started.
    pub async fn persist_final(&self, state: &SharedState) -> Result<bool, StoreError> {
        let record = {
            let state = state.read();
            if !state.started {
                return Ok(false);
            }
            self.record(&state.character)
        };
        self.snapshots.save_player(&record).await?;
        Ok(true)
    }

    fn record(&self, character: &CharacterData) -> PlayerRecord {
        let mut record = PlayerRecord::from_character(
            character,
            &self.server_region,
            &self.server_identifier,
            Utc::now(),
        );
        if record.owner.is_empty() {
            record.owner = self.owner.clone();
        }
        record
    }

    #[cfg(test)]
    fn snapshots(&self) -> &SnapshotStore<S> {
        &self.snapshots
    }
}
