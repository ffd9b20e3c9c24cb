use std::time::Duration;

use character::CharacterData;
use character::protocol::StatusInfo;
use chrono::{TimeDelta, Utc};
use database::{
    Collection, DocumentKey, DocumentStore, MemoryStore, PlayerRecord, SnapshotStore, StoreError,
};
use serde_json::json;

fn seller() -> PlayerRecord {
    let character = CharacterData {
        id: "Seller".into(),
        owner: "1234".into(),
        ctype: "merchant".into(),
        map: "main".into(),
        instance: "main".into(),
        x: 10.0,
        y: -45.0,
        ..Default::default()
    };
    PlayerRecord::from_character(&character, "EU", "II", Utc::now())
}

#[tokio::test]
async fn player_round_trips_through_the_store() {
    let snapshots = SnapshotStore::new(MemoryStore::new());
    let record = seller();

    snapshots.save_player(&record).await.unwrap();
    assert_eq!(snapshots.load_player("Seller").await.unwrap(), Some(record));
    assert_eq!(snapshots.load_player("Buyer").await.unwrap(), None);
}

#[tokio::test]
async fn saving_again_updates_the_same_document() {
    let snapshots = SnapshotStore::new(MemoryStore::new());
    let mut record = seller();
    snapshots.save_player(&record).await.unwrap();

    record.map = "halloween".into();
    record.rip = true;
    snapshots.save_player(&record).await.unwrap();

    assert_eq!(snapshots.store().len(Collection::Players), 1);
    let stored = snapshots.load_player("Seller").await.unwrap().unwrap();
    assert_eq!(stored.map, "halloween");
    assert!(stored.rip);
}

#[tokio::test]
async fn lost_party_and_expired_conditions_are_cleared() {
    let snapshots = SnapshotStore::new(MemoryStore::new());
    let mut record = seller();
    record.party = Some("Leader".into());
    record.s.insert(
        "mluck".into(),
        StatusInfo {
            f: Some("Seller".into()),
            strong: Some(true),
            ms: Some(3_600_000.0),
        },
    );
    snapshots.save_player(&record).await.unwrap();

    record.party = None;
    record.s.clear();
    snapshots.save_player(&record).await.unwrap();

    let stored = snapshots.load_player("Seller").await.unwrap().unwrap();
    assert_eq!(stored.party, None);
    assert!(stored.s.is_empty());
}

#[tokio::test]
async fn malformed_player_documents_fail_to_load() {
    let snapshots = SnapshotStore::new(MemoryStore::new());
    snapshots
        .store()
        .upsert(
            Collection::Players,
            &DocumentKey::player("Broken"),
            json!({"name": "Broken", "x": "far away"}),
        )
        .await
        .unwrap();

    assert!(matches!(
        snapshots.load_player("Broken").await,
        Err(StoreError::Deserialize(_))
    ));
}

#[tokio::test]
async fn writes_are_tracked_but_never_throttled() {
    let snapshots = SnapshotStore::new(MemoryStore::new());
    let key = DocumentKey::player("Seller");
    let interval = Duration::from_secs(60);

    assert_eq!(snapshots.last_update(Collection::Players, &key), None);
    assert!(snapshots.is_due(Collection::Players, &key, interval));

    snapshots.save_player(&seller()).await.unwrap();
    let saved_at = snapshots.last_update(Collection::Players, &key).unwrap();
    assert!(!snapshots.is_due(Collection::Players, &key, interval));
    assert!(snapshots.is_due_at(
        Collection::Players,
        &key,
        interval,
        saved_at + TimeDelta::seconds(61)
    ));

    // Saving before the interval is up still goes through.
    let mut moved = seller();
    moved.x = 500.0;
    snapshots.save_player(&moved).await.unwrap();
    let stored = snapshots.load_player("Seller").await.unwrap().unwrap();
    assert_eq!(stored.x, 500.0);
}

#[tokio::test]
async fn deleting_a_player_forgets_it() {
    let snapshots = SnapshotStore::new(MemoryStore::new());
    snapshots.save_player(&seller()).await.unwrap();

    assert!(snapshots.delete_player("Seller").await.unwrap());
    assert!(!snapshots.delete_player("Seller").await.unwrap());
    assert_eq!(
        snapshots.last_update(Collection::Players, &DocumentKey::player("Seller")),
        None
    );
}

#[tokio::test]
async fn other_collections_are_keyed_by_their_own_fields() {
    let snapshots = SnapshotStore::new(MemoryStore::new());
    let key = snapshots
        .save_document(
            Collection::Entities,
            json!({"type": "franky", "serverRegion": "US", "serverIdentifier": "I", "hp": 100}),
        )
        .await
        .unwrap();
    snapshots
        .save_document(
            Collection::Entities,
            json!({"type": "franky", "serverRegion": "US", "serverIdentifier": "I", "hp": 40}),
        )
        .await
        .unwrap();

    let stored = snapshots
        .store()
        .find(Collection::Entities, &key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["hp"], 40);
    assert!(
        snapshots
            .save_document(Collection::Entities, json!({"type": "franky"}))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn recency_cache_is_bounded() {
    let snapshots = SnapshotStore::new(MemoryStore::new());
    for index in 0..=database::snapshot::RECENCY_CAPACITY.get() {
        snapshots
            .save_document(Collection::Banks, json!({"owner": index.to_string()}))
            .await
            .unwrap();
    }

    let oldest = DocumentKey::new().with("owner", "0");
    let newest = DocumentKey::new().with("owner", "1000");
    assert_eq!(snapshots.last_update(Collection::Banks, &oldest), None);
    assert!(snapshots.last_update(Collection::Banks, &newest).is_some());
    assert_eq!(snapshots.store().len(Collection::Banks), 1001);
}
