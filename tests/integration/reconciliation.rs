//! Integration tests for bulk save reconciliation
//!
//! These tests verify that:
//! - Unknown players are inserted with their password only
//! - Known players are replaced with the full record
//! - Empty queues are never submitted
//! - Saving an unchanged snapshot twice leaves the store unchanged

use std::collections::HashMap;

use player_store::{PlayerRecord, StoredRecord};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use crate::helpers::{authenticated_record, connected_memory_storage, snapshot_of};

fn stored_json(data: &str) -> Value {
    serde_json::from_str(data).unwrap()
}

#[tokio::test]
async fn test_new_then_known_player() {
    let storage = connected_memory_storage().await;

    let mut snapshot = HashMap::new();
    snapshot.insert("p1".to_string(), PlayerRecord::with_password("h1"));
    assert!(storage.save_all(&snapshot).await);

    assert_eq!(
        stored_json(&storage.get_user_data("p1").await),
        json!({"UUID": "p1", "password": "h1"})
    );

    snapshot.insert("p1".to_string(), authenticated_record("h1", "1.2.3.4", 1_700_000_000_000));
    assert!(storage.save_all(&snapshot).await);

    assert_eq!(
        stored_json(&storage.get_user_data("p1").await),
        json!({
            "UUID": "p1",
            "password": "h1",
            "is_authenticated": true,
            "last_ip": "1.2.3.4",
            "valid_until": 1_700_000_000_000_i64,
            "last_kicked": 0,
        })
    );

    let stats = storage.store().stats();
    assert_eq!(stats.insert_batches, 1);
    assert_eq!(stats.replace_batches, 1);
}

#[tokio::test]
async fn test_mixed_snapshot_partitions_exactly() {
    let storage = connected_memory_storage().await;
    assert!(storage.save_all(&snapshot_of(3)).await);

    // 3 known + 2 unknown
    let snapshot = snapshot_of(5);
    let report = storage.try_save_all(&snapshot).await.unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(report.replaced, 3);
    assert!(report.is_complete());
    assert_eq!(storage.get_all_data().await.len(), 5);
}

#[tokio::test]
async fn test_no_empty_batches() {
    let storage = connected_memory_storage().await;

    assert!(storage.save_all(&HashMap::new()).await);
    assert_eq!(storage.store().stats().insert_batches, 0);
    assert_eq!(storage.store().stats().replace_batches, 0);

    // Only known players: no insert batch
    assert!(storage.save_all(&snapshot_of(2)).await);
    assert!(storage.save_all(&snapshot_of(2)).await);
    let stats = storage.store().stats();
    assert_eq!(stats.insert_batches, 1);
    assert_eq!(stats.replace_batches, 1);
}

#[tokio::test]
async fn test_repeated_save_is_idempotent() {
    let storage = connected_memory_storage().await;
    let mut snapshot = snapshot_of(4);
    snapshot.insert("p1".to_string(), authenticated_record("h1", "10.0.0.1", 42));

    assert!(storage.save_all(&snapshot).await);
    assert!(storage.save_all(&snapshot).await);
    let first = storage.get_all_data().await;

    assert!(storage.save_all(&snapshot).await);
    assert_eq!(storage.get_all_data().await, first);
}

#[tokio::test]
async fn test_unknown_player_is_absent() {
    let storage = connected_memory_storage().await;
    assert!(storage.save_all(&snapshot_of(1)).await);

    assert!(!storage.is_user_registered("nobody").await);
    assert_eq!(storage.get_user_data("nobody").await, "");
    assert!(!storage.get_all_data().await.contains_key("nobody"));

    storage.delete_user_data("nobody").await;
    assert_eq!(storage.get_all_data().await.len(), 1);
}

#[tokio::test]
async fn test_legacy_records_migrate() {
    let storage = connected_memory_storage().await;
    assert!(storage.register_user("old", r#"{"password":"legacy-hash"}"#).await);
    assert!(storage.save_all(&snapshot_of(1)).await);

    let records = storage.load_records().await;
    assert!(records["old"].is_legacy());
    assert!(!records["player-0"].is_legacy());

    assert_eq!(storage.migrate_legacy().await, 1);
    assert_eq!(storage.migrate_legacy().await, 0);

    let migrated = storage.load_records().await.remove("old").unwrap();
    assert!(!migrated.is_legacy());
    assert_eq!(
        migrated.into_current(),
        PlayerRecord::with_password("legacy-hash")
    );
}

#[tokio::test]
async fn test_stored_current_record_parses() {
    let storage = connected_memory_storage().await;
    let record = authenticated_record("h1", "1.2.3.4", 99);

    let mut snapshot = HashMap::new();
    snapshot.insert("p1".to_string(), record.clone());
    assert!(storage.save_all(&snapshot).await);
    assert!(storage.save_all(&snapshot).await);

    let stored = StoredRecord::parse("p1", &storage.get_user_data("p1").await);
    assert_eq!(stored, StoredRecord::Current(record));
}
