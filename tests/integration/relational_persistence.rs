//! Integration tests for the relational backend (SQLite)
//!
//! These tests verify that:
//! - Records survive close/reconnect and a fresh backend instance
//! - Bulk saves upsert in place
//! - Legacy single-record writes coexist with bulk saves

use std::collections::HashMap;

use player_store::config::{RelationalConfig, StorageConfig};
use player_store::storage;
use player_store::{PlayerRecord, StoredRecord};
use pretty_assertions::assert_eq;

use crate::helpers::sqlite::connected_sqlite_storage;
use crate::helpers::{authenticated_record, snapshot_of};

#[tokio::test]
async fn test_save_then_reload_from_new_instance() {
    let (dir, storage) = connected_sqlite_storage().await;
    let mut snapshot = snapshot_of(3);
    snapshot.insert("p1".to_string(), authenticated_record("h1", "1.2.3.4", 77));
    assert!(storage.save_all(&snapshot).await);
    storage.close().await;

    let config = RelationalConfig::sqlite(dir.path().join("players.db"), "easyauth");
    let reopened = storage::from_config(&StorageConfig::Relational(config)).unwrap();
    reopened.connect().await.unwrap();

    let records = reopened.load_records().await;
    assert_eq!(records.len(), 4);
    assert_eq!(
        records["p1"],
        StoredRecord::Current(authenticated_record("h1", "1.2.3.4", 77))
    );
}

#[tokio::test]
async fn test_bulk_save_updates_in_place() {
    let (_dir, storage) = connected_sqlite_storage().await;

    let mut snapshot = HashMap::new();
    snapshot.insert("p1".to_string(), PlayerRecord::with_password("h1"));
    assert!(storage.save_all(&snapshot).await);

    snapshot.insert("p1".to_string(), authenticated_record("h1", "1.2.3.4", 5));
    assert!(storage.save_all(&snapshot).await);

    let all = storage.get_all_data().await;
    assert_eq!(all.len(), 1);
    assert_eq!(
        StoredRecord::parse("p1", &all["p1"]).into_current(),
        authenticated_record("h1", "1.2.3.4", 5)
    );
}

#[tokio::test]
async fn test_reconnect_after_close() {
    let (_dir, storage) = connected_sqlite_storage().await;
    assert!(storage.save_all(&snapshot_of(1)).await);

    storage.close().await;
    assert!(storage.is_closed().await);

    assert!(storage.is_user_registered("player-0").await);
    assert!(!storage.is_closed().await);
}

#[tokio::test]
async fn test_legacy_writes_and_migration() {
    let (_dir, storage) = connected_sqlite_storage().await;

    assert!(storage.register_user("old", r#"{"password":"h-old"}"#).await);
    assert!(!storage.register_user("old", r#"{"password":"other"}"#).await);
    storage.update_user_data("old", r#"{"password":"h-new"}"#).await;
    assert_eq!(storage.get_user_data("old").await, r#"{"password":"h-new"}"#);

    assert_eq!(storage.migrate_legacy().await, 1);
    let migrated = storage.load_records().await.remove("old").unwrap();
    assert_eq!(migrated, StoredRecord::Current(PlayerRecord::with_password("h-new")));
}

#[tokio::test]
async fn test_delete() {
    let (_dir, storage) = connected_sqlite_storage().await;
    assert!(storage.save_all(&snapshot_of(2)).await);

    storage.delete_user_data("player-0").await;
    storage.delete_user_data("unknown").await;

    assert!(!storage.is_user_registered("player-0").await);
    assert_eq!(storage.get_all_data().await.len(), 1);
}
