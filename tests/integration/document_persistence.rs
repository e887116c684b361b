//! Integration tests for the document backend (MongoDB)
//!
//! These tests need a server and run only when `MONGODB_URI` is set; each
//! one works in its own database and drops it afterwards. They verify that:
//! - A password-only insert is later replaced by the full record
//! - N unknown and M known players give N inserts and M replaces
//! - Saving the same snapshot twice leaves the stored data unchanged
//! - Snapshots larger than one command batch are written completely

use std::collections::HashMap;

use player_store::config::StorageConfig;
use player_store::storage::document::DOCUMENT_BATCH_SIZE;
use player_store::storage::{self, PlayerStore};
use player_store::{PlayerRecord, StoredRecord};
use pretty_assertions::assert_eq;

use crate::helpers::mongo::connected_document_storage;
use crate::helpers::{authenticated_record, snapshot_of};

#[tokio::test]
async fn test_insert_then_replace_keeps_every_field() {
    let Some((database, storage)) = connected_document_storage("replace").await else {
        return;
    };

    let mut snapshot = HashMap::new();
    snapshot.insert("p1".to_string(), PlayerRecord::with_password("h1"));
    let first = storage.try_save_all(&snapshot).await.unwrap();
    assert_eq!((first.inserted, first.replaced), (1, 0));

    let stored: serde_json::Value =
        serde_json::from_str(&storage.get_user_data("p1").await).unwrap();
    assert_eq!(stored["password"], "h1");
    assert!(stored.get("is_authenticated").is_none());

    snapshot.insert("p1".to_string(), authenticated_record("h1", "1.2.3.4", 1_700_000_000_000));
    let second = storage.try_save_all(&snapshot).await.unwrap();
    assert_eq!((second.inserted, second.replaced), (0, 1));
    assert!(second.failures.is_empty());

    let records = storage.load_records().await;
    assert_eq!(
        records["p1"],
        StoredRecord::Current(authenticated_record("h1", "1.2.3.4", 1_700_000_000_000))
    );

    storage.close().await;
    database.drop().await;
}

#[tokio::test]
async fn test_partition_counts_match_known_players() {
    let Some((database, storage)) = connected_document_storage("partition").await else {
        return;
    };

    let existing = snapshot_of(3);
    assert!(storage.save_all(&existing).await);

    let mut snapshot = existing.clone();
    snapshot.insert("fresh-1".to_string(), PlayerRecord::with_password("f1"));
    snapshot.insert("fresh-2".to_string(), PlayerRecord::with_password("f2"));

    let report = storage.try_save_all(&snapshot).await.unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.replaced, 3);
    assert!(report.is_complete());
    assert_eq!(storage.get_all_data().await.len(), 5);

    storage.close().await;
    database.drop().await;
}

#[tokio::test]
async fn test_repeated_save_is_idempotent() {
    let Some((database, storage)) = connected_document_storage("idempotent").await else {
        return;
    };

    let mut snapshot = snapshot_of(4);
    snapshot.insert("p1".to_string(), authenticated_record("h1", "10.0.0.1", 42));
    assert!(storage.save_all(&snapshot).await);
    assert!(storage.save_all(&snapshot).await);
    let first = storage.load_records().await;

    assert!(storage.save_all(&snapshot).await);
    let second = storage.load_records().await;

    assert_eq!(first, second);
    assert_eq!(second.len(), 5);

    storage.close().await;
    database.drop().await;
}

#[tokio::test]
async fn test_unknown_player_reads_as_empty() {
    let Some((database, storage)) = connected_document_storage("unknown").await else {
        return;
    };

    assert!(!storage.is_user_registered("missing").await);
    assert_eq!(storage.get_user_data("missing").await, "");
    assert!(storage.get_all_data().await.is_empty());

    storage.close().await;
    database.drop().await;
}

#[tokio::test]
async fn test_snapshot_larger_than_one_batch() {
    let Some((database, storage)) = connected_document_storage("batches").await else {
        return;
    };

    let count = DOCUMENT_BATCH_SIZE * 2 + 7;
    let snapshot = snapshot_of(count);

    let first = storage.try_save_all(&snapshot).await.unwrap();
    assert_eq!(first.inserted, count);

    let second = storage.try_save_all(&snapshot).await.unwrap();
    assert_eq!((second.inserted, second.replaced), (0, count));
    assert!(second.failures.is_empty());

    assert_eq!(storage.store().fetch_all().await.unwrap().len(), count);

    storage.close().await;
    database.drop().await;
}

#[tokio::test]
async fn test_records_survive_new_instance() {
    let Some((database, storage)) = connected_document_storage("reopen").await else {
        return;
    };

    let mut snapshot = snapshot_of(2);
    snapshot.insert("p1".to_string(), authenticated_record("h1", "1.2.3.4", 77));
    assert!(storage.save_all(&snapshot).await);
    assert!(storage.save_all(&snapshot).await);
    storage.close().await;

    let reopened = storage::from_config(&StorageConfig::Document(database.config())).unwrap();
    reopened.connect().await.unwrap();

    let records = reopened.load_records().await;
    assert_eq!(records.len(), 3);
    assert_eq!(
        records["p1"],
        StoredRecord::Current(authenticated_record("h1", "1.2.3.4", 77))
    );

    reopened.close().await;
    database.drop().await;
}
