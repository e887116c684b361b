//! Integration tests for failure handling
//!
//! These tests verify graceful degradation when the backend fails:
//! - An unreachable backend yields defaults instead of errors
//! - The guard reconnects once the backend comes back
//! - A failing replace queue does not block the insert queue

use std::collections::HashMap;

use assert_matches::assert_matches;
use player_store::storage::{BatchKind, MemoryBackend, PlayerStorage, StorageError};
use player_store::PlayerRecord;

use crate::helpers::{authenticated_record, connected_memory_storage, snapshot_of};

#[tokio::test]
async fn test_connect_reports_unreachable_backend() {
    let storage = PlayerStorage::new(MemoryBackend::new());
    storage.store().set_reachable(false);

    let result = storage.connect().await;
    assert_matches!(result, Err(StorageError::ConnectionFailed(_)));
    assert!(storage.is_closed().await);
}

#[tokio::test]
async fn test_unreachable_backend_degrades_to_defaults() {
    let storage = connected_memory_storage().await;
    assert!(storage.save_all(&snapshot_of(2)).await);

    storage.store().set_reachable(false);

    assert!(!storage.is_user_registered("player-0").await);
    assert_eq!(storage.get_user_data("player-0").await, "");
    assert!(storage.get_all_data().await.is_empty());
    assert!(!storage.register_user("p9", "blob").await);
    assert!(!storage.save_all(&snapshot_of(3)).await);
    storage.delete_user_data("player-0").await;
    storage.update_user_data("player-0", "blob").await;
    assert!(storage.is_closed().await);
}

#[tokio::test]
async fn test_guard_reconnects_after_outage() {
    let storage = connected_memory_storage().await;
    assert!(storage.save_all(&snapshot_of(2)).await);

    storage.store().set_reachable(false);
    assert!(!storage.is_user_registered("player-1").await);

    storage.store().set_reachable(true);
    assert!(storage.is_user_registered("player-1").await);
    assert!(!storage.is_closed().await);
    assert_eq!(storage.store().stats().connects, 2);
}

#[tokio::test]
async fn test_replace_failure_keeps_inserts() {
    let storage = connected_memory_storage().await;
    assert!(storage.save_all(&snapshot_of(2)).await);

    storage.store().fail_replace_batches(true);
    let mut snapshot = snapshot_of(2);
    snapshot.insert("newcomer".to_string(), PlayerRecord::with_password("h"));

    let report = storage.try_save_all(&snapshot).await.unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.inserted, 1);
    assert_eq!(report.replaced, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].batch, BatchKind::Replace);

    assert!(storage.is_user_registered("newcomer").await);
    assert!(!storage.save_all(&snapshot).await);

    // Next cycle succeeds with the full snapshot
    storage.store().fail_replace_batches(false);
    assert!(storage.save_all(&snapshot).await);
}

#[tokio::test]
async fn test_closed_storage_reconnects_for_bulk_save() {
    let storage = connected_memory_storage().await;
    storage.close().await;
    assert!(storage.is_closed().await);

    let mut snapshot = HashMap::new();
    snapshot.insert("p1".to_string(), authenticated_record("h1", "127.0.0.1", 5));
    assert!(storage.save_all(&snapshot).await);
    assert!(!storage.is_closed().await);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let storage = connected_memory_storage().await;
    storage.close().await;
    storage.close().await;
    assert!(storage.is_closed().await);

    storage.connect().await.unwrap();
    assert!(!storage.is_closed().await);
}
