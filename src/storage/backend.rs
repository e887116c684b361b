//! Storage backend trait definition
//!
//! This module defines the `PlayerStore` trait that every backend
//! implements, plus the report returned by a bulk save.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::{StorageError, StorageResult};
use crate::record::PlayerRecord;

/// Which write queue of a bulk save a result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    /// Documents for identifiers the store has never seen
    Insert,
    /// Full replacements for identifiers already stored
    Replace,
    /// Upsert-by-key rows (relational backend)
    Upsert,
}

/// A write queue that failed during a bulk save
#[derive(Debug)]
pub struct BatchFailure {
    pub batch: BatchKind,
    pub error: StorageError,
}

/// Outcome of [`PlayerStore::save_all`]
///
/// Counts only include batches that were actually acknowledged.
#[derive(Debug, Default)]
pub struct SaveReport {
    pub inserted: usize,
    pub replaced: usize,
    pub upserted: usize,

    /// Queues that failed; the other queue may still have succeeded
    pub failures: Vec<BatchFailure>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of records written
    pub fn written(&self) -> usize {
        self.inserted + self.replaced + self.upserted
    }
}

/// Longest identifier the stores accept (the relational `uuid` column width)
pub const MAX_PLAYER_ID_LEN: usize = 36;

/// Reject identifiers a store would truncate or could not key on
pub fn check_player_id(uuid: &str) -> StorageResult<()> {
    if uuid.is_empty() || uuid.chars().count() > MAX_PLAYER_ID_LEN {
        return Err(StorageError::InvalidPlayerId(uuid.to_string()));
    }
    Ok(())
}

/// Trait for persistent player stores
///
/// Every backend (relational, document, in-memory) implements this trait.
/// Methods keep the distinction between "absent" (`Ok(None)`/`Ok(false)`)
/// and "failed" (`Err`); [`PlayerStorage`](super::PlayerStorage) is the layer
/// that collapses failures into defaults.
///
/// ## Sessions
///
/// A backend owns at most one session. Operations on a backend without a
/// session fail with [`StorageError::Unavailable`]; re-establishing the
/// session is the job of the caller (see `PlayerStorage::ensure_live`).
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`; the session is guarded internally.
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Short backend name for logs
    fn kind(&self) -> &'static str;

    /// Open the session, replacing any existing one
    ///
    /// Backends with a fixed schema create it here if it does not exist yet.
    async fn connect(&self) -> StorageResult<()>;

    /// Release the session; closing a closed backend is a no-op
    async fn close(&self) -> StorageResult<()>;

    /// Whether no session is currently held
    async fn is_closed(&self) -> bool;

    /// Lightweight round-trip on the current session
    async fn ping(&self) -> StorageResult<()>;

    /// Whether a record exists for `uuid`
    async fn is_registered(&self, uuid: &str) -> StorageResult<bool>;

    /// Serialized data stored for `uuid`
    async fn fetch(&self, uuid: &str) -> StorageResult<Option<String>>;

    /// Remove the record for `uuid`; unknown identifiers are not an error
    async fn delete(&self, uuid: &str) -> StorageResult<()>;

    /// Legacy single-record insert
    ///
    /// Returns `false` when a record already exists.
    async fn insert_legacy(&self, uuid: &str, data: &str) -> StorageResult<bool>;

    /// Legacy single-record update
    async fn update_legacy(&self, uuid: &str, data: &str) -> StorageResult<()>;

    /// Every stored record, keyed by identifier
    async fn fetch_all(&self) -> StorageResult<HashMap<String, String>>;

    /// Reconcile a full cache snapshot with the store
    ///
    /// An `Err` means nothing was written; partial failures are reported in
    /// [`SaveReport::failures`].
    async fn save_all(&self, snapshot: &HashMap<String, PlayerRecord>)
    -> StorageResult<SaveReport>;
}

macro_rules! forward_player_store {
    ($wrapper:ident) => {
        #[async_trait]
        impl<S: PlayerStore + ?Sized> PlayerStore for $wrapper<S> {
            fn kind(&self) -> &'static str {
                (**self).kind()
            }

            async fn connect(&self) -> StorageResult<()> {
                (**self).connect().await
            }

            async fn close(&self) -> StorageResult<()> {
                (**self).close().await
            }

            async fn is_closed(&self) -> bool {
                (**self).is_closed().await
            }

            async fn ping(&self) -> StorageResult<()> {
                (**self).ping().await
            }

            async fn is_registered(&self, uuid: &str) -> StorageResult<bool> {
                (**self).is_registered(uuid).await
            }

            async fn fetch(&self, uuid: &str) -> StorageResult<Option<String>> {
                (**self).fetch(uuid).await
            }

            async fn delete(&self, uuid: &str) -> StorageResult<()> {
                (**self).delete(uuid).await
            }

            async fn insert_legacy(&self, uuid: &str, data: &str) -> StorageResult<bool> {
                (**self).insert_legacy(uuid, data).await
            }

            async fn update_legacy(&self, uuid: &str, data: &str) -> StorageResult<()> {
                (**self).update_legacy(uuid, data).await
            }

            async fn fetch_all(&self) -> StorageResult<HashMap<String, String>> {
                (**self).fetch_all().await
            }

            async fn save_all(
                &self,
                snapshot: &HashMap<String, PlayerRecord>,
            ) -> StorageResult<SaveReport> {
                (**self).save_all(snapshot).await
            }
        }
    };
}

forward_player_store!(Box);
forward_player_store!(Arc);
