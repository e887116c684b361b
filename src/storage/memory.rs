//! In-memory storage backend (no persistence)
//!
//! This backend keeps player documents in a map guarded by a lock.
//! It's useful for:
//! - Testing without database dependencies
//! - Deployments that keep players only for the lifetime of the process
//!
//! It follows the document backend's write semantics: new identifiers are
//! inserted with the password only, known identifiers are replaced with the
//! full record. Stored data survives `close`/`connect`, like a server would.
//!
//! ## Fault injection
//!
//! [`MemoryBackend::set_reachable`] and
//! [`MemoryBackend::fail_replace_batches`] simulate an unreachable server and
//! a failing replace queue.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{BatchFailure, BatchKind, PlayerStore, SaveReport};
use super::error::{StorageError, StorageResult};
use super::reconcile::{
    IS_AUTHENTICATED_FIELD, LAST_IP_FIELD, LAST_KICKED_FIELD, PASSWORD_FIELD, SavePlan,
    UUID_FIELD, VALID_UNTIL_FIELD,
};
use crate::record::PlayerRecord;

/// Write accounting for [`MemoryBackend`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub connects: usize,
    pub insert_batches: usize,
    pub replace_batches: usize,
    pub inserted: usize,
    pub replaced: usize,
}

/// In-memory storage backend
pub struct MemoryBackend {
    /// Serialized documents keyed by identifier
    documents: RwLock<HashMap<String, String>>,

    open: AtomicBool,
    reachable: AtomicBool,
    fail_replaces: AtomicBool,

    connects: AtomicUsize,
    insert_batches: AtomicUsize,
    replace_batches: AtomicUsize,
    inserted: AtomicUsize,
    replaced: AtomicUsize,
}

impl MemoryBackend {
    /// Create a new, closed in-memory backend
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            open: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
            fail_replaces: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            insert_batches: AtomicUsize::new(0),
            replace_batches: AtomicUsize::new(0),
            inserted: AtomicUsize::new(0),
            replaced: AtomicUsize::new(0),
        }
    }

    /// Simulate the server going away (or coming back)
    ///
    /// While unreachable, `connect` and `ping` fail and the open session is
    /// considered dead.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make every replace batch fail until reset
    pub fn fail_replace_batches(&self, fail: bool) {
        self.fail_replaces.store(fail, Ordering::SeqCst);
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            connects: self.connects.load(Ordering::SeqCst),
            insert_batches: self.insert_batches.load(Ordering::SeqCst),
            replace_batches: self.replace_batches.load(Ordering::SeqCst),
            inserted: self.inserted.load(Ordering::SeqCst),
            replaced: self.replaced.load(Ordering::SeqCst),
        }
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn session(&self) -> StorageResult<()> {
        if self.open.load(Ordering::SeqCst) && self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable)
        }
    }

    fn insert_document(uuid: &str, record: &PlayerRecord) -> String {
        json!({
            UUID_FIELD: uuid,
            PASSWORD_FIELD: record.password,
        })
        .to_string()
    }

    fn replace_document(uuid: &str, record: &PlayerRecord) -> String {
        json!({
            UUID_FIELD: uuid,
            PASSWORD_FIELD: record.password,
            IS_AUTHENTICATED_FIELD: record.is_authenticated,
            LAST_IP_FIELD: record.last_ip,
            VALID_UNTIL_FIELD: record.valid_until,
            LAST_KICKED_FIELD: record.last_kicked,
        })
        .to_string()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlayerStore for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self) -> StorageResult<()> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(StorageError::ConnectionFailed(
                "in-memory backend is unreachable".to_string(),
            ));
        }

        self.open.store(true, Ordering::SeqCst);
        self.connects.fetch_add(1, Ordering::SeqCst);
        debug!("in-memory backend connected");
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_closed(&self) -> bool {
        !self.open.load(Ordering::SeqCst)
    }

    async fn ping(&self) -> StorageResult<()> {
        self.session()
    }

    async fn is_registered(&self, uuid: &str) -> StorageResult<bool> {
        self.session()?;
        Ok(self.documents.read().await.contains_key(uuid))
    }

    async fn fetch(&self, uuid: &str) -> StorageResult<Option<String>> {
        self.session()?;
        Ok(self.documents.read().await.get(uuid).cloned())
    }

    async fn delete(&self, uuid: &str) -> StorageResult<()> {
        self.session()?;
        self.documents.write().await.remove(uuid);
        Ok(())
    }

    async fn insert_legacy(&self, uuid: &str, data: &str) -> StorageResult<bool> {
        self.session()?;
        let mut documents = self.documents.write().await;
        if documents.contains_key(uuid) {
            return Ok(false);
        }
        documents.insert(uuid.to_string(), data.to_string());
        Ok(true)
    }

    async fn update_legacy(&self, uuid: &str, data: &str) -> StorageResult<()> {
        self.session()?;
        if let Some(stored) = self.documents.write().await.get_mut(uuid) {
            *stored = data.to_string();
        }
        Ok(())
    }

    async fn fetch_all(&self) -> StorageResult<HashMap<String, String>> {
        self.session()?;
        Ok(self.documents.read().await.clone())
    }

    async fn save_all(
        &self,
        snapshot: &HashMap<String, PlayerRecord>,
    ) -> StorageResult<SaveReport> {
        self.session()?;

        let mut documents = self.documents.write().await;
        let known: HashSet<String> = snapshot
            .keys()
            .filter(|uuid| documents.contains_key(*uuid))
            .cloned()
            .collect();
        let plan = SavePlan::partition(snapshot, &known);
        let mut report = SaveReport::default();

        if !plan.inserts.is_empty() {
            self.insert_batches.fetch_add(1, Ordering::SeqCst);
            for (uuid, record) in &plan.inserts {
                documents.insert(uuid.to_string(), Self::insert_document(uuid, record));
            }
            report.inserted = plan.inserts.len();
            self.inserted.fetch_add(report.inserted, Ordering::SeqCst);
        }

        if !plan.replaces.is_empty() {
            self.replace_batches.fetch_add(1, Ordering::SeqCst);
            if self.fail_replaces.load(Ordering::SeqCst) {
                report.failures.push(BatchFailure {
                    batch: BatchKind::Replace,
                    error: StorageError::QueryFailed("injected replace failure".to_string()),
                });
            } else {
                for (uuid, record) in &plan.replaces {
                    documents.insert(uuid.to_string(), Self::replace_document(uuid, record));
                }
                report.replaced = plan.replaces.len();
                self.replaced.fetch_add(report.replaced, Ordering::SeqCst);
            }
        }

        debug!(
            inserted = report.inserted,
            replaced = report.replaced,
            "in-memory save complete"
        );
        Ok(report)
    }
}
