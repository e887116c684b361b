//! Caller-facing storage facade
//!
//! [`PlayerStorage<S>`] wraps any [`PlayerStore`] and provides:
//! - The reconnect guard, run before every operation: a missing session or a
//!   failed (or timed out) liveness probe triggers close + connect
//! - Degradation: failures are logged and turned into the "absent" value
//!   (`false`, empty string, empty map, no-op); only `connect` returns errors
//! - Startup helpers on top of the raw data (typed load, legacy migration)

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use super::backend::{PlayerStore, SaveReport, check_player_id};
use super::error::{StorageError, StorageResult};
use crate::record::{PlayerRecord, StoredRecord};

/// Default upper bound for a liveness probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Storage facade used by the rest of the server
///
/// # Type parameter
///
/// - `S`: the backend, boxed by default so it can be chosen at runtime
pub struct PlayerStorage<S: PlayerStore = Box<dyn PlayerStore>> {
    store: S,
    probe_timeout: Duration,
}

impl<S: PlayerStore> PlayerStorage<S> {
    /// Wrap a backend; it is not connected yet
    pub fn new(store: S) -> Self {
        Self {
            store,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// The wrapped backend, for callers that want the undegraded results
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Open the session
    ///
    /// This is the only operation that reports failure to the caller.
    pub async fn connect(&self) -> StorageResult<()> {
        debug!("using {} storage backend", self.store.kind());
        self.store.connect().await
    }

    /// Release the session; errors are logged, never returned
    pub async fn close(&self) {
        if let Err(e) = self.store.close().await {
            error!("database connection not closed: {e}");
        }
    }

    /// Whether no live session exists
    ///
    /// An open session that fails the liveness probe is torn down, so a
    /// silently dead transport is reported as closed.
    pub async fn is_closed(&self) -> bool {
        if self.store.is_closed().await {
            return true;
        }

        if self.probe().await.is_ok() {
            return false;
        }

        self.close().await;
        true
    }

    async fn probe(&self) -> StorageResult<()> {
        match tokio::time::timeout(self.probe_timeout, self.store.ping()).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::QueryFailed(format!(
                "liveness probe timed out after {:?}",
                self.probe_timeout
            ))),
        }
    }

    /// Make sure a live session exists before an operation
    ///
    /// A failed reconnect is only logged: the operation then runs without a
    /// session and fails with [`StorageError::Unavailable`].
    async fn ensure_live(&self) {
        if !self.store.is_closed().await {
            match self.probe().await {
                Ok(()) => return,
                Err(e) => debug!("liveness probe failed: {e}"),
            }
            if let Err(e) = self.store.close().await {
                debug!("closing dead session failed: {e}");
            }
        }

        debug!("reconnecting to {} backend", self.store.kind());
        if let Err(e) = self.store.connect().await {
            error!("{} reconnect failed: {e}", self.store.kind());
        }
    }

    /// Legacy insert; `true` iff a new record was written
    #[instrument(skip(self, data))]
    pub async fn register_user(&self, uuid: &str, data: &str) -> bool {
        if let Err(e) = check_player_id(uuid) {
            error!("register_user error: {e}");
            return false;
        }
        self.ensure_live().await;
        match self.store.insert_legacy(uuid, data).await {
            Ok(inserted) => inserted,
            Err(e) => {
                error!("register_user error: {e}");
                false
            }
        }
    }

    pub async fn is_user_registered(&self, uuid: &str) -> bool {
        self.ensure_live().await;
        self.store
            .is_registered(uuid)
            .await
            .inspect_err(|e| error!("is_user_registered error for {uuid}: {e}"))
            .unwrap_or(false)
    }

    /// Best-effort delete
    pub async fn delete_user_data(&self, uuid: &str) {
        self.ensure_live().await;
        if let Err(e) = self.store.delete(uuid).await {
            error!("delete_user_data error for {uuid}: {e}");
        }
    }

    /// Legacy unconditional update
    #[instrument(skip(self, data))]
    pub async fn update_user_data(&self, uuid: &str, data: &str) {
        if let Err(e) = check_player_id(uuid) {
            error!("update_user_data error: {e}");
            return;
        }
        self.ensure_live().await;
        if let Err(e) = self.store.update_legacy(uuid, data).await {
            error!("update_user_data error: {e}");
        }
    }

    /// Stored data for `uuid`, or an empty string
    pub async fn get_user_data(&self, uuid: &str) -> String {
        self.ensure_live().await;
        match self.store.fetch(uuid).await {
            Ok(data) => data.unwrap_or_default(),
            Err(e) => {
                error!("get_user_data error for {uuid}: {e}");
                String::new()
            }
        }
    }

    /// Every stored record, or an empty map
    pub async fn get_all_data(&self) -> HashMap<String, String> {
        self.ensure_live().await;
        self.store
            .fetch_all()
            .await
            .inspect_err(|e| error!("get_all_data error: {e}"))
            .unwrap_or_default()
    }

    /// Reconcile the cache snapshot with the store
    ///
    /// Returns `true` iff every submitted batch was written. A `false` means
    /// the caller should retry the full snapshot on its next cycle.
    #[instrument(skip(self, snapshot), fields(count = snapshot.len()))]
    pub async fn save_all(&self, snapshot: &HashMap<String, PlayerRecord>) -> bool {
        self.try_save_all(snapshot).await.is_some_and(|report| report.is_complete())
    }

    /// Like [`save_all`](Self::save_all) but returns the report
    ///
    /// `None` if nothing could be written. Players whose identifier cannot be
    /// stored are logged and left out.
    pub async fn try_save_all(
        &self,
        snapshot: &HashMap<String, PlayerRecord>,
    ) -> Option<SaveReport> {
        let snapshot = storable(snapshot);
        self.ensure_live().await;
        match self.store.save_all(&snapshot).await {
            Ok(report) => {
                for failure in &report.failures {
                    error!("{:?} batch failed while saving players: {}", failure.batch, failure.error);
                }
                debug!(written = report.written(), "players saved");
                Some(report)
            }
            Err(e) if e.is_connection_error() => {
                error!("storage unavailable, {} players not saved", snapshot.len());
                None
            }
            Err(e) => {
                error!("error saving players data: {e}");
                None
            }
        }
    }

    /// Every stored record, classified by shape
    pub async fn load_records(&self) -> HashMap<String, StoredRecord> {
        self.get_all_data()
            .await
            .into_iter()
            .map(|(uuid, data)| {
                let record = StoredRecord::parse(&uuid, &data);
                if record.is_legacy() {
                    warn!("player {uuid} is stored in the legacy format");
                }
                (uuid, record)
            })
            .collect()
    }

    /// Rewrite every legacy record in the current shape
    ///
    /// Returns the number of records migrated.
    pub async fn migrate_legacy(&self) -> usize {
        let legacy: HashMap<String, PlayerRecord> = self
            .load_records()
            .await
            .into_iter()
            .filter(|(_, record)| record.is_legacy())
            .map(|(uuid, record)| (uuid, record.into_current()))
            .collect();

        if legacy.is_empty() {
            return 0;
        }

        match self.try_save_all(&legacy).await {
            Some(report) if report.is_complete() => {
                info!("migrated {} legacy records", legacy.len());
                legacy.len()
            }
            _ => {
                warn!("legacy migration incomplete");
                0
            }
        }
    }
}

/// The snapshot without players whose identifier cannot be stored
fn storable(snapshot: &HashMap<String, PlayerRecord>) -> Cow<'_, HashMap<String, PlayerRecord>> {
    if snapshot.keys().all(|uuid| check_player_id(uuid).is_ok()) {
        return Cow::Borrowed(snapshot);
    }

    Cow::Owned(
        snapshot
            .iter()
            .filter(|(uuid, _)| match check_player_id(uuid) {
                Ok(()) => true,
                Err(e) => {
                    error!("skipping player while saving: {e}");
                    false
                }
            })
            .map(|(uuid, record)| (uuid.clone(), record.clone()))
            .collect(),
    )
}

impl<S: PlayerStore + std::fmt::Debug> std::fmt::Debug for PlayerStorage<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerStorage")
            .field("store", &self.store)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}
