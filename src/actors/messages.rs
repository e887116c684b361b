//! Message types for actor communication

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, oneshot};

use crate::record::PlayerRecord;

/// Player cache shared between the server and the save actor
///
/// The server owns and mutates it; the save actor only takes snapshots.
pub type SharedCache = Arc<RwLock<HashMap<String, PlayerRecord>>>;

/// Commands that can be sent to the save actor
#[derive(Debug)]
pub enum SaveCommand {
    /// Save the current cache snapshot now
    Flush {
        respond_to: oneshot::Sender<anyhow::Result<()>>,
    },

    /// Get save statistics
    GetStats {
        respond_to: oneshot::Sender<SaveStats>,
    },

    /// Final save, close the storage and stop the actor
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}

/// Save statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveStats {
    /// Number of saves that wrote every batch
    pub save_count: u64,

    /// Number of saves with at least one failed batch
    pub failed_saves: u64,

    /// Number of records in the last snapshot
    pub last_snapshot_size: usize,
}
