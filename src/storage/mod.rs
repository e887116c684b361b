//! Storage backends for player credentials
//!
//! This module provides a trait-based abstraction for persisting player
//! records to various backends (MySQL/SQLite, MongoDB, in-memory).
//!
//! ## Design
//!
//! - **Trait-based**: `PlayerStore` allows swapping implementations at startup
//! - **Async**: All operations are async and awaited to completion
//! - **Degrading facade**: `PlayerStorage` reconnects on demand and turns
//!   failures into "absent" values, only `connect` reports errors
//!
//! ## Backends
//!
//! - **Relational** (`relational` feature): one table keyed by `uuid` with a
//!   JSON `data` column; MySQL in production, SQLite through an explicit URL
//! - **Document** (`document` feature): one MongoDB collection, one document
//!   per player, insert/replace reconciliation on bulk save
//! - **In-Memory**: No persistence, for testing or throwaway servers
//!
//! ## Usage
//!
//! ```no_run
//! use player_store::config::StorageConfig;
//! use player_store::storage;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = storage::from_config(&StorageConfig::Memory)?;
//!     storage.connect().await?;
//!     assert!(!storage.is_user_registered("069a79f4-44e9-4726-a5be-fca90e38aaf5").await);
//!     Ok(())
//! }
//! ```

pub mod backend;
#[cfg(feature = "document")]
pub mod document;
pub mod error;
pub mod guard;
pub mod memory;
#[cfg(feature = "relational")]
pub mod queries;
pub mod reconcile;
#[cfg(feature = "relational")]
pub mod relational;

pub use backend::{BatchFailure, BatchKind, PlayerStore, SaveReport};
#[cfg(feature = "document")]
pub use document::DocumentBackend;
pub use error::{StorageError, StorageResult};
pub use guard::PlayerStorage;
pub use memory::MemoryBackend;
pub use reconcile::SavePlan;
#[cfg(feature = "relational")]
pub use relational::RelationalBackend;

use tracing::debug;

use crate::config::StorageConfig;

/// Build the configured backend behind the facade
///
/// The returned storage is not connected yet.
pub fn from_config(config: &StorageConfig) -> StorageResult<PlayerStorage> {
    let store: Box<dyn PlayerStore> = match config {
        StorageConfig::Memory => Box::new(MemoryBackend::new()),

        #[cfg(feature = "relational")]
        StorageConfig::Relational(relational) => {
            Box::new(RelationalBackend::new(relational.clone())?)
        }
        #[cfg(not(feature = "relational"))]
        StorageConfig::Relational(_) => {
            return Err(StorageError::InvalidConfig(
                "relational backend requires the `relational` feature".to_string(),
            ));
        }

        #[cfg(feature = "document")]
        StorageConfig::Document(document) => Box::new(DocumentBackend::new(document.clone())?),
        #[cfg(not(feature = "document"))]
        StorageConfig::Document(_) => {
            return Err(StorageError::InvalidConfig(
                "document backend requires the `document` feature".to_string(),
            ));
        }
    };

    debug!("configured {} storage backend", store.kind());
    Ok(PlayerStorage::new(store))
}
