pub mod actors;
pub mod config;
pub mod record;
pub mod storage;
pub mod util;

pub use record::{PlayerRecord, StoredRecord};
pub use storage::{PlayerStorage, PlayerStore, StorageError, StorageResult};
