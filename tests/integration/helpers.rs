//! Helper functions for integration tests

use std::collections::HashMap;

use player_store::PlayerRecord;
use player_store::storage::{MemoryBackend, PlayerStorage};

pub fn authenticated_record(password: &str, ip: &str, valid_until: i64) -> PlayerRecord {
    PlayerRecord {
        password: Some(password.to_string()),
        is_authenticated: true,
        last_ip: ip.to_string(),
        valid_until,
        last_kicked: 0,
    }
}

/// Snapshot of `count` fresh players named `player-<n>`
pub fn snapshot_of(count: usize) -> HashMap<String, PlayerRecord> {
    (0..count)
        .map(|n| (format!("player-{n}"), PlayerRecord::with_password(format!("hash-{n}"))))
        .collect()
}

pub async fn connected_memory_storage() -> PlayerStorage<MemoryBackend> {
    let storage = PlayerStorage::new(MemoryBackend::new());
    storage.connect().await.unwrap();
    storage
}

#[cfg(feature = "relational")]
pub mod sqlite {
    use player_store::config::{RelationalConfig, StorageConfig};
    use player_store::storage::{self, PlayerStorage};
    use tempfile::TempDir;

    /// Connected SQLite-backed storage; keep the directory alive for the test
    pub async fn connected_sqlite_storage() -> (TempDir, PlayerStorage) {
        let dir = tempfile::tempdir().unwrap();
        let config = RelationalConfig::sqlite(dir.path().join("players.db"), "easyauth");

        let storage = storage::from_config(&StorageConfig::Relational(config)).unwrap();
        storage.connect().await.unwrap();
        (dir, storage)
    }
}

#[cfg(feature = "document")]
pub mod mongo {
    use player_store::config::{DocumentConfig, StorageConfig};
    use player_store::storage::{self, PlayerStorage};

    /// Throwaway database on the server named by `MONGODB_URI`
    pub struct TestDatabase {
        uri: String,
        name: String,
    }

    impl TestDatabase {
        pub fn config(&self) -> DocumentConfig {
            DocumentConfig {
                connection_string: self.uri.clone(),
                database: self.name.clone(),
                collection: "players".to_string(),
            }
        }

        pub async fn drop(self) {
            let client = mongodb::Client::with_uri_str(&self.uri).await.unwrap();
            client.database(&self.name).drop().await.unwrap();
        }
    }

    /// Connected MongoDB-backed storage, or `None` when `MONGODB_URI` is unset
    pub async fn connected_document_storage(test: &str) -> Option<(TestDatabase, PlayerStorage)> {
        let Ok(uri) = std::env::var("MONGODB_URI") else {
            eprintln!("MONGODB_URI not set, skipping {test}");
            return None;
        };
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let database = TestDatabase {
            uri,
            name: format!("ps_{test}_{nanos}"),
        };

        let storage = storage::from_config(&StorageConfig::Document(database.config())).unwrap();
        storage.connect().await.unwrap();
        Some((database, storage))
    }
}
