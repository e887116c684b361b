//! Relational storage backend implementation
//!
//! One row per player in a table of the shape
//!
//! ```sql
//! CREATE TABLE `<database>`.`<table>` (
//!     `id` INT NOT NULL AUTO_INCREMENT,
//!     `uuid` VARCHAR(36) NOT NULL,
//!     `data` JSON NOT NULL,
//!     PRIMARY KEY (`id`), UNIQUE (`uuid`)
//! ) ENGINE = InnoDB;
//! ```
//!
//! where `data` holds the JSON-serialized [`PlayerRecord`].
//!
//! ## Session
//!
//! The backend holds a single connection (no pool). The table is created on
//! `connect` if the schema lookup does not find it. Both MySQL and SQLite are
//! supported through sqlx's `Any` driver; SQLite is meant for embedded
//! deployments and tests.
//!
//! ## Bulk save
//!
//! `save_all` writes the whole snapshot as multi-row upserts inside one
//! transaction. A failure rolls the transaction back, so either every row is
//! written or none is.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Any, AnyConnection, Connection, QueryBuilder, Row};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::backend::{PlayerStore, SaveReport, check_player_id};
use super::error::{StorageError, StorageResult};
use super::queries::{Dialect, UPSERT_CHUNK_ROWS, validate_identifier};
use crate::config::RelationalConfig;
use crate::record::PlayerRecord;

/// Relational storage backend
pub struct RelationalBackend {
    session: Mutex<Option<AnyConnection>>,
    dialect: Dialect,
    config: RelationalConfig,
}

impl RelationalBackend {
    /// Create a closed backend; call [`PlayerStore::connect`] to open it
    ///
    /// Fails if the connection URL has an unsupported scheme or the
    /// database/table names are not plain identifiers.
    pub fn new(config: RelationalConfig) -> StorageResult<Self> {
        sqlx::any::install_default_drivers();

        let url = config.connection_url()?;
        let dialect = Dialect::from_url(&url).ok_or_else(|| {
            StorageError::InvalidConfig("unsupported relational URL scheme".to_string())
        })?;

        validate_identifier(&config.table, "table name")?;
        if dialect == Dialect::MySql {
            validate_identifier(&config.database, "database name")?;
        }

        Ok(Self {
            session: Mutex::new(None),
            dialect,
            config,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn table(&self) -> &str {
        &self.config.table
    }

    /// Create the player table unless the schema already has it
    async fn ensure_table(&self, conn: &mut AnyConnection) -> StorageResult<()> {
        let exists = sqlx::query(self.dialect.table_exists())
            .bind(self.config.table.as_str())
            .fetch_optional(&mut *conn)
            .await?
            .is_some();

        if exists {
            debug!("table {} already exists", self.config.table);
            return Ok(());
        }

        info!("creating table {}", self.config.table);
        let ddl = self
            .dialect
            .create_table(&self.config.database, &self.config.table);
        sqlx::query(&ddl).execute(&mut *conn).await?;
        Ok(())
    }
}

#[async_trait]
impl PlayerStore for RelationalBackend {
    fn kind(&self) -> &'static str {
        "relational"
    }

    #[instrument(skip(self), fields(table = %self.config.table))]
    async fn connect(&self) -> StorageResult<()> {
        let url = self.config.connection_url()?;
        debug!("connecting to {:?} database", self.dialect);

        let mut conn = AnyConnection::connect(&url)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        if let Err(e) = self.ensure_table(&mut conn).await {
            // Best effort, the setup error is what matters
            let _ = conn.close().await;
            return Err(StorageError::ConnectionFailed(format!(
                "failed setting up table {}: {e}",
                self.config.table
            )));
        }

        let previous = self.session.lock().await.replace(conn);
        if let Some(previous) = previous
            && let Err(e) = previous.close().await
        {
            warn!("failed to close replaced connection: {e}");
        }

        info!("relational backend connected");
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        let conn = self.session.lock().await.take();
        match conn {
            Some(conn) => {
                conn.close().await?;
                info!("database connection closed successfully");
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn is_closed(&self) -> bool {
        self.session.lock().await.is_none()
    }

    async fn ping(&self) -> StorageResult<()> {
        let mut session = self.session.lock().await;
        live(&mut session)?.ping().await?;
        Ok(())
    }

    async fn is_registered(&self, uuid: &str) -> StorageResult<bool> {
        let mut session = self.session.lock().await;
        let conn = live(&mut session)?;
        let row = sqlx::query(&self.dialect.find_uuid(&self.config.table))
            .bind(uuid)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.is_some())
    }

    async fn fetch(&self, uuid: &str) -> StorageResult<Option<String>> {
        let mut session = self.session.lock().await;
        let conn = live(&mut session)?;
        let row = sqlx::query(&self.dialect.select_data(&self.config.table))
            .bind(uuid)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(|row| row.try_get::<String, _>("data"))
            .transpose()
            .map_err(StorageError::from)
    }

    async fn delete(&self, uuid: &str) -> StorageResult<()> {
        let mut session = self.session.lock().await;
        let conn = live(&mut session)?;
        let result = sqlx::query(&self.dialect.delete(&self.config.table))
            .bind(uuid)
            .execute(&mut *conn)
            .await?;
        debug!("deleted {} row(s) for {uuid}", result.rows_affected());
        Ok(())
    }

    async fn insert_legacy(&self, uuid: &str, data: &str) -> StorageResult<bool> {
        check_player_id(uuid)?;
        let mut session = self.session.lock().await;
        let conn = live(&mut session)?;
        let result = sqlx::query(&self.dialect.insert(&self.config.table))
            .bind(uuid)
            .bind(data)
            .execute(&mut *conn)
            .await;

        match result {
            Ok(result) => Ok(result.rows_affected() == 1),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                debug!("{uuid} is already registered");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_legacy(&self, uuid: &str, data: &str) -> StorageResult<()> {
        check_player_id(uuid)?;
        let mut session = self.session.lock().await;
        let conn = live(&mut session)?;
        sqlx::query(&self.dialect.update_data(&self.config.table))
            .bind(data)
            .bind(uuid)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_all(&self) -> StorageResult<HashMap<String, String>> {
        let mut session = self.session.lock().await;
        let conn = live(&mut session)?;
        let rows = sqlx::query(&self.dialect.select_all(&self.config.table))
            .fetch_all(&mut *conn)
            .await?;

        let records = rows
            .into_iter()
            .map(|row| Ok((row.try_get("uuid")?, row.try_get("data")?)))
            .collect::<Result<HashMap<String, String>, sqlx::Error>>()?;

        debug!("loaded {} records", records.len());
        Ok(records)
    }

    #[instrument(skip(self, snapshot), fields(count = snapshot.len()))]
    async fn save_all(
        &self,
        snapshot: &HashMap<String, PlayerRecord>,
    ) -> StorageResult<SaveReport> {
        let mut session = self.session.lock().await;
        let conn = live(&mut session)?;

        if snapshot.is_empty() {
            return Ok(SaveReport::default());
        }
        for uuid in snapshot.keys() {
            check_player_id(uuid)?;
        }

        let mut rows = snapshot
            .iter()
            .map(|(uuid, record)| Ok((uuid.as_str(), record.to_json()?)))
            .collect::<StorageResult<Vec<(&str, String)>>>()?;
        rows.sort_unstable_by_key(|(uuid, _)| *uuid);

        let mut tx = conn.begin().await?;
        for chunk in rows.chunks(UPSERT_CHUNK_ROWS) {
            let mut builder =
                QueryBuilder::<Any>::new(self.dialect.upsert_head(&self.config.table));
            builder.push_values(chunk, |mut row, (uuid, data)| {
                row.push_bind(*uuid).push_bind(data.as_str());
            });
            builder.push(self.dialect.upsert_tail());
            builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!("upserted {} records", rows.len());
        Ok(SaveReport {
            upserted: rows.len(),
            ..Default::default()
        })
    }
}

/// The open connection of a locked session
fn live(session: &mut Option<AnyConnection>) -> StorageResult<&mut AnyConnection> {
    session.as_mut().ok_or(StorageError::Unavailable)
}

impl std::fmt::Debug for RelationalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalBackend")
            .field("dialect", &self.dialect)
            .field("table", &self.config.table)
            .finish_non_exhaustive()
    }
}
