//! SQL statements for the relational backend
//!
//! The table name is interpolated, so it must have passed
//! [`validate_identifier`] first.

use super::error::{StorageError, StorageResult};

/// Rows per multi-row upsert statement
pub const UPSERT_CHUNK_ROWS: usize = 500;

/// SQL dialect of the relational backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// MySQL/MariaDB
    MySql,
    /// SQLite (embedded deployments and tests)
    Sqlite,
}

impl Dialect {
    /// Detect the dialect from a connection URL
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("mysql://") || url.starts_with("mariadb://") {
            Some(Self::MySql)
        } else if url.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else {
            None
        }
    }

    /// Query returning a row iff the table exists
    pub fn table_exists(self) -> &'static str {
        match self {
            Dialect::MySql => {
                "SELECT 1 FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?"
            }
            Dialect::Sqlite => "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        }
    }

    pub fn create_table(self, database: &str, table: &str) -> String {
        match self {
            Dialect::MySql => format!(
                r#"
                CREATE TABLE `{database}`.`{table}` (
                    `id` INT NOT NULL AUTO_INCREMENT,
                    `uuid` VARCHAR(36) NOT NULL,
                    `data` JSON NOT NULL,
                    PRIMARY KEY (`id`), UNIQUE (`uuid`)
                ) ENGINE = InnoDB;"#
            ),
            Dialect::Sqlite => format!(
                r#"
                CREATE TABLE "{table}" (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid VARCHAR(36) NOT NULL UNIQUE,
                    data TEXT NOT NULL
                )"#
            ),
        }
    }

    /// Column expression that reads `data` as text
    ///
    /// MySQL's JSON type is not decodable through the generic driver.
    fn data_column(self) -> &'static str {
        match self {
            Dialect::MySql => "CAST(data AS CHAR)",
            Dialect::Sqlite => "data",
        }
    }

    pub fn find_uuid(self, table: &str) -> String {
        format!("SELECT uuid FROM {table} WHERE uuid = ?")
    }

    pub fn select_data(self, table: &str) -> String {
        format!(
            "SELECT {} AS data FROM {table} WHERE uuid = ?",
            self.data_column()
        )
    }

    pub fn select_all(self, table: &str) -> String {
        format!("SELECT uuid, {} AS data FROM {table}", self.data_column())
    }

    pub fn delete(self, table: &str) -> String {
        format!("DELETE FROM {table} WHERE uuid = ?")
    }

    /// Single-row insert; an existing `uuid` fails with a unique violation
    ///
    /// Not `INSERT IGNORE`: MySQL would also downgrade truncation errors to
    /// warnings.
    pub fn insert(self, table: &str) -> String {
        format!("INSERT INTO {table} (uuid, data) VALUES (?, ?)")
    }

    /// Binds: data, uuid
    pub fn update_data(self, table: &str) -> String {
        format!("UPDATE {table} SET data = ? WHERE uuid = ?")
    }

    /// Head of the multi-row upsert, followed by the `VALUES` list
    pub fn upsert_head(self, table: &str) -> String {
        format!("INSERT INTO {table} (uuid, data) ")
    }

    /// Tail of the multi-row upsert
    pub fn upsert_tail(self) -> &'static str {
        match self {
            Dialect::MySql => " ON DUPLICATE KEY UPDATE data = VALUES(data)",
            Dialect::Sqlite => " ON CONFLICT(uuid) DO UPDATE SET data = excluded.data",
        }
    }
}

/// Reject identifiers that would need quoting
pub fn validate_identifier(name: &str, what: &str) -> StorageResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidConfig(format!(
            "{what} must be 1-64 characters of [A-Za-z0-9_], got {name:?}"
        )))
    }
}
