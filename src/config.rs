use std::time::Duration;

use tracing::trace;
use url::Url;

use crate::storage::{StorageError, StorageResult};

/// Storage backend configuration
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[default]
    Memory,

    /// Relational table (MySQL, or SQLite through `url`)
    Relational(RelationalConfig),

    /// Document collection (MongoDB)
    Document(DocumentConfig),
}

#[derive(Clone, serde::Deserialize)]
pub struct RelationalConfig {
    #[serde(default = "default_mysql_host")]
    pub host: String,

    pub database: String,

    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Full connection URL, takes precedence over host/user/password
    /// (e.g. `sqlite:///var/lib/players.db?mode=rwc`)
    pub url: Option<String>,
}

impl RelationalConfig {
    /// Config for an embedded SQLite database at `path`
    pub fn sqlite(path: impl AsRef<std::path::Path>, table: impl Into<String>) -> Self {
        Self {
            host: String::new(),
            database: "main".to_string(),
            table: table.into(),
            user: String::new(),
            password: String::new(),
            url: Some(format!(
                "sqlite://{}?mode=rwc",
                path.as_ref().to_string_lossy()
            )),
        }
    }

    /// Connection URL with percent-encoded credentials
    pub fn connection_url(&self) -> StorageResult<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let mut url = Url::parse(&format!("mysql://{}", self.host))
            .map_err(|e| StorageError::InvalidConfig(format!("invalid host {:?}: {e}", self.host)))?;
        url.set_path(&format!("/{}", self.database));
        if !self.user.is_empty() {
            url.set_username(&self.user)
                .map_err(|_| StorageError::InvalidConfig("invalid user name".to_string()))?;
        }
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| StorageError::InvalidConfig("invalid password".to_string()))?;
        }

        Ok(url.to_string())
    }
}

// Debug implementation (don't leak credentials)
impl std::fmt::Debug for RelationalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalConfig")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("table", &self.table)
            .field("user", &self.user)
            .field("url", &self.url.as_ref().map(|_| "<set>"))
            .finish_non_exhaustive()
    }
}

#[derive(Clone, serde::Deserialize)]
pub struct DocumentConfig {
    pub connection_string: String,

    pub database: String,

    #[serde(default = "default_collection")]
    pub collection: String,
}

impl std::fmt::Debug for DocumentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentConfig")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

fn default_mysql_host() -> String {
    String::from("localhost:3306")
}

fn default_table() -> String {
    String::from("easyauth")
}

fn default_collection() -> String {
    String::from("players")
}

fn default_save_interval() -> u64 {
    300
}

fn default_probe_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    /// Seconds between periodic bulk saves
    #[serde(default = "default_save_interval")]
    pub save_interval_secs: u64,

    /// Upper bound for a liveness probe before reconnecting
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

impl Config {
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
