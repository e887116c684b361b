//! Document storage backend implementation
//!
//! One document per player in a single collection:
//!
//! ```json
//! { "UUID": "...", "password": "...", "is_authenticated": false,
//!   "last_ip": "", "valid_until": 0, "last_kicked": 0 }
//! ```
//!
//! ## Bulk save
//!
//! The backend has no upsert-by-key path. `save_all` looks up which snapshot
//! identifiers already exist and issues two unordered batches: inserts of
//! `{UUID, password}` for new players and full replacements for known ones.
//! Empty batches are never submitted and a failing batch does not stop the
//! other one.
//!
//! The legacy single-record writes are not supported here.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::backend::{BatchFailure, BatchKind, PlayerStore, SaveReport};
use super::error::{StorageError, StorageResult};
use super::reconcile::{
    IS_AUTHENTICATED_FIELD, LAST_IP_FIELD, LAST_KICKED_FIELD, PASSWORD_FIELD, SavePlan,
    UUID_FIELD, VALID_UNTIL_FIELD,
};
use crate::config::DocumentConfig;
use crate::record::PlayerRecord;

/// Identifiers per `$in` lookup and statements per `update` command
///
/// Keeps every command far below the 16 MB BSON and 100,000 statement
/// limits of the server.
pub const DOCUMENT_BATCH_SIZE: usize = 1000;

/// Handles of an open session; all of them are cheap to clone
#[derive(Clone)]
struct Session {
    client: Client,
    database: Database,
    collection: Collection<Document>,
}

/// Document storage backend
pub struct DocumentBackend {
    session: RwLock<Option<Session>>,
    config: DocumentConfig,
}

impl DocumentBackend {
    /// Create a closed backend; call [`PlayerStore::connect`] to open it
    pub fn new(config: DocumentConfig) -> StorageResult<Self> {
        if config.connection_string.trim().is_empty() {
            return Err(StorageError::InvalidConfig(
                "connection string must not be empty".to_string(),
            ));
        }
        if config.database.trim().is_empty() || config.collection.trim().is_empty() {
            return Err(StorageError::InvalidConfig(
                "database and collection names must not be empty".to_string(),
            ));
        }

        Ok(Self {
            session: RwLock::new(None),
            config,
        })
    }

    async fn live(&self) -> StorageResult<Session> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(StorageError::Unavailable)
    }

    fn uuid_filter(uuid: &str) -> Document {
        doc! { UUID_FIELD: uuid }
    }

    /// Document written for a player the store has never seen
    fn insert_document(uuid: &str, record: &PlayerRecord) -> Document {
        doc! {
            UUID_FIELD: uuid,
            PASSWORD_FIELD: record.password.clone(),
        }
    }

    /// Full replacement for a stored player
    fn replace_document(uuid: &str, record: &PlayerRecord) -> Document {
        doc! {
            UUID_FIELD: uuid,
            PASSWORD_FIELD: record.password.clone(),
            IS_AUTHENTICATED_FIELD: record.is_authenticated,
            LAST_IP_FIELD: record.last_ip.clone(),
            VALID_UNTIL_FIELD: record.valid_until,
            LAST_KICKED_FIELD: record.last_kicked,
        }
    }

    /// Relaxed extended JSON, the representation handed to callers
    fn render(document: Document) -> String {
        Bson::Document(document).into_relaxed_extjson().to_string()
    }

    /// Identifiers from `uuids` that already have a document
    async fn known_uuids(
        collection: &Collection<Document>,
        uuids: &[&str],
    ) -> StorageResult<HashSet<String>> {
        let mut known = HashSet::new();

        for chunk in uuids.chunks(DOCUMENT_BATCH_SIZE) {
            let mut cursor = collection
                .find(doc! { UUID_FIELD: { "$in": chunk.to_vec() } })
                .projection(doc! { UUID_FIELD: 1, "_id": 0 })
                .await?;

            while let Some(document) = cursor.try_next().await? {
                if let Ok(uuid) = document.get_str(UUID_FIELD) {
                    known.insert(uuid.to_string());
                }
            }
        }
        Ok(known)
    }

    async fn insert_batch(
        collection: &Collection<Document>,
        inserts: &[(&str, &PlayerRecord)],
    ) -> StorageResult<usize> {
        let documents: Vec<Document> = inserts
            .iter()
            .map(|(uuid, record)| Self::insert_document(uuid, record))
            .collect();

        let result = collection.insert_many(documents).ordered(false).await?;
        Ok(result.inserted_ids.len())
    }

    /// `update` commands replacing every entry, at most
    /// [`DOCUMENT_BATCH_SIZE`] statements each
    fn replace_commands(collection: &str, replaces: &[(&str, &PlayerRecord)]) -> Vec<Document> {
        replaces
            .chunks(DOCUMENT_BATCH_SIZE)
            .map(|chunk| {
                let updates: Vec<Document> = chunk
                    .iter()
                    .map(|(uuid, record)| {
                        doc! {
                            "q": Self::uuid_filter(uuid),
                            "u": Self::replace_document(uuid, record),
                            "upsert": false,
                        }
                    })
                    .collect();

                doc! {
                    "update": collection,
                    "updates": updates,
                    "ordered": false,
                }
            })
            .collect()
    }

    /// Run the replace commands; every command is attempted
    ///
    /// Returns the number of replaced documents, or the first error.
    async fn replace_batch(
        database: &Database,
        collection: &Collection<Document>,
        replaces: &[(&str, &PlayerRecord)],
    ) -> StorageResult<usize> {
        let commands = Self::replace_commands(collection.name(), replaces);
        let total = commands.len();
        let mut replaced = 0;
        let mut first_error = None;

        let chunks = replaces.chunks(DOCUMENT_BATCH_SIZE);
        for (command, chunk) in commands.into_iter().zip(chunks) {
            let outcome = match database.run_command(command).await {
                Ok(response) => write_outcome(&response),
                Err(e) => Err(e.into()),
            };
            match outcome {
                Ok(()) => replaced += chunk.len(),
                Err(e) => {
                    debug!("replace command failed: {e}");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            None => Ok(replaced),
            Some(e) => Err(StorageError::QueryFailed(format!(
                "{replaced} of {} replacement(s) written in {total} command(s): {e}",
                replaces.len()
            ))),
        }
    }
}

/// Check a write command response for per-statement and write concern errors
fn write_outcome(response: &Document) -> StorageResult<()> {
    if let Ok(errors) = response.get_array("writeErrors")
        && let Some(first) = errors.first()
    {
        return Err(StorageError::QueryFailed(format!(
            "{} write error(s), first: {first}",
            errors.len()
        )));
    }

    if let Ok(concern) = response.get_document("writeConcernError") {
        return Err(StorageError::QueryFailed(format!("write concern error: {concern}")));
    }

    Ok(())
}

#[async_trait]
impl PlayerStore for DocumentBackend {
    fn kind(&self) -> &'static str {
        "document"
    }

    #[instrument(skip(self), fields(database = %self.config.database))]
    async fn connect(&self) -> StorageResult<()> {
        debug!("connecting to document store");

        let client = Client::with_uri_str(&self.config.connection_string)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        let database = client.database(&self.config.database);

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let collection = database.collection::<Document>(&self.config.collection);
        let index = IndexModel::builder()
            .keys(doc! { UUID_FIELD: 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collection.create_index(index).await.map_err(|e| {
            StorageError::ConnectionFailed(format!("failed creating {UUID_FIELD} index: {e}"))
        })?;

        let previous = self.session.write().await.replace(Session {
            client,
            database,
            collection,
        });
        if let Some(previous) = previous {
            previous.client.shutdown().await;
        }

        info!("document backend connected");
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        let session = self.session.write().await.take();
        if let Some(session) = session {
            session.client.shutdown().await;
            info!("database connection closed successfully");
        }
        Ok(())
    }

    async fn is_closed(&self) -> bool {
        self.session.read().await.is_none()
    }

    async fn ping(&self) -> StorageResult<()> {
        let session = self.live().await?;
        session.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn is_registered(&self, uuid: &str) -> StorageResult<bool> {
        let session = self.live().await?;
        let found = session
            .collection
            .find_one(Self::uuid_filter(uuid))
            .projection(doc! { "_id": 1 })
            .await?;
        Ok(found.is_some())
    }

    async fn fetch(&self, uuid: &str) -> StorageResult<Option<String>> {
        let session = self.live().await?;
        let found = session
            .collection
            .find_one(Self::uuid_filter(uuid))
            .await?;
        Ok(found.map(Self::render))
    }

    async fn delete(&self, uuid: &str) -> StorageResult<()> {
        let session = self.live().await?;
        let result = session
            .collection
            .delete_one(Self::uuid_filter(uuid))
            .await?;
        debug!("deleted {} document(s) for {uuid}", result.deleted_count);
        Ok(())
    }

    async fn insert_legacy(&self, _uuid: &str, _data: &str) -> StorageResult<bool> {
        Err(StorageError::Unsupported("register_user"))
    }

    async fn update_legacy(&self, _uuid: &str, _data: &str) -> StorageResult<()> {
        Err(StorageError::Unsupported("update_user_data"))
    }

    #[instrument(skip(self))]
    async fn fetch_all(&self) -> StorageResult<HashMap<String, String>> {
        let session = self.live().await?;
        let mut cursor = session.collection.find(doc! {}).await?;

        let mut records = HashMap::new();
        while let Some(document) = cursor.try_next().await? {
            let Ok(uuid) = document.get_str(UUID_FIELD).map(str::to_string) else {
                debug!("skipping document without {UUID_FIELD}");
                continue;
            };
            records.insert(uuid, Self::render(document));
        }

        debug!("loaded {} documents", records.len());
        Ok(records)
    }

    #[instrument(skip(self, snapshot), fields(count = snapshot.len()))]
    async fn save_all(
        &self,
        snapshot: &HashMap<String, PlayerRecord>,
    ) -> StorageResult<SaveReport> {
        let session = self.live().await?;

        if snapshot.is_empty() {
            return Ok(SaveReport::default());
        }

        let uuids: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        let known = Self::known_uuids(&session.collection, &uuids).await?;
        let plan = SavePlan::partition(snapshot, &known);
        let mut report = SaveReport::default();

        if !plan.inserts.is_empty() {
            match Self::insert_batch(&session.collection, &plan.inserts).await {
                Ok(inserted) => report.inserted = inserted,
                Err(error) => report.failures.push(BatchFailure {
                    batch: BatchKind::Insert,
                    error,
                }),
            }
        }

        if !plan.replaces.is_empty() {
            match Self::replace_batch(&session.database, &session.collection, &plan.replaces)
                .await
            {
                Ok(replaced) => report.replaced = replaced,
                Err(error) => report.failures.push(BatchFailure {
                    batch: BatchKind::Replace,
                    error,
                }),
            }
        }

        debug!(
            inserted = report.inserted,
            replaced = report.replaced,
            failed = report.failures.len(),
            "document save complete"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for DocumentBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBackend")
            .field("database", &self.config.database)
            .field("collection", &self.config.collection)
            .finish_non_exhaustive()
    }
}
