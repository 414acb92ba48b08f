//! SQLite-backed document store.
//!
//! A single worker thread owns the [`rusqlite::Connection`]; async callers
//! submit closures over an mpsc channel and await the reply on a oneshot.
//! Serializing every operation through one writer is what keeps the
//! read-modify-write accounting sequence race-free, so nothing in this crate
//! opens a second connection to the same database.
//!
//! Documents live at slash-separated paths (`users/u1`,
//! `users/u1/commits/<id>`). A path with an even number of segments names a
//! document, an odd number names a collection. Change notifications fan out
//! per path, with a write to a document also notifying its parent
//! collection.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

use crate::db::helpers::{ensure_collection_path, merge_objects, parse_datetime, split_document_path};
use crate::db::migrations::run_migrations;
use crate::errors::PersistenceError;

/// Buffered change notifications per watched path. A slow subscriber that
/// overflows this simply re-reads the latest state, so the buffer only needs
/// to absorb short bursts.
const CHANGE_BUFFER: usize = 16;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join store thread: {join_err:?}");
            }
        }
    }
}

/// A document read back from the store.
#[derive(Debug, Clone)]
pub struct Document {
    /// Last path segment, assigned on append for collection members.
    pub id: String,
    /// Full document path.
    pub path: String,
    pub data: Value,
    /// When the document was first written. Collection listings keep this
    /// order, so appends read back in insertion order.
    pub created_at: DateTime<Utc>,
}

/// Storage interface the pipeline and dashboard are written against.
///
/// `watch` returns a [`ChangeStream`] rather than a snapshot stream: the
/// subscriber re-reads whatever it cares about after each notification,
/// which keeps the interface neutral about what a "snapshot" contains.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load one document, `None` if it has never been written.
    async fn get_document(&self, path: &str) -> Result<Option<Document>, PersistenceError>;

    /// Write one document. With `merge` the incoming fields are laid over
    /// the stored ones; without it the document is replaced wholesale.
    async fn set_document(
        &self,
        path: &str,
        data: Value,
        merge: bool,
    ) -> Result<(), PersistenceError>;

    /// Append a new document to a collection and return its assigned id.
    async fn append_to_collection(
        &self,
        collection: &str,
        data: Value,
    ) -> Result<String, PersistenceError>;

    /// Every document in a collection, in insertion order.
    async fn list_collection(&self, collection: &str) -> Result<Vec<Document>, PersistenceError>;

    /// Subscribe to changes of a document path or collection path.
    fn watch(&self, path: &str) -> ChangeStream;
}

/// Change notifications for one watched path.
///
/// The first [`changed`](Self::changed) call resolves immediately so a
/// subscriber always observes the current state before waiting; afterwards
/// it resolves once per write. A subscriber that falls behind is woken once
/// and reads the latest state, intermediate versions are not replayed.
pub struct ChangeStream {
    rx: broadcast::Receiver<()>,
    primed: bool,
}

impl ChangeStream {
    /// Wait for the next change. Returns `false` once the store has shut
    /// down and no further changes can happen.
    pub async fn changed(&mut self) -> bool {
        if !self.primed {
            self.primed = true;
            return true;
        }
        loop {
            match self.rx.recv().await {
                Ok(()) => return true,
                Err(broadcast::error::RecvError::Lagged(_)) => return true,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    }
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    watchers: Arc<Mutex<HashMap<String, broadcast::Sender<()>>>>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("inklog-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Document store thread shutting down");
            })
            .with_context(|| "failed to spawn document store worker thread")?;

        ready_rx
            .recv()
            .context("document store worker exited before signaling readiness")??;

        info!("Document store initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            watchers: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Run a closure on the store thread and await its result.
    pub async fn execute<F, T>(&self, op: &'static str, task: F) -> Result<T, PersistenceError>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Store caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|_| PersistenceError::StoreClosed)?;

        reply_rx
            .await
            .map_err(|_| PersistenceError::StoreClosed)?
            .map_err(|source| PersistenceError::Operation { op, source })
    }

    fn watch_path(&self, path: &str) -> ChangeStream {
        let mut watchers = self
            .watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let tx = watchers
            .entry(path.to_string())
            .or_insert_with(|| broadcast::channel(CHANGE_BUFFER).0);
        ChangeStream {
            rx: tx.subscribe(),
            primed: false,
        }
    }

    fn publish_change(&self, path: &str) {
        let watchers = self
            .watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(tx) = watchers.get(path) {
            // No live subscribers is fine.
            let _ = tx.send(());
        }
    }
}

fn row_to_document(path: String, id: String, data: String, created_at: String) -> Result<Document> {
    let data =
        serde_json::from_str(&data).with_context(|| format!("document {path} holds invalid JSON"))?;
    let created_at = parse_datetime(&created_at, "created_at")?;
    Ok(Document {
        id,
        path,
        data,
        created_at,
    })
}

#[async_trait]
impl DocumentStore for Database {
    async fn get_document(&self, path: &str) -> Result<Option<Document>, PersistenceError> {
        let doc_path = path.to_string();
        self.execute("get_document", move |conn| {
            split_document_path(&doc_path)?;
            let row = conn
                .query_row(
                    "SELECT doc_id, data, created_at FROM documents WHERE path = ?1",
                    params![doc_path],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()
                .context("failed to load document")?;

            match row {
                Some((doc_id, data, created_at)) => {
                    row_to_document(doc_path, doc_id, data, created_at).map(Some)
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn set_document(
        &self,
        path: &str,
        data: Value,
        merge: bool,
    ) -> Result<(), PersistenceError> {
        let doc_path = path.to_string();
        self.execute("set_document", move |conn| {
            let (collection, doc_id) = split_document_path(&doc_path)?;

            let next = if merge {
                let stored: Option<String> = conn
                    .query_row(
                        "SELECT data FROM documents WHERE path = ?1",
                        params![doc_path],
                        |row| row.get(0),
                    )
                    .optional()
                    .context("failed to load document for merge")?;
                match stored {
                    Some(existing) => {
                        let existing: Value = serde_json::from_str(&existing).with_context(
                            || format!("document {doc_path} holds invalid JSON"),
                        )?;
                        merge_objects(existing, data)
                    }
                    None => data,
                }
            } else {
                data
            };

            let payload = serde_json::to_string(&next).context("failed to encode document")?;
            conn.execute(
                "INSERT INTO documents (path, collection, doc_id, data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(path) DO UPDATE SET data = excluded.data",
                params![doc_path, collection, doc_id, payload, Utc::now().to_rfc3339()],
            )
            .context("failed to write document")?;
            Ok(())
        })
        .await?;

        self.publish_change(path);
        if let Some((collection, _)) = path.rsplit_once('/') {
            self.publish_change(collection);
        }
        Ok(())
    }

    async fn append_to_collection(
        &self,
        collection: &str,
        data: Value,
    ) -> Result<String, PersistenceError> {
        let doc_id = Uuid::new_v4().to_string();
        let doc_path = format!("{collection}/{doc_id}");

        let collection_for_task = collection.to_string();
        let path_for_task = doc_path.clone();
        let id_for_task = doc_id.clone();
        self.execute("append_to_collection", move |conn| {
            ensure_collection_path(&collection_for_task)?;
            let payload = serde_json::to_string(&data).context("failed to encode document")?;
            conn.execute(
                "INSERT INTO documents (path, collection, doc_id, data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    path_for_task,
                    collection_for_task,
                    id_for_task,
                    payload,
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("failed to append document")?;
            Ok(())
        })
        .await?;

        self.publish_change(&doc_path);
        self.publish_change(collection);
        Ok(doc_id)
    }

    async fn list_collection(&self, collection: &str) -> Result<Vec<Document>, PersistenceError> {
        let collection_owned = collection.to_string();
        self.execute("list_collection", move |conn| {
            ensure_collection_path(&collection_owned)?;
            let mut stmt = conn
                .prepare(
                    "SELECT path, doc_id, data, created_at FROM documents
                     WHERE collection = ?1 ORDER BY created_at ASC, rowid ASC",
                )
                .context("failed to prepare collection query")?;
            let rows = stmt
                .query_map(params![collection_owned], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .context("failed to query collection")?;

            let mut documents = Vec::new();
            for row in rows {
                let (path, doc_id, data, created_at) =
                    row.context("failed to read document row")?;
                documents.push(row_to_document(path, doc_id, data, created_at)?);
            }
            Ok(documents)
        })
        .await
    }

    fn watch(&self, path: &str) -> ChangeStream {
        self.watch_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    fn open_store() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("store.sqlite3")).unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn get_returns_none_for_unwritten_documents() {
        let (_dir, db) = open_store();
        assert!(db.get_document("users/u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (_dir, db) = open_store();
        db.set_document("users/u1", json!({"xp": 100}), false)
            .await
            .unwrap();

        let doc = db.get_document("users/u1").await.unwrap().unwrap();
        assert_eq!(doc.id, "u1");
        assert_eq!(doc.path, "users/u1");
        assert_eq!(doc.data, json!({"xp": 100}));
    }

    #[tokio::test]
    async fn merge_lays_fields_over_stored_ones() {
        let (_dir, db) = open_store();
        db.set_document("users/u1", json!({"xp": 100, "streak": 1}), false)
            .await
            .unwrap();
        db.set_document("users/u1", json!({"xp": 200}), true)
            .await
            .unwrap();

        let doc = db.get_document("users/u1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"xp": 200, "streak": 1}));
    }

    #[tokio::test]
    async fn replace_discards_stored_fields() {
        let (_dir, db) = open_store();
        db.set_document("users/u1", json!({"xp": 100, "streak": 1}), false)
            .await
            .unwrap();
        db.set_document("users/u1", json!({"xp": 200}), false)
            .await
            .unwrap();

        let doc = db.get_document("users/u1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"xp": 200}));
    }

    #[tokio::test]
    async fn append_assigns_ids_and_lists_in_insertion_order() {
        let (_dir, db) = open_store();
        let first = db
            .append_to_collection("users/u1/commits", json!({"timestamp": 1}))
            .await
            .unwrap();
        let second = db
            .append_to_collection("users/u1/commits", json!({"timestamp": 2}))
            .await
            .unwrap();
        assert_ne!(first, second);

        let docs = db.list_collection("users/u1/commits").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, first);
        assert_eq!(docs[1].id, second);
        assert_eq!(docs[0].path, format!("users/u1/commits/{first}"));
    }

    #[tokio::test]
    async fn rejects_collection_paths_where_documents_belong() {
        let (_dir, db) = open_store();
        // "users" has one segment, so it names a collection.
        assert!(db
            .set_document("users", json!({"xp": 1}), false)
            .await
            .is_err());
        // "users/u1" has two, so it names a document.
        assert!(db
            .append_to_collection("users/u1", json!({"xp": 1}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn watch_fires_immediately_then_on_each_write() {
        let (_dir, db) = open_store();
        let mut stream = db.watch("users/u1");

        // Primed: resolves before any write.
        assert!(timeout(Duration::from_secs(1), stream.changed())
            .await
            .unwrap());

        db.set_document("users/u1", json!({"xp": 100}), false)
            .await
            .unwrap();
        assert!(timeout(Duration::from_secs(1), stream.changed())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn document_writes_notify_the_parent_collection() {
        let (_dir, db) = open_store();
        let mut stream = db.watch("users/u1/commits");
        assert!(stream.changed().await);

        db.append_to_collection("users/u1/commits", json!({"timestamp": 1}))
            .await
            .unwrap();
        assert!(timeout(Duration::from_secs(1), stream.changed())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn watch_ends_when_the_store_is_dropped() {
        let (_dir, db) = open_store();
        let mut stream = db.watch("users/u1");
        assert!(stream.changed().await);

        drop(db);
        assert!(!timeout(Duration::from_secs(1), stream.changed())
            .await
            .unwrap());
    }
}
