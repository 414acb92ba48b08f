//! Error types for the ingestion pipeline.
//!
//! Each stage fails with its own type so callers can tell a recoverable
//! stumble (thumbnail transfer) from one that drops the event (persistence).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure moving a captured thumbnail into durable storage.
///
/// Non-fatal to ingestion: the commit is still recorded, with the durable
/// URL left absent.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The local thumbnail disappeared or could not be read before upload.
    #[error("thumbnail source unavailable at {path:?}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The object store rejected the upload or the durable URL could not be
    /// resolved afterwards.
    #[error("upload of {key} failed")]
    Upload {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Failure talking to the document store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The store worker has shut down and no longer accepts requests.
    #[error("document store has shut down")]
    StoreClosed,
    /// The underlying database rejected the operation.
    #[error("document store operation '{op}' failed")]
    Operation {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },
    /// A stored document no longer matches the shape the caller expects.
    #[error("document at {path} is malformed")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure attaching the filesystem listener.
///
/// Fatal to file watching only: ingestion of events from other sources keeps
/// working, and callers surface this as a disabled-feature notice.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to attach filesystem listener")]
    ListenerSetup(#[source] notify::Error),
    #[error("failed to spawn watch worker thread")]
    WorkerSpawn(#[source] io::Error),
}

/// Failure extracting a preview image from a drawing file.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("cannot read drawing file {path:?}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The file carries no embedded SQLite payload, so it is not a container
    /// format this extractor understands.
    #[error("{path:?} has no embedded SQLite payload")]
    NoSqlitePayload { path: PathBuf },
    /// The embedded database was probed but none of the known preview tables
    /// held a usable image blob.
    #[error("{path:?} has no preview image")]
    NoPreview { path: PathBuf },
    #[error("preview probe failed for {path:?}")]
    Probe {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("could not encode thumbnail {path:?}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("could not write thumbnail {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A single ingestion attempt failed after the point of no return; the event
/// is dropped and the pipeline moves on to the next one.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("commit record could not be appended")]
    Recording(#[source] PersistenceError),
    #[error("progress accounting could not be persisted")]
    Accounting(#[source] PersistenceError),
}
