//! Commit ingestion pipeline.
//!
//! One worker task per user consumes thumbnail events and walks each one
//! through transfer, recording, and accounting. Events are handled strictly
//! in arrival order, so the accounting read-modify-write cannot interleave
//! with itself for a given user; that ordering, together with the
//! single-writer document store, is what makes XP totals exact.

mod loop_worker;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::models::UserId;
use crate::db::repositories::progress;
use crate::db::DocumentStore;
use crate::retry::RetryPolicy;
use crate::storage::ObjectStore;

use loop_worker::ingest_loop;

/// One captured-thumbnail notification from the file watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailEvent {
    /// The watched drawing file that changed.
    pub original_file: PathBuf,
    /// Where the extracted thumbnail landed on local disk.
    pub thumbnail_path: PathBuf,
    /// Capture time, seconds since the Unix epoch.
    pub timestamp: i64,
}

pub struct IngestController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl IngestController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    /// Start consuming thumbnail events for `user`.
    ///
    /// The initial progress read goes through the bounded retry policy and
    /// creates the zero-value document for a first-time user. If it still
    /// fails after the retries the store is unusable and startup fails.
    pub async fn start(
        &mut self,
        user: UserId,
        db: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        events: mpsc::Receiver<ThumbnailEvent>,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("ingestion already active");
        }

        let starting = RetryPolicy::default()
            .run("initial progress fetch", || {
                progress::ensure_progress(db.as_ref(), &user)
            })
            .await
            .context("could not load initial progress state")?;
        info!(
            "Ingestion starting for {user}: xp={} streak={}",
            starting.xp, starting.streak
        );

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(ingest_loop(
            user,
            db,
            objects,
            events,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Stop the worker. In-flight event handling runs to completion; only
    /// waiting for the next event is interrupted.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("ingest loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}
