use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::accounting;
use crate::calendar::day_key_local;
use crate::db::models::{Commit, NewCommit, UserId};
use crate::db::repositories::{commits, progress};
use crate::db::DocumentStore;
use crate::errors::{IngestError, TransferError};
use crate::storage::{self, ObjectStore};

use super::ThumbnailEvent;

/// Consume thumbnail events until cancelled or the sender side closes.
///
/// Cancellation only interrupts the wait for the next event; an event that
/// has already been picked up runs through all stages.
pub(super) async fn ingest_loop(
    user: UserId,
    db: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
    mut events: mpsc::Receiver<ThumbnailEvent>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            // Once cancelled, queued events are abandoned rather than
            // drained.
            biased;
            _ = cancel_token.cancelled() => {
                info!("Ingest loop shutting down");
                break;
            }
            maybe_event = events.recv() => {
                match maybe_event {
                    Some(event) => {
                        match ingest_event(db.as_ref(), objects.as_ref(), &user, event).await {
                            Ok(commit) => {
                                info!("Recorded commit {} from {}", commit.id, commit.path);
                            }
                            Err(err) => error!("Ingestion dropped an event: {err:?}"),
                        }
                    }
                    None => {
                        info!("Thumbnail event channel closed, ingest loop exiting");
                        break;
                    }
                }
            }
        }
    }
}

/// Walk one event through transfer, recording, and accounting.
async fn ingest_event(
    db: &dyn DocumentStore,
    objects: &dyn ObjectStore,
    user: &UserId,
    event: ThumbnailEvent,
) -> Result<Commit, IngestError> {
    // Transfer is best-effort: a failed upload downgrades the commit to a
    // local-only thumbnail instead of aborting ingestion.
    let thumbnail_url = match transfer(objects, user, &event).await {
        Ok(url) => Some(url),
        Err(err) => {
            warn!("Thumbnail transfer failed, recording commit without remote URL: {err:?}");
            None
        }
    };

    let record = NewCommit {
        path: event.original_file.to_string_lossy().into_owned(),
        thumbnail_path: event.thumbnail_path.to_string_lossy().into_owned(),
        timestamp: event.timestamp,
        thumbnail_url,
    };
    let commit = commits::append_commit(db, user, record)
        .await
        .map_err(IngestError::Recording)?;

    let prev = progress::get_progress(db, user)
        .await
        .map_err(IngestError::Accounting)?
        .unwrap_or_default();
    let next = accounting::advance(&prev, day_key_local(event.timestamp));
    progress::set_progress(db, user, &next)
        .await
        .map_err(IngestError::Accounting)?;
    info!("Progress for {user}: xp={} streak={}", next.xp, next.streak);

    Ok(commit)
}

async fn transfer(
    objects: &dyn ObjectStore,
    user: &UserId,
    event: &ThumbnailEvent,
) -> Result<String, TransferError> {
    let file_name = event
        .thumbnail_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("thumbnail.png");
    let key = storage::thumbnail_key(user, event.timestamp, file_name);
    storage::transfer_thumbnail(objects, &key, &event.thumbnail_path).await
}
