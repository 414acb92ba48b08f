use std::sync::mpsc::Receiver;
use std::time::Instant;

use log::{error, info, warn};
use notify::Event;
use tokio::sync::mpsc;

use crate::pipeline::ThumbnailEvent;
use crate::thumbnails::ThumbnailExtractor;

use super::debounce::Debouncer;

/// File extensions that are drawing containers worth capturing.
const WATCHED_EXTENSIONS: &[&str] = &["clip"];

/// Drain native filesystem events until the watcher (sender side) is
/// dropped or the ingestion side stops listening.
///
/// Runs on a dedicated thread: extraction reads whole drawing files and
/// pokes at an embedded database, which has no business on the async
/// runtime.
pub(super) fn watch_loop(
    raw_events: Receiver<notify::Result<Event>>,
    mut debouncer: Debouncer,
    mut extractor: ThumbnailExtractor,
    events_tx: mpsc::Sender<ThumbnailEvent>,
) {
    for result in raw_events {
        match result {
            Ok(event) => {
                for path in event.paths {
                    let watched = path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .map(|ext| WATCHED_EXTENSIONS.contains(&ext))
                        .unwrap_or(false);
                    if !watched {
                        continue;
                    }
                    if !debouncer.accept(&path, Instant::now()) {
                        continue;
                    }

                    info!("Detected change in {}", path.display());
                    match extractor.extract(&path) {
                        Ok(Some(captured)) => {
                            let event = ThumbnailEvent {
                                original_file: path.clone(),
                                thumbnail_path: captured.thumbnail_path,
                                timestamp: captured.timestamp,
                            };
                            if events_tx.blocking_send(event).is_err() {
                                info!("Ingestion side closed, watch loop exiting");
                                return;
                            }
                        }
                        Ok(None) => {
                            info!("Preview unchanged for {}, skipping", path.display());
                        }
                        Err(err) => {
                            warn!(
                                "Thumbnail extraction failed for {}: {err:?}",
                                path.display()
                            );
                        }
                    }
                }
            }
            Err(err) => error!("Filesystem watch error: {err}"),
        }
    }
    info!("Watch loop exiting");
}
