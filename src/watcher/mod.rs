//! Filesystem watching for drawing files.
//!
//! The native watcher feeds a dedicated worker thread that filters,
//! debounces, and extracts thumbnails, then hands capture events to the
//! ingestion pipeline over a channel.

mod debounce;
mod loop_worker;

use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info, warn};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::errors::WatchError;
use crate::pipeline::ThumbnailEvent;
use crate::thumbnails::ThumbnailExtractor;

pub use debounce::Debouncer;

use loop_worker::watch_loop;

/// Owns the native watcher and the worker thread draining its events.
///
/// Restartable: calling [`start`](Self::start) again tears down the
/// previous watcher first, which is how watch-path updates are applied.
pub struct WatchController {
    watcher: Option<RecommendedWatcher>,
    worker: Option<JoinHandle<()>>,
}

impl WatchController {
    pub fn new() -> Self {
        Self {
            watcher: None,
            worker: None,
        }
    }

    /// Watch `paths` recursively, extracting thumbnails into `thumbs_dir`
    /// and forwarding capture events to `events_tx`.
    ///
    /// Paths that do not exist are skipped with a warning rather than
    /// failing the whole watcher. An empty list just tears the previous
    /// watcher down.
    pub fn start(
        &mut self,
        paths: &[PathBuf],
        debounce_window: Duration,
        thumbs_dir: PathBuf,
        events_tx: mpsc::Sender<ThumbnailEvent>,
    ) -> Result<(), WatchError> {
        self.stop();

        if paths.is_empty() {
            info!("No watch paths configured, file watching is off");
            return Ok(());
        }

        let (raw_tx, raw_rx) = std::sync::mpsc::channel();
        let mut watcher =
            RecommendedWatcher::new(raw_tx, Config::default()).map_err(WatchError::ListenerSetup)?;

        for path in paths {
            if path.exists() {
                if let Err(err) = watcher.watch(path, RecursiveMode::Recursive) {
                    warn!("Cannot watch {}: {err}", path.display());
                }
            } else {
                warn!("Watch path {} does not exist, skipping", path.display());
            }
        }

        let debouncer = Debouncer::new(debounce_window);
        let extractor = ThumbnailExtractor::new(thumbs_dir);
        let worker = thread::Builder::new()
            .name("inklog-watch".into())
            .spawn(move || watch_loop(raw_rx, debouncer, extractor, events_tx))
            .map_err(WatchError::WorkerSpawn)?;

        self.watcher = Some(watcher);
        self.worker = Some(worker);
        info!("Watching {} path(s) for drawing changes", paths.len());
        Ok(())
    }

    /// Drop the native watcher and join the worker thread.
    pub fn stop(&mut self) {
        // Dropping the watcher closes its event channel, which lets the
        // worker drain and exit.
        self.watcher = None;
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.join() {
                error!("Watch worker panicked: {err:?}");
            }
        }
    }
}

impl Drop for WatchController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_watch_list_turns_watching_off() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let mut controller = WatchController::new();

        controller
            .start(&[], Duration::from_secs(5), dir.path().join("thumbs"), tx)
            .unwrap();
        controller.stop();
    }

    #[tokio::test]
    async fn missing_paths_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let mut controller = WatchController::new();

        controller
            .start(
                &[dir.path().join("not-there")],
                Duration::from_secs(5),
                dir.path().join("thumbs"),
                tx,
            )
            .unwrap();
        controller.stop();
        // A second stop is a no-op.
        controller.stop();
    }
}
