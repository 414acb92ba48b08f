//! Per-path event debouncing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Suppresses bursts of change notifications per watched file.
///
/// Editors fire several filesystem events for one save; only the first
/// event inside the window goes through.
pub struct Debouncer {
    window: Duration,
    last_processed: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_processed: HashMap::new(),
        }
    }

    /// Whether an event for `path` observed at `now` should be processed.
    pub fn accept(&mut self, path: &Path, now: Instant) -> bool {
        if let Some(last) = self.last_processed.get(path) {
            if now.duration_since(*last) < self.window {
                return false;
            }
        }
        self.last_processed.insert(path.to_path_buf(), now);
        true
    }
}
