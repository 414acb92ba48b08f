pub mod accounting;
pub mod calendar;
pub mod dashboard;
pub mod db;
pub mod errors;
pub mod pipeline;
pub mod retry;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod thumbnails;
pub mod watcher;

pub use dashboard::{DashboardFeed, DashboardSnapshot};
pub use db::models::{Commit, NewCommit, UserId, UserProgress};
pub use db::{Database, DocumentStore};
pub use pipeline::{IngestController, ThumbnailEvent};
pub use settings::SettingsStore;
pub use storage::{FsObjectStore, ObjectStore};
pub use watcher::WatchController;
