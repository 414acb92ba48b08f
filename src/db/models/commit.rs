//! Commit data models.
//!
//! A commit is one recorded unit of drawing progress: a snapshot of a watched
//! artwork file together with the thumbnail captured from it.

use serde::{Deserialize, Serialize};

/// Commit payload as it is written into the document store. The store assigns
/// the document id on append, so the payload itself carries none.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCommit {
    /// Absolute path of the watched artwork file the snapshot came from.
    pub path: String,
    /// Local path of the extracted thumbnail image.
    pub thumbnail_path: String,
    /// Capture time, seconds since the Unix epoch.
    pub timestamp: i64,
    /// Durable URL of the uploaded thumbnail. Absent when the upload failed
    /// and the commit was recorded with the local copy only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// A commit as read back from the store, with its assigned document id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Commit {
    pub id: String,
    pub path: String,
    pub thumbnail_path: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl NewCommit {
    pub fn into_commit(self, id: String) -> Commit {
        Commit {
            id,
            path: self.path,
            thumbnail_path: self.thumbnail_path,
            timestamp: self.timestamp,
            thumbnail_url: self.thumbnail_url,
        }
    }
}
