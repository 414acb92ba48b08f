//! User progress data model.
//!
//! One document per user holding the accumulated reward state: total XP,
//! current daily streak, and the local day of the most recent commit.

use serde::{Deserialize, Serialize};

use crate::calendar::DayKey;

/// Accumulated progress for a single user.
///
/// Serialized field names match the stored document shape, so a document
/// written by an older deployment reads back without translation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProgress {
    /// Total experience points. Only ever increases.
    #[serde(default)]
    pub xp: u64,
    /// Consecutive local days with at least one commit.
    #[serde(default)]
    pub streak: u32,
    /// Local day of the most recent commit, `None` until the first one.
    #[serde(rename = "lastCommitDate")]
    pub last_commit_day: Option<DayKey>,
}

impl UserProgress {
    /// The state a brand-new user starts from.
    pub fn zero() -> Self {
        Self::default()
    }
}
