//! Contribution-style heatmap: commits per local calendar day.

use std::collections::BTreeMap;

use crate::calendar::{day_key_in, DayKey};
use crate::db::models::Commit;
use chrono::TimeZone;

/// One cell of the heatmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatmapEntry {
    pub day: DayKey,
    pub count: u32,
}

/// Commit counts per calendar day in `tz`, ascending by day.
///
/// Recomputing from the same commit list always yields the same entries, so
/// callers can rebuild the heatmap on every change notification without
/// drift.
pub fn aggregate_heatmap<Tz: TimeZone>(commits: &[Commit], tz: &Tz) -> Vec<HeatmapEntry> {
    let mut counts: BTreeMap<DayKey, u32> = BTreeMap::new();
    for commit in commits {
        *counts.entry(day_key_in(commit.timestamp, tz)).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(day, count)| HeatmapEntry { day, count })
        .collect()
}
