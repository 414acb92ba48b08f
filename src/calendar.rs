//! Local calendar-day keys.
//!
//! Streaks, heatmaps and "today" comparisons all bucket commits by the
//! viewer's local calendar day, never the UTC day. A capture at 23:30 local
//! must not land on the next UTC day, so every consumer goes through
//! [`day_key_in`] / [`day_key_local`] instead of slicing timestamps itself.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A calendar day, rendered as `YYYY-MM-DD` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// The following calendar day, used for streak adjacency checks.
    pub fn next(&self) -> Option<DayKey> {
        self.0.succ_opt().map(DayKey)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map(DayKey)
    }
}

/// Day key for an epoch-seconds instant in the given timezone.
pub fn day_key_in<Tz: TimeZone>(timestamp_secs: i64, tz: &Tz) -> DayKey {
    let instant = DateTime::<Utc>::from_timestamp(timestamp_secs, 0).unwrap_or(DateTime::UNIX_EPOCH);
    DayKey(instant.with_timezone(tz).date_naive())
}

/// Day key for an epoch-seconds instant in the viewer's local timezone.
pub fn day_key_local(timestamp_secs: i64) -> DayKey {
    day_key_in(timestamp_secs, &Local)
}
