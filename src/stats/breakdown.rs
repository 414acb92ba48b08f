//! Histograms of commit activity by hour, weekday, day of month and month.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

use crate::db::models::Commit;

/// Commit counts bucketed four ways. Weekdays start at Sunday, months at
/// January, and the day-of-month axis is 1-based (index 0 is the 1st).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsBreakdown {
    pub by_hour: [u32; 24],
    pub by_weekday: [u32; 7],
    pub by_month_day: [u32; 31],
    pub by_month: [u32; 12],
}

impl StatsBreakdown {
    pub fn empty() -> Self {
        Self {
            by_hour: [0; 24],
            by_weekday: [0; 7],
            by_month_day: [0; 31],
            by_month: [0; 12],
        }
    }
}

/// Bucket every commit's capture instant in `tz`.
pub fn breakdown<Tz: TimeZone>(commits: &[Commit], tz: &Tz) -> StatsBreakdown {
    let mut stats = StatsBreakdown::empty();
    for commit in commits {
        let Some(instant) = DateTime::<Utc>::from_timestamp(commit.timestamp, 0) else {
            continue;
        };
        let local = instant.with_timezone(tz);
        stats.by_hour[local.hour() as usize] += 1;
        stats.by_weekday[local.weekday().num_days_from_sunday() as usize] += 1;
        stats.by_month_day[local.day0() as usize] += 1;
        stats.by_month[local.month0() as usize] += 1;
    }
    stats
}
