//! Derived statistics over recorded commits.
//!
//! Everything in here is recomputed from the commit list; nothing is
//! persisted. All bucketing happens in the timezone the caller passes in,
//! which for the dashboard is the viewer's local one.

mod breakdown;
mod heatmap;

pub use breakdown::{breakdown, StatsBreakdown};
pub use heatmap::{aggregate_heatmap, HeatmapEntry};
