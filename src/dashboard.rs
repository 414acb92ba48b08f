//! Live dashboard state.
//!
//! One background task subscribes to the progress document and the commit
//! collection, and republishes a full [`DashboardSnapshot`] on every change
//! through a watch channel. Consumers read the latest snapshot or await
//! changes; stopping the feed cancels the subscription.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use log::{error, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::calendar::DayKey;
use crate::db::models::{Commit, UserId, UserProgress};
use crate::db::repositories::{commits, progress};
use crate::db::DocumentStore;
use crate::retry::RetryPolicy;
use crate::stats::{aggregate_heatmap, breakdown, HeatmapEntry, StatsBreakdown};

/// Everything the dashboard renders, derived from one read of the store.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub xp: u64,
    pub streak: u32,
    pub last_commit_day: Option<DayKey>,
    /// Newest capture first.
    pub commits: Vec<Commit>,
    pub heatmap: Vec<HeatmapEntry>,
    pub breakdown: StatsBreakdown,
}

impl DashboardSnapshot {
    fn build(state: UserProgress, commits: Vec<Commit>) -> Self {
        let heatmap = aggregate_heatmap(&commits, &Local);
        let histograms = breakdown(&commits, &Local);
        Self {
            xp: state.xp,
            streak: state.streak,
            last_commit_day: state.last_commit_day,
            commits,
            heatmap,
            breakdown: histograms,
        }
    }
}

/// Cancellable handle on the snapshot stream.
pub struct DashboardFeed {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    snapshots: watch::Receiver<DashboardSnapshot>,
}

impl DashboardFeed {
    /// Load the initial snapshot and start following changes.
    ///
    /// The initial reads go through the bounded retry policy; a store that
    /// stays unreachable fails the feed instead of serving nothing.
    pub async fn start(db: Arc<dyn DocumentStore>, user: UserId) -> Result<Self> {
        let retry = RetryPolicy::default();
        let initial_state = retry
            .run("initial progress fetch", || {
                progress::ensure_progress(db.as_ref(), &user)
            })
            .await
            .context("could not load progress state")?;
        let initial_commits = retry
            .run("initial commit fetch", || {
                commits::list_commits(db.as_ref(), &user)
            })
            .await
            .context("could not load commit history")?;

        let (tx, rx) = watch::channel(DashboardSnapshot::build(initial_state, initial_commits));
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(feed_loop(db, user, tx, cancel_token.clone()));

        Ok(Self {
            handle: Some(handle),
            cancel_token: Some(cancel_token),
            snapshots: rx,
        })
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver observing every subsequently published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshots.clone()
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            handle.await.context("dashboard feed task failed to join")?;
        }
        Ok(())
    }
}

async fn feed_loop(
    db: Arc<dyn DocumentStore>,
    user: UserId,
    tx: watch::Sender<DashboardSnapshot>,
    cancel_token: CancellationToken,
) {
    let mut progress_changes = progress::watch_progress(db.as_ref(), &user);
    let mut commit_changes = commits::watch_commits(db.as_ref(), &user);

    loop {
        tokio::select! {
            // Once cancelled, pending change notifications are dropped
            // rather than republished.
            biased;
            _ = cancel_token.cancelled() => {
                info!("Dashboard feed shutting down");
                break;
            }
            alive = progress_changes.changed() => {
                if !alive {
                    info!("Progress change stream closed, dashboard feed exiting");
                    break;
                }
                refresh(db.as_ref(), &user, &tx).await;
            }
            alive = commit_changes.changed() => {
                if !alive {
                    info!("Commit change stream closed, dashboard feed exiting");
                    break;
                }
                refresh(db.as_ref(), &user, &tx).await;
            }
        }
    }
}

/// Re-read everything and publish. A failed read keeps the previous
/// snapshot in place until the next change.
async fn refresh(db: &dyn DocumentStore, user: &UserId, tx: &watch::Sender<DashboardSnapshot>) {
    let state = match progress::get_progress(db, user).await {
        Ok(state) => state.unwrap_or_default(),
        Err(err) => {
            error!("Dashboard progress refresh failed: {err:?}");
            return;
        }
    };
    let commit_list = match commits::list_commits(db, user).await {
        Ok(list) => list,
        Err(err) => {
            error!("Dashboard commit refresh failed: {err:?}");
            return;
        }
    };
    tx.send_replace(DashboardSnapshot::build(state, commit_list));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::day_key_local;
    use crate::db::models::NewCommit;
    use crate::db::Database;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn open_feed() -> (tempfile::TempDir, Arc<dyn DocumentStore>, DashboardFeed) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("store.sqlite3")).unwrap();
        let db: Arc<dyn DocumentStore> = Arc::new(db);
        let feed = DashboardFeed::start(db.clone(), UserId::new("u1"))
            .await
            .unwrap();
        (dir, db, feed)
    }

    async fn wait_until(
        rx: &mut watch::Receiver<DashboardSnapshot>,
        pred: impl Fn(&DashboardSnapshot) -> bool,
    ) -> DashboardSnapshot {
        timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = rx.borrow().clone();
                if pred(&snapshot) {
                    return snapshot;
                }
                rx.changed().await.expect("feed closed while waiting");
            }
        })
        .await
        .expect("snapshot condition not reached")
    }

    #[tokio::test]
    async fn starts_with_zero_state_for_new_users() {
        let (_dir, _db, mut feed) = open_feed().await;

        let snapshot = feed.snapshot();
        assert_eq!(snapshot.xp, 0);
        assert_eq!(snapshot.streak, 0);
        assert!(snapshot.last_commit_day.is_none());
        assert!(snapshot.commits.is_empty());
        assert!(snapshot.heatmap.is_empty());

        feed.stop().await.unwrap();
    }

    #[tokio::test]
    async fn republishes_after_store_writes() {
        let (_dir, db, mut feed) = open_feed().await;
        let user = UserId::new("u1");
        let now = chrono::Utc::now().timestamp();

        commits::append_commit(
            db.as_ref(),
            &user,
            NewCommit {
                path: "/art/piece.clip".into(),
                thumbnail_path: "/thumbs/piece_1.png".into(),
                timestamp: now,
                thumbnail_url: None,
            },
        )
        .await
        .unwrap();
        progress::set_progress(
            db.as_ref(),
            &user,
            &UserProgress {
                xp: 100,
                streak: 1,
                last_commit_day: Some(day_key_local(now)),
            },
        )
        .await
        .unwrap();

        let mut rx = feed.subscribe();
        let snapshot = wait_until(&mut rx, |snap| snap.xp == 100 && snap.commits.len() == 1).await;
        assert_eq!(snapshot.streak, 1);
        assert_eq!(snapshot.heatmap.len(), 1);
        assert_eq!(snapshot.heatmap[0].day, day_key_local(now));
        assert_eq!(snapshot.heatmap[0].count, 1);

        feed.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stopping_closes_the_snapshot_stream() {
        let (_dir, _db, mut feed) = open_feed().await;
        let mut rx = feed.subscribe();

        feed.stop().await.unwrap();
        // A startup-primed refresh may have published before the cancel
        // won; changed() reports that unseen snapshot before it reports
        // the dropped sender, so mark it seen first.
        let _ = rx.borrow_and_update();
        assert!(rx.changed().await.is_err());
    }
}
