use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::sync::mpsc;

use inklog::{
    Database, DashboardFeed, DocumentStore, FsObjectStore, IngestController, ObjectStore,
    SettingsStore, UserId, WatchController,
};

/// Buffered capture events between the watcher thread and the pipeline.
const EVENT_BUFFER: usize = 64;

fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("INKLOG_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|base| base.join("inklog"))
        .context("no data directory available; set INKLOG_DATA_DIR")
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("inklog starting up...");

    let data_dir = data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let database = Database::new(data_dir.join("inklog.sqlite3"))?;
    let settings = SettingsStore::new(data_dir.join("settings.json"))?;
    let user = UserId::new(std::env::var("INKLOG_USER").unwrap_or_else(|_| "local".into()));

    let db: Arc<dyn DocumentStore> = Arc::new(database);
    let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(data_dir.join("objects")));

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

    let mut pipeline = IngestController::new();
    pipeline
        .start(user.clone(), db.clone(), objects, events_rx)
        .await?;

    let mut feed = DashboardFeed::start(db.clone(), user.clone()).await?;
    let mut snapshots = feed.subscribe();
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow().clone();
            info!(
                "Dashboard: xp={} streak={} commits={}",
                snapshot.xp,
                snapshot.streak,
                snapshot.commits.len()
            );
        }
    });

    let mut watch = WatchController::new();
    if let Err(err) = watch.start(
        &settings.watch_paths(),
        Duration::from_secs(settings.snapshot_interval()),
        data_dir.join("thumbnails"),
        events_tx.clone(),
    ) {
        // The rest of the pipeline still works; only automatic capture
        // is off.
        warn!("File watching disabled: {err}");
    }

    info!("Tracking progress for {user}; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for Ctrl-C")?;
    info!("Shutting down");

    watch.stop();
    pipeline.stop().await?;
    feed.stop().await?;

    Ok(())
}
