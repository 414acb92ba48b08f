use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

/// Watcher configuration, kept as a local JSON file next to the database.
///
/// Field names match the synchronized settings document of older
/// deployments, so an exported settings file drops in unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    /// Directories (or single files) watched for drawing changes.
    pub watch_paths: Vec<PathBuf>,
    /// Seconds between accepted captures of the same file.
    pub snapshot_interval: u64,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            watch_paths: Vec::new(),
            snapshot_interval: 5,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn watch_paths(&self) -> Vec<PathBuf> {
        self.data.read().unwrap().watch_paths.clone()
    }

    pub fn snapshot_interval(&self) -> u64 {
        self.data.read().unwrap().snapshot_interval
    }

    pub fn update_watch_paths(&self, paths: Vec<PathBuf>) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.watch_paths = paths;
            self.persist(&guard)?;
        }
        Ok(())
    }

    pub fn update_snapshot_interval(&self, seconds: u64) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.snapshot_interval = seconds.max(1);
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
