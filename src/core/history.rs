use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Safety ceiling on stored entries (a day of 5-minute samples).
pub const MAX_ENTRIES: usize = 288;
/// Entries older than this, relative to the latest write, are dropped.
pub const RETENTION_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub session_utilization: f64,
    pub weekly_utilization: f64,
}

/// Keep entries inside the retention window ending at `now`, then the newest
/// `MAX_ENTRIES` of those.
pub fn prune(entries: &mut Vec<HistoryEntry>, now: DateTime<Utc>) {
    let cutoff = now - Duration::hours(RETENTION_HOURS);
    entries.retain(|e| e.timestamp > cutoff);
    if entries.len() > MAX_ENTRIES {
        let excess = entries.len() - MAX_ENTRIES;
        entries.drain(..excess);
    }
}

/// Best-effort trend store backed by a single JSON file.
///
/// Reads never fail (a missing or corrupt file reads as empty). Writes go to a
/// sibling temp file that is renamed over the target, so readers never see a
/// partial file.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Vec<HistoryEntry> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    pub fn record(&self, session: f64, weekly: f64) -> Result<()> {
        self.record_at(Utc::now(), session, weekly)
    }

    pub fn record_at(&self, now: DateTime<Utc>, session: f64, weekly: f64) -> Result<()> {
        let mut entries = self.load();
        entries.push(HistoryEntry {
            timestamp: now,
            session_utilization: session,
            weekly_utilization: weekly,
        });
        prune(&mut entries, now);
        self.write(&entries)
    }

    /// Replace the stored sequence with `entries`.
    pub fn write(&self, entries: &[HistoryEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create history directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string(entries).context("Failed to serialize usage history")?;

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        std::fs::write(&temp_path, json)
            .with_context(|| format!("Failed to write temp history file: {}", temp_path.display()))?;
        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to replace history file: {}", self.path.display()))?;
        Ok(())
    }

    pub fn session_series(&self) -> Vec<f64> {
        self.series().0
    }

    pub fn weekly_series(&self) -> Vec<f64> {
        self.series().1
    }

    /// Session and weekly projections in stored order, from a single read.
    pub fn series(&self) -> (Vec<f64>, Vec<f64>) {
        self.load()
            .iter()
            .map(|e| (e.session_utilization, e.weekly_utilization))
            .unzip()
    }
}
