//! Persisted result sets substituted for failed sources.
//!
//! Snapshots live in one directory, one JSON file per output level
//! (`national.json`, `subnational.json`, ...). The store only reads them;
//! writing is left to whoever produced the last good run.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use chrono::NaiveDate;
use hdx_model::{CellValue, OutputLevel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Provenance of one published indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCitation {
    /// Output header the citation covers.
    pub indicator: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// A previously published table for one output level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FallbackSnapshot {
    /// Column of each row holding the admin code.
    pub admin_column: String,
    pub rows: Vec<BTreeMap<String, CellValue>>,
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
}

impl FallbackSnapshot {
    pub fn new(admin_column: impl Into<String>) -> Self {
        Self {
            admin_column: admin_column.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_row<K, V>(mut self, row: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<CellValue>,
    {
        self.rows
            .push(row.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    #[must_use]
    pub fn with_source(mut self, citation: SourceCitation) -> Self {
        self.sources.push(citation);
        self
    }
}

fn snapshot_file(level: OutputLevel) -> String {
    format!("{}.json", level.as_str())
}

#[derive(Debug, Clone, Default)]
pub struct FallbackStore {
    snapshots: HashMap<OutputLevel, FallbackSnapshot>,
}

impl FallbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every `<level>.json` present in `dir`. Missing levels are not an
    /// error; a missing directory or an unreadable file is.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        ensure!(
            dir.is_dir(),
            "fallback directory {} does not exist",
            dir.display()
        );

        let mut store = Self::new();
        for level in OutputLevel::ALL {
            let path = dir.join(snapshot_file(level));
            if !path.is_file() {
                debug!(level = %level, path = %path.display(), "no fallback snapshot");
                continue;
            }
            let text = fs::read_to_string(&path)
                .with_context(|| format!("read fallback snapshot {}", path.display()))?;
            let snapshot: FallbackSnapshot = serde_json::from_str(&text)
                .with_context(|| format!("parse fallback snapshot {}", path.display()))?;
            store.insert(level, snapshot);
        }
        info!(
            dir = %dir.display(),
            levels = store.snapshots.len(),
            "fallback snapshots loaded"
        );
        Ok(store)
    }

    #[must_use]
    pub fn with_snapshot(mut self, level: OutputLevel, snapshot: FallbackSnapshot) -> Self {
        self.insert(level, snapshot);
        self
    }

    pub fn insert(&mut self, level: OutputLevel, snapshot: FallbackSnapshot) {
        self.snapshots.insert(level, snapshot);
    }

    pub fn snapshot(&self, level: OutputLevel) -> Option<&FallbackSnapshot> {
        self.snapshots.get(&level)
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Writes every held snapshot as `<level>.json` under `dir`.
    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("create fallback directory {}", dir.display()))?;
        for (level, snapshot) in &self.snapshots {
            let path = dir.join(snapshot_file(*level));
            let text = serde_json::to_string_pretty(snapshot)
                .with_context(|| format!("serialize {level} snapshot"))?;
            fs::write(&path, text)
                .with_context(|| format!("write fallback snapshot {}", path.display()))?;
        }
        Ok(())
    }
}
