//! Durable per-phase progress records
//!
//! Each phase of a run owns one checkpoint file under
//! `<results_dir>/<run_id>/`. Saves are full-file overwrites (temp file +
//! rename), which keeps the store trivially consistent: a reader sees either
//! the old checkpoint or the new one, never a partial write.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The checkpointed phases, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Ingest,
    Search,
    Evaluate,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Ingest => "ingest",
            Phase::Search => "search",
            Phase::Evaluate => "evaluate",
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            Phase::Ingest => "ingest_checkpoint.json",
            Phase::Search => "search_checkpoint.json",
            Phase::Evaluate => "evaluate_checkpoint.json",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a result row by the dataset item that produced it.
pub trait ItemKeyed {
    fn item_id(&self) -> &str;
}

impl ItemKeyed for String {
    fn item_id(&self) -> &str {
        self
    }
}

/// Progress record for one phase of one run.
///
/// `last_processed_index` only ever increases; a fresh checkpoint starts at
/// -1 so the first item to process is always `last_processed_index + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint<T> {
    pub run_id: String,
    pub provider: String,
    pub phase: Phase,
    pub total_items: usize,
    pub last_processed_index: i64,
    pub results: Vec<T>,
    pub updated_at: DateTime<Utc>,
}

impl<T> Checkpoint<T> {
    pub fn new(run_id: &str, provider: &str, phase: Phase, total_items: usize) -> Self {
        Self {
            run_id: run_id.to_string(),
            provider: provider.to_string(),
            phase,
            total_items,
            last_processed_index: -1,
            results: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Index the next pass over the items should start from.
    pub fn resume_index(&self) -> usize {
        (self.last_processed_index + 1) as usize
    }

    /// Whether every item index has been processed at least once.
    pub fn is_complete(&self) -> bool {
        self.last_processed_index + 1 >= self.total_items as i64
    }

    /// Record that `index` has been processed. Monotonic: an index at or
    /// below the current watermark leaves it unchanged.
    pub fn advance_to(&mut self, index: usize) {
        if index as i64 > self.last_processed_index {
            self.last_processed_index = index as i64;
        }
        self.updated_at = Utc::now();
    }
}

impl<T: ItemKeyed> Checkpoint<T> {
    /// Gap-tolerant skip check for phases keyed by item identity.
    ///
    /// Earlier partial runs may have failed mid-batch and left gaps, so
    /// identity-keyed phases cannot rely on the sequential watermark alone.
    pub fn should_skip(&self, item_id: &str) -> bool {
        self.results.iter().any(|r| r.item_id() == item_id)
    }
}

/// File-backed checkpoint and report storage for one run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Open (creating if needed) the storage directory for a run.
    pub fn new(results_dir: &Path, run_id: &str) -> Result<Self> {
        let dir = results_dir.join(run_id);
        std::fs::create_dir_all(&dir).map_err(|e| {
            Error::Storage(format!(
                "Failed to create run directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    pub fn run_dir(&self) -> &Path {
        &self.dir
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join("report.json")
    }

    fn path(&self, phase: Phase) -> PathBuf {
        self.dir.join(phase.file_name())
    }

    /// Load the checkpoint for a phase, if one has been saved.
    pub fn load<T: DeserializeOwned>(&self, phase: Phase) -> Result<Option<Checkpoint<T>>> {
        let path = self.path(phase);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        let checkpoint = serde_json::from_str(&content)?;
        Ok(Some(checkpoint))
    }

    /// Persist a checkpoint, replacing any previous save for its phase.
    pub fn save<T: Serialize>(&self, checkpoint: &Checkpoint<T>) -> Result<()> {
        let path = self.path(checkpoint.phase);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(checkpoint)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}
