/*!
 * Queue data model: files, their rows, and run bookkeeping.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Translation status for individual rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Row awaiting translation
    Pending,
    /// Row is part of the batch in flight
    Processing,
    /// Row translated (or imported) successfully
    Done,
    /// Row filled from translation memory
    Cached,
    /// Last attempt failed; eligible for retry
    Failed,
}

impl ItemStatus {
    /// Done or Cached
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Done | Self::Cached)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "pending"),
            ItemStatus::Processing => write!(f, "processing"),
            ItemStatus::Done => write!(f, "done"),
            ItemStatus::Cached => write!(f, "cached"),
            ItemStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ItemStatus::Pending),
            "processing" => Ok(ItemStatus::Processing),
            "done" => Ok(ItemStatus::Done),
            "cached" => Ok(ItemStatus::Cached),
            "failed" => Ok(ItemStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid item status: {}", s)),
        }
    }
}

/// Processing status of a queued file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Pending => write!(f, "pending"),
            FileStatus::Processing => write!(f, "processing"),
            FileStatus::Done => write!(f, "done"),
            FileStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for FileStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(FileStatus::Pending),
            "processing" => Ok(FileStatus::Processing),
            "done" => Ok(FileStatus::Done),
            "error" => Ok(FileStatus::Error),
            _ => Err(anyhow::anyhow!("Invalid file status: {}", s)),
        }
    }
}

/// State of one orchestrator run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Stopped,
    Completed,
}

/// One row to translate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationItem {
    /// 1-based data row ordinal, unique within the file
    pub id: usize,
    pub key: String,
    pub source: String,
    pub target: Option<String>,
    pub status: ItemStatus,
    /// 0-100, set when the target came from a backend or translation memory
    pub confidence: Option<u8>,
    pub critique: Option<String>,
    pub is_edited: bool,
}

impl TranslationItem {
    /// Build an item from a parsed row
    ///
    /// Rows that already carry a target, and rows with nothing to translate,
    /// start out Done.
    pub fn from_row(id: usize, key: String, source: String, target: Option<String>) -> Self {
        let status = if target.is_some() || source.trim().is_empty() {
            ItemStatus::Done
        } else {
            ItemStatus::Pending
        };
        let target = match (target, status) {
            (None, ItemStatus::Done) => Some(String::new()),
            (target, _) => target,
        };

        Self {
            id,
            key,
            source,
            target,
            status,
            confidence: None,
            critique: None,
            is_edited: false,
        }
    }

    /// Whether the orchestrator should still send this row to a backend
    pub fn needs_translation(&self) -> bool {
        matches!(
            self.status,
            ItemStatus::Pending | ItemStatus::Processing | ItemStatus::Failed
        )
    }

    /// Existing non-empty target that a backend should validate rather than replace
    pub fn validation_target(&self) -> Option<&str> {
        self.target.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// One queued unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub status: FileStatus,
    /// 0-100
    pub progress: u8,
    pub total_items: usize,
    pub completed_items: usize,
    /// SHA-256 of the ingested text, used to detect re-ingestion of the same file
    pub source_hash: String,
    /// Language the file is being translated into; empty until enqueued
    pub target_language: String,
}

impl FileEntry {
    /// Create a pending entry for freshly parsed items
    pub fn new(name: impl Into<String>, source_hash: impl Into<String>, items: &[TranslationItem]) -> Self {
        let mut entry = Self {
            name: name.into(),
            status: FileStatus::Pending,
            progress: 0,
            total_items: 0,
            completed_items: 0,
            source_hash: source_hash.into(),
            target_language: String::new(),
        };
        entry.refresh_progress(items);
        entry
    }

    pub fn with_target_language(mut self, target_language: impl Into<String>) -> Self {
        self.target_language = target_language.into();
        self
    }

    /// Recompute counters from the file's items
    pub fn refresh_progress(&mut self, items: &[TranslationItem]) {
        self.total_items = items.len();
        self.completed_items = items.iter().filter(|i| i.status.is_complete()).count();
        self.progress = if self.total_items == 0 {
            100
        } else {
            ((self.completed_items * 100) / self.total_items) as u8
        };
    }

    /// Terminal status once every item has been attempted
    pub fn settle(&mut self, items: &[TranslationItem]) {
        self.refresh_progress(items);
        self.status = if items.iter().all(|i| i.status.is_complete()) {
            FileStatus::Done
        } else {
            FileStatus::Error
        };
    }

    /// Number of failed items, shown as the file's error badge
    pub fn failed_count(items: &[TranslationItem]) -> usize {
        items.iter().filter(|i| i.status == ItemStatus::Failed).count()
    }
}

/// Totals for one orchestrator run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub files_done: usize,
    pub files_error: usize,
    pub items_translated: usize,
    pub items_cached: usize,
    pub items_failed: usize,
    pub backend_calls: usize,
    pub transport_errors: usize,
    pub rate_limit_hits: usize,
}
