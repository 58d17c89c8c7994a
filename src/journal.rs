//! A local step log for template apply.
//!
//! Google gives us no transaction across the duplicate, delete, duplicate and write calls of an
//! apply. The journal records how far each target got so that a later run can finish a target
//! whose original worksheet was already deleted, instead of starting over and losing track of the
//! backup. There is one file per spreadsheet: `$GSHEETX_HOME/journal/{spreadsheet_id}.json`.

use crate::error::Res;
use crate::model::{InputMode, RenderMode};
use crate::utils;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How far a target got. Phases are ordered.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The backup worksheet exists. The original may still exist.
    BackedUp,
    /// The original worksheet has been deleted. Its data lives only in the backup.
    OriginalDeleted,
    /// The template copy exists under the original title and holds the data. Only the optional
    /// backup deletion is left.
    Restored,
}

serde_plain::derive_display_from_serialize!(Phase);

/// One target in flight.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub target: String,
    pub template: String,
    pub backup: String,
    pub original_index: usize,
    pub render: RenderMode,
    pub input: InputMode,
    pub delete_backup: bool,
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct JournalFile {
    spreadsheet_id: String,
    entries: Vec<JournalEntry>,
}

/// The journal for one spreadsheet.
#[derive(Debug, Clone)]
pub struct Journal {
    spreadsheet_id: String,
    path: PathBuf,
}

impl Journal {
    pub fn new(dir: impl AsRef<Path>, spreadsheet_id: &str) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.to_string(),
            path: dir.as_ref().join(format!("{spreadsheet_id}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The unfinished targets, oldest first. A missing file means there are none.
    pub async fn entries(&self) -> Res<Vec<JournalEntry>> {
        if !self.path.is_file() {
            return Ok(Vec::new());
        }
        let file: JournalFile = utils::deserialize(&self.path).await?;
        Ok(file.entries)
    }

    /// Inserts `entry`, or replaces the entry with the same target.
    pub async fn record(&self, entry: &JournalEntry) -> Res<()> {
        let mut entries = self.entries().await?;
        match entries.iter_mut().find(|e| e.target == entry.target) {
            Some(existing) => *existing = entry.clone(),
            None => entries.push(entry.clone()),
        }
        self.save(entries).await
    }

    /// Removes the entry for `target`. The file is deleted once no entries remain.
    pub async fn remove(&self, target: &str) -> Res<()> {
        let mut entries = self.entries().await?;
        entries.retain(|e| e.target != target);
        if entries.is_empty() {
            if self.path.is_file() {
                utils::remove(&self.path).await?;
            }
            return Ok(());
        }
        self.save(entries).await
    }

    /// Writes to a temporary file first so that a crash never leaves a truncated journal.
    async fn save(&self, entries: Vec<JournalEntry>) -> Res<()> {
        if let Some(parent) = self.path.parent() {
            utils::make_dir(parent).await?;
        }
        let file = JournalFile {
            spreadsheet_id: self.spreadsheet_id.clone(),
            entries,
        };
        let tmp = self.path.with_extension("json.tmp");
        utils::serialize(&tmp, &file).await?;
        utils::rename(&tmp, &self.path).await
    }
}
