//! Template apply: gives existing worksheets the structure of a template worksheet while keeping
//! their values.
//!
//! For each target the sequence is: capture the grid and position, duplicate the target to a
//! timestamped backup at the end, delete the target, duplicate the template into the target's
//! title and position, write the captured grid back at A1, and optionally delete the backup. There
//! is no transaction around these calls, so every step after the backup is recorded in the
//! `Journal` and a later run completes whatever an interrupted run left behind.

use crate::api::{Store, TimedStore};
use crate::error::{Error, ErrorType, IntoResult};
use crate::journal::{Journal, JournalEntry, Phase};
use crate::model::{CellRef, Grid, InputMode, RenderMode, Spreadsheet, SpreadsheetRef, Worksheet};
use crate::Result;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What to apply, and to which worksheets.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ApplyOptions {
    /// The title of the worksheet whose structure is copied.
    pub template: String,
    /// The titles of the worksheets to re-template. `None` means every worksheet except the
    /// template, as listed when the run starts.
    pub targets: Option<Vec<String>>,
    /// Delete each backup once its target has been restored.
    pub delete_backup: bool,
    pub render: RenderMode,
    pub input: InputMode,
    /// Complete unfinished targets from the journal before starting new work.
    pub resume: bool,
}

/// One target that was re-templated.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct AppliedTarget {
    pub title: String,
    /// The position of the restored worksheet.
    pub index: usize,
    pub backup: String,
    pub backup_deleted: bool,
    /// True when the target was completed from the journal of an earlier run.
    pub resumed: bool,
}

/// The outcome of an apply, in processing order.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub spreadsheet: String,
    pub url: String,
    pub targets: Vec<AppliedTarget>,
}

/// Runs template applies against a `Store`, one call at a time.
pub(crate) struct TemplateApplier {
    store: TimedStore,
    journal_dir: Option<PathBuf>,
    clock: fn() -> DateTime<Local>,
}

impl TemplateApplier {
    pub(crate) fn new(store: Box<dyn Store>, timeout: Duration) -> Self {
        Self {
            store: TimedStore::new(store, timeout),
            journal_dir: None,
            clock: Local::now,
        }
    }

    /// Journals progress in `dir`, one file per spreadsheet.
    pub(crate) fn with_journal(mut self, dir: impl Into<PathBuf>) -> Self {
        self.journal_dir = Some(dir.into());
        self
    }

    #[cfg(test)]
    pub(crate) fn with_clock(mut self, clock: fn() -> DateTime<Local>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) async fn apply(
        &mut self,
        target: &SpreadsheetRef,
        options: &ApplyOptions,
    ) -> Result<ApplyReport> {
        let template_title = options.template.trim();
        if template_title.is_empty() {
            return Err(Error::invalid_argument("A template sheet name is required"));
        }
        if let Some(targets) = &options.targets {
            if targets.iter().any(|t| t == template_title) {
                return Err(Error::invalid_argument(format!(
                    "The template sheet '{template_title}' cannot also be a target"
                )));
            }
        }

        let spreadsheet = self.store.resolve_spreadsheet(target).await?;
        debug!("Resolved spreadsheet '{}' ({})", spreadsheet.title, spreadsheet.id);
        let journal = self
            .journal_dir
            .as_ref()
            .map(|dir| Journal::new(dir, &spreadsheet.id));

        let mut report = ApplyReport {
            spreadsheet: spreadsheet.title.clone(),
            url: spreadsheet.url.clone(),
            targets: Vec::new(),
        };

        if options.resume {
            if let Some(journal) = &journal {
                let pending = journal.entries().await.pub_result(ErrorType::Io)?;
                for entry in pending {
                    let done = self.resume(&spreadsheet, journal, entry).await?;
                    report.targets.push(done);
                }
            }
        }

        let worksheets = self.store.list_worksheets(&spreadsheet).await?;
        let template = worksheets
            .iter()
            .find(|ws| ws.title == template_title)
            .cloned()
            .ok_or_else(|| {
                Error::new(
                    ErrorType::NotFound,
                    anyhow::anyhow!(
                        "The template sheet '{template_title}' does not exist in '{}'",
                        spreadsheet.title
                    ),
                )
            })?;
        let targets = match &options.targets {
            Some(targets) => targets.clone(),
            None => worksheets
                .iter()
                .filter(|ws| ws.title != template_title)
                .map(|ws| ws.title.clone())
                .collect(),
        };
        debug!("Applying '{template_title}' to {} sheet(s)", targets.len());

        for title in targets {
            let done = self
                .apply_one(&spreadsheet, journal.as_ref(), &template, &title, options)
                .await?;
            report.targets.push(done);
        }
        Ok(report)
    }

    async fn apply_one(
        &mut self,
        spreadsheet: &Spreadsheet,
        journal: Option<&Journal>,
        template: &Worksheet,
        title: &str,
        options: &ApplyOptions,
    ) -> Result<AppliedTarget> {
        let original = self
            .store
            .get_or_create_worksheet(spreadsheet, title)
            .await?;
        let grid = self.store.read_grid(&original, options.render).await?;
        let original_index = self.store.worksheet_index(&original).await?;
        debug!(
            "Captured {} row(s) of '{title}' at index {original_index}",
            grid.len()
        );

        let worksheets = self.store.list_worksheets(spreadsheet).await?;
        let taken: Vec<&str> = worksheets.iter().map(|ws| ws.title.as_str()).collect();
        let backup_title = backup_title(title, (self.clock)(), &taken);
        let backup = self
            .store
            .duplicate_worksheet(&original, &backup_title, worksheets.len())
            .await?;
        debug!("Backed up '{title}' to '{backup_title}'");

        let mut entry = JournalEntry {
            target: title.to_string(),
            template: template.title.clone(),
            backup: backup_title.clone(),
            original_index,
            render: options.render,
            input: options.input,
            delete_backup: options.delete_backup,
            phase: Phase::BackedUp,
            started_at: Utc::now(),
        };
        record(journal, &entry).await?;

        self.store.delete_worksheet(&original).await?;
        debug!("Deleted the original '{title}'");

        let restored = self
            .restore(journal, &mut entry, template, &backup, grid)
            .await
            .map_err(|e| partial_apply(e, title, &backup_title))?;

        let backup_deleted = self.finish(journal, &entry, Some(&backup)).await?;
        info!("Applied template '{}' to '{title}'", template.title);
        Ok(AppliedTarget {
            title: title.to_string(),
            index: restored.index,
            backup: backup_title,
            backup_deleted,
            resumed: false,
        })
    }

    /// Clones the template into the target's title and position and writes `grid` into it.
    async fn restore(
        &mut self,
        journal: Option<&Journal>,
        entry: &mut JournalEntry,
        template: &Worksheet,
        backup: &Worksheet,
        grid: Grid,
    ) -> Result<Worksheet> {
        entry.phase = Phase::OriginalDeleted;
        record(journal, entry).await?;

        let restored = self
            .store
            .duplicate_worksheet(template, &entry.target, entry.original_index)
            .await?;
        debug!(
            "Cloned '{}' to '{}' at index {}",
            template.title, entry.target, restored.index
        );
        self.store
            .write_grid(&restored, &grid, CellRef::origin(), entry.input)
            .await?;
        debug!(
            "Wrote {} row(s) into '{}' (backup '{}')",
            grid.len(),
            entry.target,
            backup.title
        );

        entry.phase = Phase::Restored;
        record(journal, entry).await?;
        Ok(restored)
    }

    /// Deletes the backup if asked to and clears the journal entry. Returns whether the backup was
    /// deleted. A `backup` of `None` means it is already gone.
    async fn finish(
        &mut self,
        journal: Option<&Journal>,
        entry: &JournalEntry,
        backup: Option<&Worksheet>,
    ) -> Result<bool> {
        if entry.delete_backup {
            match backup {
                Some(backup) => {
                    self.store.delete_worksheet(backup).await?;
                    debug!("Deleted the backup '{}'", backup.title);
                }
                None => debug!("The backup '{}' was already deleted", entry.backup),
            }
        }
        if let Some(journal) = journal {
            journal
                .remove(&entry.target)
                .await
                .pub_result(ErrorType::Io)?;
        }
        Ok(entry.delete_backup)
    }

    /// Completes a target that an earlier run left unfinished.
    async fn resume(
        &mut self,
        spreadsheet: &Spreadsheet,
        journal: &Journal,
        mut entry: JournalEntry,
    ) -> Result<AppliedTarget> {
        warn!(
            "Resuming '{}' from phase {} of a run started at {}",
            entry.target, entry.phase, entry.started_at
        );
        let worksheets = self.store.list_worksheets(spreadsheet).await?;
        let find = |title: &str| worksheets.iter().find(|ws| ws.title == title).cloned();

        if entry.phase == Phase::Restored {
            let restored = find(&entry.target);
            let backup = find(&entry.backup);
            let backup_deleted = self.finish(Some(journal), &entry, backup.as_ref()).await?;
            info!("Finished the earlier apply to '{}'", entry.target);
            return Ok(AppliedTarget {
                index: restored.map_or(entry.original_index, |ws| ws.index),
                title: entry.target,
                backup: entry.backup,
                backup_deleted,
                resumed: true,
            });
        }

        let backup = find(&entry.backup).ok_or_else(|| {
            Error::new(
                ErrorType::NotFound,
                anyhow::anyhow!(
                    "Cannot resume '{}': its backup '{}' no longer exists. Remove the entry from {} \
                    to continue",
                    entry.target,
                    entry.backup,
                    journal.path().display()
                ),
            )
        })?;

        let existing = find(&entry.target);
        let existing = match (entry.phase, existing) {
            (Phase::BackedUp, Some(original)) => {
                self.store.delete_worksheet(&original).await?;
                debug!("Deleted the original '{}'", entry.target);
                None
            }
            (_, existing) => existing,
        };
        entry.phase = Phase::OriginalDeleted;
        record(Some(journal), &entry).await?;

        let title = entry.target.clone();
        let backup_title = entry.backup.clone();
        let restored = self
            .resume_restore(journal, &mut entry, &backup, existing, &worksheets)
            .await
            .map_err(|e| partial_apply(e, &title, &backup_title))?;

        let backup_deleted = self.finish(Some(journal), &entry, Some(&backup)).await?;
        info!("Finished the earlier apply to '{title}'");
        Ok(AppliedTarget {
            title,
            index: restored.index,
            backup: backup_title,
            backup_deleted,
            resumed: true,
        })
    }

    async fn resume_restore(
        &mut self,
        journal: &Journal,
        entry: &mut JournalEntry,
        backup: &Worksheet,
        existing: Option<Worksheet>,
        worksheets: &[Worksheet],
    ) -> Result<Worksheet> {
        let grid = self.store.read_grid(backup, entry.render).await?;
        match existing {
            // The template was already cloned before the interruption.
            Some(restored) => {
                self.store
                    .write_grid(&restored, &grid, CellRef::origin(), entry.input)
                    .await?;
                entry.phase = Phase::Restored;
                record(Some(journal), entry).await?;
                Ok(restored)
            }
            None => {
                let template = worksheets
                    .iter()
                    .find(|ws| ws.title == entry.template)
                    .cloned()
                    .ok_or_else(|| {
                        Error::new(
                            ErrorType::NotFound,
                            anyhow::anyhow!(
                                "The template sheet '{}' no longer exists",
                                entry.template
                            ),
                        )
                    })?;
                self.restore(Some(journal), entry, &template, backup, grid)
                    .await
            }
        }
    }
}

async fn record(journal: Option<&Journal>, entry: &JournalEntry) -> Result<()> {
    match journal {
        Some(journal) => journal.record(entry).await.pub_result(ErrorType::Io),
        None => Ok(()),
    }
}

fn partial_apply(e: Error, target: &str, backup: &str) -> Error {
    e.context(format!(
        "'{target}' was deleted but not restored; its data is in the backup sheet '{backup}'"
    ))
    .with_type(ErrorType::PartialApply)
}

/// `{target}_{YYYYMMDD_HHMMSS}`, with `_2`, `_3`, ... appended while the title is taken.
fn backup_title(target: &str, now: DateTime<Local>, taken: &[&str]) -> String {
    let base = format!("{target}_{}", now.format("%Y%m%d_%H%M%S"));
    if !taken.contains(&base.as_str()) {
        return base;
    }
    (2usize..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(&candidate.as_str()))
        .unwrap_or(base)
}
