//! gsheetx reads, writes and re-templates Google sheets.
//!
//! The interesting part is template apply (see `commands::apply`): it gives existing worksheets
//! the structure of a template worksheet while keeping their values and positions, and it can
//! finish a run that was interrupted halfway.

mod api;
mod apply;
pub mod args;
pub mod commands;
mod config;
mod error;
mod journal;
mod model;
mod utils;

#[cfg(test)]
mod test;

pub use api::{Mode, TEST_MODE_ENV};
pub use apply::{AppliedTarget, ApplyOptions, ApplyReport};
pub use config::Config;
pub use error::{Error, ErrorType, Result};
pub use journal::{JournalEntry, Phase};
pub use model::{CellRef, Grid, InputMode, OutputFormat, RenderMode, SpreadsheetRef, Worksheet};
