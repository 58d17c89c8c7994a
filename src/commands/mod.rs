//! Command handlers for the gsheetx CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod apply;
mod auth;
mod get;
mod init;
mod set;
mod sheet;
mod sheets;

use crate::api::{self, Mode, TimedStore};
use crate::args::SpreadsheetArgs;
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{Spreadsheet, SpreadsheetRef, Worksheet};
use crate::{Config, Result};
use serde::Serialize;
use std::fmt::Debug;
use std::path::Path;
use tracing::{debug, info};

pub use apply::apply;
pub use auth::{auth, auth_verify};
pub use get::get;
pub use init::init;
pub use set::set;
pub use sheet::{sheet, SheetInfo};
pub use sheets::sheets;

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Loads the configuration from `home`, applying a `--timeout-secs` override if one was given.
pub async fn load_config(home: &Path, timeout_secs: Option<u64>) -> Result<Config> {
    Config::load(home)
        .await
        .pub_result(ErrorType::Config)
        .map(|config| config.with_timeout_secs(timeout_secs))
}

/// Opens the store for `mode` with the configured per-call timeout.
async fn open_store(config: &Config, mode: Mode) -> Result<TimedStore> {
    let store = api::store(config, mode).await.pub_result(ErrorType::Auth)?;
    Ok(TimedStore::new(store, config.timeout()))
}

fn spreadsheet_ref(args: &SpreadsheetArgs) -> Result<SpreadsheetRef> {
    args.spreadsheet_ref().ok_or_else(|| {
        Error::invalid_argument("A spreadsheet is required, pass either --url or --spreadsheet")
    })
}

/// The worksheet titled `title`, created empty when missing. A blank title means the first
/// worksheet.
async fn worksheet(
    store: &mut TimedStore,
    spreadsheet: &Spreadsheet,
    title: &str,
) -> Result<Worksheet> {
    let title = title.trim();
    if !title.is_empty() {
        return store.get_or_create_worksheet(spreadsheet, title).await;
    }
    store
        .list_worksheets(spreadsheet)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            Error::new(
                ErrorType::NotFound,
                anyhow::anyhow!("The spreadsheet '{}' has no worksheets", spreadsheet.title),
            )
        })
}

fn plural(count: usize, word: &str) -> String {
    format!("{count} {word}{}", if count == 1 { "" } else { "s" })
}
