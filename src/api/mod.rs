//! The worksheet store: everything that talks to (or pretends to be) Google Sheets.
//!
//! The `Store` trait is the contract the rest of the crate programs against. `GoogleStore`
//! implements it with the Sheets and Drive REST APIs and `TestStore` implements it in memory.

mod files;
mod google_store;
mod oauth;
mod test_store;
mod timed;

use crate::error::Res;
use crate::model::{CellRef, Grid, InputMode, RenderMode, Spreadsheet, SpreadsheetRef, Worksheet};
use crate::Config;
use anyhow::Context;

// OAuth scopes required for Sheets API access. Drive is needed to find and create spreadsheets by
// name.
const OAUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

/// Environment variable that selects `Mode::Test` when set to a non-empty value.
pub const TEST_MODE_ENV: &str = "GSHEETX_IN_TEST_MODE";

pub(crate) use oauth::TokenProvider;
#[cfg(test)]
pub(crate) use test_store::{FailOn, Op, TestSpreadsheet, TestState, TEST_SPREADSHEET_ID};
pub(crate) use test_store::TestStore;
pub(crate) use timed::TimedStore;

/// Whether we are talking to Google or to the in-memory test store.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Google,
    Test,
}

impl Mode {
    /// Returns `Mode::Test` when `GSHEETX_IN_TEST_MODE` is set and non-empty.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Google,
        }
    }
}

/// The operations we need from a remote spreadsheet service. All calls address entities by the
/// handles returned from earlier calls; nothing is cached between calls.
#[async_trait::async_trait]
pub(crate) trait Store: Send {
    /// Opens a spreadsheet by URL, or by name (creating it, inside the given folder, if absent).
    async fn resolve_spreadsheet(&mut self, target: &SpreadsheetRef) -> Res<Spreadsheet>;

    /// The worksheets of `spreadsheet`, ordered by position.
    async fn list_worksheets(&mut self, spreadsheet: &Spreadsheet) -> Res<Vec<Worksheet>>;

    /// Returns the worksheet whose title is exactly `title`, creating an empty one if needed.
    async fn get_or_create_worksheet(
        &mut self,
        spreadsheet: &Spreadsheet,
        title: &str,
    ) -> Res<Worksheet>;

    /// Reads every populated cell of `worksheet`.
    async fn read_grid(&mut self, worksheet: &Worksheet, render: RenderMode) -> Res<Grid>;

    /// Writes `grid` into `worksheet` with its top-left cell at `anchor`.
    async fn write_grid(
        &mut self,
        worksheet: &Worksheet,
        grid: &Grid,
        anchor: CellRef,
        input: InputMode,
    ) -> Res<()>;

    /// Copies `worksheet` (content and structure) to a new worksheet named `new_title` inserted
    /// at `index`.
    async fn duplicate_worksheet(
        &mut self,
        worksheet: &Worksheet,
        new_title: &str,
        index: usize,
    ) -> Res<Worksheet>;

    async fn delete_worksheet(&mut self, worksheet: &Worksheet) -> Res<()>;

    /// The current position of `worksheet`, fetched fresh from the store.
    async fn worksheet_index(&mut self, worksheet: &Worksheet) -> Res<usize>;
}

/// Constructs the store for `mode`. For `Mode::Google` this loads (and if needed refreshes) the
/// OAuth token. For `Mode::Test` the in-memory state is shared by every store created for the same
/// home directory and starts with the default `Budget` spreadsheet.
pub(crate) async fn store(config: &Config, mode: Mode) -> Res<Box<dyn Store>> {
    match mode {
        Mode::Google => {
            let token_provider =
                TokenProvider::load(config.client_secret_path(), config.token_path())
                    .await
                    .context("Unable to load OAuth credentials, have you run 'gsheetx auth'?")?;
            Ok(Box::new(google_store::GoogleStore::new(token_provider).await?))
        }
        Mode::Test => Ok(Box::new(TestStore::shared(&config.root().to_string_lossy())?)),
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL such as
/// `https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/edit#gid=0`.
pub(crate) fn spreadsheet_id_from_url(url: &str) -> Res<&str> {
    let parts: Vec<&str> = url.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            let id = parts[i + 1]
                .split(['?', '#'])
                .next()
                .unwrap_or_default();
            if !id.is_empty() {
                return Ok(id);
            }
        }
    }
    anyhow::bail!(
        "Invalid Google Sheets URL '{url}'. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    )
}

/// Quotes a worksheet title for use in an A1 range, e.g. `Bob's` becomes `'Bob''s'`.
pub(crate) fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spreadsheet_id_from_url() {
        let url = "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";
        assert_eq!(
            spreadsheet_id_from_url(url).unwrap(),
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL"
        );
        let url = "https://docs.google.com/spreadsheets/d/ABC123?foo=bar";
        assert_eq!(spreadsheet_id_from_url(url).unwrap(), "ABC123");
        let url = "https://docs.google.com/spreadsheets/d/ABC123#gid=0";
        assert_eq!(spreadsheet_id_from_url(url).unwrap(), "ABC123");
        assert!(spreadsheet_id_from_url("https://example.com/invalid").is_err());
        assert!(spreadsheet_id_from_url("").is_err());
        assert!(spreadsheet_id_from_url("https://example.com/d/").is_err());
    }

    #[test]
    fn test_quote_title() {
        assert_eq!(quote_title("Jan"), "'Jan'");
        assert_eq!(quote_title("Bob's"), "'Bob''s'");
    }
}
