use serde::{Deserialize, Serialize};

/// Rows of cell values. Rows may have differing lengths.
pub type Grid = Vec<Vec<String>>;

/// How to find a spreadsheet.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadsheetRef {
    /// Open an existing spreadsheet by its URL.
    Url(String),
    /// Open a spreadsheet by its name, creating it (inside `folder` if given) when it does not
    /// exist.
    Name {
        name: String,
        folder: Option<String>,
    },
}

impl SpreadsheetRef {
    /// Builds a reference from the optional command line values. A name takes precedence over a
    /// URL. Returns `None` when neither is given.
    pub fn from_parts(
        url: Option<&str>,
        name: Option<&str>,
        folder: Option<&str>,
    ) -> Option<Self> {
        if let Some(name) = non_blank(name) {
            return Some(Self::Name {
                name: name.to_string(),
                folder: non_blank(folder).map(folder_id),
            });
        }
        non_blank(url).map(|url| Self::Url(url.to_string()))
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// A folder may be given as a bare id or as `something:id`; the id is whatever follows the last
/// colon.
pub fn folder_id(folder: &str) -> String {
    folder.rsplit(':').next().unwrap_or(folder).to_string()
}

/// An opened spreadsheet.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Spreadsheet {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// A worksheet (tab) within a spreadsheet. `index` is the position at the time the handle was
/// obtained; use `Store::worksheet_index` when the current position matters.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Worksheet {
    pub spreadsheet_id: String,
    pub sheet_id: i64,
    pub title: String,
    pub index: usize,
}

/// How cell values are fetched.
#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    /// Computed values, formatted as displayed.
    #[default]
    Formatted,
    /// Computed values without number formatting.
    Unformatted,
    /// Formula text for cells that hold formulas.
    Formula,
}

serde_plain::derive_display_from_serialize!(RenderMode);
serde_plain::derive_fromstr_from_deserialize!(RenderMode);

/// How written values are interpreted.
#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum InputMode {
    /// Values are stored literally, so a displayed `$900` stays the text `$900`.
    #[default]
    Raw,
    /// Values are parsed as if typed by a user, so `=SUM(A1:A3)` becomes a formula.
    UserEntered,
}

serde_plain::derive_display_from_serialize!(InputMode);
serde_plain::derive_fromstr_from_deserialize!(InputMode);

/// Splits text into a grid: rows on newlines and cells on `separator`. A single trailing newline
/// does not produce an extra row.
pub fn parse_delimited(text: &str, separator: &str) -> Grid {
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.split('\n')
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if separator.is_empty() {
                vec![line.to_string()]
            } else {
                line.split(separator).map(str::to_string).collect()
            }
        })
        .collect()
}

/// Splits a comma and/or newline delimited list of sheet titles, dropping blank items.
pub fn parse_sheet_list(list: &str) -> Vec<String> {
    list.split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spreadsheet_ref_from_parts() {
        assert_eq!(SpreadsheetRef::from_parts(None, None, None), None);
        assert_eq!(SpreadsheetRef::from_parts(Some(" "), Some(""), None), None);
        assert_eq!(
            SpreadsheetRef::from_parts(Some("https://x/d/abc"), None, Some("f")),
            Some(SpreadsheetRef::Url("https://x/d/abc".into()))
        );
        assert_eq!(
            SpreadsheetRef::from_parts(Some("https://x/d/abc"), Some("Budget"), Some("drive:F1")),
            Some(SpreadsheetRef::Name {
                name: "Budget".into(),
                folder: Some("F1".into())
            })
        );
    }

    #[test]
    fn test_folder_id() {
        assert_eq!(folder_id("abc"), "abc");
        assert_eq!(folder_id("gdrive:abc"), "abc");
        assert_eq!(folder_id("a:b:c"), "c");
    }

    #[test]
    fn test_parse_delimited() {
        let grid = parse_delimited("a\tb\nc\td\te\n", "\t");
        assert_eq!(
            grid,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string(), "d".to_string(), "e".to_string()],
            ]
        );
        let grid = parse_delimited("x, y\r\nz", ", ");
        assert_eq!(grid[0], vec!["x".to_string(), "y".to_string()]);
        assert_eq!(grid[1], vec!["z".to_string()]);
    }

    #[test]
    fn test_parse_sheet_list() {
        assert_eq!(
            parse_sheet_list("Jan, Feb\nMar,,\n"),
            vec!["Jan".to_string(), "Feb".to_string(), "Mar".to_string()]
        );
        assert!(parse_sheet_list(" , \n").is_empty());
    }

    #[test]
    fn test_modes_display_and_parse() {
        assert_eq!(RenderMode::Formula.to_string(), "formula");
        assert_eq!(InputMode::UserEntered.to_string(), "user-entered");
        assert_eq!("raw".parse::<InputMode>().unwrap(), InputMode::Raw);
        assert_eq!(InputMode::default(), InputMode::Raw);
    }
}
