//! These structs provide the CLI interface for the gsheetx CLI.

use crate::model::{CellRef, InputMode, OutputFormat, RenderMode, SpreadsheetRef};
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// gsheetx: read, write and re-template Google sheets from the command line.
///
/// A spreadsheet is addressed either by its URL (--url) or by its name (--spreadsheet). A
/// spreadsheet addressed by name is created, optionally inside --folder, when it does not exist.
///
/// You will need to set up Google OAuth credentials for this. Download the client secret JSON
/// for a "Desktop app" OAuth client, then run `gsheetx init --client-secret <file>` followed by
/// `gsheetx auth`.
#[derive(Debug, Parser, Clone)]
#[command(version)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory and initialize the configuration files.
    ///
    /// This is the first command you should run. By default the home directory is
    /// $HOME/.gsheetx; pass --gsheetx-home (or set GSHEETX_HOME) to put it somewhere else.
    Init(InitArgs),
    /// Authenticate with Google via OAuth.
    Auth(AuthArgs),
    /// List the worksheet titles of a spreadsheet, in order.
    Sheets(SheetsArgs),
    /// Open (or create) a spreadsheet and, with --sheet, one of its worksheets, and print them.
    Sheet(SheetArgs),
    /// Print the values of a worksheet.
    Get(GetArgs),
    /// Write delimited text into a worksheet.
    Set(SetArgs),
    /// Give worksheets the structure of a template worksheet while keeping their values.
    ///
    /// Each target is backed up to `{title}_{YYYYMMDD_HHMMSS}` at the end of the spreadsheet,
    /// deleted, replaced by a copy of the template at the same position, and refilled with its
    /// previous values. An interrupted run is completed by the next `apply` on the same
    /// spreadsheet.
    Apply(ApplyArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where gsheetx configuration and credentials are held. Defaults to
    /// ~/.gsheetx
    #[arg(long, env = "GSHEETX_HOME", default_value_t = default_gsheetx_home())]
    gsheetx_home: DisplayPath,

    /// The number of seconds to wait for each call to Google. Overrides `timeout_secs` in the
    /// config file.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,
}

impl Common {
    pub fn new(log_level: LevelFilter, gsheetx_home: PathBuf, timeout_secs: Option<u64>) -> Self {
        Self {
            log_level,
            gsheetx_home: gsheetx_home.into(),
            timeout_secs,
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn gsheetx_home(&self) -> &DisplayPath {
        &self.gsheetx_home
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.timeout_secs
    }
}

/// (Not shown): Args for the `gsheetx init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The path to your downloaded OAuth client credentials. This file will be copied to the
    /// default secrets location in the home directory.
    #[arg(long)]
    client_secret: PathBuf,
}

impl InitArgs {
    pub fn new(client_secret: impl Into<PathBuf>) -> Self {
        Self {
            client_secret: client_secret.into(),
        }
    }

    pub fn client_secret(&self) -> &Path {
        &self.client_secret
    }
}

/// (Not shown): Args for the `gsheetx auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify and refresh authentication.
    #[arg(long)]
    verify: bool,
}

impl AuthArgs {
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

/// How to find the spreadsheet. `--spreadsheet` wins when both it and `--url` are given.
#[derive(Debug, Default, Parser, Clone)]
pub struct SpreadsheetArgs {
    /// The URL of the spreadsheet, e.g.
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long)]
    url: Option<String>,

    /// The name of the spreadsheet. It is created when no spreadsheet has this name.
    #[arg(long)]
    spreadsheet: Option<String>,

    /// The Drive folder to create a new spreadsheet in, as an id or `name:id`.
    #[arg(long)]
    folder: Option<String>,
}

impl SpreadsheetArgs {
    pub fn new(url: Option<String>, spreadsheet: Option<String>, folder: Option<String>) -> Self {
        Self {
            url,
            spreadsheet,
            folder,
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn spreadsheet(&self) -> Option<&str> {
        self.spreadsheet.as_deref()
    }

    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    /// `None` when neither a name nor a URL was given.
    pub fn spreadsheet_ref(&self) -> Option<SpreadsheetRef> {
        SpreadsheetRef::from_parts(self.url(), self.spreadsheet(), self.folder())
    }
}

/// (Not shown): Args for the `gsheetx sheets` command.
#[derive(Debug, Parser, Clone)]
pub struct SheetsArgs {
    #[clap(flatten)]
    spreadsheet: SpreadsheetArgs,
}

impl SheetsArgs {
    pub fn new(spreadsheet: SpreadsheetArgs) -> Self {
        Self { spreadsheet }
    }

    pub fn spreadsheet(&self) -> &SpreadsheetArgs {
        &self.spreadsheet
    }
}

/// (Not shown): Args for the `gsheetx sheet` command.
#[derive(Debug, Parser, Clone)]
pub struct SheetArgs {
    #[clap(flatten)]
    spreadsheet: SpreadsheetArgs,

    /// The worksheet title. An empty title means the first worksheet. A missing worksheet is
    /// created empty.
    #[arg(long)]
    sheet: Option<String>,
}

impl SheetArgs {
    pub fn new(spreadsheet: SpreadsheetArgs, sheet: Option<&str>) -> Self {
        Self {
            spreadsheet,
            sheet: sheet.map(str::to_string),
        }
    }

    pub fn spreadsheet(&self) -> &SpreadsheetArgs {
        &self.spreadsheet
    }

    pub fn sheet(&self) -> Option<&str> {
        self.sheet.as_deref()
    }
}

/// (Not shown): Args for the `gsheetx get` command.
#[derive(Debug, Parser, Clone)]
pub struct GetArgs {
    #[clap(flatten)]
    spreadsheet: SpreadsheetArgs,

    /// The worksheet title. Defaults to the first worksheet. A missing worksheet is created empty.
    #[arg(long, default_value = "")]
    sheet: String,

    /// How to print the values.
    #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
    format: OutputFormat,

    /// The cell separator for the plain and report formats.
    #[arg(long, default_value = ", ")]
    separator: String,

    /// How cell values are fetched.
    #[arg(long, value_enum, default_value_t = RenderMode::Formatted)]
    render: RenderMode,
}

impl GetArgs {
    pub fn new(spreadsheet: SpreadsheetArgs, sheet: impl Into<String>) -> Self {
        Self {
            spreadsheet,
            sheet: sheet.into(),
            format: OutputFormat::default(),
            separator: ", ".to_string(),
            render: RenderMode::default(),
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn spreadsheet(&self) -> &SpreadsheetArgs {
        &self.spreadsheet
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn render(&self) -> RenderMode {
        self.render
    }
}

/// (Not shown): Args for the `gsheetx set` command.
#[derive(Debug, Parser, Clone)]
pub struct SetArgs {
    #[clap(flatten)]
    spreadsheet: SpreadsheetArgs,

    /// The worksheet title. Defaults to the first worksheet. A missing worksheet is created empty.
    #[arg(long, default_value = "")]
    sheet: String,

    /// Read the values from this file instead of stdin.
    #[arg(long, conflicts_with = "text")]
    file: Option<PathBuf>,

    /// The values to write, instead of reading them from stdin.
    #[arg(long)]
    text: Option<String>,

    /// The cell separator in the input.
    #[arg(long, default_value = "\t")]
    separator: String,

    /// The top-left cell to write to, in A1 notation.
    #[arg(long, default_value = "A1")]
    cell: CellRef,

    /// How written values are interpreted.
    #[arg(long, value_enum, default_value_t = InputMode::Raw)]
    input: InputMode,
}

impl SetArgs {
    pub fn new(spreadsheet: SpreadsheetArgs, sheet: impl Into<String>) -> Self {
        Self {
            spreadsheet,
            sheet: sheet.into(),
            file: None,
            text: None,
            separator: "\t".to_string(),
            cell: CellRef::origin(),
            input: InputMode::default(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_cell(mut self, cell: CellRef) -> Self {
        self.cell = cell;
        self
    }

    pub fn spreadsheet(&self) -> &SpreadsheetArgs {
        &self.spreadsheet
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn cell(&self) -> CellRef {
        self.cell
    }

    pub fn input(&self) -> InputMode {
        self.input
    }
}

/// (Not shown): Args for the `gsheetx apply` command.
#[derive(Debug, Parser, Clone)]
pub struct ApplyArgs {
    #[clap(flatten)]
    spreadsheet: SpreadsheetArgs,

    /// The title of the worksheet whose structure is copied.
    #[arg(long)]
    template_sheet: String,

    /// The worksheets to re-template, separated by commas or newlines. Defaults to every
    /// worksheet except the template.
    #[arg(long)]
    sheet: Option<String>,

    /// Delete each backup once its worksheet has been restored.
    #[arg(long)]
    delete_backup: bool,

    /// How the existing values are read.
    #[arg(long, value_enum, default_value_t = RenderMode::Formatted)]
    render: RenderMode,

    /// How the values are written back.
    #[arg(long, value_enum, default_value_t = InputMode::Raw)]
    input: InputMode,

    /// Do not complete worksheets left unfinished by an interrupted run.
    #[arg(long)]
    no_resume: bool,
}

impl ApplyArgs {
    pub fn new(spreadsheet: SpreadsheetArgs, template_sheet: impl Into<String>) -> Self {
        Self {
            spreadsheet,
            template_sheet: template_sheet.into(),
            sheet: None,
            delete_backup: false,
            render: RenderMode::default(),
            input: InputMode::default(),
            no_resume: false,
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_delete_backup(mut self, delete_backup: bool) -> Self {
        self.delete_backup = delete_backup;
        self
    }

    pub fn spreadsheet(&self) -> &SpreadsheetArgs {
        &self.spreadsheet
    }

    pub fn template_sheet(&self) -> &str {
        &self.template_sheet
    }

    pub fn sheet(&self) -> Option<&str> {
        self.sheet.as_deref()
    }

    pub fn delete_backup(&self) -> bool {
        self.delete_backup
    }

    pub fn render(&self) -> RenderMode {
        self.render
    }

    pub fn input(&self) -> InputMode {
        self.input
    }

    pub fn resume(&self) -> bool {
        !self.no_resume
    }
}

fn default_gsheetx_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join(".gsheetx"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --gsheetx-home or GSHEETX_HOME instead of relying on the \
                default home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from(".gsheetx")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["gsheetx", "--gsheetx-home", "/tmp/gsx"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_apply() {
        let args = parse(&[
            "apply",
            "--spreadsheet",
            "Budget",
            "--url",
            "https://docs.google.com/spreadsheets/d/abc/edit",
            "--template-sheet",
            "Tmpl",
            "--sheet",
            "Jan, Feb",
            "--delete-backup",
            "--render",
            "formula",
            "--no-resume",
        ]);
        let Command::Apply(apply) = args.command() else {
            panic!("expected apply, got {:?}", args.command());
        };
        assert_eq!(apply.template_sheet(), "Tmpl");
        assert_eq!(apply.sheet(), Some("Jan, Feb"));
        assert!(apply.delete_backup());
        assert!(!apply.resume());
        assert_eq!(apply.render(), RenderMode::Formula);
        assert_eq!(apply.input(), InputMode::Raw);
        assert_eq!(
            apply.spreadsheet().spreadsheet_ref(),
            Some(SpreadsheetRef::Name {
                name: "Budget".to_string(),
                folder: None
            })
        );
        assert_eq!(args.common().gsheetx_home().path(), Path::new("/tmp/gsx"));
    }

    #[test]
    fn test_parse_set_defaults_and_cell() {
        let args = parse(&["set", "--url", "u", "--cell", "c3"]);
        let Command::Set(set) = args.command() else {
            panic!("expected set");
        };
        assert_eq!(set.cell(), CellRef::new(2, 2));
        assert_eq!(set.input(), InputMode::Raw);
        assert_eq!(set.separator(), "\t");
        assert_eq!(set.sheet(), "");
        assert!(set.text().is_none());

        let args = parse(&["set", "--url", "u", "--input", "user-entered"]);
        let Command::Set(set) = args.command() else {
            panic!("expected set");
        };
        assert_eq!(set.input(), InputMode::UserEntered);
    }

    #[test]
    fn test_parse_get_and_common() {
        let args = parse(&[
            "--timeout-secs",
            "5",
            "--log-level",
            "debug",
            "get",
            "--spreadsheet",
            "Budget",
            "--format",
            "markdown",
        ]);
        assert_eq!(args.common().timeout_secs(), Some(5));
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
        let Command::Get(get) = args.command() else {
            panic!("expected get");
        };
        assert_eq!(get.format(), OutputFormat::Markdown);
        assert_eq!(get.separator(), ", ");
    }

    #[test]
    fn test_parse_sheet() {
        let args = parse(&["sheet", "--spreadsheet", "Budget", "--folder", "drive:F1"]);
        let Command::Sheet(sheet) = args.command() else {
            panic!("expected sheet");
        };
        assert_eq!(sheet.sheet(), None);

        let args = parse(&["sheet", "--url", "u", "--sheet", "Jan"]);
        let Command::Sheet(sheet) = args.command() else {
            panic!("expected sheet");
        };
        assert_eq!(sheet.sheet(), Some("Jan"));
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        let bad = [
            vec!["gsheetx", "--timeout-secs", "0", "sheets"],
            vec!["gsheetx", "set", "--cell", "A0"],
            vec!["gsheetx", "set", "--text", "x", "--file", "f"],
            vec!["gsheetx", "apply", "--url", "u"],
        ];
        for argv in bad {
            assert!(Args::try_parse_from(&argv).is_err(), "{argv:?}");
        }
    }
}
