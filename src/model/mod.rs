//! Types that represent the core data model, such as `Worksheet`, `Grid` and `CellRef`.
mod cell;
mod format;
mod sheet;

pub use cell::{column_letters, CellRef};
pub use format::{render, OutputFormat};
pub use sheet::{
    parse_delimited, parse_sheet_list, Grid, InputMode, RenderMode, Spreadsheet, SpreadsheetRef,
    Worksheet,
};
