use crate::api::Mode;
use crate::args::SheetArgs;
use crate::commands::{open_store, spreadsheet_ref, worksheet, Out};
use crate::model::{Spreadsheet, Worksheet};
use crate::{Config, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A spreadsheet and, when one was asked for, one of its worksheets.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SheetInfo {
    pub spreadsheet: Spreadsheet,
    pub worksheet: Option<Worksheet>,
}

impl Display for SheetInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ss = &self.spreadsheet;
        write!(f, "Spreadsheet '{}' ({}) {}", ss.title, ss.id, ss.url)?;
        if let Some(ws) = &self.worksheet {
            write!(
                f,
                "\nWorksheet '{}' (sheet id {}, index {})",
                ws.title, ws.sheet_id, ws.index
            )?;
        }
        Ok(())
    }
}

/// Opens a spreadsheet, creating it when it is addressed by a name that does not exist yet. With
/// `--sheet` the worksheet is opened (or created empty) as well; a blank title means the first
/// worksheet.
pub async fn sheet(config: &Config, mode: Mode, args: &SheetArgs) -> Result<Out<SheetInfo>> {
    let target = spreadsheet_ref(args.spreadsheet())?;
    let mut store = open_store(config, mode).await?;
    let spreadsheet = store.resolve_spreadsheet(&target).await?;
    let worksheet = match args.sheet() {
        Some(title) => Some(worksheet(&mut store, &spreadsheet, title).await?),
        None => None,
    };
    let message = match &worksheet {
        Some(ws) => format!("Opened '{}' in '{}'", ws.title, spreadsheet.title),
        None => format!("Opened '{}'", spreadsheet.title),
    };
    Ok(Out::new(
        message,
        SheetInfo {
            spreadsheet,
            worksheet,
        },
    ))
}
