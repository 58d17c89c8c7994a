use crate::api::Mode;
use crate::args::SheetsArgs;
use crate::commands::{open_store, plural, spreadsheet_ref, Out};
use crate::{Config, Result};

/// Lists the worksheet titles of a spreadsheet in order.
pub async fn sheets(config: &Config, mode: Mode, args: &SheetsArgs) -> Result<Out<Vec<String>>> {
    let target = spreadsheet_ref(args.spreadsheet())?;
    let mut store = open_store(config, mode).await?;
    let spreadsheet = store.resolve_spreadsheet(&target).await?;
    let titles: Vec<String> = store
        .list_worksheets(&spreadsheet)
        .await?
        .into_iter()
        .map(|ws| ws.title)
        .collect();
    let message = format!(
        "Found {} in '{}'",
        plural(titles.len(), "worksheet"),
        spreadsheet.title
    );
    Ok(Out::new(message, titles))
}
