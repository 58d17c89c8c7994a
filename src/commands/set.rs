use crate::api::Mode;
use crate::args::SetArgs;
use crate::commands::{open_store, plural, spreadsheet_ref, worksheet, Out};
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{parse_delimited, Worksheet};
use crate::{utils, Config, Result};
use anyhow::Context;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Writes delimited text into a worksheet. The text comes from `--text`, else `--file`, else
/// stdin.
pub async fn set(config: &Config, mode: Mode, args: &SetArgs) -> Result<Out<Worksheet>> {
    let target = spreadsheet_ref(args.spreadsheet())?;
    let text = input_text(args).await?;
    if text.trim().is_empty() {
        return Err(Error::invalid_argument("There is nothing to write"));
    }
    let grid = parse_delimited(&text, args.separator());
    debug!("Parsed {} from the input", plural(grid.len(), "row"));

    let mut store = open_store(config, mode).await?;
    let spreadsheet = store.resolve_spreadsheet(&target).await?;
    let ws = worksheet(&mut store, &spreadsheet, args.sheet()).await?;
    store
        .write_grid(&ws, &grid, args.cell(), args.input())
        .await?;
    let message = format!(
        "Wrote {} to '{}' at {} in '{}'",
        plural(grid.len(), "row"),
        ws.title,
        args.cell(),
        spreadsheet.title
    );
    Ok(Out::new(message, ws))
}

async fn input_text(args: &SetArgs) -> Result<String> {
    if let Some(text) = args.text() {
        return Ok(text.to_string());
    }
    if let Some(path) = args.file() {
        return utils::read(path).await.pub_result(ErrorType::Io);
    }
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("Unable to read the values from stdin")
        .pub_result(ErrorType::Io)?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::SpreadsheetArgs;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_set_text_at_cell() {
        let env = TestEnv::new().await;
        let args = SetArgs::new(SpreadsheetArgs::new(Some(env.url()), None, None), "Jan")
            .with_text("x,y\nz\n")
            .with_separator(",")
            .with_cell("B2".parse().unwrap());
        let out = set(&env.config(), Mode::Test, &args).await.unwrap();
        assert_eq!(out.message(), "Wrote 2 rows to 'Jan' at B2 in 'Budget'");
        assert_eq!(
            env.grid("Jan"),
            vec![
                vec!["item".to_string(), "amount".to_string()],
                vec!["rent".to_string(), "x".to_string(), "y".to_string()],
                vec!["".to_string(), "z".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_set_from_file_into_new_spreadsheet() {
        let env = TestEnv::new().await;
        let file = env.config().root().join("in.tsv");
        std::fs::write(&file, "a\tb\n").unwrap();
        let spreadsheet = SpreadsheetArgs::new(None, Some("Fresh".into()), Some("drive:f1".into()));
        let args = SetArgs::new(spreadsheet, "").with_file(&file);
        let out = set(&env.config(), Mode::Test, &args).await.unwrap();
        assert_eq!(out.structure().unwrap().title, "Sheet1");

        let state = env.state();
        let state = state.lock().unwrap();
        let fresh = state
            .spreadsheets
            .iter()
            .find(|s| s.title == "Fresh")
            .unwrap();
        assert_eq!(fresh.folder.as_deref(), Some("f1"));
        assert_eq!(
            fresh.worksheets[0].grid,
            vec![vec!["a".to_string(), "b".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_set_empty_text_is_invalid() {
        let env = TestEnv::new().await;
        let args =
            SetArgs::new(SpreadsheetArgs::new(Some(env.url()), None, None), "Jan").with_text("\n");
        let err = set(&env.config(), Mode::Test, &args).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidArgument);
        assert_eq!(env.state().lock().unwrap().mutation_count(), 0);
    }
}
