use crate::api::Mode;
use crate::args::GetArgs;
use crate::commands::{open_store, plural, spreadsheet_ref, worksheet, Out};
use crate::error::{ErrorType, IntoResult};
use crate::model;
use crate::{Config, Result};

/// Reads a worksheet and renders its values in the requested format. The rendered text is the
/// structured output; the caller prints it.
pub async fn get(config: &Config, mode: Mode, args: &GetArgs) -> Result<Out<String>> {
    let target = spreadsheet_ref(args.spreadsheet())?;
    let mut store = open_store(config, mode).await?;
    let spreadsheet = store.resolve_spreadsheet(&target).await?;
    let ws = worksheet(&mut store, &spreadsheet, args.sheet()).await?;
    let grid = store.read_grid(&ws, args.render()).await?;
    let rendered =
        model::render(args.format(), &grid, args.separator()).pub_result(ErrorType::Internal)?;
    let message = format!(
        "Read {} from '{}' in '{}'",
        plural(grid.len(), "row"),
        ws.title,
        spreadsheet.title
    );
    Ok(Out::new(message, rendered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::SpreadsheetArgs;
    use crate::model::OutputFormat;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_get_plain_first_sheet() {
        let env = TestEnv::new().await;
        let url = env.url();
        let args = GetArgs::new(SpreadsheetArgs::new(Some(url), None, None), "Jan");
        let out = get(&env.config(), Mode::Test, &args).await.unwrap();
        assert_eq!(out.structure().unwrap(), "item, amount\nrent, 900");

        // The first worksheet is the (empty) template.
        let url = env.url();
        let args = GetArgs::new(SpreadsheetArgs::new(Some(url), None, None), "");
        let out = get(&env.config(), Mode::Test, &args).await.unwrap();
        assert_eq!(out.structure().unwrap(), "");
        assert!(out.message().contains("'Tmpl'"));
    }

    #[tokio::test]
    async fn test_get_json() {
        let env = TestEnv::new().await;
        let url = env.url();
        let args = GetArgs::new(SpreadsheetArgs::new(Some(url), None, None), "Feb")
            .with_format(OutputFormat::Json);
        let out = get(&env.config(), Mode::Test, &args).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(out.structure().unwrap()).unwrap();
        assert_eq!(value, serde_json::json!([{ "item": "food", "amount": -12.5 }]));
    }

    #[tokio::test]
    async fn test_get_missing_sheet_is_created() {
        let env = TestEnv::new().await;
        let url = env.url();
        let args = GetArgs::new(SpreadsheetArgs::new(Some(url), None, None), "Mar");
        let out = get(&env.config(), Mode::Test, &args).await.unwrap();
        assert_eq!(out.structure().unwrap(), "");
        assert_eq!(env.titles(), vec!["Tmpl", "Jan", "Feb", "Mar"]);
    }
}
