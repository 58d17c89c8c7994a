//! Implements the `Store` trait against Google.
//!
//! Cell values are written through the `sheets` client (`values_batch_update`). Reads go through
//! the Sheets v4 `values.get` REST endpoint because the unformatted and formula render options
//! return numbers and booleans as bare JSON values. Sheet structure (listing, adding, duplicating
//! and deleting tabs) goes through the `batchUpdate` REST endpoint, and finding or creating a
//! spreadsheet by name goes through the Drive v3 API, all with `reqwest` and the same bearer token.

use crate::api::{quote_title, spreadsheet_id_from_url, Store, TokenProvider};
use crate::error::Res;
use crate::model::{
    CellRef, Grid, InputMode, RenderMode, Spreadsheet, SpreadsheetRef, Worksheet,
};
use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use serde_json::{json, Value};
use sheets::types::{BatchUpdateValuesRequest, Dimension, ValueInputOption, ValueRange};
use sheets::ClientError;
use tracing::trace;
use url::Url;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";
const SPREADSHEET_FIELDS: &str =
    "spreadsheetId,spreadsheetUrl,properties.title,sheets.properties(sheetId,title,index)";

/// Implements the `Store` trait with Google Sheets. It takes a `TokenProvider`, on which it calls
/// refresh to keep the token up-to-date.
pub(super) struct GoogleStore {
    token_provider: TokenProvider,
    client: sheets::Client,
    http: reqwest::Client,
}

impl GoogleStore {
    pub(super) async fn new(mut token_provider: TokenProvider) -> Res<Self> {
        let client = create_sheets_client(&mut token_provider).await?;
        Ok(Self {
            token_provider,
            client,
            http: reqwest::Client::new(),
        })
    }

    /// Refreshes the sheets client with a new access token if needed
    async fn refresh_client(&mut self) -> Res<()> {
        self.client = create_sheets_client(&mut self.token_provider).await?;
        Ok(())
    }

    /// Sends a request with the bearer token and parses the JSON response body. Non-success
    /// statuses become errors that include the response body.
    async fn send<T>(&mut self, request: reqwest::RequestBuilder, what: &str) -> Res<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let token = self.token_provider.token_with_refresh().await?.to_string();
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to send the {what} request"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("Google API {what} request failed with status {status}: {body}");
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse the {what} response"))
    }

    async fn spreadsheet_meta(&mut self, spreadsheet_id: &str) -> Res<SpreadsheetMeta> {
        let request = self
            .http
            .get(format!("{SHEETS_API}/{spreadsheet_id}"))
            .query(&[("fields", SPREADSHEET_FIELDS)]);
        self.send(request, "spreadsheets.get").await
    }

    /// Sends a single structural request through `spreadsheets.batchUpdate` and returns its reply.
    async fn batch_update(&mut self, spreadsheet_id: &str, request: Value) -> Res<Value> {
        trace!("batchUpdate on {spreadsheet_id}: {request}");
        let request = self
            .http
            .post(format!("{SHEETS_API}/{spreadsheet_id}:batchUpdate"))
            .json(&json!({ "requests": [request] }));
        let mut response: BatchUpdateResponse =
            self.send(request, "spreadsheets.batchUpdate").await?;
        response
            .replies
            .pop()
            .context("The batchUpdate response had no replies")
    }

    /// Finds a spreadsheet by exact name in Drive. The first match wins.
    async fn find_by_name(&mut self, name: &str) -> Res<Option<String>> {
        let query = format!(
            "name = '{}' and mimeType = '{SPREADSHEET_MIME_TYPE}' and trashed = false",
            escape_query(name)
        );
        let request = self
            .http
            .get(DRIVE_FILES_API)
            .query(&[("q", query.as_str()), ("fields", "files(id,name)")]);
        let files: DriveFileList = self.send(request, "drive.files.list").await?;
        Ok(files.files.into_iter().next().map(|f| f.id))
    }

    async fn create_spreadsheet(&mut self, name: &str, folder: Option<&str>) -> Res<String> {
        let mut body = json!({ "name": name, "mimeType": SPREADSHEET_MIME_TYPE });
        if let Some(folder) = folder {
            body["parents"] = json!([folder]);
        }
        let request = self
            .http
            .post(DRIVE_FILES_API)
            .query(&[("fields", "id")])
            .json(&body);
        let file: DriveFile = self.send(request, "drive.files.create").await?;
        Ok(file.id)
    }

    async fn worksheets(&mut self, spreadsheet_id: &str) -> Res<Vec<Worksheet>> {
        let meta = self.spreadsheet_meta(spreadsheet_id).await?;
        let mut worksheets: Vec<Worksheet> = meta
            .sheets
            .into_iter()
            .map(|s| s.properties.into_worksheet(spreadsheet_id))
            .collect();
        worksheets.sort_by_key(|w| w.index);
        Ok(worksheets)
    }
}

#[async_trait::async_trait]
impl Store for GoogleStore {
    async fn resolve_spreadsheet(&mut self, target: &SpreadsheetRef) -> Res<Spreadsheet> {
        let id = match target {
            SpreadsheetRef::Url(url) => spreadsheet_id_from_url(url)?.to_string(),
            SpreadsheetRef::Name { name, folder } => match self.find_by_name(name).await? {
                Some(id) => id,
                None => {
                    trace!("No spreadsheet named '{name}', creating it");
                    self.create_spreadsheet(name, folder.as_deref())
                        .await
                        .with_context(|| format!("Unable to create spreadsheet '{name}'"))?
                }
            },
        };
        let meta = self.spreadsheet_meta(&id).await?;
        Ok(Spreadsheet {
            id: meta.spreadsheet_id,
            title: meta.properties.title,
            url: meta.spreadsheet_url,
        })
    }

    async fn list_worksheets(&mut self, spreadsheet: &Spreadsheet) -> Res<Vec<Worksheet>> {
        self.worksheets(&spreadsheet.id).await
    }

    async fn get_or_create_worksheet(
        &mut self,
        spreadsheet: &Spreadsheet,
        title: &str,
    ) -> Res<Worksheet> {
        let existing = self.worksheets(&spreadsheet.id).await?;
        if let Some(worksheet) = existing.into_iter().find(|w| w.title == title) {
            return Ok(worksheet);
        }
        trace!("Adding worksheet '{title}'");
        let reply = self
            .batch_update(
                &spreadsheet.id,
                json!({ "addSheet": { "properties": { "title": title } } }),
            )
            .await
            .with_context(|| format!("Unable to add worksheet '{title}'"))?;
        sheet_properties(reply, "addSheet")
            .map(|p| p.into_worksheet(&spreadsheet.id))
    }

    async fn read_grid(&mut self, worksheet: &Worksheet, render: RenderMode) -> Res<Grid> {
        trace!("read_grid for {} ({render})", worksheet.title);
        let url = values_url(&worksheet.spreadsheet_id, &quote_title(&worksheet.title))?;
        let request = self.http.get(url).query(&[
            ("majorDimension", "ROWS"),
            ("valueRenderOption", value_render_option(render)),
            ("dateTimeRenderOption", "FORMATTED_STRING"),
        ]);
        let values: ValueGrid = self
            .send(request, "spreadsheets.values.get")
            .await
            .with_context(|| format!("Failed to fetch {} sheet data", worksheet.title))?;
        Ok(values.into_grid())
    }

    async fn write_grid(
        &mut self,
        worksheet: &Worksheet,
        grid: &Grid,
        anchor: CellRef,
        input: InputMode,
    ) -> Res<()> {
        if grid.is_empty() {
            return Ok(());
        }
        self.refresh_client().await?;
        let range = format!("{}!{anchor}", quote_title(&worksheet.title));
        let value_input_option = match input {
            InputMode::Raw => ValueInputOption::Raw,
            InputMode::UserEntered => ValueInputOption::UserEntered,
        };
        let request = BatchUpdateValuesRequest {
            data: vec![ValueRange {
                major_dimension: Some(Dimension::Rows),
                range: range.clone(),
                values: grid.clone(),
            }],
            include_values_in_response: Some(false),
            response_date_time_render_option: None,
            response_value_render_option: None,
            value_input_option: Some(value_input_option),
        };
        self.client
            .spreadsheets()
            .values_batch_update(&worksheet.spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to write {range}"))?;
        Ok(())
    }

    async fn duplicate_worksheet(
        &mut self,
        worksheet: &Worksheet,
        new_title: &str,
        index: usize,
    ) -> Res<Worksheet> {
        let reply = self
            .batch_update(
                &worksheet.spreadsheet_id,
                json!({
                    "duplicateSheet": {
                        "sourceSheetId": worksheet.sheet_id,
                        "insertSheetIndex": index,
                        "newSheetName": new_title,
                    }
                }),
            )
            .await
            .with_context(|| {
                format!("Unable to duplicate '{}' as '{new_title}'", worksheet.title)
            })?;
        sheet_properties(reply, "duplicateSheet")
            .map(|p| p.into_worksheet(&worksheet.spreadsheet_id))
    }

    async fn delete_worksheet(&mut self, worksheet: &Worksheet) -> Res<()> {
        self.batch_update(
            &worksheet.spreadsheet_id,
            json!({ "deleteSheet": { "sheetId": worksheet.sheet_id } }),
        )
        .await
        .with_context(|| format!("Unable to delete worksheet '{}'", worksheet.title))?;
        Ok(())
    }

    async fn worksheet_index(&mut self, worksheet: &Worksheet) -> Res<usize> {
        self.worksheets(&worksheet.spreadsheet_id)
            .await?
            .into_iter()
            .find(|w| w.sheet_id == worksheet.sheet_id)
            .map(|w| w.index)
            .with_context(|| format!("Worksheet '{}' no longer exists", worksheet.title))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetMeta {
    spreadsheet_id: String,
    #[serde(default)]
    spreadsheet_url: String,
    #[serde(default)]
    properties: SpreadsheetProperties,
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct SpreadsheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

/// Google omits zero values, so the first sheet often arrives without `sheetId` or `index`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
    #[serde(default)]
    index: usize,
}

impl SheetProperties {
    fn into_worksheet(self, spreadsheet_id: &str) -> Worksheet {
        Worksheet {
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_id: self.sheet_id,
            title: self.title,
            index: self.index,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<Value>,
}

/// The body of a `values.get` response. Cells are strings, numbers or booleans depending on the
/// render option.
#[derive(Debug, Deserialize)]
struct ValueGrid {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl ValueGrid {
    fn into_grid(self) -> Grid {
        self.values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect()
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        other => other.to_string(),
    }
}

fn value_render_option(render: RenderMode) -> &'static str {
    match render {
        RenderMode::Formatted => "FORMATTED_VALUE",
        RenderMode::Unformatted => "UNFORMATTED_VALUE",
        RenderMode::Formula => "FORMULA",
    }
}

/// `{SHEETS_API}/{id}/values/{range}` with the range percent-encoded as a single path segment.
fn values_url(spreadsheet_id: &str, range: &str) -> Res<Url> {
    let mut url = Url::parse(SHEETS_API).context("Unable to parse the Sheets API URL")?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("The Sheets API URL cannot have path segments"))?
        .extend([spreadsheet_id, "values", range]);
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

/// Pulls `reply.{kind}.properties` out of a batchUpdate reply.
fn sheet_properties(mut reply: Value, kind: &str) -> Res<SheetProperties> {
    let properties = reply
        .get_mut(kind)
        .and_then(|v| v.get_mut("properties"))
        .map(Value::take)
        .with_context(|| format!("The {kind} reply had no sheet properties"))?;
    serde_json::from_value(properties)
        .with_context(|| format!("Unable to parse the {kind} sheet properties"))
}

/// Escapes a value for a single-quoted string in a Drive query.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Creates a new sheets client with a refreshed access token.
async fn create_sheets_client(token_provider: &mut TokenProvider) -> Res<sheets::Client> {
    let access_token = token_provider.token_with_refresh().await?;

    // The sheets crate requires client_id, client_secret, and redirect_uri, but we don't need them
    // for API calls, only the access token
    Ok(sheets::Client::new(
        String::new(),
        String::new(),
        String::new(),
        access_token.to_string(),
        String::new(), // refresh_token (not needed, we handle refresh ourselves)
    ))
}

fn map_client_error(e: ClientError) -> anyhow::Error {
    let error_name = match &e {
        ClientError::EmptyRefreshToken => "EmptyRefreshToken".to_string(),
        ClientError::FromUtf8Error(inner) => format!("FromUtf8Error {inner}"),
        ClientError::UrlParserError(inner) => format!("UrlParserError {inner}"),
        ClientError::SerdeJsonError(inner) => format!("SerdeJsonError {inner}"),
        ClientError::ReqwestError(inner) => format!("ReqwestError {inner}"),
        ClientError::InvalidHeaderValue(inner) => format!("InvalidHeaderValue {inner}"),
        ClientError::ReqwestMiddleWareError(inner) => format!("ReqwestMiddleWareError {inner}"),
        ClientError::HttpError { .. } => "HttpError".to_string(),
        ClientError::Other(_) => "Other".to_string(),
    };
    anyhow::Error::new(e).context(error_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_query() {
        assert_eq!(escape_query("Budget"), "Budget");
        assert_eq!(escape_query("Bob's \\ sheet"), "Bob\\'s \\\\ sheet");
    }

    #[test]
    fn test_spreadsheet_meta_defaults_zero_values() {
        let json = r#"{
            "spreadsheetId": "abc",
            "spreadsheetUrl": "https://docs.google.com/spreadsheets/d/abc/edit",
            "properties": { "title": "Budget" },
            "sheets": [
                { "properties": { "title": "Tmpl" } },
                { "properties": { "sheetId": 42, "title": "Jan", "index": 1 } }
            ]
        }"#;
        let meta: SpreadsheetMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.properties.title, "Budget");
        let first = &meta.sheets[0].properties;
        assert_eq!((first.sheet_id, first.index), (0, 0));
        let second = &meta.sheets[1].properties;
        assert_eq!((second.sheet_id, second.index), (42, 1));
    }

    #[test]
    fn test_sheet_properties_from_reply() {
        let reply = json!({
            "duplicateSheet": { "properties": { "sheetId": 7, "title": "Jan", "index": 2 } }
        });
        let worksheet = sheet_properties(reply, "duplicateSheet")
            .unwrap()
            .into_worksheet("abc");
        assert_eq!(worksheet.sheet_id, 7);
        assert_eq!(worksheet.index, 2);
        assert_eq!(worksheet.spreadsheet_id, "abc");

        let missing = sheet_properties(json!({}), "addSheet");
        assert!(missing.is_err());
    }

    #[test]
    fn test_value_grid_with_mixed_cell_types() {
        let json = r#"{
            "range": "'Jan'!A1:B4",
            "majorDimension": "ROWS",
            "values": [
                ["item", "amount"],
                ["rent", 900],
                ["food", -12.5, true],
                ["total", "=SUM(B2:B3)", false]
            ]
        }"#;
        let values: ValueGrid = serde_json::from_str(json).unwrap();
        let grid = values.into_grid();
        assert_eq!(grid[1], vec!["rent", "900"]);
        assert_eq!(grid[2], vec!["food", "-12.5", "TRUE"]);
        assert_eq!(grid[3], vec!["total", "=SUM(B2:B3)", "FALSE"]);

        let empty: ValueGrid = serde_json::from_str(r#"{"range": "'Tmpl'!A1:Z1000"}"#).unwrap();
        assert!(empty.into_grid().is_empty());
    }

    #[test]
    fn test_values_url_encodes_the_range() {
        let url = values_url("abc", &quote_title("Q1 #2")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/'Q1%20%232'"
        );
        assert_eq!(value_render_option(RenderMode::Formula), "FORMULA");
    }
}
