use std::time::Duration;

use dashsync::connector::string_field;
use dashsync::{
    Connector, ConnectorConfig, ConnectorDescriptor, ConnectorError, FieldDescriptor,
    GoogleCredentials, SyncContext, Table,
};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::http::{api_error_message, transport};

pub const GOOGLE_SHEETS_ID: &str = "google_sheets";

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
const URL_MARKER: &str = "/spreadsheets/d/";
const MIN_KEY_LEN: usize = 10;
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const VALUES_TIMEOUT: Duration = Duration::from_secs(60);

/// Reads the first worksheet of a Google spreadsheet. The first row is the
/// header; every following row becomes a record.
pub struct GoogleSheetsConnector {
    client: reqwest::Client,
    api_base_url: Option<String>,
}

impl GoogleSheetsConnector {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base_url: None,
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    fn api_base(&self) -> &str {
        self.api_base_url
            .as_deref()
            .unwrap_or(SHEETS_API_BASE)
            .trim_end_matches('/')
    }

    fn spreadsheet_url(&self, id: &str, tail: &[&str]) -> Result<Url, ConnectorError> {
        let mut url = Url::parse(&format!("{}/v4/spreadsheets", self.api_base()))
            .map_err(|e| ConnectorError::Config(format!("invalid Sheets API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ConnectorError::Config("invalid Sheets API URL".into()))?
            .push(id)
            .extend(tail);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        credentials: &GoogleCredentials,
        timeout: Duration,
    ) -> Result<T, ConnectorError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&credentials.token)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| ConnectorError::Data(format!("unreadable Sheets API response: {e}")))
    }

    async fn first_sheet_title(
        &self,
        id: &str,
        credentials: &GoogleCredentials,
    ) -> Result<String, ConnectorError> {
        let mut url = self.spreadsheet_url(id, &[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(title,index)");

        let metadata: SpreadsheetMetadata = self
            .get_json(url, credentials, METADATA_TIMEOUT)
            .await?;
        metadata
            .sheets
            .into_iter()
            .map(|s| s.properties)
            .min_by_key(|p| p.index)
            .map(|p| p.title)
            .ok_or_else(|| ConnectorError::NotFound("spreadsheet has no worksheets".into()))
    }
}

impl Default for GoogleSheetsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: i64,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[async_trait::async_trait]
impl Connector for GoogleSheetsConnector {
    fn describe(&self) -> ConnectorDescriptor {
        ConnectorDescriptor::new(GOOGLE_SHEETS_ID, "Google Sheets", "📄").with_fields(vec![
            FieldDescriptor::text("url", "Spreadsheet link or ID")
                .with_placeholder("https://docs.google.com/spreadsheets/d/..."),
        ])
    }

    fn validate(&self, _config: &ConnectorConfig, ctx: &SyncContext) -> Result<(), ConnectorError> {
        match &ctx.google {
            None => Err(ConnectorError::Auth(
                "not logged in to Google; sign in first".into(),
            )),
            Some(creds) if creds.is_expired() => Err(ConnectorError::Auth(
                "Google token has expired; sign in again".into(),
            )),
            Some(_) => Ok(()),
        }
    }

    async fn load(
        &self,
        config: &ConnectorConfig,
        ctx: &SyncContext,
    ) -> Result<Table, ConnectorError> {
        let link = string_field(config, "url").ok_or_else(|| {
            ConnectorError::Config(
                "the spreadsheet link is empty; set it in the source settings".into(),
            )
        })?;
        let credentials = ctx.google.as_ref().ok_or_else(|| {
            ConnectorError::Auth("no Google token available; sign in again".into())
        })?;

        let id = spreadsheet_id(link)?;
        let title = self.first_sheet_title(&id, credentials).await?;
        tracing::debug!(spreadsheet = %id, sheet = %title, "reading worksheet");

        let range = format!("'{}'", title.replace('\'', "''"));
        let mut url = self.spreadsheet_url(&id, &["values", &range])?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE")
            .append_pair("majorDimension", "ROWS");

        let values: ValueRange = self.get_json(url, credentials, VALUES_TIMEOUT).await?;
        Ok(table_from_values(values.values))
    }
}

/// Extract the spreadsheet key from a browser link or a bare key.
pub fn spreadsheet_id(input: &str) -> Result<String, ConnectorError> {
    let input = input.trim();
    let malformed = || {
        ConnectorError::Config(format!(
            "malformed link or ID: '{input}'; copy the link from the browser"
        ))
    };

    if input.starts_with("https://") && input.contains("docs.google.com") {
        let (_, rest) = input.split_once(URL_MARKER).ok_or_else(malformed)?;
        let id: String = rest
            .chars()
            .take_while(|c| !matches!(c, '/' | '?' | '#'))
            .collect();
        return if id.is_empty() { Err(malformed()) } else { Ok(id) };
    }

    let is_key = input.len() >= MIN_KEY_LEN
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if is_key {
        Ok(input.to_owned())
    } else {
        Err(malformed())
    }
}

fn classify(status: StatusCode, body: &str) -> ConnectorError {
    match status.as_u16() {
        401 => {
            ConnectorError::Auth("Google credentials are missing or expired; sign in again".into())
        }
        403 => ConnectorError::PermissionDenied(
            "check that your Google account can open this spreadsheet".into(),
        ),
        404 => {
            ConnectorError::NotFound("spreadsheet not found; check the link".into())
        }
        _ => ConnectorError::Api(format!(
            "Google API error: {}",
            api_error_message(body).unwrap_or_else(|| format!("HTTP {status}"))
        )),
    }
}

/// Turn a header row plus data rows into a table. Short rows are padded
/// with empty strings; rows with no content at all are dropped. Cells past
/// the header get generated `column_<n>` names instead of being lost.
fn table_from_values(values: Vec<Vec<Value>>) -> Table {
    let mut rows = values.into_iter();
    let Some(header) = rows.next() else {
        return Table::default();
    };

    let mut columns: Vec<String> = header
        .into_iter()
        .map(|cell| match cell {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect();

    let mut rows: Vec<Vec<Value>> = rows
        .filter(|row| row.iter().any(|cell| !is_blank(cell)))
        .collect();

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width > columns.len() {
        tracing::warn!(
            header = columns.len(),
            widest = width,
            "rows are wider than the header row; naming the extra columns"
        );
        let named = columns.len();
        columns.extend((named..width).map(|i| format!("column_{}", i + 1)));
    }

    for row in &mut rows {
        row.resize(columns.len(), Value::String(String::new()));
    }

    Table::new(columns, rows)
}

fn is_blank(cell: &Value) -> bool {
    match cell {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
