use std::time::Duration;

use dashsync::connector::{integer_field, string_field};
use dashsync::{
    Connector, ConnectorConfig, ConnectorDescriptor, ConnectorError, FieldDescriptor, SyncContext,
    Table,
};
use reqwest::Url;
use serde_json::{Value, json};

use crate::http::{body_snippet, transport};

pub const YTSAURUS_ID: &str = "ytsaurus";

const DEFAULT_PROXY: &str = "jupiter.yt.idzn.ru";
const DEFAULT_LIMIT: i64 = 1000;
const EXISTS_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Reads a static table through the YTsaurus HTTP proxy API.
pub struct YtsaurusConnector {
    client: reqwest::Client,
}

impl YtsaurusConnector {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, url: Url, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("Authorization", format!("OAuth {token}"))
    }

    async fn exists(&self, base: &str, token: &str, path: &str) -> Result<bool, ConnectorError> {
        let url = Url::parse_with_params(&format!("{base}/api/v4/exists"), [("path", path)])
            .map_err(|e| ConnectorError::Config(format!("invalid proxy address: {e}")))?;

        let response = self
            .request(url, token)
            .timeout(EXISTS_TIMEOUT)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify(status, body_snippet(response).await));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ConnectorError::Data(format!("unreadable exists response: {e}")))?;

        // v4 wraps scalar results in {"value": ..}
        body.get("value")
            .unwrap_or(&body)
            .as_bool()
            .ok_or_else(|| ConnectorError::Data(format!("unexpected exists response: {body}")))
    }

    async fn read_table(
        &self,
        base: &str,
        token: &str,
        path: &str,
        limit: i64,
    ) -> Result<Table, ConnectorError> {
        let url = Url::parse(&format!("{base}/api/v4/read_table"))
            .map_err(|e| ConnectorError::Config(format!("invalid proxy address: {e}")))?;

        let parameters = json!({
            "path": rich_path(path, limit),
            "output_format": "json",
        });

        let response = self
            .request(url, token)
            .header("X-YT-Parameters", parameters.to_string())
            .timeout(READ_TIMEOUT)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify(status, body_snippet(response).await));
        }

        let body = response.text().await.map_err(transport)?;
        parse_rows(&body)
    }
}

impl Default for YtsaurusConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Connector for YtsaurusConnector {
    fn describe(&self) -> ConnectorDescriptor {
        ConnectorDescriptor::new(YTSAURUS_ID, "YTsaurus (YT)", "🦖").with_fields(vec![
            FieldDescriptor::text("proxy", "YT Proxy (Cluster)")
                .with_placeholder(DEFAULT_PROXY)
                .with_default(DEFAULT_PROXY),
            FieldDescriptor::password("token", "YT Token")
                .with_help("Your OAuth token, from ~/.yt/token or the web UI."),
            FieldDescriptor::text("path", "Table path").with_placeholder("//home/..."),
            FieldDescriptor::number("limit", "Row limit (0 = all)").with_default(DEFAULT_LIMIT),
        ])
    }

    fn validate(&self, config: &ConnectorConfig, _ctx: &SyncContext) -> Result<(), ConnectorError> {
        if string_field(config, "token").is_none() {
            return Err(ConnectorError::Config("YT token is missing".into()));
        }
        if string_field(config, "path").is_none() {
            return Err(ConnectorError::Config("table path is missing".into()));
        }
        integer_field(config, "limit")?;
        Ok(())
    }

    async fn load(
        &self,
        config: &ConnectorConfig,
        ctx: &SyncContext,
    ) -> Result<Table, ConnectorError> {
        self.validate(config, ctx)?;
        let token = string_field(config, "token").unwrap_or_default();
        let path = string_field(config, "path").unwrap_or_default();
        let limit = integer_field(config, "limit")?.unwrap_or(0);
        let base = proxy_url(string_field(config, "proxy").unwrap_or(DEFAULT_PROXY));

        if !self.exists(&base, token, path).await? {
            return Err(ConnectorError::NotFound(format!("path not found in YT: {path}")));
        }

        tracing::debug!(proxy = %base, %path, limit, "reading YT table");
        self.read_table(&base, token, path, limit).await
    }
}

/// Proxy address as a base URL. A bare host gets `http://`.
pub fn proxy_url(proxy: &str) -> String {
    let proxy = proxy.trim().trim_end_matches('/');
    if proxy.contains("://") {
        proxy.to_owned()
    } else {
        format!("http://{proxy}")
    }
}

/// Table path in YSON-as-JSON form, carrying a row range when `limit` is
/// positive.
fn rich_path(path: &str, limit: i64) -> Value {
    if limit <= 0 {
        return Value::String(path.to_owned());
    }
    json!({
        "$value": path,
        "$attributes": {
            "ranges": [{
                "lower_limit": {"row_index": 0},
                "upper_limit": {"row_index": limit},
            }]
        }
    })
}

/// Parse a newline-delimited JSON body into a table.
fn parse_rows(body: &str) -> Result<Table, ConnectorError> {
    let records = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str::<Value>(line)
                .map_err(|e| ConnectorError::Data(format!("row {i} is not valid JSON: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Table::from_json_records(records).map_err(ConnectorError::Data)
}

fn classify(status: reqwest::StatusCode, body: String) -> ConnectorError {
    match status.as_u16() {
        401 => ConnectorError::Auth("YT rejected the token".into()),
        403 => ConnectorError::PermissionDenied(format!("YT denied access: {body}")),
        _ => ConnectorError::Api(format!("YT error: HTTP {status}: {body}")),
    }
}
