use std::time::Duration;

use dashsync::connector::{integer_field, string_field};
use dashsync::{
    Connector, ConnectorConfig, ConnectorDescriptor, ConnectorError, FieldDescriptor, SyncContext,
    Table,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::http::{body_snippet, transport};

pub const SUPERSET_ID: &str = "superset";

const DEFAULT_HOST: &str = "http://localhost:8088";
const DEFAULT_DATABASE_ID: i64 = 1;
const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);
const EXECUTE_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs a SQL query through Superset's SQL Lab API.
pub struct SupersetConnector {
    client: reqwest::Client,
}

impl SupersetConnector {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn login(
        &self,
        host: &str,
        username: &str,
        password: &str,
    ) -> Result<String, ConnectorError> {
        let response = self
            .client
            .post(format!("{host}/api/v1/security/login"))
            .timeout(LOGIN_TIMEOUT)
            .json(&json!({
                "username": username,
                "password": password,
                "provider": "db",
                "refresh": true,
            }))
            .send()
            .await
            .map_err(|e| ConnectorError::Transport(format!("cannot reach Superset: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::Auth(format!(
                "Superset login failed: {status} {}",
                body_snippet(response).await
            )));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::Auth(format!("unreadable login response: {e}")))?;

        login
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConnectorError::Auth("Superset login returned no access_token".into()))
    }
}

impl Default for SupersetConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
}

#[async_trait::async_trait]
impl Connector for SupersetConnector {
    fn describe(&self) -> ConnectorDescriptor {
        ConnectorDescriptor::new(SUPERSET_ID, "Apache Superset (SQL)", "📊").with_fields(vec![
            FieldDescriptor::text("host", "Superset URL")
                .with_placeholder("http://superset.mycompany.com:8088")
                .with_default(DEFAULT_HOST),
            FieldDescriptor::text("username", "Username"),
            FieldDescriptor::password("password", "Password"),
            FieldDescriptor::number("database_id", "Database ID")
                .with_help(
                    "Id of the database in Superset, shown in SQL Lab or the database edit URL.",
                )
                .with_default(DEFAULT_DATABASE_ID),
            FieldDescriptor::text("query", "SQL Query")
                .with_placeholder("SELECT * FROM my_table LIMIT 1000")
                .with_help("Runs on the Superset side."),
        ])
    }

    fn validate(&self, config: &ConnectorConfig, _ctx: &SyncContext) -> Result<(), ConnectorError> {
        let connection = ["host", "username", "password"];
        if connection.iter().any(|key| string_field(config, key).is_none()) {
            return Err(ConnectorError::Config(
                "connection settings are incomplete (host, username, password)".into(),
            ));
        }
        if string_field(config, "query").is_none() {
            return Err(ConnectorError::Config("SQL query is empty".into()));
        }
        integer_field(config, "database_id")?;
        Ok(())
    }

    async fn load(
        &self,
        config: &ConnectorConfig,
        ctx: &SyncContext,
    ) -> Result<Table, ConnectorError> {
        self.validate(config, ctx)?;
        let field = |key| string_field(config, key).unwrap_or_default();
        let host = field("host").trim_end_matches('/');
        let database_id = integer_field(config, "database_id")?.unwrap_or(DEFAULT_DATABASE_ID);

        let token = self.login(host, field("username"), field("password")).await?;

        tracing::debug!(%host, database_id, "executing SQL Lab query");
        let response = self
            .client
            .post(format!("{host}/api/v1/sqllab/execute/"))
            .timeout(EXECUTE_TIMEOUT)
            .bearer_auth(token)
            .json(&json!({
                "database_id": database_id,
                "sql": field("query"),
                "runAsync": false,
                "json": true,
            }))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::Api(format!(
                "query failed: {status} {}",
                body_snippet(response).await
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ConnectorError::Data(format!("unreadable query response: {e}")))?;

        table_from_response(body)
    }
}

/// Superset versions disagree on where rows live: `data`, `results[0].data`,
/// or the body itself. An `errors` payload wins even on HTTP 200.
fn table_from_response(body: Value) -> Result<Table, ConnectorError> {
    if let Some(errors) = body.get("errors").filter(|e| !is_empty_payload(e)) {
        return Err(ConnectorError::Api(format!(
            "Superset error: {}",
            describe_errors(errors)
        )));
    }

    let rows = if let Some(data) = body.get("data") {
        data.clone()
    } else if let Some(results) = body.get("results") {
        results
            .get(0)
            .and_then(|r| r.get("data"))
            .cloned()
            .unwrap_or(Value::Null)
    } else {
        body
    };

    match rows {
        Value::Array(records) => Table::from_json_records(records).map_err(ConnectorError::Data),
        Value::Null => Ok(Table::default()),
        other => Err(ConnectorError::Data(format!(
            "unexpected response shape: {other}"
        ))),
    }
}

fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

fn describe_errors(errors: &Value) -> String {
    match errors {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or_else(|| other.to_string()),
            })
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}
