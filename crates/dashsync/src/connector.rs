use std::sync::Arc;

use serde_json::{Map, Value};

use crate::context::SyncContext;
use crate::descriptor::{ConnectorDescriptor, FieldDescriptor};
use crate::table::Table;

/// Connector-specific configuration values, keyed by field key.
pub type ConnectorConfig = Map<String, Value>;

/// Errors a connector can report. Every variant renders as a message an
/// operator can act on without reading logs.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Transport(String),

    #[error("{0}")]
    Api(String),

    #[error("data error: {0}")]
    Data(String),
}

/// A data source adapter that turns one external protocol into a [`Table`].
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Static metadata, including the ordered field list. No I/O.
    fn describe(&self) -> ConnectorDescriptor;

    /// Configuration fields in display order. No I/O.
    fn fields(&self) -> Vec<FieldDescriptor> {
        self.describe().fields
    }

    /// Cheap precondition check. Must not perform the fetch.
    fn validate(
        &self,
        _config: &ConnectorConfig,
        _ctx: &SyncContext,
    ) -> Result<(), ConnectorError> {
        Ok(())
    }

    /// Fetch the data. An empty table is reported as-is; the orchestrator
    /// decides that empty is a failure.
    async fn load(
        &self,
        config: &ConnectorConfig,
        ctx: &SyncContext,
    ) -> Result<Table, ConnectorError>;
}

#[async_trait::async_trait]
impl<T: Connector + ?Sized> Connector for Arc<T> {
    fn describe(&self) -> ConnectorDescriptor {
        (**self).describe()
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        (**self).fields()
    }

    fn validate(&self, config: &ConnectorConfig, ctx: &SyncContext) -> Result<(), ConnectorError> {
        (**self).validate(config, ctx)
    }

    async fn load(
        &self,
        config: &ConnectorConfig,
        ctx: &SyncContext,
    ) -> Result<Table, ConnectorError> {
        (**self).load(config, ctx).await
    }
}

/// Read a non-empty, trimmed string field.
pub fn string_field<'a>(config: &'a ConnectorConfig, key: &str) -> Option<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Read an integer field, accepting numbers and numeric strings.
pub fn integer_field(config: &ConnectorConfig, key: &str) -> Result<Option<i64>, ConnectorError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| ConnectorError::Config(format!("'{key}' is out of range"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ConnectorError::Config(format!("'{key}' must be an integer, got '{s}'"))),
        Some(other) => Err(ConnectorError::Config(format!(
            "'{key}' must be an integer, got {other}"
        ))),
    }
}
