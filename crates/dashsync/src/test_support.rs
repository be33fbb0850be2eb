use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crate::artifact::{ArtifactError, ArtifactWriter};
use crate::connector::{Connector, ConnectorConfig, ConnectorError};
use crate::context::SyncContext;
use crate::descriptor::{ConnectorDescriptor, FieldDescriptor};
use crate::table::Table;

/// Connector method invocations recorded by [`ScriptedConnector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Validate,
    Load,
}

/// Connector with canned behaviour that records how it was driven.
pub struct ScriptedConnector {
    id: String,
    fields: Vec<FieldDescriptor>,
    table: Table,
    rejection: Option<String>,
    failure: Option<ConnectorError>,
    panic_message: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
    last_config: Mutex<Option<ConnectorConfig>>,
}

impl ScriptedConnector {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: vec![FieldDescriptor::number("limit", "Limit")],
            table: Table::default(),
            rejection: None,
            failure: None,
            panic_message: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
            last_config: Mutex::new(None),
        }
    }

    pub fn with_fields(mut self, fields: Vec<FieldDescriptor>) -> Self {
        self.fields = fields;
        self
    }

    /// Table handed back by `load`.
    pub fn returning(mut self, table: Table) -> Self {
        self.table = table;
        self
    }

    /// Make `validate` fail with a configuration error.
    pub fn rejecting(mut self, reason: impl Into<String>) -> Self {
        self.rejection = Some(reason.into());
        self
    }

    /// Make `load` fail with `error`.
    pub fn failing(mut self, error: ConnectorError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Make `load` panic.
    pub fn panicking(mut self, message: impl Into<String>) -> Self {
        self.panic_message = Some(message.into());
        self
    }

    /// Sleep inside `load` before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn last_config(&self) -> Option<ConnectorConfig> {
        self.last_config.lock().ok().and_then(|c| c.clone())
    }

    fn record(&self, call: Call, config: &ConnectorConfig) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if let Ok(mut last) = self.last_config.lock() {
            *last = Some(config.clone());
        }
    }
}

#[async_trait::async_trait]
impl Connector for ScriptedConnector {
    fn describe(&self) -> ConnectorDescriptor {
        ConnectorDescriptor::new(self.id.clone(), format!("Scripted {}", self.id), "")
            .with_fields(self.fields.clone())
    }

    fn validate(&self, config: &ConnectorConfig, _ctx: &SyncContext) -> Result<(), ConnectorError> {
        self.record(Call::Validate, config);
        match &self.rejection {
            Some(reason) => Err(ConnectorError::Config(reason.clone())),
            None => Ok(()),
        }
    }

    async fn load(
        &self,
        config: &ConnectorConfig,
        _ctx: &SyncContext,
    ) -> Result<Table, ConnectorError> {
        self.record(Call::Load, config);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.panic_message {
            panic!("{message}");
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.table.clone()),
        }
    }
}

/// Artifact writer that keeps tables in memory.
#[derive(Default)]
pub struct MemoryArtifactWriter {
    written: Mutex<BTreeMap<String, Table>>,
    failing: Option<String>,
}

impl MemoryArtifactWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write to `filename`.
    pub fn failing_on(mut self, filename: impl Into<String>) -> Self {
        self.failing = Some(filename.into());
        self
    }

    pub fn written(&self, filename: &str) -> Option<Table> {
        self.written.lock().ok()?.get(filename).cloned()
    }

    pub fn filenames(&self) -> Vec<String> {
        self.written
            .lock()
            .map(|w| w.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames().is_empty()
    }
}

impl ArtifactWriter for MemoryArtifactWriter {
    fn write_table(&self, filename: &str, table: &Table) -> Result<PathBuf, ArtifactError> {
        if self.failing.as_deref() == Some(filename) {
            return Err(ArtifactError::Io(format!("{filename}: disk full")));
        }
        self.written
            .lock()
            .map_err(|e| ArtifactError::Io(e.to_string()))?
            .insert(filename.to_owned(), table.clone());
        Ok(PathBuf::from("memory").join(filename))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn scripted_connector_records_calls() {
        let connector = ScriptedConnector::new("fake")
            .returning(Table::new(vec!["a".into()], vec![vec![json!(1)]]));
        let ctx = SyncContext::new();
        let config = ConnectorConfig::new();

        connector.validate(&config, &ctx).unwrap();
        let table = connector.load(&config, &ctx).await.unwrap();

        assert_eq!(table.row_count(), 1);
        assert_eq!(connector.calls(), vec![Call::Validate, Call::Load]);
    }

    #[tokio::test]
    async fn scripted_connector_fails_on_request() {
        let connector =
            ScriptedConnector::new("fake").failing(ConnectorError::Api("boom".into()));
        let err = connector
            .load(&ConnectorConfig::new(), &SyncContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn memory_writer_stores_and_fails() {
        let writer = MemoryArtifactWriter::new().failing_on("bad.csv");
        let table = Table::new(vec!["a".into()], vec![vec![json!(1)]]);

        writer.write_table("good.csv", &table).unwrap();
        assert!(writer.write_table("bad.csv", &table).is_err());
        assert_eq!(writer.filenames(), vec!["good.csv"]);
        assert_eq!(writer.written("good.csv"), Some(table));
    }
}
