use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::artifact::with_default_extension;
use crate::connector::ConnectorConfig;

/// Handler value meaning "no transform".
pub const NO_HANDLER: &str = "None";

/// Legacy type tag of sources written before connectors existed.
const LEGACY_SHEETS_TYPE: &str = "Google Sheets";

/// Connector id legacy sheet sources map onto.
pub const SHEETS_CONNECTOR_ID: &str = "google_sheets";

/// One configured data source as stored in the sources document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<String>,
    #[serde(default)]
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConnectorConfig>,
    #[serde(default = "default_handler")]
    pub handler: String,
    #[serde(default = "default_true")]
    pub active: bool,

    /// Pre-connector sources carried `type` and `url` at the top level.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub legacy_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn default_handler() -> String {
    NO_HANDLER.to_owned()
}

fn default_true() -> bool {
    true
}

impl SourceSpec {
    pub fn new(connector_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            connector_id: Some(connector_id.into()),
            filename: filename.into(),
            config: Some(Map::new()),
            handler: default_handler(),
            active: true,
            legacy_type: None,
            url: None,
        }
    }

    pub fn with_config(mut self, config: ConnectorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = handler.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Resolve which connector and configuration this source uses.
    ///
    /// A source without `connector_id` but tagged `"Google Sheets"` maps to
    /// the sheets connector with `{url}` as its configuration. Anything else
    /// without an id resolves to `None`.
    pub fn resolve(&self) -> Option<(String, ConnectorConfig)> {
        if let Some(id) = self.connector_id.as_deref().filter(|id| !id.is_empty()) {
            return Some((id.to_owned(), self.config.clone().unwrap_or_default()));
        }

        if self.legacy_type.as_deref() == Some(LEGACY_SHEETS_TYPE) {
            let config = self.config.clone().unwrap_or_else(|| {
                let mut config = Map::new();
                config.insert(
                    "url".into(),
                    Value::String(self.url.clone().unwrap_or_default()),
                );
                config
            });
            return Some((SHEETS_CONNECTOR_ID.to_owned(), config));
        }

        None
    }

    /// The transform to apply, if any.
    pub fn handler(&self) -> Option<&str> {
        let handler = self.handler.trim();
        (!handler.is_empty() && handler != NO_HANDLER).then_some(handler)
    }

    /// The artifact this source writes, with the default extension applied.
    /// `None` when no filename is configured.
    pub fn destination(&self) -> Option<String> {
        let filename = self.filename.trim();
        (!filename.is_empty()).then(|| with_default_extension(filename))
    }

    /// Label used in logs and run lines.
    pub fn display_name(&self) -> &str {
        if self.filename.is_empty() {
            "<unnamed>"
        } else {
            &self.filename
        }
    }

    /// Rewrite a legacy source into connector form and normalise the
    /// filename extension. Used when the sources document is saved.
    pub fn normalized(mut self) -> Self {
        if let Some((id, config)) = self.resolve() {
            self.connector_id = Some(id);
            self.config = Some(config);
            self.legacy_type = None;
            self.url = None;
        }
        if !self.filename.is_empty() {
            self.filename = with_default_extension(&self.filename);
        }
        self
    }
}
