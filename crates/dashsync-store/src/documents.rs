//! Flat JSON configuration documents.
//!
//! Every document is read permissively: a missing or unparsable file yields
//! the default document and a warning, never an error.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use dashsync::{GoogleCredentials, SourceSpec};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::StoreError;

pub const SOURCES_FILE: &str = "sources_config.json";
pub const CHARTS_FILE: &str = "charts_config.json";
pub const TITLES_FILE: &str = "titles_config.json";
pub const PAGES_FILE: &str = "pages_config.json";
pub const TOKEN_FILE: &str = "user_token.json";

/// Format of `last_updated`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Read a JSON document, falling back to `T::default()`.
pub fn load_document<T: DeserializeOwned + Default>(path: &Path) -> T {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "unreadable document, using defaults"
            );
            return T::default();
        }
    };

    serde_json::from_str(&text).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "invalid document, using defaults");
        T::default()
    })
}

/// Write a JSON document with four-space indentation, replacing the file
/// atomically.
pub fn save_document<T: Serialize>(path: &Path, document: &T) -> Result<(), StoreError> {
    let mut bytes = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    document.serialize(&mut serializer)?;
    bytes.push(b'\n');

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// The configured sources plus bookkeeping. Keys this type does not know
/// are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesDocument {
    #[serde(default, deserialize_with = "lenient_sources")]
    pub sources: Vec<SourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SourcesDocument {
    /// Drop sources without a filename and normalise the rest.
    pub fn normalized(mut self) -> Self {
        self.sources = self
            .sources
            .into_iter()
            .filter(|s| !s.filename.trim().is_empty())
            .map(SourceSpec::normalized)
            .collect();
        self
    }
}

fn lenient_sources<'de, D>(deserializer: D) -> Result<Vec<SourceSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| match serde_json::from_value(value) {
            Ok(spec) => Some(spec),
            Err(e) => {
                tracing::warn!(index = i, error = %e, "skipping malformed source entry");
                None
            }
        })
        .collect())
}

/// Chart module to the data files it renders, in link order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartLinks(pub BTreeMap<String, Vec<String>>);

impl ChartLinks {
    pub fn linked(&self, chart: &str) -> &[String] {
        self.0.get(chart).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn link(&mut self, chart: impl Into<String>, files: Vec<String>) {
        self.0.insert(chart.into(), files);
    }

    /// Forget a chart entirely.
    pub fn unlink(&mut self, chart: &str) -> Option<Vec<String>> {
        self.0.remove(chart)
    }
}

/// Display titles of chart modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Titles(pub BTreeMap<String, String>);

impl Titles {
    /// Title for a chart, falling back to its module file name.
    pub fn display_name<'a>(&'a self, chart: &'a str) -> &'a str {
        self.0.get(chart).map(String::as_str).unwrap_or(chart)
    }
}

/// Dashboard pages and the charts on each, in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pages(pub Map<String, Value>);

impl Pages {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pages with their chart lists. Non-string entries are ignored.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Vec<&str>)> {
        self.0.iter().map(|(page, charts)| {
            let charts = charts
                .as_array()
                .map(|list| list.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            (page.as_str(), charts)
        })
    }
}

/// Locations of the configuration documents inside a config directory.
#[derive(Debug, Clone)]
pub struct ConfigFiles {
    dir: PathBuf,
}

impl ConfigFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn load_sources(&self) -> SourcesDocument {
        load_document(&self.path(SOURCES_FILE))
    }

    /// Normalise and save an edited sources document.
    pub fn save_sources(&self, document: SourcesDocument) -> Result<SourcesDocument, StoreError> {
        let document = document.normalized();
        save_document(&self.path(SOURCES_FILE), &document)?;
        Ok(document)
    }

    /// Set `last_updated` in the sources document and leave every other key
    /// and source entry exactly as stored, including entries that do not
    /// load. A missing document is created; an unparsable one is left alone.
    pub fn stamp_last_updated<Tz>(&self, at: DateTime<Tz>) -> Result<(), StoreError>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let path = self.path(SOURCES_FILE);
        let mut document = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Value>(&text)? {
                Value::Object(map) => map,
                _ => {
                    return Err(StoreError::Json(serde::de::Error::custom(
                        "sources document is not a JSON object",
                    )));
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        document.insert(
            "last_updated".to_owned(),
            Value::String(at.format(TIMESTAMP_FORMAT).to_string()),
        );
        save_document(&path, &document)
    }

    pub fn load_chart_links(&self) -> ChartLinks {
        load_document(&self.path(CHARTS_FILE))
    }

    pub fn save_chart_links(&self, links: &ChartLinks) -> Result<(), StoreError> {
        save_document(&self.path(CHARTS_FILE), links)
    }

    pub fn load_titles(&self) -> Titles {
        load_document(&self.path(TITLES_FILE))
    }

    pub fn load_pages(&self) -> Pages {
        load_document(&self.path(PAGES_FILE))
    }

    /// The stored Google token, if any. An empty object counts as signed
    /// out.
    pub fn load_google_token(&self) -> Option<GoogleCredentials> {
        let value: Value = load_document(&self.path(TOKEN_FILE));
        if value.as_object().is_none_or(Map::is_empty) {
            return None;
        }
        match serde_json::from_value(value) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed Google token");
                None
            }
        }
    }

    pub fn save_google_token(&self, credentials: &GoogleCredentials) -> Result<(), StoreError> {
        save_document(&self.path(TOKEN_FILE), credentials)
    }
}
