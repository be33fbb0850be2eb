use std::path::PathBuf;

use crate::table::Table;

/// Errors raised while persisting a table.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Destination for synced tables. The data directory implements this; the
/// file format is chosen from the filename extension by the implementation.
pub trait ArtifactWriter: Send + Sync {
    /// Persist `table` under `filename`, replacing any previous artifact.
    /// Returns the path written.
    fn write_table(&self, filename: &str, table: &Table) -> Result<PathBuf, ArtifactError>;
}

impl<T: ArtifactWriter + ?Sized> ArtifactWriter for std::sync::Arc<T> {
    fn write_table(&self, filename: &str, table: &Table) -> Result<PathBuf, ArtifactError> {
        (**self).write_table(filename, table)
    }
}

/// Filename extensions a source's artifact may carry as-is.
pub const KNOWN_EXTENSIONS: [&str; 3] = [".csv", ".xlsx", ".json"];

/// Extension appended when a configured filename has none of
/// [`KNOWN_EXTENSIONS`].
pub const DEFAULT_EXTENSION: &str = ".csv";

/// Append the default extension when the filename lacks a known one.
pub fn with_default_extension(filename: &str) -> String {
    if KNOWN_EXTENSIONS.iter().any(|ext| filename.ends_with(ext)) {
        filename.to_owned()
    } else {
        format!("{filename}{DEFAULT_EXTENSION}")
    }
}

/// Name used when a source has no filename at all.
pub fn generated_filename() -> String {
    format!("source_{}{DEFAULT_EXTENSION}", chrono::Utc::now().timestamp())
}

/// True when the artifact is stored as a spreadsheet workbook.
pub fn is_spreadsheet(filename: &str) -> bool {
    filename.ends_with(".xlsx")
}
