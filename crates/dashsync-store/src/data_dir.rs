use std::io::Write;
use std::path::{Path, PathBuf};

use dashsync::artifact::is_spreadsheet;
use dashsync::{ArtifactError, ArtifactWriter, Table, TransformError, TransformRunner};

use crate::codec;

const BACKUP_DIR: &str = "backups";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} has no saved original")]
    NoBackup(String),

    #[error("{0} cannot be read back; only delimited-text artifacts can be transformed")]
    UnsupportedFormat(String),

    #[error("invalid artifact name '{0}'")]
    InvalidFilename(String),

    #[error("artifact {0} does not exist")]
    NotFound(String),

    #[error("{0}")]
    Transform(#[from] TransformError),

    #[error("transform of {0} returned an empty result")]
    EmptyResult(String),
}

/// A data file in the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub filename: String,
    pub path: PathBuf,
    /// True when a pre-transform original is kept in the backups folder.
    pub has_backup: bool,
}

/// The directory synced tables are written to, with a one-level backup
/// folder for manual transforms.
#[derive(Debug, Clone)]
pub struct DataDirectory {
    root: PathBuf,
}

impl DataDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn backup_dir(&self) -> PathBuf {
        self.root.join(BACKUP_DIR)
    }

    /// Path of an artifact. Names that would leave the directory are
    /// rejected.
    pub fn artifact_path(&self, filename: &str) -> Result<PathBuf, StoreError> {
        check_filename(filename)?;
        Ok(self.root.join(filename))
    }

    pub fn backup_path(&self, filename: &str) -> Result<PathBuf, StoreError> {
        check_filename(filename)?;
        Ok(self.backup_dir().join(filename))
    }

    /// Serialize `table` by extension and replace the artifact. The bytes go
    /// to a temporary file in the same directory first so readers never see
    /// a partial file.
    pub fn save_table(&self, filename: &str, table: &Table) -> Result<PathBuf, StoreError> {
        let target = self.artifact_path(filename)?;
        let bytes = if is_spreadsheet(filename) {
            codec::encode_xlsx(table)?
        } else {
            codec::encode_csv(table)?
        };

        std::fs::create_dir_all(&self.root)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".partial")
            .tempfile_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;

        tracing::debug!(filename, rows = table.row_count(), "artifact written");
        Ok(target)
    }

    /// Read an artifact back into a table. Spreadsheet artifacts are
    /// write-only.
    pub fn read_table(&self, filename: &str) -> Result<Table, StoreError> {
        let path = self.artifact_path(filename)?;
        if is_spreadsheet(filename) {
            return Err(StoreError::UnsupportedFormat(filename.to_owned()));
        }
        if !path.is_file() {
            return Err(StoreError::NotFound(filename.to_owned()));
        }
        codec::decode_csv(&path)
    }

    /// Regular files in the directory, sorted by name. Hidden files are
    /// skipped. A missing directory lists as empty.
    pub fn list_artifacts(&self) -> Result<Vec<ArtifactEntry>, StoreError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut artifacts = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            if filename.starts_with('.') {
                continue;
            }
            artifacts.push(ArtifactEntry {
                has_backup: self.backup_dir().join(&filename).is_file(),
                path: entry.path(),
                filename,
            });
        }

        artifacts.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(artifacts)
    }

    pub fn has_backup(&self, filename: &str) -> bool {
        self.backup_path(filename).is_ok_and(|p| p.is_file())
    }

    /// Run a handler over an existing artifact and write the result back in
    /// place.
    ///
    /// The first manual transform keeps the original under `backups/`; later
    /// ones leave that backup alone so [`restore`](Self::restore) always
    /// returns to the synced data.
    pub async fn apply_handler(
        &self,
        filename: &str,
        handler: &str,
        runner: &TransformRunner,
    ) -> Result<Table, StoreError> {
        let path = self.artifact_path(filename)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(filename.to_owned()));
        }
        if is_spreadsheet(filename) {
            return Err(StoreError::UnsupportedFormat(filename.to_owned()));
        }

        let backup = self.backup_path(filename)?;
        if !backup.is_file() {
            std::fs::create_dir_all(self.backup_dir())?;
            std::fs::copy(&path, &backup)?;
            tracing::info!(filename, "original kept in backups");
        }

        let table = self.read_table(filename)?;
        let result = runner.apply(handler, &table).await?;
        if result.is_empty() {
            return Err(StoreError::EmptyResult(filename.to_owned()));
        }

        self.save_table(filename, &result)?;
        tracing::info!(filename, handler, rows = result.row_count(), "transform applied");
        Ok(result)
    }

    /// Put the backed-up original back and drop the backup.
    pub fn restore(&self, filename: &str) -> Result<PathBuf, StoreError> {
        let path = self.artifact_path(filename)?;
        let backup = self.backup_path(filename)?;
        if !backup.is_file() {
            return Err(StoreError::NoBackup(filename.to_owned()));
        }

        std::fs::copy(&backup, &path)?;
        std::fs::remove_file(&backup)?;
        tracing::info!(filename, "original restored");
        Ok(path)
    }

    /// Remove an artifact together with its backup.
    pub fn delete(&self, filename: &str) -> Result<(), StoreError> {
        for path in [self.artifact_path(filename)?, self.backup_path(filename)?] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl ArtifactWriter for DataDirectory {
    fn write_table(&self, filename: &str, table: &Table) -> Result<PathBuf, ArtifactError> {
        self.save_table(filename, table).map_err(|e| match e {
            StoreError::Io(io) => ArtifactError::Io(io.to_string()),
            StoreError::InvalidFilename(_) => ArtifactError::Io(e.to_string()),
            other => ArtifactError::Serialize(other.to_string()),
        })
    }
}

fn check_filename(filename: &str) -> Result<(), StoreError> {
    let bad = filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains('/')
        || filename.contains('\\')
        || filename == BACKUP_DIR;
    if bad {
        Err(StoreError::InvalidFilename(filename.to_owned()))
    } else {
        Ok(())
    }
}
