use std::path::PathBuf;
use std::sync::Arc;

use crate::artifact::{ArtifactError, ArtifactWriter, generated_filename};
use crate::connector::ConnectorError;
use crate::context::SyncContext;
use crate::descriptor::prepare_config;
use crate::registry::ConnectorCatalog;
use crate::spec::SourceSpec;
use crate::table::Table;
use crate::transform::{TransformError, TransformRunner};

/// Why a single source failed to sync. Each stage has its own variant so
/// the failure taxonomy stays distinguishable; callers only need `Display`.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("connector '{0}' not found")]
    ConnectorNotFound(String),

    #[error("{0}")]
    Validation(ConnectorError),

    #[error("{0}")]
    Connector(ConnectorError),

    #[error("source returned an empty result")]
    EmptyResult,

    #[error("{0}")]
    Transform(#[from] TransformError),

    #[error("failed to save {filename}: {source}")]
    Persist {
        filename: String,
        source: ArtifactError,
    },

    #[error("destination {0} is shared with another source in this batch")]
    DuplicateFilename(String),

    #[error("unexpected fault: {0}")]
    Fault(String),
}

/// A successful sync: the final table and where it was written.
#[derive(Debug, Clone)]
pub struct SyncedTable {
    pub table: Table,
    pub path: PathBuf,
}

pub type SyncResult = Result<SyncedTable, SyncError>;

/// Drives extract, validate, transform and persist for one source.
#[derive(Clone)]
pub struct Orchestrator {
    catalog: ConnectorCatalog,
    transforms: TransformRunner,
    writer: Arc<dyn ArtifactWriter>,
}

impl Orchestrator {
    pub fn new(
        catalog: ConnectorCatalog,
        transforms: TransformRunner,
        writer: Arc<dyn ArtifactWriter>,
    ) -> Self {
        Self {
            catalog,
            transforms,
            writer,
        }
    }

    pub fn catalog(&self) -> &ConnectorCatalog {
        &self.catalog
    }

    /// Sync one source. Stages run strictly in order and the first failure
    /// ends the run; nothing is retried and nothing is written on failure.
    pub async fn sync(&self, spec: &SourceSpec, ctx: &SyncContext) -> SyncResult {
        let (connector_id, raw_config) = spec.resolve().ok_or_else(|| {
            SyncError::ConnectorNotFound(
                spec.connector_id
                    .clone()
                    .unwrap_or_else(|| crate::registry::BASE_CONNECTOR_ID.to_owned()),
            )
        })?;

        let connector = self
            .catalog
            .instantiate(&connector_id)
            .ok_or_else(|| SyncError::ConnectorNotFound(connector_id.clone()))?;

        let config =
            prepare_config(&connector.fields(), &raw_config).map_err(SyncError::Validation)?;

        connector
            .validate(&config, ctx)
            .map_err(SyncError::Validation)?;

        tracing::debug!(source = spec.display_name(), connector = %connector_id, "loading");
        let mut table = connector
            .load(&config, ctx)
            .await
            .map_err(SyncError::Connector)?;

        if table.is_empty() {
            return Err(SyncError::EmptyResult);
        }

        if let Some(handler) = spec.handler() {
            table = self.transforms.apply(handler, &table).await?;
        }

        let filename = spec.destination().unwrap_or_else(generated_filename);

        let path = self
            .writer
            .write_table(&filename, &table)
            .map_err(|source| SyncError::Persist {
                filename: filename.clone(),
                source,
            })?;

        tracing::info!(
            source = spec.display_name(),
            connector = %connector_id,
            rows = table.row_count(),
            path = %path.display(),
            "synced"
        );

        Ok(SyncedTable { table, path })
    }
}
