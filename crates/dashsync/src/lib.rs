pub mod artifact;
pub mod connector;
pub mod context;
pub mod coordinator;
pub mod descriptor;
pub mod feedback;
pub mod orchestrator;
pub mod registry;
pub mod spec;
pub mod table;
pub mod transform;

pub use artifact::{ArtifactError, ArtifactWriter};
pub use connector::{Connector, ConnectorConfig, ConnectorError};
pub use context::{GoogleCredentials, SyncContext};
pub use coordinator::{DEFAULT_CONCURRENCY, SyncCoordinator, SyncLog};
pub use descriptor::{ConnectorDescriptor, FieldDescriptor, FieldKind, prepare_config};
pub use feedback::Feedback;
pub use orchestrator::{Orchestrator, SyncError, SyncResult, SyncedTable};
pub use registry::{ConnectorCatalog, ConnectorFactory, ConnectorRegistry};
pub use spec::SourceSpec;
pub use table::Table;
pub use transform::{TransformError, TransformRunner, list_handlers};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
