pub mod charts;
mod codec;
pub mod data_dir;
pub mod documents;

pub use charts::{list_chart_modules, resolve_chart_data};
pub use data_dir::{ArtifactEntry, DataDirectory, StoreError};
pub use documents::{
    ChartLinks, ConfigFiles, Pages, SourcesDocument, Titles, load_document, save_document,
};
