pub mod artifacts;
pub mod charts;
pub mod connectors;
pub mod format;
pub mod sources;
pub mod sync;
