use crate::orchestrator::SyncResult;

/// One line of run output. Sync batches report one line per source so a
/// failure never hides a sibling's success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    Info(String),
    /// The operation continued but something needs attention.
    Warning(String),
    Error(String),
}

impl Feedback {
    pub fn info(msg: impl Into<String>) -> Self {
        Self::Info(msg.into())
    }

    pub fn warning(msg: impl Into<String>) -> Self {
        Self::Warning(msg.into())
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error(msg.into())
    }

    /// Run line for one source's sync outcome.
    pub fn for_sync(name: &str, result: &SyncResult) -> Self {
        match result {
            Ok(_) => Self::info(format!("{name}: OK")),
            Err(err) => Self::error(format!("{name}: {err}")),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Info(msg) | Self::Warning(msg) | Self::Error(msg) => msg,
        }
    }
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info(msg) => write!(f, "{msg}"),
            Self::Warning(msg) => write!(f, "warning: {msg}"),
            Self::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::orchestrator::{SyncError, SyncedTable};
    use crate::table::Table;

    use super::*;

    #[test]
    fn sync_outcomes_become_run_lines() {
        let ok: SyncResult = Ok(SyncedTable {
            table: Table::default(),
            path: "data/sales.csv".into(),
        });
        let line = Feedback::for_sync("sales.csv", &ok);
        assert!(!line.is_error());
        assert_eq!(line.to_string(), "sales.csv: OK");

        let failed: SyncResult = Err(SyncError::EmptyResult);
        let line = Feedback::for_sync("sales.csv", &failed);
        assert!(line.is_error());
        assert_eq!(line.message(), "sales.csv: source returned an empty result");
    }

    #[test]
    fn feedback_display() {
        assert_eq!(Feedback::info("msg").to_string(), "msg");
        assert_eq!(Feedback::warning("msg").to_string(), "warning: msg");
        assert_eq!(Feedback::error("msg").to_string(), "error: msg");
    }
}
