use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application configuration. Relative directories are resolved against
/// `root`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub handlers_dir: PathBuf,
    pub config_dir: PathBuf,
    pub charts_dir: PathBuf,
    pub transform_timeout_secs: u64,
    /// Argv prefix every handler is run through, e.g. `["python3", "-u"]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_interpreter: Option<Vec<String>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            data_dir: PathBuf::from("data_sources"),
            handlers_dir: PathBuf::from("handlers"),
            config_dir: PathBuf::from("config"),
            charts_dir: PathBuf::from("charts"),
            transform_timeout_secs: 60,
            transform_interpreter: None,
        }
    }
}

impl AppConfig {
    fn resolve(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.root.join(dir)
        }
    }

    pub fn data_path(&self) -> PathBuf {
        self.resolve(&self.data_dir)
    }

    pub fn handlers_path(&self) -> PathBuf {
        self.resolve(&self.handlers_dir)
    }

    pub fn config_path(&self) -> PathBuf {
        self.resolve(&self.config_dir)
    }

    pub fn charts_path(&self) -> PathBuf {
        self.resolve(&self.charts_dir)
    }

    pub fn transform_timeout(&self) -> Duration {
        Duration::from_secs(self.transform_timeout_secs.max(1))
    }
}

/// Config file path: `~/.config/dashsync/dashsync.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dashsync").join("dashsync.toml"))
}

/// Load config from `explicit` or the default location, falling back to
/// defaults. Only an explicitly named file that is missing is worth a
/// warning.
pub fn load_config(explicit: Option<&Path>) -> AppConfig {
    let Some(path) = explicit.map(Path::to_path_buf).or_else(default_config_path) else {
        return AppConfig::default();
    };

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) => {
            if explicit.is_some() {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "config file unreadable, using defaults"
                );
            }
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config, using defaults"
            );
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.data_path(), PathBuf::from("./data_sources"));
        assert_eq!(config.transform_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn relative_dirs_follow_root() {
        let toml_str = r#"
root = "/srv/dash"
data_dir = "data"
handlers_dir = "/opt/handlers"
transform_timeout_secs = 5
transform_interpreter = ["python3", "-u"]
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.data_path(), PathBuf::from("/srv/dash/data"));
        assert_eq!(config.handlers_path(), PathBuf::from("/opt/handlers"));
        assert_eq!(config.config_path(), PathBuf::from("/srv/dash/config"));
        assert_eq!(config.charts_path(), PathBuf::from("/srv/dash/charts"));
        assert_eq!(config.transform_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.transform_interpreter,
            Some(vec!["python3".to_owned(), "-u".to_owned()])
        );
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashsync.toml");
        std::fs::write(&path, "data_dir = \"out\"\n").unwrap();

        let config = load_config(Some(&path));
        assert_eq!(config.data_dir, PathBuf::from("out"));
        assert_eq!(config.handlers_dir, PathBuf::from("handlers"));
    }

    #[test]
    fn unreadable_or_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            load_config(Some(&dir.path().join("missing.toml"))),
            AppConfig::default()
        );

        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "data_dir = [").unwrap();
        assert_eq!(load_config(Some(&path)), AppConfig::default());
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let config = AppConfig {
            transform_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.transform_timeout(), Duration::from_secs(1));
    }
}
