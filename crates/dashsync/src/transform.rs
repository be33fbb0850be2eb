//! Transform stage: user-authored handler scripts run out of process.
//!
//! A handler receives `{"op":"handle","table":<table>}` on stdin and answers
//! with `{"table":<table>}` on stdout. It runs with a cleared environment in
//! a scratch working directory and is killed when the timeout elapses.
//!
//! Python handlers are plain modules exposing `handle(df)`; a small loader
//! speaks the protocol on their behalf. The argument is a pandas `DataFrame`
//! when pandas is installed, otherwise the `{"columns", "rows"}` mapping.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::table::Table;

/// Default wall-clock limit for a single handler run.
pub const DEFAULT_TRANSFORM_TIMEOUT: Duration = Duration::from_secs(60);

/// Exit code a handler uses to say it has no `handle` entry point.
pub const EXIT_NO_HANDLE: i32 = 64;

/// Loads a Python module fresh from `argv[1]` and calls its `handle`.
/// Output the module prints goes to stderr so stdout stays protocol-only.
const PYTHON_LOADER: &str = r#"
import importlib.util, json, sys

out, sys.stdout = sys.stdout, sys.stderr

def reply(payload):
    json.dump(payload, out)
    out.flush()

def describe(e):
    return f"{type(e).__name__}: {e}"

spec = importlib.util.spec_from_file_location("dashsync_handler", sys.argv[1])
module = importlib.util.module_from_spec(spec)
try:
    spec.loader.exec_module(module)
except Exception as e:
    reply({"error": describe(e)})
    sys.exit(0)

handle = getattr(module, "handle", None)
if not callable(handle):
    sys.exit(64)

table = json.load(sys.stdin)["table"]
try:
    import pandas as pd
except ImportError:
    pd = None

try:
    arg = pd.DataFrame(table["rows"], columns=table["columns"]) if pd else table
    result = handle(arg)
    if pd is not None and isinstance(result, pd.DataFrame):
        result = {
            "columns": [str(c) for c in result.columns],
            "rows": json.loads(result.to_json(orient="values")),
        }
    if not isinstance(result, dict) or "columns" not in result or "rows" not in result:
        raise TypeError("handle() must return a table")
except Exception as e:
    reply({"error": describe(e)})
    sys.exit(0)

reply({"table": result})
"#;

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("script {0} not found")]
    NotFound(String),

    #[error("script {0} has no handle() function")]
    MissingHandle(String),

    #[error("error in transform script {handler}: {message}")]
    Raised { handler: String, message: String },

    #[error("transform script {handler} timed out after {secs}s")]
    Timeout { handler: String, secs: u64 },

    #[error("transform script {handler} returned invalid output: {message}")]
    Protocol { handler: String, message: String },

    #[error("failed to run transform script {handler}: {message}")]
    Io { handler: String, message: String },
}

#[derive(Serialize)]
struct HandleRequest<'a> {
    op: &'static str,
    table: &'a Table,
}

#[derive(Deserialize)]
struct HandleResponse {
    table: Option<Table>,
    error: Option<String>,
}

/// Runs handler scripts from a handlers directory.
#[derive(Debug, Clone)]
pub struct TransformRunner {
    handlers_dir: PathBuf,
    interpreter: Option<Vec<String>>,
    timeout: Duration,
}

impl TransformRunner {
    pub fn new(handlers_dir: impl Into<PathBuf>) -> Self {
        Self {
            handlers_dir: handlers_dir.into(),
            interpreter: None,
            timeout: DEFAULT_TRANSFORM_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run every handler through this argv prefix instead of choosing an
    /// interpreter by extension.
    pub fn with_interpreter(mut self, interpreter: Vec<String>) -> Self {
        self.interpreter = (!interpreter.is_empty()).then_some(interpreter);
        self
    }

    pub fn handlers_dir(&self) -> &Path {
        &self.handlers_dir
    }

    /// Resolve a handler name to a file inside the handlers directory.
    /// Names with path separators or parent components never resolve.
    pub fn resolve(&self, handler: &str) -> Result<PathBuf, TransformError> {
        let escapes = handler.contains('/') || handler.contains('\\') || handler == "..";
        let path = self.handlers_dir.join(handler);
        if escapes || !path.is_file() {
            return Err(TransformError::NotFound(handler.to_owned()));
        }
        Ok(path)
    }

    /// Apply `handler` to a copy of `table`. The input is never modified.
    pub async fn apply(&self, handler: &str, table: &Table) -> Result<Table, TransformError> {
        let script = self.resolve(handler)?;
        let io_err = |e: std::io::Error| TransformError::Io {
            handler: handler.to_owned(),
            message: e.to_string(),
        };

        let request = serde_json::to_vec(&HandleRequest {
            op: "handle",
            table,
        })
        .map_err(|e| TransformError::Io {
            handler: handler.to_owned(),
            message: e.to_string(),
        })?;

        // Handlers run from a scratch directory.
        let script = std::path::absolute(&script).map_err(io_err)?;
        let scratch = tempfile::tempdir().map_err(io_err)?;
        let mut command = self.command_for(&script);
        command
            .current_dir(scratch.path())
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            command.env("PATH", path);
        }

        tracing::debug!(handler, script = %script.display(), "running transform");
        let mut child = command.spawn().map_err(io_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                // A handler may exit without reading its input.
                let _ = stdin.write_all(&request).await;
                let _ = stdin.shutdown().await;
            });
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(io_err)?,
            Err(_) => {
                return Err(TransformError::Timeout {
                    handler: handler.to_owned(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if output.status.code() == Some(EXIT_NO_HANDLE) {
            return Err(TransformError::MissingHandle(handler.to_owned()));
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(TransformError::Raised {
                handler: handler.to_owned(),
                message,
            });
        }

        let response: HandleResponse =
            serde_json::from_slice(&output.stdout).map_err(|e| TransformError::Protocol {
                handler: handler.to_owned(),
                message: e.to_string(),
            })?;

        match response {
            HandleResponse {
                error: Some(message),
                ..
            } => Err(TransformError::Raised {
                handler: handler.to_owned(),
                message,
            }),
            HandleResponse {
                table: Some(table), ..
            } => Ok(table),
            HandleResponse { .. } => Err(TransformError::MissingHandle(handler.to_owned())),
        }
    }

    fn command_for(&self, script: &Path) -> Command {
        if let Some((program, args)) = self.interpreter.as_ref().and_then(|i| i.split_first()) {
            let mut command = Command::new(program);
            command.args(args).arg(script);
            return command;
        }

        match script.extension().and_then(|e| e.to_str()) {
            Some("py") => {
                let mut command = Command::new("python3");
                command.arg("-c").arg(PYTHON_LOADER).arg(script);
                command
            }
            Some("sh") => {
                let mut command = Command::new("sh");
                command.arg(script);
                command
            }
            _ => Command::new(script),
        }
    }
}

/// Handler files a source may reference, sorted by name. Hidden files and
/// package init files are excluded. A missing directory yields an empty list.
pub fn list_handlers(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.') && name != "__init__.py")
        .collect();
    names.sort();
    names
}

#[cfg(all(test, unix))]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Table {
        Table::new(
            vec!["region".into(), "amount".into()],
            vec![vec![json!("north"), json!(10)]],
        )
    }

    fn runner_with(scripts: &[(&str, &str)]) -> (tempfile::TempDir, TransformRunner) {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in scripts {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        let runner = TransformRunner::new(dir.path()).with_timeout(Duration::from_secs(5));
        (dir, runner)
    }

    #[tokio::test]
    async fn passthrough_handler_returns_table() {
        let (_dir, runner) =
            runner_with(&[("echo.sh", "sed 's/^{\"op\":\"handle\",/{/'\n")]);

        let result = runner.apply("echo.sh", &sample()).await.unwrap();
        assert_eq!(result, sample());
    }

    #[tokio::test]
    async fn handler_can_replace_table() {
        let (_dir, runner) = runner_with(&[(
            "replace.sh",
            "cat > /dev/null\necho '{\"table\":{\"columns\":[\"total\"],\"rows\":[[42]]}}'\n",
        )]);

        let result = runner.apply("replace.sh", &sample()).await.unwrap();
        assert_eq!(result.columns, vec!["total"]);
        assert_eq!(result.rows, vec![vec![json!(42)]]);
    }

    #[tokio::test]
    async fn missing_script_is_not_found() {
        let (_dir, runner) = runner_with(&[]);
        let err = runner.apply("nope.py", &sample()).await.unwrap_err();
        assert!(matches!(err, TransformError::NotFound(_)));
        assert_eq!(err.to_string(), "script nope.py not found");
    }

    #[tokio::test]
    async fn path_traversal_never_resolves() {
        let (_dir, runner) = runner_with(&[]);
        let err = runner.apply("../etc/passwd", &sample()).await.unwrap_err();
        assert!(matches!(err, TransformError::NotFound(_)));
    }

    #[tokio::test]
    async fn response_without_table_means_no_handle() {
        let (_dir, runner) = runner_with(&[("empty.sh", "cat > /dev/null\necho '{}'\n")]);
        let err = runner.apply("empty.sh", &sample()).await.unwrap_err();
        assert!(matches!(err, TransformError::MissingHandle(_)));
        assert!(err.to_string().contains("no handle() function"));
    }

    #[tokio::test]
    async fn exit_code_64_means_no_handle() {
        let (_dir, runner) = runner_with(&[("nohandle.sh", "exit 64\n")]);
        let err = runner.apply("nohandle.sh", &sample()).await.unwrap_err();
        assert!(matches!(err, TransformError::MissingHandle(_)));
    }

    #[tokio::test]
    async fn failing_handler_reports_stderr() {
        let (_dir, runner) = runner_with(&[(
            "boom.sh",
            "cat > /dev/null\necho 'KeyError: amount' >&2\nexit 1\n",
        )]);

        let err = runner.apply("boom.sh", &sample()).await.unwrap_err();
        assert!(matches!(err, TransformError::Raised { .. }));
        assert!(err.to_string().contains("KeyError: amount"));
    }

    #[tokio::test]
    async fn error_field_is_raised() {
        let (_dir, runner) = runner_with(&[(
            "err.sh",
            "cat > /dev/null\necho '{\"error\":\"division by zero\"}'\n",
        )]);

        let err = runner.apply("err.sh", &sample()).await.unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        let (_dir, runner) = runner_with(&[("slow.sh", "sleep 10\n")]);
        let runner = runner.with_timeout(Duration::from_millis(200));

        let err = runner.apply("slow.sh", &sample()).await.unwrap_err();
        assert!(matches!(err, TransformError::Timeout { .. }));
    }

    #[tokio::test]
    async fn handler_sees_no_ambient_environment() {
        // SAFETY: test-only; no other thread reads this variable.
        unsafe { std::env::set_var("DASHSYNC_SECRET_VALUE", "leaked") };
        let (_dir, runner) = runner_with(&[(
            "env.sh",
            concat!(
                "cat > /dev/null\n",
                "if [ -n \"$DASHSYNC_SECRET_VALUE\" ]; then exit 1; fi\n",
                "echo '{\"table\":{\"columns\":[\"ok\"],\"rows\":[[true]]}}'\n",
            ),
        )]);

        let result = runner.apply("env.sh", &sample()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn non_json_output_is_protocol_error() {
        let (_dir, runner) = runner_with(&[("text.sh", "cat > /dev/null\necho hello\n")]);
        let err = runner.apply("text.sh", &sample()).await.unwrap_err();
        assert!(matches!(err, TransformError::Protocol { .. }));
    }

    fn has_python() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .is_ok_and(|out| out.status.success())
    }

    #[tokio::test]
    async fn python_module_handle_is_called() {
        if !has_python() {
            return;
        }
        let (_dir, runner) = runner_with(&[(
            "clean.py",
            "print('loading clean')\n\ndef handle(df):\n    return df\n",
        )]);

        let result = runner.apply("clean.py", &sample()).await.unwrap();
        assert_eq!(result, sample());
    }

    #[tokio::test]
    async fn python_module_without_handle_is_missing_handle() {
        if !has_python() {
            return;
        }
        let (_dir, runner) = runner_with(&[("nohandle.py", "x = 1\n")]);

        let err = runner.apply("nohandle.py", &sample()).await.unwrap_err();
        assert!(matches!(err, TransformError::MissingHandle(_)));
    }

    #[tokio::test]
    async fn python_handle_exception_is_raised() {
        if !has_python() {
            return;
        }
        let (_dir, runner) = runner_with(&[(
            "boom.py",
            "def handle(df):\n    raise ValueError('bad amount')\n",
        )]);

        let err = runner.apply("boom.py", &sample()).await.unwrap_err();
        assert!(matches!(err, TransformError::Raised { .. }));
        assert!(err.to_string().contains("ValueError: bad amount"));
    }

    #[test]
    fn list_handlers_skips_hidden_and_init() {
        let (dir, _runner) = runner_with(&[
            ("b.py", ""),
            ("a.sh", ""),
            ("__init__.py", ""),
            (".hidden.py", ""),
        ]);
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        assert_eq!(list_handlers(dir.path()), vec!["a.sh", "b.py"]);
    }

    #[test]
    fn list_handlers_missing_dir_is_empty() {
        assert!(list_handlers(Path::new("/definitely/not/here")).is_empty());
    }
}
