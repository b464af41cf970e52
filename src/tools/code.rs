//! Python code execution tool.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::process::Command;

use super::{parse_args, Tool, ToolError, ToolOutput};
use crate::config::Config;

/// Run a Python snippet in the workspace directory.
#[derive(Debug)]
pub struct RunPython {
    interpreter: String,
    workspace: PathBuf,
    default_timeout: u64,
}

#[derive(Deserialize)]
struct RunArgs {
    code: String,
    #[serde(default)]
    timeout: Option<u64>,
}

impl RunPython {
    pub fn new(interpreter: impl Into<String>, workspace: impl Into<PathBuf>, default_timeout: u64) -> Self {
        Self {
            interpreter: interpreter.into(),
            workspace: workspace.into(),
            default_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.python_bin.clone(),
            config.workspace_path.clone(),
            config.code_timeout_secs,
        )
    }

    /// Execute `code` and return its combined output. Failures of any kind
    /// come back as text.
    pub async fn run(&self, code: &str, timeout_secs: u64) -> String {
        let script = match write_script(code) {
            Ok(script) => script,
            Err(e) => return format!("[Execution error: {}]", e),
        };

        tracing::info!(interpreter = %self.interpreter, timeout_secs, "Executing code");

        let child = Command::new(&self.interpreter)
            .arg(script.as_os_str())
            .current_dir(&self.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => return format!("[Execution error: {}]", e),
        };

        let output = match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return format!("[Execution error: {}]", e),
            Err(_) => {
                tracing::warn!(timeout_secs, "Code execution timed out");
                return format!("[Execution timed out after {} seconds]", timeout_secs);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut result = stdout.to_string();
        if !stderr.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str(&stderr);
        } else if !output.status.success() {
            result.push_str(&format!(
                "\n[exit code: {}]",
                output.status.code().unwrap_or(-1)
            ));
        }

        let result = result.trim();
        if result.is_empty() {
            "[Code executed successfully with no output]".to_string()
        } else {
            result.to_string()
        }
    }
}

/// Temporary `.py` file, removed when the returned path drops.
fn write_script(code: &str) -> std::io::Result<tempfile::TempPath> {
    use std::io::Write;

    let mut file = tempfile::Builder::new()
        .prefix("sheet_agent_")
        .suffix(".py")
        .tempfile()?;
    file.write_all(code.as_bytes())?;
    file.flush()?;
    Ok(file.into_temp_path())
}

#[async_trait]
impl Tool for RunPython {
    fn name(&self) -> &str {
        "run_python"
    }

    fn description(&self) -> &str {
        "Execute Python code in the workspace (e.g. openpyxl or pandas) and return stdout and stderr"
    }

    fn params(&self) -> &[&str] {
        &["code", "timeout"]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: RunArgs = parse_args(self.name(), args)?;
        let timeout = args.timeout.unwrap_or(self.default_timeout);
        Ok(ToolOutput::Text(self.run(&args.code, timeout).await))
    }
}
