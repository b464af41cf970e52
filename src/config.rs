//! Configuration management for sheet-agent.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required for any model call. Checked when the client is built.
//! - `OPENROUTER_BASE_URL` - Optional. Defaults to `https://openrouter.ai/api/v1`.
//! - `OPENROUTER_MODEL` - Optional. Default model. Defaults to `google/gemini-3-flash-preview`.
//! - `MAX_STEPS` - Optional. Step budget of interactive runs. Defaults to `10`.
//! - `BENCH_MAX_STEPS` - Optional. Step budget of benchmark runs. Defaults to `15`.
//! - `WORKSPACE_PATH` - Optional. Working directory for code execution. Defaults to current directory.
//! - `PYTHON_BIN` - Optional. Interpreter used by `run_python`. Defaults to `python3`.
//! - `CODE_TIMEOUT_SECS` - Optional. Default code execution timeout. Defaults to `60`.
//! - `BENCH_DATA_ROOT` - Optional. Benchmark dataset root. Defaults to `SpreadsheetBench-NoDocker/data`.
//! - `BENCH_LOG_DIR` - Optional. Conversation and evaluation logs. Defaults to `benchmark/logs`.
//! - `COMPARATOR_CMD` - Optional. Workbook comparator command used by evaluation.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    pub base_url: String,

    /// Default model identifier (OpenRouter format)
    pub default_model: String,

    /// Step budget for interactive runs
    pub max_steps: usize,

    /// Step budget for benchmark runs
    pub bench_max_steps: usize,

    /// Working directory for code execution
    pub workspace_path: PathBuf,

    /// Interpreter for the code execution tool
    pub python_bin: String,

    /// Default code execution timeout in seconds
    pub code_timeout_secs: u64,

    /// Root directory holding benchmark datasets
    pub bench_data_root: PathBuf,

    /// Directory for benchmark logs and evaluation results
    pub bench_log_dir: PathBuf,

    /// External workbook comparator command line
    pub comparator_cmd: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        let base_url = std::env::var("OPENROUTER_BASE_URL")
            .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string());

        let default_model = std::env::var("OPENROUTER_MODEL")
            .unwrap_or_else(|_| "google/gemini-3-flash-preview".to_string());

        let workspace_path = std::env::var("WORKSPACE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        Ok(Self {
            api_key,
            base_url,
            default_model,
            max_steps: parse_var("MAX_STEPS", 10)?,
            bench_max_steps: parse_var("BENCH_MAX_STEPS", 15)?,
            workspace_path,
            python_bin: std::env::var("PYTHON_BIN").unwrap_or_else(|_| "python3".to_string()),
            code_timeout_secs: parse_var("CODE_TIMEOUT_SECS", 60)?,
            bench_data_root: std::env::var("BENCH_DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("SpreadsheetBench-NoDocker/data")),
            bench_log_dir: std::env::var("BENCH_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("benchmark/logs")),
            comparator_cmd: std::env::var("COMPARATOR_CMD")
                .ok()
                .filter(|c| !c.trim().is_empty()),
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: Option<String>, default_model: String, workspace_path: PathBuf) -> Self {
        Self {
            api_key,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            default_model,
            max_steps: 10,
            bench_max_steps: 15,
            workspace_path,
            python_bin: "python3".to_string(),
            code_timeout_secs: 60,
            bench_data_root: PathBuf::from("SpreadsheetBench-NoDocker/data"),
            bench_log_dir: PathBuf::from("benchmark/logs"),
            comparator_cmd: None,
        }
    }

    /// The comparator command, required by evaluation.
    pub fn require_comparator(&self) -> Result<&str, ConfigError> {
        self.comparator_cmd
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("COMPARATOR_CMD".to_string()))
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}
