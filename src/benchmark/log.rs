//! Append-only JSONL execution log; the source of truth for resume.

use std::collections::{BTreeMap, HashSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::dataset::{string_or_number, BenchTask};
use crate::agent::ToolCall;
use crate::llm::Conversation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Success,
    Error,
}

/// Result of one test case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCaseOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_exists: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestCaseOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// One line of the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkTaskRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub instruction_type: String,
    pub status: TaskStatus,
    /// Keyed `"1"` to `"3"`.
    #[serde(default)]
    pub test_cases: BTreeMap<String, TestCaseOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<Conversation>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_steps: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkTaskRecord {
    pub fn pending(task: &BenchTask) -> Self {
        Self {
            id: task.id.clone(),
            instruction_type: task.instruction_type.clone(),
            status: TaskStatus::Pending,
            test_cases: BTreeMap::new(),
            conversation: None,
            tool_calls: Vec::new(),
            num_steps: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Error;
        self.error = Some(error.into());
    }
}

/// Newline-delimited JSON log, one record per task.
#[derive(Debug, Clone)]
pub struct ExecutionLog {
    path: PathBuf,
}

impl ExecutionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line under an exclusive file lock.
    ///
    /// Lock waits and file I/O run on the blocking pool.
    pub async fn append(&self, record: &BenchmarkTaskRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || append_line(&path, &line))
            .await
            .context("Log writer task failed")?
    }

    /// Every line that parses as a record. Blank and unreadable lines are
    /// skipped.
    pub fn records(&self) -> anyhow::Result<Vec<BenchmarkTaskRecord>> {
        Ok(self
            .lines()?
            .into_iter()
            .filter_map(|(number, line)| match serde_json::from_str(&line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(line = number, error = %e, "Skipping unreadable log line");
                    None
                }
            })
            .collect())
    }

    /// Ids with at least one `success` record.
    ///
    /// Lines are read as loose JSON so records written by other versions of
    /// the runner still count.
    pub fn completed_ids(&self) -> anyhow::Result<HashSet<String>> {
        let mut completed = HashSet::new();
        for (number, line) in self.lines()? {
            let Ok(value) = serde_json::from_str::<Value>(&line) else {
                tracing::warn!(line = number, "Skipping unreadable log line");
                continue;
            };
            if value.get("status").and_then(Value::as_str) != Some("success") {
                continue;
            }
            match value.get("id") {
                Some(Value::String(id)) => {
                    completed.insert(id.clone());
                }
                Some(Value::Number(id)) => {
                    completed.insert(id.to_string());
                }
                _ => {}
            }
        }
        Ok(completed)
    }

    /// Non-blank lines with their 1-based numbers. Lines that are not valid
    /// UTF-8, such as a write cut off inside a multi-byte character, are
    /// skipped.
    fn lines(&self) -> anyhow::Result<Vec<(usize, String)>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read log {}", self.path.display()))?;

        let mut lines = Vec::new();
        for (i, raw) in bytes.split(|&b| b == b'\n').enumerate() {
            let line = match std::str::from_utf8(raw) {
                Ok(line) => line.trim(),
                Err(e) => {
                    tracing::warn!(line = i + 1, error = %e, "Skipping log line with invalid UTF-8");
                    continue;
                }
            };
            if !line.is_empty() {
                lines.push((i + 1, line.to_string()));
            }
        }
        Ok(lines)
    }
}

fn append_line(path: &Path, line: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log {}", path.display()))?;
    file.lock_exclusive()
        .with_context(|| format!("Failed to lock log {}", path.display()))?;
    let written = file.write_all(line.as_bytes()).and_then(|_| file.flush());
    let unlocked = file.unlock();
    written.with_context(|| format!("Failed to append to {}", path.display()))?;
    unlocked?;
    Ok(())
}
