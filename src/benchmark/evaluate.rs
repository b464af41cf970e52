//! Scoring of produced workbooks against ground truth.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::dataset::{output_path, setting_name, Dataset};

/// Decides whether a produced workbook matches the ground truth at the
/// answer position.
#[async_trait]
pub trait WorkbookComparator: Send + Sync {
    async fn compare(
        &self,
        ground_truth: &Path,
        produced: &Path,
        instruction_type: &str,
        answer_position: &str,
    ) -> anyhow::Result<bool>;
}

/// Delegates comparison to an external program:
/// `<program> [args...] <ground_truth> <produced> <instruction_type> <answer_position>`.
///
/// Exit 0 means pass, exit 1 means fail, anything else is an error.
#[derive(Debug, Clone)]
pub struct CommandComparator {
    program: String,
    args: Vec<String>,
}

impl CommandComparator {
    /// Split a whitespace-separated command line.
    pub fn parse(command: &str) -> anyhow::Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else {
            bail!("Comparator command is empty");
        };
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl WorkbookComparator for CommandComparator {
    async fn compare(
        &self,
        ground_truth: &Path,
        produced: &Path,
        instruction_type: &str,
        answer_position: &str,
    ) -> anyhow::Result<bool> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(ground_truth)
            .arg(produced)
            .arg(instruction_type)
            .arg(answer_position)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run comparator {}", self.program))?;

        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            code => bail!(
                "Comparator exited with {}: {}",
                code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }
}

/// Scores of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: String,
    pub instruction_type: String,
    pub test_case_results: [u8; 3],
    pub soft_restriction: f64,
    pub hard_restriction: u8,
}

impl EvaluationRecord {
    pub fn new(id: String, instruction_type: String, test_case_results: [u8; 3]) -> Self {
        let passed = test_case_results.iter().filter(|&&r| r == 1).count();
        Self {
            id,
            instruction_type,
            test_case_results,
            soft_restriction: passed as f64 / test_case_results.len() as f64,
            hard_restriction: u8::from(!test_case_results.contains(&0)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategoryStats {
    pub total: usize,
    pub soft_sum: f64,
    pub hard_sum: usize,
}

impl CategoryStats {
    pub fn add(&mut self, record: &EvaluationRecord) {
        self.total += 1;
        self.soft_sum += record.soft_restriction;
        self.hard_sum += usize::from(record.hard_restriction);
    }

    pub fn soft_avg(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.soft_sum / self.total as f64
        }
    }

    pub fn hard_avg(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.hard_sum as f64 / self.total as f64
        }
    }
}

/// Per-task records plus per-category aggregates, including `overall`.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub setting: String,
    pub dataset: String,
    pub records: Vec<EvaluationRecord>,
    pub stats: BTreeMap<String, CategoryStats>,
    pub result_path: PathBuf,
}

impl EvaluationReport {
    pub fn render_summary(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "  Evaluation: {}", self.setting);
        let _ = writeln!(out, "  Dataset: {}", self.dataset);
        let _ = writeln!(out, "{}", rule);
        for (category, stats) in &self.stats {
            let _ = writeln!(
                out,
                "  {:30}  n={:4}  soft={:.4}  hard={:.4}",
                category,
                stats.total,
                stats.soft_avg(),
                stats.hard_avg()
            );
        }
        let _ = writeln!(out, "{}", rule);
        let _ = write!(out, "  Detailed results: {}", self.result_path.display());
        out
    }
}

pub struct Evaluator {
    comparator: Arc<dyn WorkbookComparator>,
    data_root: PathBuf,
    log_dir: PathBuf,
}

impl Evaluator {
    pub fn new(comparator: Arc<dyn WorkbookComparator>, data_root: PathBuf, log_dir: PathBuf) -> Self {
        Self {
            comparator,
            data_root,
            log_dir,
        }
    }

    /// Score every task of `dataset` for the outputs of `setting` and `model`
    /// and write the records to `eval_<setting>.json` in the log directory.
    pub async fn evaluate(
        &self,
        dataset: &str,
        setting: &str,
        model: &str,
    ) -> anyhow::Result<EvaluationReport> {
        let root = Dataset::locate(&self.data_root, dataset)?;
        let data = Dataset::load(&root)?;
        let setting = setting_name(setting, model);
        let output_dir = data.output_dir(&setting);
        if !output_dir.is_dir() {
            bail!(
                "Output directory not found: {}. Run the benchmark first.",
                output_dir.display()
            );
        }

        tracing::info!(dataset, setting = %setting, tasks = data.tasks.len(), "Evaluating");

        let mut records = Vec::with_capacity(data.tasks.len());
        let mut stats: BTreeMap<String, CategoryStats> = BTreeMap::new();
        for task in &data.tasks {
            let mut results = [0u8; 3];
            for (slot, case) in results.iter_mut().zip(1u8..=3) {
                let ground_truth = data.answer_path(&task.id, case);
                let produced = output_path(&output_dir, &task.id, case);
                if !ground_truth.exists() || !produced.exists() {
                    tracing::debug!(id = %task.id, case, "Missing workbook; scoring as fail");
                    continue;
                }
                match self
                    .comparator
                    .compare(
                        &ground_truth,
                        &produced,
                        &task.instruction_type,
                        &task.answer_position,
                    )
                    .await
                {
                    Ok(passed) => *slot = u8::from(passed),
                    Err(e) => {
                        tracing::warn!(id = %task.id, case, error = %e, "Comparator failed");
                    }
                }
            }

            let record =
                EvaluationRecord::new(task.id.clone(), task.instruction_type.clone(), results);
            stats
                .entry(record.instruction_type.clone())
                .or_default()
                .add(&record);
            stats.entry("overall".to_string()).or_default().add(&record);
            records.push(record);
        }

        tokio::fs::create_dir_all(&self.log_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.log_dir.display()))?;
        let result_path = self.log_dir.join(format!("eval_{}.json", setting));
        tokio::fs::write(&result_path, serde_json::to_string_pretty(&records)?)
            .await
            .with_context(|| format!("Failed to write {}", result_path.display()))?;

        Ok(EvaluationReport {
            setting,
            dataset: dataset.to_string(),
            records,
            stats,
            result_path,
        })
    }
}
