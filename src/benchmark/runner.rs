//! Drives the agent over a benchmark dataset.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;

use super::dataset::{output_path, setting_name, BenchTask, Dataset};
use super::log::{BenchmarkTaskRecord, ExecutionLog, TaskStatus, TestCaseOutcome};
use crate::agent::{extract_tool_calls, Agent};
use crate::config::Config;
use crate::llm::{LlmClient, RetryPolicy, RetryingClient};
use crate::tools::ToolRegistry;

/// Parameters of one benchmark pass.
#[derive(Debug, Clone)]
pub struct BenchmarkOptions {
    /// Dataset directory name under the data root
    pub dataset: String,
    /// Model override; `None` uses the configured default
    pub model: Option<String>,
    pub max_steps: usize,
    /// Skip tasks that already have a success record
    pub resume: bool,
    /// Restrict the pass to these ids
    pub task_ids: Option<Vec<String>>,
    /// Prefix of output directory and log names
    pub setting: String,
    pub retry: RetryPolicy,
}

impl BenchmarkOptions {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            model: None,
            max_steps: 15,
            resume: false,
            task_ids: None,
            setting: "agent".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Counts and locations of a finished pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub success: usize,
    pub error: usize,
    pub skipped: usize,
    pub output_dir: PathBuf,
    pub log_path: PathBuf,
}

pub struct BenchmarkRunner {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    data_root: PathBuf,
    log_dir: PathBuf,
    default_model: String,
}

impl BenchmarkRunner {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, config: &Config) -> Self {
        Self {
            llm,
            tools,
            data_root: config.bench_data_root.clone(),
            log_dir: config.bench_log_dir.clone(),
            default_model: config.default_model.clone(),
        }
    }

    /// Run every selected task in dataset order, appending one log record
    /// per task.
    pub async fn run(&self, options: &BenchmarkOptions) -> anyhow::Result<RunSummary> {
        let root = Dataset::locate(&self.data_root, &options.dataset)?;
        let dataset = Dataset::load(&root)?;

        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let setting = setting_name(&options.setting, model);
        let output_dir = dataset.output_dir(&setting);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let log = ExecutionLog::new(self.log_dir.join(format!("conv_{}.jsonl", setting)));
        let completed = if options.resume {
            let ids = log.completed_ids()?;
            tracing::info!(completed = ids.len(), "Resuming; completed tasks will be skipped");
            ids
        } else {
            HashSet::new()
        };

        let tasks: Vec<&BenchTask> = match &options.task_ids {
            Some(ids) => {
                let wanted: HashSet<&str> = ids.iter().map(|s| s.trim()).collect();
                dataset
                    .tasks
                    .iter()
                    .filter(|t| wanted.contains(t.id.as_str()))
                    .collect()
            }
            None => dataset.tasks.iter().collect(),
        };

        tracing::info!(
            dataset = %options.dataset,
            tasks = tasks.len(),
            model,
            output_dir = %output_dir.display(),
            log = %log.path().display(),
            "Starting benchmark"
        );

        let agent = Agent::new(
            Arc::new(RetryingClient::new(self.llm.clone(), options.retry.clone())),
            self.tools.clone(),
        )
        .with_max_steps(options.max_steps)
        .with_model(options.model.clone());

        let mut summary = RunSummary {
            success: 0,
            error: 0,
            skipped: 0,
            output_dir: output_dir.clone(),
            log_path: log.path().to_path_buf(),
        };

        for (index, task) in tasks.iter().enumerate() {
            if completed.contains(&task.id) {
                summary.skipped += 1;
                continue;
            }

            tracing::info!(id = %task.id, progress = %format!("{}/{}", index + 1, tasks.len()), "Running task");
            let record = run_task(&agent, task, &dataset, &output_dir).await;
            match record.status {
                TaskStatus::Success => summary.success += 1,
                _ => {
                    tracing::error!(id = %task.id, error = ?record.error, "Task failed");
                    summary.error += 1;
                }
            }
            log.append(&record).await?;
        }

        tracing::info!(
            success = summary.success,
            error = summary.error,
            skipped = summary.skipped,
            "Benchmark finished"
        );
        Ok(summary)
    }
}

/// Run the three test cases of one task.
///
/// Test case 1 decides the task status; failures in cases 2 and 3 are only
/// recorded on the case itself.
async fn run_task(
    agent: &Agent,
    task: &BenchTask,
    dataset: &Dataset,
    output_dir: &Path,
) -> BenchmarkTaskRecord {
    let mut record = BenchmarkTaskRecord::pending(task);

    let input = dataset.input_path(&task.id, 1);
    let output = output_path(output_dir, &task.id, 1);
    if !input.exists() {
        record.fail(format!("Input not found: {}", input.display()));
        return record;
    }
    if let Err(e) = tokio::fs::copy(&input, &output).await {
        record.fail(format!("Failed to copy {}: {}", input.display(), e));
        return record;
    }

    let started = Instant::now();
    match agent.run(&task.agent_task(&output)).await {
        Ok(result) => {
            let elapsed = (started.elapsed().as_secs_f64() * 100.0).round() / 100.0;
            record.test_cases.insert(
                "1".to_string(),
                TestCaseOutcome {
                    output_exists: Some(output.exists()),
                    elapsed_seconds: Some(elapsed),
                    error: None,
                },
            );
            record.tool_calls = extract_tool_calls(&result.conversation);
            record.num_steps = Some(record.tool_calls.len());
            record.conversation = Some(result.conversation);
        }
        Err(e) => {
            record.fail(e.to_string());
            return record;
        }
    }

    for case in [2u8, 3] {
        let input = dataset.input_path(&task.id, case);
        let output = output_path(output_dir, &task.id, case);
        let outcome = if !input.exists() {
            TestCaseOutcome::failed("input not found")
        } else if let Err(e) = tokio::fs::copy(&input, &output).await {
            TestCaseOutcome::failed(format!("Failed to copy {}: {}", input.display(), e))
        } else {
            match agent.run(&task.agent_task(&output)).await {
                Ok(_) => TestCaseOutcome {
                    output_exists: Some(output.exists()),
                    ..TestCaseOutcome::default()
                },
                Err(e) => TestCaseOutcome::failed(e.to_string()),
            }
        };
        record.test_cases.insert(case.to_string(), outcome);
    }

    record.status = TaskStatus::Success;
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedLlm;
    use crate::llm::LlmError;
    use crate::sheet;
    use serde_json::json;

    struct Fixture {
        dir: tempfile::TempDir,
        config: Config,
    }

    impl Fixture {
        /// Dataset `sample` with tasks 7 and 9. Task 7 has inputs for cases
        /// 1 and 2; task 9 only for case 1.
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("data/sample");
            std::fs::create_dir_all(&root).unwrap();
            std::fs::write(
                root.join("dataset.json"),
                json!([
                    {"id": 7, "instruction": "Sum B", "instruction_type": "Cell-Level Manipulation", "answer_position": "B5"},
                    {"id": "9", "instruction": "Bold header", "instruction_type": "Sheet-Level Manipulation", "answer_position": "A1:C1"}
                ])
                .to_string(),
            )
            .unwrap();

            for (id, cases) in [("7", vec![1u8, 2]), ("9", vec![1u8])] {
                let folder = root.join("spreadsheet").join(id);
                std::fs::create_dir_all(&folder).unwrap();
                for case in cases {
                    sheet::create_workbook(
                        &folder.join(format!("{}_{}_input.xlsx", case, id)),
                        &[("Sheet1".to_string(), vec![vec![json!("A")], vec![json!(1)]])],
                    )
                    .unwrap();
                }
            }

            let mut config = Config::new(None, "vendor/model".into(), dir.path().to_path_buf());
            config.bench_data_root = dir.path().join("data");
            config.bench_log_dir = dir.path().join("logs");
            Self { dir, config }
        }

        fn runner(&self, llm: Arc<ScriptedLlm>) -> BenchmarkRunner {
            let tools = Arc::new(ToolRegistry::spreadsheet(&self.config));
            BenchmarkRunner::new(llm, tools, &self.config)
        }

        fn options(&self) -> BenchmarkOptions {
            BenchmarkOptions {
                retry: RetryPolicy::immediate(3),
                ..BenchmarkOptions::new("sample")
            }
        }

        fn log(&self) -> ExecutionLog {
            ExecutionLog::new(self.dir.path().join("logs/conv_agent_vendor_model.jsonl"))
        }
    }

    #[tokio::test]
    async fn success_record_covers_three_test_cases() {
        let fixture = Fixture::new();
        let llm = Arc::new(ScriptedLlm::always("Done."));
        let mut options = fixture.options();
        options.task_ids = Some(vec!["7".into()]);

        let summary = fixture.runner(llm).run(&options).await.expect("run");
        assert_eq!((summary.success, summary.error, summary.skipped), (1, 0, 0));
        assert!(summary.output_dir.ends_with("outputs/agent_vendor_model"));

        let records = fixture.log().records().unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, "7");
        assert_eq!(record.status, TaskStatus::Success);
        assert_eq!(record.num_steps, Some(0));
        assert_eq!(record.test_cases["1"].output_exists, Some(true));
        assert!(record.test_cases["1"].elapsed_seconds.is_some());
        assert_eq!(record.test_cases["2"].output_exists, Some(true));
        assert_eq!(record.test_cases["3"].error.as_deref(), Some("input not found"));
        assert_eq!(record.conversation.as_ref().unwrap().len(), 3);
        assert!(summary.output_dir.join("2_7_output.xlsx").exists());
    }

    #[tokio::test]
    async fn resume_skips_only_successful_tasks() {
        let fixture = Fixture::new();
        std::fs::create_dir_all(fixture.dir.path().join("logs")).unwrap();
        std::fs::write(
            fixture.log().path(),
            concat!(
                "{\"id\": \"7\", \"status\": \"success\", \"timestamp\": \"2025-01-01T00:00:00Z\"}\n",
                "{\"id\": \"9\", \"status\": \"error\", \"error\": \"boom\", \"timestamp\": \"2025-01-01T00:00:00Z\"}\n"
            ),
        )
        .unwrap();

        let llm = Arc::new(ScriptedLlm::always("Done."));
        let mut options = fixture.options();
        options.resume = true;

        let summary = fixture.runner(llm.clone()).run(&options).await.unwrap();
        assert_eq!((summary.success, summary.skipped), (1, 1));
        // Task 9 has a single test case input, so one completion.
        assert_eq!(llm.calls(), 1);

        let records = fixture.log().records().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].id, "9");
        assert_eq!(records[2].status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn model_failure_marks_task_as_error() {
        let fixture = Fixture::new();
        let llm = Arc::new(ScriptedLlm::new(vec![Err(LlmError::InvalidResponse(
            "garbled".into(),
        ))]));
        let mut options = fixture.options();
        options.task_ids = Some(vec!["9".into()]);

        let summary = fixture.runner(llm).run(&options).await.unwrap();
        assert_eq!((summary.success, summary.error), (0, 1));

        let record = &fixture.log().records().unwrap()[0];
        assert_eq!(record.status, TaskStatus::Error);
        assert!(record.error.as_deref().unwrap().contains("garbled"));
    }

    #[tokio::test]
    async fn missing_first_input_is_recorded() {
        let fixture = Fixture::new();
        std::fs::remove_file(
            fixture
                .dir
                .path()
                .join("data/sample/spreadsheet/9/1_9_input.xlsx"),
        )
        .unwrap();
        let llm = Arc::new(ScriptedLlm::always("Done."));
        let mut options = fixture.options();
        options.task_ids = Some(vec!["9".into()]);

        fixture.runner(llm.clone()).run(&options).await.unwrap();
        let record = &fixture.log().records().unwrap()[0];
        assert!(record
            .error
            .as_deref()
            .unwrap()
            .starts_with("Input not found: "));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let fixture = Fixture::new();
        let llm = Arc::new(ScriptedLlm::new(vec![
            Err(LlmError::RateLimited("slow down".into())),
            Err(LlmError::Timeout("late".into())),
            Ok("Done.".into()),
        ]));
        let mut options = fixture.options();
        options.task_ids = Some(vec!["9".into()]);

        let summary = fixture.runner(llm.clone()).run(&options).await.unwrap();
        assert_eq!(summary.success, 1);
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn unknown_dataset_is_an_error() {
        let fixture = Fixture::new();
        let llm = Arc::new(ScriptedLlm::always("Done."));
        let options = BenchmarkOptions::new("nope");
        assert!(fixture.runner(llm).run(&options).await.is_err());
    }
}
