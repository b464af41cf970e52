//! Benchmark dataset layout.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::agent::AgentTask;

/// One labeled task from `dataset.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchTask {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub instruction: String,
    pub instruction_type: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub answer_position: String,
}

impl BenchTask {
    /// The agent task for one working copy of this task's spreadsheet.
    pub fn agent_task(&self, file_path: &Path) -> AgentTask {
        AgentTask::Benchmark {
            instruction: self.instruction.clone(),
            file_path: file_path.display().to_string(),
            instruction_type: self.instruction_type.clone(),
            answer_position: self.answer_position.clone(),
        }
    }
}

/// Ids and positions appear as either strings or numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// A dataset directory and its tasks.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub root: PathBuf,
    pub tasks: Vec<BenchTask>,
}

impl Dataset {
    /// Find the directory holding `<name>/dataset.json`, trying the data root
    /// first and then `./data`.
    pub fn locate(data_root: &Path, name: &str) -> anyhow::Result<PathBuf> {
        let candidates = [data_root.join(name), PathBuf::from("data").join(name)];
        candidates
            .iter()
            .find(|dir| dir.join("dataset.json").is_file())
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Dataset '{}' not found. Tried: {}. Has the data archive been extracted?",
                    name,
                    candidates
                        .iter()
                        .map(|c| c.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }

    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let manifest = root.join("dataset.json");
        let text = std::fs::read_to_string(&manifest)
            .with_context(|| format!("Failed to read {}", manifest.display()))?;
        let tasks: Vec<BenchTask> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {}", manifest.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
            tasks,
        })
    }

    /// `<root>/spreadsheet/<id>/<n>_<id>_input.xlsx`
    pub fn input_path(&self, id: &str, case: u8) -> PathBuf {
        self.root
            .join("spreadsheet")
            .join(id)
            .join(format!("{}_{}_input.xlsx", case, id))
    }

    /// `<root>/spreadsheet/<id>/<n>_<id>_answer.xlsx`
    pub fn answer_path(&self, id: &str, case: u8) -> PathBuf {
        self.root
            .join("spreadsheet")
            .join(id)
            .join(format!("{}_{}_answer.xlsx", case, id))
    }

    /// `<root>/outputs/<setting>`
    pub fn output_dir(&self, setting: &str) -> PathBuf {
        self.root.join("outputs").join(setting)
    }
}

/// `<output_dir>/<n>_<id>_output.xlsx`
pub fn output_path(output_dir: &Path, id: &str, case: u8) -> PathBuf {
    output_dir.join(format!("{}_{}_output.xlsx", case, id))
}

/// Model id made safe for file names.
pub fn safe_model(model: &str) -> String {
    model.replace('/', "_")
}

/// `<setting>_<safe model>`, shared by output directories and log names.
pub fn setting_name(setting: &str, model: &str) -> String {
    format!("{}_{}", setting, safe_model(model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_may_be_numbers_or_strings() {
        let tasks: Vec<BenchTask> = serde_json::from_str(
            r#"[
                {"id": 7, "instruction": "a", "instruction_type": "Cell-Level Manipulation", "answer_position": "B5", "spreadsheet_path": "x"},
                {"id": "13-1", "instruction": "b", "instruction_type": "Sheet-Level Manipulation", "answer_position": "'Sheet1'!A1:C3"}
            ]"#,
        )
        .expect("parse dataset");
        assert_eq!(tasks[0].id, "7");
        assert_eq!(tasks[1].id, "13-1");
        assert_eq!(tasks[1].answer_position, "'Sheet1'!A1:C3");
    }

    #[test]
    fn paths_follow_benchmark_layout() {
        let dataset = Dataset {
            root: PathBuf::from("/data/sample"),
            tasks: Vec::new(),
        };
        assert_eq!(
            dataset.input_path("42", 2),
            PathBuf::from("/data/sample/spreadsheet/42/2_42_input.xlsx")
        );
        assert_eq!(
            dataset.answer_path("42", 3),
            PathBuf::from("/data/sample/spreadsheet/42/3_42_answer.xlsx")
        );
        let out = dataset.output_dir(&setting_name("agent", "google/gemini-3-flash-preview"));
        assert_eq!(
            out,
            PathBuf::from("/data/sample/outputs/agent_google_gemini-3-flash-preview")
        );
        assert_eq!(
            output_path(&out, "42", 1).file_name().unwrap(),
            "1_42_output.xlsx"
        );
    }

    #[test]
    fn locate_reports_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let err = Dataset::locate(dir.path(), "missing_set").unwrap_err();
        assert!(err.to_string().contains("Dataset 'missing_set' not found"));

        std::fs::create_dir_all(dir.path().join("present")).unwrap();
        std::fs::write(dir.path().join("present/dataset.json"), "[]").unwrap();
        let found = Dataset::locate(dir.path(), "present").unwrap();
        assert_eq!(found, dir.path().join("present"));
        assert!(Dataset::load(&found).unwrap().tasks.is_empty());
    }
}
