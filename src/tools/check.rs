//! Formula verification.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{blocking, parse_args, path, Tool, ToolError, ToolOutput};
use crate::sheet;

/// Count formulas and list cells whose cached value is an error.
pub struct CheckFormulas;

#[derive(Deserialize)]
struct CheckArgs {
    file_path: String,
}

#[async_trait]
impl Tool for CheckFormulas {
    fn name(&self) -> &str {
        "check_formulas"
    }

    fn description(&self) -> &str {
        "Count formulas and report cells showing #REF!, #DIV/0!, #VALUE!, #NAME?, #NULL!, #N/A or #NUM!"
    }

    fn params(&self) -> &[&str] {
        &["file_path"]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: CheckArgs = parse_args(self.name(), args)?;
        let report = blocking(move || sheet::check_formulas(&path(&args.file_path))).await?;
        if !report.errors.is_empty() {
            tracing::warn!(errors = report.errors.len(), "Formula errors found");
        }
        Ok(ToolOutput::Json(json!(report)))
    }
}
