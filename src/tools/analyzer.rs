//! Data analysis and chart tools.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{blocking, parse_args, path, Tool, ToolError, ToolOutput};
use crate::sheet::{self, ChartKind, ChartRequest, SheetError, SheetTable, WorkbookInfo};

/// The requested sheet, or the active one when none is named.
fn target_table(info: WorkbookInfo, sheet_name: Option<&str>) -> Result<(String, SheetTable), SheetError> {
    let target = sheet_name.unwrap_or(&info.active_sheet).to_string();
    info.data
        .into_iter()
        .find(|d| d.name == target)
        .map(|d| (d.name, d.table))
        .ok_or(SheetError::SheetNotFound(target))
}

pub struct AnalyzeData;

#[derive(Deserialize)]
struct AnalyzeArgs {
    file_path: String,
    #[serde(default)]
    sheet_name: Option<String>,
}

#[async_trait]
impl Tool for AnalyzeData {
    fn name(&self) -> &str {
        "analyze_data"
    }

    fn description(&self) -> &str {
        "Profile a sheet: shape, columns, dtypes, descriptive statistics and missing values"
    }

    fn params(&self) -> &[&str] {
        &["file_path", "sheet_name"]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: AnalyzeArgs = parse_args(self.name(), args)?;
        let (_, table) = blocking(move || {
            let info = sheet::read_workbook(&path(&args.file_path), args.sheet_name.as_deref())?;
            target_table(info, args.sheet_name.as_deref())
        })
        .await?;
        Ok(ToolOutput::Json(sheet::profile(&table)))
    }
}

pub struct CreateChart;

#[derive(Deserialize)]
struct ChartArgs {
    file_path: String,
    #[serde(default)]
    sheet_name: Option<String>,
    #[serde(default = "default_chart_type")]
    chart_type: String,
    #[serde(default)]
    x_col: Option<String>,
    #[serde(default)]
    y_col: Option<String>,
    #[serde(default)]
    output_path: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

fn default_chart_type() -> String {
    "bar".to_string()
}

/// `<dir>/<stem>_chart.svg` next to the workbook.
fn default_output(file_path: &Path) -> PathBuf {
    let stem = file_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "workbook".to_string());
    file_path.with_file_name(format!("{}_chart.svg", stem))
}

#[async_trait]
impl Tool for CreateChart {
    fn name(&self) -> &str {
        "create_chart"
    }

    fn description(&self) -> &str {
        "Draw a bar, line, pie, scatter or hist chart from sheet columns and save it as SVG; returns the image path"
    }

    fn params(&self) -> &[&str] {
        &[
            "file_path",
            "sheet_name",
            "chart_type",
            "x_col",
            "y_col",
            "output_path",
            "title",
        ]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: ChartArgs = parse_args(self.name(), args)?;
        let kind: ChartKind = args.chart_type.parse()?;

        let output = blocking(move || {
            let file = path(&args.file_path);
            let info = sheet::read_workbook(&file, args.sheet_name.as_deref())?;
            let (target, table) = target_table(info, args.sheet_name.as_deref())?;

            let output = args
                .output_path
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| default_output(&file));
            let request = ChartRequest {
                kind,
                title: args
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| format!("{} - {}", target, kind.as_str())),
                x_col: args.x_col,
                y_col: args.y_col,
            };
            sheet::render_chart(&table, &request, &output)?;
            Ok(output)
        })
        .await?;

        tracing::info!(path = %output.display(), "Chart written");
        Ok(ToolOutput::Text(output.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    fn sample(dir: &tempfile::TempDir) -> String {
        let file = dir.path().join("sales.xlsx");
        sheet::create_workbook(
            &file,
            &[
                (
                    "Sales".to_string(),
                    vec![
                        vec![json!("Month"), json!("Revenue")],
                        vec![json!("Jan"), json!(10)],
                        vec![json!("Feb"), Value::Null],
                        vec![json!("Mar"), json!(30)],
                    ],
                ),
                ("Notes".to_string(), vec![vec![json!("text")]]),
            ],
        )
        .unwrap();
        file.display().to_string()
    }

    #[tokio::test]
    async fn analysis_defaults_to_active_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let file = sample(&dir);

        let out = AnalyzeData
            .execute(args(json!({"file_path": file})))
            .await
            .unwrap();
        let ToolOutput::Json(value) = out else {
            panic!("expected json");
        };
        assert_eq!(value["shape"], json!([3, 2]));
        assert_eq!(value["dtypes"]["Revenue"], json!("float64"));
        assert_eq!(value["missing"], json!({"Revenue": 1}));
    }

    #[tokio::test]
    async fn analysis_of_unknown_sheet_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = sample(&dir);

        let err = AnalyzeData
            .execute(args(json!({"file_path": file, "sheet_name": "Costs"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Sheet(SheetError::SheetNotFound(s)) if s == "Costs"));
    }

    #[tokio::test]
    async fn chart_defaults_to_stem_svg() {
        let dir = tempfile::tempdir().unwrap();
        let file = sample(&dir);

        let out = CreateChart
            .execute(args(json!({
                "file_path": file, "sheet_name": "Sales", "chart_type": "line",
                "x_col": "Month", "y_col": "Revenue"
            })))
            .await
            .expect("chart");
        let expected = dir.path().join("sales_chart.svg");
        assert_eq!(out.render(), expected.display().to_string());
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn unsupported_chart_type_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = sample(&dir);

        let err = CreateChart
            .execute(args(json!({"file_path": file, "chart_type": "radar"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported chart type"));
    }
}
