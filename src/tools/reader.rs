//! Read-only workbook tools.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{blocking, parse_args, path, Tool, ToolError, ToolOutput};
use crate::sheet;

#[derive(Deserialize)]
struct SheetArgs {
    file_path: String,
    #[serde(default)]
    sheet_name: Option<String>,
}

/// Sheet names plus tabular data of one or all sheets.
pub struct ReadExcel;

#[async_trait]
impl Tool for ReadExcel {
    fn name(&self) -> &str {
        "read_excel"
    }

    fn description(&self) -> &str {
        "Read workbook contents: sheet names, the active sheet, and each sheet's header and rows"
    }

    fn params(&self) -> &[&str] {
        &["file_path", "sheet_name"]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: SheetArgs = parse_args(self.name(), args)?;
        let info = blocking(move || {
            sheet::read_workbook(&path(&args.file_path), args.sheet_name.as_deref())
        })
        .await?;
        Ok(ToolOutput::Json(info.to_value()))
    }
}

/// Formula text of every formula cell.
pub struct ReadFormulas;

#[async_trait]
impl Tool for ReadFormulas {
    fn name(&self) -> &str {
        "read_formulas"
    }

    fn description(&self) -> &str {
        "Read the formulas in a workbook as {sheet: [{cell, formula}]}"
    }

    fn params(&self) -> &[&str] {
        &["file_path", "sheet_name"]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: SheetArgs = parse_args(self.name(), args)?;
        let sheets = blocking(move || {
            sheet::read_formulas(&path(&args.file_path), args.sheet_name.as_deref())
        })
        .await?;

        let map: Map<String, Value> = sheets
            .into_iter()
            .map(|s| (s.sheet, json!(s.formulas)))
            .collect();
        Ok(ToolOutput::Json(Value::Object(map)))
    }
}

/// Plain-text overview of a workbook.
pub struct GetSummary;

#[derive(Deserialize)]
struct SummaryArgs {
    file_path: String,
}

#[async_trait]
impl Tool for GetSummary {
    fn name(&self) -> &str {
        "get_summary"
    }

    fn description(&self) -> &str {
        "Summarize a workbook: sheets, shapes, columns, first rows and numeric statistics"
    }

    fn params(&self) -> &[&str] {
        &["file_path"]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: SummaryArgs = parse_args(self.name(), args)?;
        let info = blocking(move || sheet::read_workbook(&path(&args.file_path), None)).await?;
        Ok(ToolOutput::Text(summarize(&info)))
    }
}

fn summarize(info: &sheet::WorkbookInfo) -> String {
    let mut lines = vec![
        format!("File: {}", info.file),
        format!("Sheets: {}", info.sheets.join(", ")),
    ];

    for data in &info.data {
        let (rows, cols) = data.table.shape();
        lines.push(String::new());
        lines.push(format!("=== {} ({} rows x {} columns) ===", data.name, rows, cols));
        lines.push(format!("Columns: {}", data.table.columns.join(", ")));
        if rows > 0 {
            lines.push("First rows:".to_string());
            lines.push(data.table.head(5).to_text());
        }
        let stats = sheet::numeric_summary(&data.table);
        if !stats.is_empty() {
            lines.push("Numeric columns:".to_string());
            lines.extend(stats.into_iter().map(|s| format!("  {}", s)));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    fn sample(dir: &tempfile::TempDir) -> String {
        let file = dir.path().join("budget.xlsx");
        sheet::create_workbook(
            &file,
            &[(
                "Budget".to_string(),
                vec![
                    vec![json!("Item"), json!("Cost")],
                    vec![json!("Rent"), json!(1200)],
                    vec![json!("Food"), json!(450.5)],
                    vec![json!("Total"), json!("=SUM(B2:B3)")],
                ],
            )],
        )
        .expect("create");
        file.display().to_string()
    }

    #[tokio::test]
    async fn read_excel_returns_data_and_shape() {
        let dir = tempfile::tempdir().unwrap();
        let file = sample(&dir);

        let out = ReadExcel
            .execute(args(json!({"file_path": file})))
            .await
            .expect("read");
        let ToolOutput::Json(value) = out else {
            panic!("expected json");
        };
        assert_eq!(value["sheets"], json!(["Budget"]));
        assert_eq!(value["shape"]["Budget"], json!([3, 2]));
        assert_eq!(value["data"]["Budget"]["rows"][0], json!(["Rent", 1200.0]));
    }

    #[tokio::test]
    async fn read_formulas_keys_by_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let file = sample(&dir);

        let out = ReadFormulas
            .execute(args(json!({"file_path": file, "sheet_name": "Budget"})))
            .await
            .unwrap();
        assert_eq!(
            out,
            ToolOutput::Json(json!({"Budget": [{"cell": "B4", "formula": "=SUM(B2:B3)"}]}))
        );
    }

    #[tokio::test]
    async fn summary_mentions_shape_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        let file = sample(&dir);

        let out = GetSummary
            .execute(args(json!({"file_path": file})))
            .await
            .unwrap()
            .render();
        assert!(out.contains("Sheets: Budget"));
        assert!(out.contains("=== Budget (3 rows x 2 columns) ==="));
        assert!(out.contains("Columns: Item, Cost"));
        assert!(out.contains("Cost: count=2"));
    }

    #[tokio::test]
    async fn missing_file_is_a_sheet_error() {
        let err = ReadExcel
            .execute(args(json!({"file_path": "/no/such/file.xlsx"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Sheet(sheet::SheetError::NotFound(_))));
    }
}
