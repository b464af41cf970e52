//! Tools that create workbooks and write cells.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{blocking, parse_args, path, Tool, ToolError, ToolOutput};
use crate::sheet::{self, CellWrite};

/// New workbook from a sheet → rows map.
pub struct CreateWorkbook;

#[derive(Deserialize)]
struct CreateArgs {
    file_path: String,
    sheets: Map<String, Value>,
}

#[async_trait]
impl Tool for CreateWorkbook {
    fn name(&self) -> &str {
        "create_workbook"
    }

    fn description(&self) -> &str {
        "Create a new workbook. sheets maps sheet name to a list of rows; strings starting with = are formulas"
    }

    fn params(&self) -> &[&str] {
        &["file_path", "sheets"]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: CreateArgs = parse_args(self.name(), args)?;
        let sheets = args
            .sheets
            .into_iter()
            .map(|(name, rows)| {
                serde_json::from_value::<Vec<Vec<Value>>>(rows)
                    .map(|rows| (name, rows))
                    .map_err(|source| ToolError::InvalidArguments {
                        tool: self.name().to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let names: Vec<String> = sheets.iter().map(|(name, _)| name.clone()).collect();
        let file_path = args.file_path.clone();
        blocking(move || sheet::create_workbook(&path(&file_path), &sheets)).await?;

        Ok(ToolOutput::Text(format!(
            "Created {} with sheets: {}",
            args.file_path,
            names.join(", ")
        )))
    }
}

/// Write values or formulas into individual cells.
pub struct WriteCells;

#[derive(Deserialize)]
struct WriteArgs {
    file_path: String,
    sheet_name: String,
    cells: Vec<CellWrite>,
}

#[async_trait]
impl Tool for WriteCells {
    fn name(&self) -> &str {
        "write_cells"
    }

    fn description(&self) -> &str {
        "Write cells as [{cell, value, style}]; style is input, formula or assumption; creates the file or sheet if missing"
    }

    fn params(&self) -> &[&str] {
        &["file_path", "sheet_name", "cells"]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: WriteArgs = parse_args(self.name(), args)?;
        let count = args.cells.len();
        let summary = format!(
            "Wrote {} cells to {} in {}",
            count, args.sheet_name, args.file_path
        );
        blocking(move || sheet::write_cells(&path(&args.file_path), &args.sheet_name, &args.cells))
            .await?;
        Ok(ToolOutput::Text(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[tokio::test]
    async fn sheets_are_created_in_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ordered.xlsx").display().to_string();

        let out = CreateWorkbook
            .execute(args(json!({
                "file_path": file,
                "sheets": {
                    "Zeta": [["a"], [1]],
                    "Alpha": [["b", "c"], [2, 3], [4, null]]
                }
            })))
            .await
            .expect("create");
        assert!(out.render().ends_with("sheets: Zeta, Alpha"));

        let info = sheet::read_workbook(&path(&file), None).unwrap();
        assert_eq!(info.sheets, vec!["Zeta", "Alpha"]);
        assert_eq!(info.table("Alpha").unwrap().shape(), (2, 2));
        assert!(info.table("Alpha").unwrap().rows[1][1].is_empty());
    }

    #[tokio::test]
    async fn non_list_rows_are_invalid_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.xlsx").display().to_string();

        let err = CreateWorkbook
            .execute(args(json!({"file_path": file, "sheets": {"S": "not rows"}})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn write_cells_reports_count() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("w.xlsx").display().to_string();

        let out = WriteCells
            .execute(args(json!({
                "file_path": file,
                "sheet_name": "Model",
                "cells": [
                    {"cell": "A1", "value": "Growth"},
                    {"cell": "B1", "value": 0.05, "style": "assumption"}
                ]
            })))
            .await
            .unwrap();
        assert!(out.render().starts_with("Wrote 2 cells to Model"));
    }

    #[tokio::test]
    async fn bad_cell_reference_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("w.xlsx").display().to_string();

        let err = WriteCells
            .execute(args(json!({
                "file_path": file,
                "sheet_name": "S",
                "cells": [{"cell": "1A", "value": 1}]
            })))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid cell reference: 1A"));
    }
}
