//! Presentation tools: number formats, widths, header style, borders.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{blocking, parse_args, path, Tool, ToolError, ToolOutput};
use crate::sheet::{self, HeaderStyle, NumberFormat};

#[derive(Deserialize)]
struct SheetArgs {
    file_path: String,
    sheet_name: String,
}

pub struct ApplyNumberFormat;

#[derive(Deserialize)]
struct NumberFormatArgs {
    file_path: String,
    sheet_name: String,
    formats: Vec<NumberFormat>,
}

#[async_trait]
impl Tool for ApplyNumberFormat {
    fn name(&self) -> &str {
        "apply_number_format"
    }

    fn description(&self) -> &str {
        "Apply number formats as [{range, format}], e.g. {\"range\": \"B2:B10\", \"format\": \"#,##0.00\"}"
    }

    fn params(&self) -> &[&str] {
        &["file_path", "sheet_name", "formats"]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: NumberFormatArgs = parse_args(self.name(), args)?;
        let count = args.formats.len();
        let sheet_name = args.sheet_name.clone();
        blocking(move || {
            sheet::apply_number_format(&path(&args.file_path), &args.sheet_name, &args.formats)
        })
        .await?;
        Ok(ToolOutput::Text(format!(
            "Applied {} number formats to {}",
            count, sheet_name
        )))
    }
}

pub struct SetColumnWidths;

#[derive(Deserialize)]
struct WidthArgs {
    file_path: String,
    sheet_name: String,
    widths: Map<String, Value>,
}

#[async_trait]
impl Tool for SetColumnWidths {
    fn name(&self) -> &str {
        "set_column_widths"
    }

    fn description(&self) -> &str {
        "Set column widths as {column letter: width}, e.g. {\"A\": 20, \"B\": 12}"
    }

    fn params(&self) -> &[&str] {
        &["file_path", "sheet_name", "widths"]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: WidthArgs = parse_args(self.name(), args)?;
        let widths = args
            .widths
            .iter()
            .map(|(column, width)| {
                width
                    .as_f64()
                    .filter(|w| *w > 0.0)
                    .map(|w| (column.clone(), w))
                    .ok_or_else(|| {
                        ToolError::Execution(format!("invalid width for column {}: {}", column, width))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let count = widths.len();
        blocking(move || sheet::set_column_widths(&path(&args.file_path), &args.sheet_name, &widths))
            .await?;
        Ok(ToolOutput::Text(format!("Set widths of {} columns", count)))
    }
}

pub struct AutoFit;

#[async_trait]
impl Tool for AutoFit {
    fn name(&self) -> &str {
        "auto_fit"
    }

    fn description(&self) -> &str {
        "Fit column widths to their contents (maximum 50)"
    }

    fn params(&self) -> &[&str] {
        &["file_path", "sheet_name"]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: SheetArgs = parse_args(self.name(), args)?;
        let message = format!("Auto-fitted columns in {}", args.sheet_name);
        blocking(move || sheet::auto_fit_columns(&path(&args.file_path), &args.sheet_name)).await?;
        Ok(ToolOutput::Text(message))
    }
}

pub struct ApplyHeaderStyle;

#[derive(Deserialize)]
struct HeaderArgs {
    file_path: String,
    sheet_name: String,
    #[serde(default)]
    header_row: Option<u32>,
    #[serde(default)]
    bg_color: Option<String>,
    #[serde(default)]
    font_color: Option<String>,
}

#[async_trait]
impl Tool for ApplyHeaderStyle {
    fn name(&self) -> &str {
        "apply_header_style"
    }

    fn description(&self) -> &str {
        "Style a header row bold and centred with a fill colour (defaults: row 1, bg 4472C4, font FFFFFF)"
    }

    fn params(&self) -> &[&str] {
        &["file_path", "sheet_name", "header_row", "bg_color", "font_color"]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: HeaderArgs = parse_args(self.name(), args)?;
        let defaults = HeaderStyle::default();
        let style = HeaderStyle {
            row: args.header_row.unwrap_or(defaults.row),
            bg_color: args.bg_color.unwrap_or(defaults.bg_color),
            font_color: args.font_color.unwrap_or(defaults.font_color),
        };
        let message = format!("Styled header row {} in {}", style.row, args.sheet_name);
        blocking(move || {
            sheet::apply_header_style(&path(&args.file_path), &args.sheet_name, &style)
        })
        .await?;
        Ok(ToolOutput::Text(message))
    }
}

pub struct AddBorders;

#[derive(Deserialize)]
struct BorderArgs {
    file_path: String,
    sheet_name: String,
    cell_range: String,
}

#[async_trait]
impl Tool for AddBorders {
    fn name(&self) -> &str {
        "add_borders"
    }

    fn description(&self) -> &str {
        "Add thin borders to every cell of a range such as A1:D10"
    }

    fn params(&self) -> &[&str] {
        &["file_path", "sheet_name", "cell_range"]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args: BorderArgs = parse_args(self.name(), args)?;
        let message = format!("Added borders to {}", args.cell_range);
        blocking(move || {
            sheet::add_borders(&path(&args.file_path), &args.sheet_name, &args.cell_range)
        })
        .await?;
        Ok(ToolOutput::Text(message))
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
        let file = dir.path().join("fmt.xlsx");
        sheet::create_workbook(
            &file,
            &[(
                "Data".to_string(),
                vec![
                    vec![json!("Name"), json!("Amount")],
                    vec![json!("a fairly long label"), json!(1234.5)],
                ],
            )],
        )
        .unwrap();
        file.display().to_string()
    }

    #[tokio::test]
    async fn formatting_tools_succeed_on_existing_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let file = sample(&dir);

        ApplyNumberFormat
            .execute(args(json!({
                "file_path": file, "sheet_name": "Data",
                "formats": [{"range": "B2", "format": "$#,##0"}]
            })))
            .await
            .expect("number format");
        SetColumnWidths
            .execute(args(json!({"file_path": file, "sheet_name": "Data", "widths": {"A": 24}})))
            .await
            .expect("widths");
        AutoFit
            .execute(args(json!({"file_path": file, "sheet_name": "Data"})))
            .await
            .expect("auto fit");
        let out = ApplyHeaderStyle
            .execute(args(json!({"file_path": file, "sheet_name": "Data", "bg_color": "#1F4E78"})))
            .await
            .expect("header");
        assert_eq!(out.render(), "Styled header row 1 in Data");
        AddBorders
            .execute(args(json!({"file_path": file, "sheet_name": "Data", "cell_range": "A1:B2"})))
            .await
            .expect("borders");
    }

    #[tokio::test]
    async fn unknown_sheet_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = sample(&dir);

        let err = AutoFit
            .execute(args(json!({"file_path": file, "sheet_name": "Missing"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "sheet not found: Missing");
    }

    #[tokio::test]
    async fn negative_width_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = sample(&dir);

        let err = SetColumnWidths
            .execute(args(json!({"file_path": file, "sheet_name": "Data", "widths": {"A": -3}})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid width"));
    }
}
