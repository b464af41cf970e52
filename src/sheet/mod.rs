//! Spreadsheet capability surface used by the tools.
//!
//! File format handling is delegated to `umya-spreadsheet` and chart
//! rendering to `plotters`; this module adapts both to the tabular view
//! the agent works with.

mod address;
mod chart;
mod stats;
mod workbook;

use serde::Serialize;
use thiserror::Error;

pub use address::{column_index, column_letter, CellRange, CellRef};
pub use chart::{render_chart, ChartKind, ChartRequest};
pub use stats::{describe, dtype, missing_counts, numeric_summary, profile, ColumnStats};
pub use workbook::{
    add_borders, apply_header_style, apply_number_format, auto_fit_columns, check_formulas,
    create_workbook, read_formulas, read_workbook, set_column_widths, write_cells, CellStyle,
    CellWrite, FormulaCell, FormulaError, FormulaReport, HeaderStyle, NumberFormat, SheetData,
    SheetFormulas, WorkbookInfo,
};

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("sheet not found: {0}")]
    SheetNotFound(String),

    #[error("invalid cell reference: {0}")]
    InvalidReference(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("failed to read workbook {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to write workbook {path}: {message}")]
    Write { path: String, message: String },

    #[error("chart error: {0}")]
    Chart(String),

    #[error("{0}")]
    Invalid(String),
}

/// A cell's value as seen by the tabular view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "NaN"),
            Self::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Render integral floats without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

static EMPTY: CellValue = CellValue::Empty;

/// Header row plus data rows of one sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetTable {
    /// `(rows, columns)`, header excluded.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn column_position(&self, name: &str) -> Result<usize, SheetError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| SheetError::ColumnNotFound(name.to_string()))
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(index).unwrap_or(&EMPTY))
    }

    /// Indices of columns whose non-empty values are all numbers.
    pub fn numeric_columns(&self) -> Vec<usize> {
        (0..self.columns.len())
            .filter(|&i| {
                let mut values = self.column(i).filter(|v| !v.is_empty()).peekable();
                values.peek().is_some() && values.all(|v| v.as_number().is_some())
            })
            .collect()
    }

    /// First `n` rows as a new table.
    pub fn head(&self, n: usize) -> SheetTable {
        SheetTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Aligned plain-text rendering, one line per row.
    pub fn to_text(&self) -> String {
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                (0..self.columns.len())
                    .map(|i| row.get(i).map(ToString::to_string).unwrap_or_default())
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                rendered
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut lines = vec![align(self.columns.iter(), &widths)];
        for row in &rendered {
            lines.push(align(row.iter(), &widths));
        }
        lines.join("\n")
    }
}

fn align<'a>(cells: impl Iterator<Item = &'a String>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:>width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SheetTable {
        SheetTable {
            columns: vec!["Name".into(), "Qty".into()],
            rows: vec![
                vec![CellValue::Text("Apple".into()), CellValue::Number(3.0)],
                vec![CellValue::Text("Kiwi".into()), CellValue::Number(12.5)],
                vec![CellValue::Text("Fig".into()), CellValue::Empty],
            ],
        }
    }

    #[test]
    fn text_rendering_right_aligns_columns() {
        let text = table().to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], " Name   Qty");
        assert_eq!(lines[1], "Apple     3");
        assert_eq!(lines[2], " Kiwi  12.5");
        assert_eq!(lines[3], "  Fig   NaN");
    }

    #[test]
    fn numeric_columns_ignore_blanks() {
        assert_eq!(table().numeric_columns(), vec![1]);
    }

    #[test]
    fn empty_cells_serialize_as_null() {
        let value = serde_json::to_value(table().head(1)).unwrap();
        assert_eq!(value["rows"][0][1], serde_json::json!(3.0));
        let value = serde_json::to_value(CellValue::Empty).unwrap();
        assert!(value.is_null());
    }
}
