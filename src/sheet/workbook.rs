//! Workbook operations backed by `umya-spreadsheet`.
//!
//! Every operation opens the file, applies its change and saves it again.
//! Nothing is cached between calls.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use umya_spreadsheet::{Border, Cell, HorizontalAlignmentValues, Spreadsheet, Style, Worksheet};

use super::{CellRange, CellRef, CellValue, SheetError, SheetTable};

/// Cached values that mark a broken formula.
const FORMULA_ERROR_VALUES: [&str; 7] = [
    "#REF!", "#DIV/0!", "#VALUE!", "#NAME?", "#NULL!", "#N/A", "#NUM!",
];

const MAX_AUTO_WIDTH: f64 = 50.0;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Result of reading a workbook.
#[derive(Debug, Clone)]
pub struct WorkbookInfo {
    pub file: String,
    pub sheets: Vec<String>,
    pub active_sheet: String,
    pub data: Vec<SheetData>,
}

/// Tabular content of one sheet.
#[derive(Debug, Clone)]
pub struct SheetData {
    pub name: String,
    pub table: SheetTable,
}

impl WorkbookInfo {
    pub fn table(&self, sheet: &str) -> Option<&SheetTable> {
        self.data.iter().find(|d| d.name == sheet).map(|d| &d.table)
    }

    /// `{file, sheets, active_sheet, data: {sheet: table}, shape: {sheet: [r, c]}}`
    pub fn to_value(&self) -> Value {
        let mut data = Map::new();
        let mut shape = Map::new();
        for sheet in &self.data {
            data.insert(sheet.name.clone(), json!(sheet.table));
            let (rows, cols) = sheet.table.shape();
            shape.insert(sheet.name.clone(), json!([rows, cols]));
        }
        json!({
            "file": self.file,
            "sheets": self.sheets,
            "active_sheet": self.active_sheet,
            "data": data,
            "shape": shape,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaCell {
    pub cell: String,
    pub formula: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetFormulas {
    pub sheet: String,
    pub formulas: Vec<FormulaCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaError {
    pub sheet: String,
    pub cell: String,
    pub formula: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaReport {
    pub formulas: usize,
    pub errors: Vec<FormulaError>,
}

/// Colour-coding convention for financial models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    /// Hard-coded input, blue font
    Input,
    /// Calculated value, black font
    Formula,
    /// Key assumption, blue font on yellow
    Assumption,
}

impl CellStyle {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "input" => Some(Self::Input),
            "formula" => Some(Self::Formula),
            "assumption" => Some(Self::Assumption),
            _ => None,
        }
    }
}

/// One cell assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct CellWrite {
    pub cell: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub style: Option<String>,
}

/// A number format applied to a range.
#[derive(Debug, Clone, Deserialize)]
pub struct NumberFormat {
    pub range: String,
    pub format: String,
}

#[derive(Debug, Clone)]
pub struct HeaderStyle {
    pub row: u32,
    pub bg_color: String,
    pub font_color: String,
}

impl Default for HeaderStyle {
    fn default() -> Self {
        Self {
            row: 1,
            bg_color: "4472C4".to_string(),
            font_color: "FFFFFF".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reading
// ─────────────────────────────────────────────────────────────────────────────

/// Read sheet names and tabular data. An unknown or absent `sheet_name`
/// reads every sheet.
pub fn read_workbook(path: &Path, sheet_name: Option<&str>) -> Result<WorkbookInfo, SheetError> {
    let book = open(path)?;
    let sheets = sheet_names(&book);
    let active_sheet = book.get_active_sheet().get_name().to_string();

    let data = target_sheets(&book, sheet_name)
        .into_iter()
        .map(|sheet| SheetData {
            name: sheet.get_name().to_string(),
            table: sheet_table(sheet),
        })
        .collect();

    Ok(WorkbookInfo {
        file: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        sheets,
        active_sheet,
        data,
    })
}

/// Raw formula strings (with leading `=`), per sheet, in row-major order.
pub fn read_formulas(path: &Path, sheet_name: Option<&str>) -> Result<Vec<SheetFormulas>, SheetError> {
    let book = open(path)?;
    Ok(target_sheets(&book, sheet_name)
        .into_iter()
        .map(|sheet| SheetFormulas {
            sheet: sheet.get_name().to_string(),
            formulas: used_cells(sheet)
                .filter_map(|(at, cell)| {
                    formula_text(cell).map(|formula| FormulaCell {
                        cell: at.to_a1(),
                        formula,
                    })
                })
                .collect(),
        })
        .collect())
}

/// Count formulas and collect those whose cached value is an error.
pub fn check_formulas(path: &Path) -> Result<FormulaReport, SheetError> {
    let book = open(path)?;
    let mut report = FormulaReport {
        formulas: 0,
        errors: Vec::new(),
    };

    for sheet in book.get_sheet_collection().iter() {
        for (at, cell) in used_cells(sheet) {
            let Some(formula) = formula_text(cell) else {
                continue;
            };
            report.formulas += 1;
            let value = cell.get_value();
            if FORMULA_ERROR_VALUES.contains(&&*value) {
                report.errors.push(FormulaError {
                    sheet: sheet.get_name().to_string(),
                    cell: at.to_a1(),
                    formula,
                    error: value.to_string(),
                });
            }
        }
    }

    Ok(report)
}

// ─────────────────────────────────────────────────────────────────────────────
// Writing
// ─────────────────────────────────────────────────────────────────────────────

/// Create a workbook with the given sheets, in order. Strings starting
/// with `=` become formulas; nulls stay blank.
pub fn create_workbook(path: &Path, sheets: &[(String, Vec<Vec<Value>>)]) -> Result<(), SheetError> {
    if sheets.is_empty() {
        return Err(SheetError::Invalid(
            "a workbook needs at least one sheet".to_string(),
        ));
    }

    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    for (name, rows) in sheets {
        let sheet = book
            .new_sheet(name.as_str())
            .map_err(|e| SheetError::Invalid(format!("cannot create sheet {}: {}", name, e)))?;
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if value.is_null() {
                    continue;
                }
                let at = CellRef::new(c as u32 + 1, r as u32 + 1).to_a1();
                set_cell_value(sheet.get_cell_mut(at.as_str()), value);
            }
        }
    }

    save(&book, path)
}

/// Write cell values, creating the file and the sheet when absent.
pub fn write_cells(path: &Path, sheet_name: &str, cells: &[CellWrite]) -> Result<(), SheetError> {
    let targets = cells
        .iter()
        .map(|item| CellRef::parse(&item.cell).map(|at| (at.to_a1(), item)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut book = if path.exists() {
        open(path)?
    } else {
        umya_spreadsheet::new_file_empty_worksheet()
    };
    if book.get_sheet_by_name(sheet_name).is_none() {
        book.new_sheet(sheet_name).map_err(|e| {
            SheetError::Invalid(format!("cannot create sheet {}: {}", sheet_name, e))
        })?;
    }

    let sheet = sheet_mut(&mut book, sheet_name)?;
    for (at, item) in targets {
        set_cell_value(sheet.get_cell_mut(at.as_str()), &item.value);
        if let Some(style) = item.style.as_deref().and_then(CellStyle::from_tag) {
            apply_cell_style(sheet.get_style_mut(at.as_str()), style);
        }
    }

    save(&book, path)
}

pub fn apply_number_format(
    path: &Path,
    sheet_name: &str,
    formats: &[NumberFormat],
) -> Result<(), SheetError> {
    let ranges = formats
        .iter()
        .map(|f| CellRange::parse(&f.range).map(|range| (range, f.format.as_str())))
        .collect::<Result<Vec<_>, _>>()?;

    let mut book = open(path)?;
    let sheet = sheet_mut(&mut book, sheet_name)?;
    for (range, format) in ranges {
        for at in range.cells() {
            sheet
                .get_style_mut(at.to_a1().as_str())
                .get_number_format_mut()
                .set_format_code(format);
        }
    }

    save(&book, path)
}

/// Set explicit widths, keyed by column letter.
pub fn set_column_widths(
    path: &Path,
    sheet_name: &str,
    widths: &[(String, f64)],
) -> Result<(), SheetError> {
    for (column, _) in widths {
        if super::column_index(column).is_none() {
            return Err(SheetError::InvalidReference(column.clone()));
        }
    }

    let mut book = open(path)?;
    let sheet = sheet_mut(&mut book, sheet_name)?;
    for (column, width) in widths {
        sheet
            .get_column_dimension_mut(&column.to_ascii_uppercase())
            .set_width(*width);
    }

    save(&book, path)
}

/// Fit each column to its longest value, capped at 50.
pub fn auto_fit_columns(path: &Path, sheet_name: &str) -> Result<(), SheetError> {
    let mut book = open(path)?;
    let sheet = sheet_mut(&mut book, sheet_name)?;
    let (max_col, max_row) = sheet.get_highest_column_and_row();

    let widths: Vec<(String, f64)> = (1..=max_col)
        .map(|col| {
            let longest = (1..=max_row)
                .filter_map(|row| sheet.get_cell(CellRef::new(col, row).to_a1().as_str()))
                .map(|cell| display_text(cell).chars().count())
                .max()
                .unwrap_or(0);
            let width = (longest as f64 + 2.0).min(MAX_AUTO_WIDTH);
            (super::column_letter(col), width)
        })
        .collect();

    for (letter, width) in widths {
        sheet.get_column_dimension_mut(&letter).set_width(width);
    }

    save(&book, path)
}

/// Bold, coloured, centred header row.
pub fn apply_header_style(path: &Path, sheet_name: &str, header: &HeaderStyle) -> Result<(), SheetError> {
    if header.row == 0 {
        return Err(SheetError::InvalidReference(format!("row {}", header.row)));
    }
    let bg = argb(&header.bg_color)?;
    let fg = argb(&header.font_color)?;

    let mut book = open(path)?;
    let sheet = sheet_mut(&mut book, sheet_name)?;
    let max_col = sheet.get_highest_column_and_row().0;

    for col in 1..=max_col {
        let style = sheet.get_style_mut(CellRef::new(col, header.row).to_a1().as_str());
        style.set_background_color(bg.as_str());
        let font = style.get_font_mut();
        font.set_bold(true);
        font.get_color_mut().set_argb(fg.as_str());
        style
            .get_alignment_mut()
            .set_horizontal(HorizontalAlignmentValues::Center);
    }

    save(&book, path)
}

/// Thin borders on every side of every cell in `cell_range`.
pub fn add_borders(path: &Path, sheet_name: &str, cell_range: &str) -> Result<(), SheetError> {
    let range = CellRange::parse(cell_range)?;

    let mut book = open(path)?;
    let sheet = sheet_mut(&mut book, sheet_name)?;
    for at in range.cells() {
        let borders = sheet.get_style_mut(at.to_a1().as_str()).get_borders_mut();
        borders.get_left_mut().set_border_style(Border::BORDER_THIN);
        borders.get_right_mut().set_border_style(Border::BORDER_THIN);
        borders.get_top_mut().set_border_style(Border::BORDER_THIN);
        borders.get_bottom_mut().set_border_style(Border::BORDER_THIN);
    }

    save(&book, path)
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn open(path: &Path) -> Result<Spreadsheet, SheetError> {
    if !path.exists() {
        return Err(SheetError::NotFound(path.display().to_string()));
    }
    umya_spreadsheet::reader::xlsx::read(path).map_err(|e| SheetError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn save(book: &Spreadsheet, path: &Path) -> Result<(), SheetError> {
    umya_spreadsheet::writer::xlsx::write(book, path).map_err(|e| SheetError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn sheet_names(book: &Spreadsheet) -> Vec<String> {
    book.get_sheet_collection()
        .iter()
        .map(|sheet| sheet.get_name().to_string())
        .collect()
}

fn target_sheets<'a>(book: &'a Spreadsheet, sheet_name: Option<&str>) -> Vec<&'a Worksheet> {
    if let Some(sheet) = sheet_name.and_then(|name| book.get_sheet_by_name(name)) {
        return vec![sheet];
    }
    book.get_sheet_collection().iter().collect()
}

fn sheet_mut<'a>(book: &'a mut Spreadsheet, sheet_name: &str) -> Result<&'a mut Worksheet, SheetError> {
    book.get_sheet_by_name_mut(sheet_name)
        .ok_or_else(|| SheetError::SheetNotFound(sheet_name.to_string()))
}

/// Existing cells in row-major order.
fn used_cells(sheet: &Worksheet) -> impl Iterator<Item = (CellRef, &Cell)> + '_ {
    let (max_col, max_row) = sheet.get_highest_column_and_row();
    (1..=max_row).flat_map(move |row| {
        (1..=max_col).filter_map(move |col| {
            let at = CellRef::new(col, row);
            sheet.get_cell(at.to_a1().as_str()).map(|cell| (at, cell))
        })
    })
}

/// First row is the header; the remaining rows are data. Trailing blank
/// rows are dropped.
fn sheet_table(sheet: &Worksheet) -> SheetTable {
    let (max_col, max_row) = sheet.get_highest_column_and_row();
    if max_col == 0 || max_row == 0 {
        return SheetTable {
            columns: Vec::new(),
            rows: Vec::new(),
        };
    }

    let columns = (1..=max_col)
        .map(|col| match cell_value(sheet, CellRef::new(col, 1)) {
            CellValue::Empty => format!("Unnamed: {}", col - 1),
            value => value.to_string(),
        })
        .collect();

    let mut rows: Vec<Vec<CellValue>> = (2..=max_row)
        .map(|row| {
            (1..=max_col)
                .map(|col| cell_value(sheet, CellRef::new(col, row)))
                .collect()
        })
        .collect();
    while rows
        .last()
        .map_or(false, |row| row.iter().all(CellValue::is_empty))
    {
        rows.pop();
    }

    SheetTable { columns, rows }
}

fn cell_value(sheet: &Worksheet, at: CellRef) -> CellValue {
    let Some(cell) = sheet.get_cell(at.to_a1().as_str()) else {
        return CellValue::Empty;
    };
    let raw = cell.get_value();
    if raw.is_empty() {
        return CellValue::Empty;
    }
    match cell.get_data_type() {
        "n" => raw
            .parse::<f64>()
            .map(CellValue::Number)
            .unwrap_or_else(|_| CellValue::Text(raw.to_string())),
        "b" => CellValue::Bool(raw.eq_ignore_ascii_case("true") || raw == "1"),
        _ => CellValue::Text(raw.to_string()),
    }
}

fn formula_text(cell: &Cell) -> Option<String> {
    if cell.is_formula() {
        Some(format!("={}", cell.get_formula()))
    } else {
        None
    }
}

/// What a user sees when typing into the cell: the formula or the value.
fn display_text(cell: &Cell) -> String {
    formula_text(cell).unwrap_or_else(|| cell.get_value().to_string())
}

fn set_cell_value(cell: &mut Cell, value: &Value) {
    match value {
        Value::Null => {
            cell.set_value_string("");
        }
        Value::Bool(b) => {
            cell.set_value_bool(*b);
        }
        Value::Number(n) => {
            cell.set_value_number(n.as_f64().unwrap_or_default());
        }
        Value::String(s) if s.len() > 1 && s.starts_with('=') => {
            cell.set_formula(&s[1..]);
        }
        Value::String(s) => {
            cell.set_value_string(s.as_str());
        }
        other => {
            cell.set_value_string(other.to_string());
        }
    }
}

fn apply_cell_style(style: &mut Style, kind: CellStyle) {
    match kind {
        CellStyle::Input => {
            style.get_font_mut().get_color_mut().set_argb("FF0000FF");
        }
        CellStyle::Formula => {
            style.get_font_mut().get_color_mut().set_argb("FF000000");
        }
        CellStyle::Assumption => {
            style.get_font_mut().get_color_mut().set_argb("FF0000FF");
            style.set_background_color("FFFFFF00");
        }
    }
}

/// `4472C4` / `#4472C4` → `FF4472C4`; 8-digit values pass through.
fn argb(color: &str) -> Result<String, SheetError> {
    let hex = color.trim().trim_start_matches('#').to_ascii_uppercase();
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SheetError::Invalid(format!("invalid color: {}", color)));
    }
    match hex.len() {
        6 => Ok(format!("FF{}", hex)),
        8 => Ok(hex),
        _ => Err(SheetError::Invalid(format!("invalid color: {}", color))),
    }
}
