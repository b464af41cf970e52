//! Column profiling for the tabular view.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{format_number, CellValue, SheetTable};

/// Summary statistics of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnStats {
    Numeric {
        count: usize,
        mean: f64,
        /// Sample standard deviation, absent with fewer than two values.
        std: Option<f64>,
        min: f64,
        #[serde(rename = "25%")]
        q25: f64,
        #[serde(rename = "50%")]
        q50: f64,
        #[serde(rename = "75%")]
        q75: f64,
        max: f64,
    },
    Text {
        count: usize,
        unique: usize,
        top: Option<String>,
        freq: usize,
    },
}

/// Statistics for every column, in column order.
pub fn describe(table: &SheetTable) -> Vec<(String, ColumnStats)> {
    let numeric = table.numeric_columns();
    table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let stats = if numeric.contains(&i) {
                numeric_stats(table.column(i).filter_map(CellValue::as_number).collect())
            } else {
                text_stats(table, i)
            };
            (name.clone(), stats)
        })
        .collect()
}

/// Inferred storage type of a column: `int64`, `float64`, `bool` or `object`.
pub fn dtype(table: &SheetTable, index: usize) -> &'static str {
    let mut missing = false;
    let mut all_bool = true;
    let mut all_number = true;
    let mut all_integral = true;

    for value in table.column(index) {
        match value {
            CellValue::Empty => missing = true,
            CellValue::Bool(_) => all_number = false,
            CellValue::Number(n) => {
                all_bool = false;
                all_integral &= n.fract() == 0.0;
            }
            CellValue::Text(_) => {
                all_bool = false;
                all_number = false;
            }
        }
    }

    let present = table.column(index).any(|v| !v.is_empty());
    match (present, all_number, all_bool) {
        (false, _, _) => "float64",
        (true, true, _) if all_integral && !missing => "int64",
        (true, true, _) => "float64",
        (true, false, true) if !missing => "bool",
        _ => "object",
    }
}

/// Blank-cell count per column, only for columns that have any.
pub fn missing_counts(table: &SheetTable) -> Vec<(String, usize)> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), table.column(i).filter(|v| v.is_empty()).count()))
        .filter(|(_, n)| *n > 0)
        .collect()
}

/// `{shape, columns, dtypes, describe, missing}` for one sheet.
pub fn profile(table: &SheetTable) -> Value {
    let (rows, cols) = table.shape();
    let dtypes: Map<String, Value> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), json!(dtype(table, i))))
        .collect();
    let described: Map<String, Value> = describe(table)
        .into_iter()
        .map(|(name, stats)| (name, json!(stats)))
        .collect();
    let missing: Map<String, Value> = missing_counts(table)
        .into_iter()
        .map(|(name, n)| (name, json!(n)))
        .collect();

    json!({
        "shape": [rows, cols],
        "columns": table.columns,
        "dtypes": dtypes,
        "describe": described,
        "missing": missing,
    })
}

/// One line per numeric column, for the plain-text summary.
pub fn numeric_summary(table: &SheetTable) -> Vec<String> {
    describe(table)
        .into_iter()
        .filter_map(|(name, stats)| match stats {
            ColumnStats::Numeric {
                count,
                mean,
                std,
                min,
                q50,
                max,
                ..
            } => Some(format!(
                "{}: count={} mean={} std={} min={} median={} max={}",
                name,
                count,
                round4(mean),
                std.map(round4).unwrap_or_else(|| "NaN".to_string()),
                format_number(min),
                format_number(q50),
                format_number(max),
            )),
            ColumnStats::Text { .. } => None,
        })
        .collect()
}

fn round4(value: f64) -> String {
    format_number((value * 10_000.0).round() / 10_000.0)
}

fn numeric_stats(mut values: Vec<f64>) -> ColumnStats {
    values.sort_by(f64::total_cmp);
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let std = (count > 1).then(|| {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        var.sqrt()
    });

    ColumnStats::Numeric {
        count,
        mean,
        std,
        min: values[0],
        q25: quantile(&values, 0.25),
        q50: quantile(&values, 0.5),
        q75: quantile(&values, 0.75),
        max: values[count - 1],
    }
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn text_stats(table: &SheetTable, index: usize) -> ColumnStats {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in table.column(index).filter(|v| !v.is_empty()) {
        let key = value.to_string();
        let n = counts.entry(key.clone()).or_insert(0);
        if *n == 0 {
            order.push(key);
        }
        *n += 1;
    }

    let mut top: Option<(&String, usize)> = None;
    for key in &order {
        let n = counts[key];
        if top.map_or(true, |(_, best)| n > best) {
            top = Some((key, n));
        }
    }

    ColumnStats::Text {
        count: counts.values().sum(),
        unique: order.len(),
        top: top.map(|(k, _)| k.clone()),
        freq: top.map_or(0, |(_, n)| n),
    }
}
