//! Chart rendering to SVG with `plotters`.

use std::path::Path;
use std::str::FromStr;

use plotters::coord::Shift;
use plotters::prelude::*;

use super::{CellValue, SheetError, SheetTable};

const SIZE: (u32, u32) = (1000, 600);
const HIST_BINS: usize = 20;

const PALETTE: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Scatter,
    Hist,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Pie => "pie",
            Self::Scatter => "scatter",
            Self::Hist => "hist",
        }
    }
}

impl FromStr for ChartKind {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bar" => Ok(Self::Bar),
            "line" => Ok(Self::Line),
            "pie" => Ok(Self::Pie),
            "scatter" => Ok(Self::Scatter),
            "hist" | "histogram" => Ok(Self::Hist),
            other => Err(SheetError::Invalid(format!(
                "unsupported chart type: {} (expected bar, line, pie, scatter or hist)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChartRequest {
    pub kind: ChartKind,
    pub title: String,
    pub x_col: Option<String>,
    pub y_col: Option<String>,
}

/// Labels along the category axis plus one or more named value series.
struct Series {
    labels: Vec<String>,
    values: Vec<(String, Vec<f64>)>,
}

/// Render `table` as an SVG chart at `output`.
pub fn render_chart(table: &SheetTable, request: &ChartRequest, output: &Path) -> Result<(), SheetError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SheetError::Write {
            path: parent.display().to_string(),
            message: e.to_string(),
        })?;
    }

    let root = SVGBackend::new(output, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    match request.kind {
        ChartKind::Bar => draw_bars(&root, &request.title, &categorical(table, request)?)?,
        ChartKind::Line => draw_lines(&root, &request.title, &categorical(table, request)?)?,
        ChartKind::Pie => draw_pie(&root, &request.title, &pie_series(table, request)?)?,
        ChartKind::Scatter => {
            let (x_name, y_name) = match (&request.x_col, &request.y_col) {
                (Some(x), Some(y)) => (x.clone(), y.clone()),
                _ => {
                    let numeric = table.numeric_columns();
                    if numeric.len() < 2 {
                        return Err(SheetError::Invalid(
                            "scatter needs two numeric columns".to_string(),
                        ));
                    }
                    (table.columns[numeric[0]].clone(), table.columns[numeric[1]].clone())
                }
            };
            let xs = numbers(table, &x_name)?;
            let ys = numbers(table, &y_name)?;
            let points: Vec<(f64, f64)> = xs
                .into_iter()
                .zip(ys)
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .collect();
            draw_scatter(&root, &request.title, &x_name, &y_name, &points)?
        }
        ChartKind::Hist => {
            let name = value_column(table, request.y_col.as_deref())?;
            let values: Vec<f64> = numbers(table, &name)?
                .into_iter()
                .filter(|v| v.is_finite())
                .collect();
            draw_hist(&root, &request.title, &name, &values)?
        }
    }

    root.present().map_err(chart_err)
}

fn chart_err<E: std::fmt::Display>(err: E) -> SheetError {
    SheetError::Chart(err.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Data selection
// ─────────────────────────────────────────────────────────────────────────────

fn numbers(table: &SheetTable, column: &str) -> Result<Vec<f64>, SheetError> {
    let index = table.column_position(column)?;
    Ok(table
        .column(index)
        .map(|v| v.as_number().unwrap_or(f64::NAN))
        .collect())
}

fn labels(table: &SheetTable, column: Option<&str>) -> Result<Vec<String>, SheetError> {
    match column {
        Some(name) => {
            let index = table.column_position(name)?;
            Ok(table.column(index).map(CellValue::to_string).collect())
        }
        None => Ok((0..table.rows.len()).map(|i| i.to_string()).collect()),
    }
}

/// The named column, or the first numeric one.
fn value_column(table: &SheetTable, column: Option<&str>) -> Result<String, SheetError> {
    match column {
        Some(name) => Ok(name.to_string()),
        None => table
            .numeric_columns()
            .first()
            .map(|&i| table.columns[i].clone())
            .ok_or_else(|| SheetError::Invalid("no numeric column to plot".to_string())),
    }
}

/// Bar and line charts: one series when both axes are named, otherwise
/// every numeric column against the row index.
fn categorical(table: &SheetTable, request: &ChartRequest) -> Result<Series, SheetError> {
    if let (Some(x), Some(y)) = (&request.x_col, &request.y_col) {
        return Ok(Series {
            labels: labels(table, Some(x.as_str()))?,
            values: vec![(y.clone(), numbers(table, y)?)],
        });
    }

    let numeric = table.numeric_columns();
    if numeric.is_empty() {
        return Err(SheetError::Invalid("no numeric column to plot".to_string()));
    }
    Ok(Series {
        labels: labels(table, None)?,
        values: numeric
            .into_iter()
            .map(|i| {
                let name = table.columns[i].clone();
                let values = table
                    .column(i)
                    .map(|v| v.as_number().unwrap_or(f64::NAN))
                    .collect();
                (name, values)
            })
            .collect(),
    })
}

fn pie_series(table: &SheetTable, request: &ChartRequest) -> Result<Series, SheetError> {
    let name = value_column(table, request.y_col.as_deref())?;
    Ok(Series {
        labels: labels(table, request.x_col.as_deref())?,
        values: vec![(name.clone(), numbers(table, &name)?)],
    })
}

fn value_bounds<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((0.0f64, 0.0f64), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo == hi {
        (lo, lo + 1.0)
    } else {
        (lo * 1.1, hi * 1.1)
    }
}

fn label_at(labels: &[String], x: f64) -> String {
    let index = x.round();
    if (x - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    labels.get(index as usize).cloned().unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Drawing
// ─────────────────────────────────────────────────────────────────────────────

fn draw_bars(root: &Area<'_>, title: &str, series: &Series) -> Result<(), SheetError> {
    let n = series.labels.len().max(1);
    let (lo, hi) = value_bounds(series.values.iter().flat_map(|(_, v)| v.iter()));

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..n as f64 - 0.5, lo..hi)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n.min(30))
        .x_label_formatter(&|x| label_at(&series.labels, *x))
        .draw()
        .map_err(chart_err)?;

    let width = 0.8 / series.values.len().max(1) as f64;
    for (j, (name, values)) in series.values.iter().enumerate() {
        let color = PALETTE[j % PALETTE.len()];
        chart
            .draw_series(values.iter().enumerate().filter(|(_, v)| v.is_finite()).map(
                |(i, &v)| {
                    let x0 = i as f64 - 0.4 + j as f64 * width;
                    Rectangle::new([(x0, 0.0), (x0 + width, v)], color.filled())
                },
            ))
            .map_err(chart_err)?
            .label(name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(chart_err)
}

fn draw_lines(root: &Area<'_>, title: &str, series: &Series) -> Result<(), SheetError> {
    let n = series.labels.len().max(1);
    let (lo, hi) = value_bounds(series.values.iter().flat_map(|(_, v)| v.iter()));

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..n as f64 - 0.5, lo..hi)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_labels(n.min(30))
        .x_label_formatter(&|x| label_at(&series.labels, *x))
        .draw()
        .map_err(chart_err)?;

    for (j, (name, values)) in series.values.iter().enumerate() {
        let color = PALETTE[j % PALETTE.len()];
        let points: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, &v)| (i as f64, v))
            .collect();
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))
            .map_err(chart_err)?
            .label(name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(chart_err)
}

fn draw_scatter(
    root: &Area<'_>,
    title: &str,
    x_name: &str,
    y_name: &str,
    points: &[(f64, f64)],
) -> Result<(), SheetError> {
    let (x_lo, x_hi) = padded(points.iter().map(|p| p.0));
    let (y_lo, y_hi) = padded(points.iter().map(|p| p.1));

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc(x_name)
        .y_desc(y_name)
        .draw()
        .map_err(chart_err)?;

    let color = PALETTE[0];
    chart
        .draw_series(points.iter().map(|&p| Circle::new(p, 4, color.filled())))
        .map_err(chart_err)?;
    Ok(())
}

fn draw_hist(root: &Area<'_>, title: &str, name: &str, values: &[f64]) -> Result<(), SheetError> {
    if values.is_empty() {
        return Err(SheetError::Invalid(format!("column {} has no numeric values", name)));
    }
    let (lo, hi) = padded(values.iter().copied());
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    let step = span / HIST_BINS as f64;

    let mut counts = [0u32; HIST_BINS];
    for v in values {
        let bin = (((v - min) / step) as usize).min(HIST_BINS - 1);
        counts[bin] += 1;
    }
    let top = counts.iter().copied().max().unwrap_or(1).max(1);

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(lo..hi, 0u32..top + 1)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc(name)
        .y_desc("Frequency")
        .draw()
        .map_err(chart_err)?;

    let color = PALETTE[0];
    chart
        .draw_series(counts.iter().enumerate().map(|(i, &count)| {
            let x0 = min + i as f64 * step;
            Rectangle::new([(x0, 0), (x0 + step, count)], color.filled())
        }))
        .map_err(chart_err)?;
    Ok(())
}

fn draw_pie(root: &Area<'_>, title: &str, series: &Series) -> Result<(), SheetError> {
    let Some((_, values)) = series.values.first() else {
        return Err(SheetError::Invalid("no values to plot".to_string()));
    };
    let slices: Vec<(String, f64)> = series
        .labels
        .iter()
        .cloned()
        .zip(values.iter().copied())
        .filter(|(_, v)| v.is_finite() && *v > 0.0)
        .collect();
    let total: f64 = slices.iter().map(|(_, v)| v).sum();
    if total <= 0.0 {
        return Err(SheetError::Invalid("pie chart needs positive values".to_string()));
    }

    let area = root.titled(title, ("sans-serif", 24.0).into_font()).map_err(chart_err)?;
    let (w, h) = area.dim_in_pixel();
    let center = (w as i32 / 2, h as i32 / 2);
    let radius = (w.min(h) as f64 * 0.4).max(10.0);

    let mut start = -std::f64::consts::FRAC_PI_2;
    for (i, (label, value)) in slices.iter().enumerate() {
        let sweep = value / total * std::f64::consts::TAU;
        let color = PALETTE[i % PALETTE.len()];

        let steps = ((sweep / 0.05).ceil() as usize).max(2);
        let mut outline = vec![center];
        outline.extend((0..=steps).map(|k| {
            let angle = start + sweep * k as f64 / steps as f64;
            polar(center, radius, angle)
        }));
        area.draw(&Polygon::new(outline, color.filled()))
            .map_err(chart_err)?;

        let mid = start + sweep / 2.0;
        let text = format!("{} {:.1}%", label, value / total * 100.0);
        area.draw(&Text::new(
            text,
            polar(center, radius * 1.12, mid),
            ("sans-serif", 14.0).into_font(),
        ))
        .map_err(chart_err)?;

        start += sweep;
    }
    Ok(())
}

fn polar(center: (i32, i32), radius: f64, angle: f64) -> (i32, i32) {
    (
        center.0 + (radius * angle.cos()).round() as i32,
        center.1 + (radius * angle.sin()).round() as i32,
    )
}

/// Axis range covering every value with a 5% margin.
fn padded(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if lo == hi {
        return (lo - 0.5, hi + 0.5);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SheetTable {
        SheetTable {
            columns: vec!["Month".into(), "Sales".into(), "Cost".into()],
            rows: vec![
                vec![CellValue::Text("Jan".into()), CellValue::Number(120.0), CellValue::Number(80.0)],
                vec![CellValue::Text("Feb".into()), CellValue::Number(150.0), CellValue::Number(95.0)],
                vec![CellValue::Text("Mar".into()), CellValue::Number(90.0), CellValue::Number(70.0)],
            ],
        }
    }

    fn request(kind: ChartKind, x: Option<&str>, y: Option<&str>) -> ChartRequest {
        ChartRequest {
            kind,
            title: format!("Sheet1 - {}", kind.as_str()),
            x_col: x.map(String::from),
            y_col: y.map(String::from),
        }
    }

    #[test]
    fn chart_kind_parses_known_names() {
        assert_eq!("Bar".parse::<ChartKind>().unwrap(), ChartKind::Bar);
        assert_eq!("hist".parse::<ChartKind>().unwrap(), ChartKind::Hist);
        assert!("radar".parse::<ChartKind>().is_err());
    }

    #[test]
    fn every_kind_writes_an_svg() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            request(ChartKind::Bar, Some("Month"), Some("Sales")),
            request(ChartKind::Bar, None, None),
            request(ChartKind::Line, None, None),
            request(ChartKind::Pie, Some("Month"), Some("Sales")),
            request(ChartKind::Scatter, None, None),
            request(ChartKind::Hist, None, Some("Cost")),
        ];
        for (i, req) in cases.iter().enumerate() {
            let out = dir.path().join(format!("chart_{}.svg", i));
            render_chart(&table(), req, &out).expect("render");
            let svg = std::fs::read_to_string(&out).unwrap();
            assert!(svg.contains("<svg"), "{:?} produced no svg", req.kind);
        }
    }

    #[test]
    fn unknown_column_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_chart(
            &table(),
            &request(ChartKind::Bar, Some("Month"), Some("Profit")),
            &dir.path().join("c.svg"),
        )
        .unwrap_err();
        assert!(matches!(err, SheetError::ColumnNotFound(c) if c == "Profit"));
    }

    #[test]
    fn labels_only_on_integer_ticks() {
        let labels = vec!["Jan".to_string(), "Feb".to_string()];
        assert_eq!(label_at(&labels, 1.0), "Feb");
        assert_eq!(label_at(&labels, 0.5), "");
        assert_eq!(label_at(&labels, 5.0), "");
    }
}
