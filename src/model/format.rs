//! Renders a worksheet grid for the `get` command.
//!
//! The `plain` format joins cells with a separator. All other formats treat the first row as the
//! header and every following row as a record.

use crate::error::Res;
use crate::model::{column_letters, Grid};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// The output formats supported by `get`.
#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Cells joined by the separator, one row per line.
    #[default]
    Plain,
    /// A JSON array of records.
    Json,
    /// A YAML sequence of records.
    Yaml,
    /// One line per record with signed numbers, e.g. `Jan +10, Feb -3`.
    Report,
    /// A markdown pipe table.
    Markdown,
}

serde_plain::derive_display_from_serialize!(OutputFormat);
serde_plain::derive_fromstr_from_deserialize!(OutputFormat);

type Renderer = fn(&Grid, &str) -> Res<String>;

const RENDERERS: &[(OutputFormat, Renderer)] = &[
    (OutputFormat::Plain, render_plain),
    (OutputFormat::Json, render_json),
    (OutputFormat::Yaml, render_yaml),
    (OutputFormat::Report, render_report),
    (OutputFormat::Markdown, render_markdown),
];

/// Renders `grid` in the given `format`. `separator` is used by the `plain` and `report` formats.
pub fn render(format: OutputFormat, grid: &Grid, separator: &str) -> Res<String> {
    let Some((_, renderer)) = RENDERERS.iter().find(|(f, _)| *f == format) else {
        bail!("No renderer is registered for the '{format}' format");
    };
    renderer(grid, separator)
}

/// Converts a grid into records keyed by the header row. Values that look like numbers become
/// JSON numbers. Short rows are padded with empty strings and blank header cells are keyed by
/// their column letters.
pub fn records(grid: &Grid) -> Vec<Map<String, Value>> {
    let Some((header, rows)) = grid.split_first() else {
        return Vec::new();
    };
    let keys: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(ix, h)| {
            if h.trim().is_empty() {
                column_letters(ix)
            } else {
                h.clone()
            }
        })
        .collect();

    rows.iter()
        .map(|row| {
            keys.iter()
                .enumerate()
                .map(|(ix, key)| {
                    let cell = row.get(ix).map(String::as_str).unwrap_or_default();
                    (key.clone(), numericise(cell))
                })
                .collect()
        })
        .collect()
}

fn numericise(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() || !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return Value::String(cell.to_string());
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(Number::from(i));
    }
    match trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(cell.to_string()),
    }
}

fn render_plain(grid: &Grid, separator: &str) -> Res<String> {
    Ok(grid
        .iter()
        .map(|row| row.join(separator))
        .collect::<Vec<_>>()
        .join("\n"))
}

fn render_json(grid: &Grid, _: &str) -> Res<String> {
    serde_json::to_string_pretty(&records(grid)).context("Unable to serialize records as JSON")
}

fn render_yaml(grid: &Grid, _: &str) -> Res<String> {
    serde_yaml::to_string(&records(grid)).context("Unable to serialize records as YAML")
}

fn render_report(grid: &Grid, separator: &str) -> Res<String> {
    Ok(records(grid)
        .iter()
        .map(|record| {
            record
                .iter()
                .map(|(k, v)| format!("{k} {}", signed(v)))
                .collect::<Vec<_>>()
                .join(separator)
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

fn signed(value: &Value) -> String {
    match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => format!("{i:+}"),
            (None, Some(f)) => format!("{f:+}"),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_markdown(grid: &Grid, _: &str) -> Res<String> {
    let records = records(grid);
    let Some(header) = grid.first() else {
        return Ok(String::new());
    };
    let keys: Vec<String> = records
        .first()
        .map(|r| r.keys().cloned().collect())
        .unwrap_or_else(|| header.clone());

    let mut lines = Vec::with_capacity(records.len() + 2);
    lines.push(table_row(keys.iter().map(String::as_str)));
    lines.push(table_row(keys.iter().map(|_| "---")));
    for record in &records {
        let cells: Vec<String> = record
            .values()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        lines.push(table_row(cells.iter().map(String::as_str)));
    }
    Ok(lines.join("\n"))
}

fn table_row<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let cells: Vec<String> = cells.map(|c| c.replace('|', "\\|")).collect();
    format!("| {} |", cells.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Grid {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_records_numbers_and_padding() {
        let g = grid(&[&["Name", "Qty", "Price", ""], &["apple", "3", "1.25"], &["pear"]]);
        let records = records(&g);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Name"], Value::from("apple"));
        assert_eq!(records[0]["Qty"], Value::from(3));
        assert_eq!(records[0]["Price"], Value::from(1.25));
        assert_eq!(records[0]["D"], Value::from(""));
        assert_eq!(records[1]["Qty"], Value::from(""));
    }

    #[test]
    fn test_numericise_leaves_non_numbers() {
        assert_eq!(numericise("inf"), Value::from("inf"));
        assert_eq!(numericise("1e400"), Value::from("1e400"));
        assert_eq!(numericise("12 apples"), Value::from("12 apples"));
        assert_eq!(numericise("-7"), Value::from(-7));
    }

    #[test]
    fn test_render_plain() {
        let g = grid(&[&["a", "b"], &["c"]]);
        assert_eq!(render(OutputFormat::Plain, &g, ", ").unwrap(), "a, b\nc");
    }

    #[test]
    fn test_render_json_keeps_header_order() {
        let g = grid(&[&["Zeta", "Alpha"], &["1", "x"]]);
        let json = render(OutputFormat::Json, &g, "").unwrap();
        let zeta = json.find("Zeta").unwrap();
        let alpha = json.find("Alpha").unwrap();
        assert!(zeta < alpha);
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["Zeta"], Value::from(1));
    }

    #[test]
    fn test_render_yaml() {
        let g = grid(&[&["k"], &["v"]]);
        let yaml = render(OutputFormat::Yaml, &g, "").unwrap();
        assert_eq!(yaml.trim(), "- k: v");
    }

    #[test]
    fn test_render_report() {
        let g = grid(&[&["Jan", "Feb", "Note"], &["10", "-3.5", "ok"]]);
        let report = render(OutputFormat::Report, &g, ", ").unwrap();
        assert_eq!(report, "Jan +10, Feb -3.5, Note ok");
    }

    #[test]
    fn test_render_markdown() {
        let g = grid(&[&["a", "b"], &["1", "x|y"]]);
        let md = render(OutputFormat::Markdown, &g, "").unwrap();
        assert_eq!(md, "| a | b |\n| --- | --- |\n| 1 | x\\|y |");
    }

    #[test]
    fn test_render_empty_grid() {
        let g = Grid::new();
        assert_eq!(render(OutputFormat::Json, &g, "").unwrap(), "[]");
        assert_eq!(render(OutputFormat::Markdown, &g, "").unwrap(), "");
        assert_eq!(render(OutputFormat::Plain, &g, ", ").unwrap(), "");
    }

    #[test]
    fn test_every_format_has_a_renderer() {
        use clap::ValueEnum;
        for format in OutputFormat::value_variants() {
            assert!(RENDERERS.iter().any(|(f, _)| f == format));
        }
    }
}
