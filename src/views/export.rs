//! CSV and JSON export of a list for a chosen set of columns.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::Fields;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
  Csv,
  Json,
}

impl ExportFormat {
  pub fn extension(&self) -> &'static str {
    match self {
      ExportFormat::Csv => "csv",
      ExportFormat::Json => "json",
    }
  }
}

impl fmt::Display for ExportFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.extension())
  }
}

impl FromStr for ExportFormat {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "csv" => Ok(ExportFormat::Csv),
      "json" => Ok(ExportFormat::Json),
      other => Err(format!("unknown export format '{}' (expected csv or json)", other)),
    }
  }
}

/// Render `items` in the given format.
pub fn export<I>(items: I, columns: &[&str], format: ExportFormat) -> Result<String>
where
  I: IntoIterator,
  I::Item: Fields,
{
  match format {
    ExportFormat::Csv => Ok(to_csv(items, columns)),
    ExportFormat::Json => Ok(serde_json::to_string_pretty(&to_json(items, columns))?),
  }
}

/// RFC 4180 CSV with a header row and CRLF line endings.
/// Missing fields become empty cells.
pub fn to_csv<I>(items: I, columns: &[&str]) -> String
where
  I: IntoIterator,
  I::Item: Fields,
{
  let mut out = String::new();
  write_row(&mut out, columns.iter().map(|c| c.to_string()));
  for item in items {
    write_row(
      &mut out,
      columns
        .iter()
        .map(|c| item.field(c).map(|v| v.to_display()).unwrap_or_default()),
    );
  }
  out
}

fn write_row(out: &mut String, cells: impl Iterator<Item = String>) {
  for (i, cell) in cells.enumerate() {
    if i > 0 {
      out.push(',');
    }
    push_cell(out, &cell);
  }
  out.push_str("\r\n");
}

fn push_cell(out: &mut String, cell: &str) {
  let needs_quotes = cell.contains([',', '"', '\r', '\n'])
    || cell.starts_with(' ')
    || cell.ends_with(' ');
  if needs_quotes {
    out.push('"');
    out.push_str(&cell.replace('"', "\"\""));
    out.push('"');
  } else {
    out.push_str(cell);
  }
}

/// Array of objects restricted to `columns`. Missing fields become null.
pub fn to_json<I>(items: I, columns: &[&str]) -> Value
where
  I: IntoIterator,
  I::Item: Fields,
{
  let rows = items
    .into_iter()
    .map(|item| {
      let row: Map<String, Value> = columns
        .iter()
        .map(|c| {
          let value = item.field(c).map_or(Value::Null, |v| v.to_json());
          (c.to_string(), value)
        })
        .collect();
      Value::Object(row)
    })
    .collect();
  Value::Array(rows)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn rows() -> Vec<Value> {
    vec![
      json!({"id": 1, "name": "Acme, Ltd", "balance": "10.50"}),
      json!({"id": 2, "name": "The \"Best\" Co", "note": "line\nbreak"}),
      json!({"id": 3, "name": " padded"}),
    ]
  }

  #[test]
  fn test_csv_quoting() {
    let csv = to_csv(&rows(), &["id", "name", "balance"]);
    assert_eq!(
      csv,
      "id,name,balance\r\n\
       1,\"Acme, Ltd\",10.50\r\n\
       2,\"The \"\"Best\"\" Co\",\r\n\
       3,\" padded\",\r\n"
    );
  }

  #[test]
  fn test_csv_embedded_newline() {
    let csv = to_csv(&rows()[1..2], &["note"]);
    assert_eq!(csv, "note\r\n\"line\nbreak\"\r\n");
  }

  #[test]
  fn test_json_export_selects_columns() {
    let value = to_json(&rows(), &["id", "balance"]);
    assert_eq!(
      value,
      json!([
        {"id": 1, "balance": "10.50"},
        {"id": 2, "balance": null},
        {"id": 3, "balance": null},
      ])
    );
  }

  #[test]
  fn test_format_parse() {
    assert_eq!("CSV".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
    assert!("xml".parse::<ExportFormat>().is_err());
  }

  #[test]
  fn test_export_json_is_pretty() {
    let text = export(&rows()[..1], &["id"], ExportFormat::Json).unwrap();
    assert!(text.contains("\n"));
    assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), json!([{"id": 1}]));
  }
}
