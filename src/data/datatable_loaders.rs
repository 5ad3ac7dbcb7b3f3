//! Build row collections from JSON or CSV sources.

use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use serde_json::Value as JsonValue;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

use crate::data::datatable::{DataValue, Row, RowId};

/// Field that carries the per-row selectable flag in JSON sources
const SELECTABLE_FIELD: &str = "selectable";

/// Parse a JSON array of objects into rows.
///
/// The `id_field` value becomes the row id; objects without it fall back to
/// their array position. A boolean `selectable` field sets selectability
/// instead of becoming a value.
pub fn load_json_rows(json: &str, id_field: &str) -> Result<Vec<Row>> {
    let value: JsonValue = serde_json::from_str(json).context("Failed to parse JSON rows")?;
    rows_from_json_value(&value, id_field)
}

/// Load a JSON file of row objects
pub fn load_json_file<P: AsRef<Path>>(path: P, id_field: &str) -> Result<Vec<Row>> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open JSON file: {:?}", path.as_ref()))?;
    let value: JsonValue = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse JSON file: {:?}", path.as_ref()))?;
    rows_from_json_value(&value, id_field)
}

fn rows_from_json_value(value: &JsonValue, id_field: &str) -> Result<Vec<Row>> {
    let items = value
        .as_array()
        .ok_or_else(|| anyhow!("Expected a JSON array of objects"))?;

    let mut rows = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let obj = item
            .as_object()
            .ok_or_else(|| anyhow!("Row {} is not a JSON object", position))?;

        let id = match obj.get(id_field) {
            Some(JsonValue::String(s)) => RowId::from(s.as_str()),
            Some(JsonValue::Null) | None => {
                warn!(target: "engine", "Row {} has no '{}', using position as id", position, id_field);
                RowId::from(position)
            }
            Some(other) => RowId::from(other.to_string()),
        };

        let mut row = Row::new(id);
        for (key, field) in obj {
            if key == SELECTABLE_FIELD {
                if let JsonValue::Bool(selectable) = field {
                    row = row.with_selectable(*selectable);
                    continue;
                }
            }
            row.set(key.as_str(), DataValue::from_json(field));
        }
        rows.push(row);
    }

    debug!(target: "engine", "Loaded {} rows from JSON", rows.len());
    Ok(rows)
}

/// Parse CSV text with a header line into rows, inferring value types
pub fn load_csv_rows<R: Read>(reader: R, id_field: &str) -> Result<Vec<Row>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = reader.headers()?.clone();
    let id_column = headers.iter().position(|h| h == id_field);
    if id_column.is_none() {
        warn!(target: "engine", "CSV has no '{}' column, using line position as id", id_field);
    }

    let mut rows = Vec::new();
    for (position, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV record {}", position))?;

        let id = id_column
            .and_then(|c| record.get(c))
            .filter(|s| !s.is_empty())
            .map(RowId::from)
            .unwrap_or_else(|| RowId::from(position));

        let mut row = Row::new(id);
        for (header, cell) in headers.iter().zip(record.iter()) {
            row.set(header, DataValue::infer_from_str(cell));
        }
        rows.push(row);
    }

    debug!(target: "engine", "Loaded {} rows from CSV", rows.len());
    Ok(rows)
}

/// Load a CSV file of rows
pub fn load_csv_file<P: AsRef<Path>>(path: P, id_field: &str) -> Result<Vec<Row>> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path.as_ref()))?;
    load_csv_rows(BufReader::new(file), id_field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rows_with_ids_and_selectable() {
        let rows = load_json_rows(
            r#"[
                {"id": "light.kitchen", "name": "Kitchen", "brightness": 180},
                {"id": 7, "name": "Porch", "selectable": false},
                {"name": "No id"}
            ]"#,
            "id",
        )
        .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].id().as_str(), "light.kitchen");
        assert_eq!(rows[0].get("brightness"), Some(&DataValue::Integer(180)));
        assert_eq!(rows[1].id().as_str(), "7");
        assert!(!rows[1].is_selectable());
        assert!(rows[1].get("selectable").is_none());
        assert_eq!(rows[2].id().as_str(), "2");
    }

    #[test]
    fn test_json_requires_array_of_objects() {
        assert!(load_json_rows(r#"{"id": 1}"#, "id").is_err());
        assert!(load_json_rows(r#"[1, 2]"#, "id").is_err());
    }

    #[test]
    fn test_csv_rows_infer_types() {
        let csv = "id,name,amount\n1,Alice,10.5\n2,Bob,\n";
        let rows = load_csv_rows(csv.as_bytes(), "id").unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id().as_str(), "1");
        assert_eq!(rows[0].get("amount"), Some(&DataValue::Float(10.5)));
        assert_eq!(rows[1].get("amount"), Some(&DataValue::Null));
        assert_eq!(rows[1].get("name"), Some(&DataValue::from("Bob")));
    }
}
