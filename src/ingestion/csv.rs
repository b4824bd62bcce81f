//! CSV ingestion implementation.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Read a CSV file into a [`DataSet`], inferring column types from its contents.
///
/// See [`infer_csv_schema_from_reader`] for the inference rules.
pub fn read_csv_from_path(path: impl AsRef<Path>) -> IngestionResult<DataSet> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let schema = infer_csv_schema_from_reader(&mut rdr)?;
    ingest_csv_from_path(path, &schema)
}

/// Ingest a CSV file into an in-memory [`DataSet`].
///
/// Rules:
///
/// - CSV must have headers, each name at most once.
/// - Headers must contain all schema fields (order can differ).
/// - Each value is parsed according to the schema field type.
pub fn ingest_csv_from_path(path: impl AsRef<Path>, schema: &Schema) -> IngestionResult<DataSet> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    ingest_csv_from_reader(&mut rdr, schema)
}

/// Ingest CSV data from an existing CSV reader.
pub fn ingest_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    schema: &Schema,
) -> IngestionResult<DataSet> {
    let headers = rdr.headers()?.clone();
    ensure_unique_headers(&headers)?;

    // Map schema fields -> CSV column indexes (allows re-ordered CSV columns).
    let mut col_idxs = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        match headers.iter().position(|h| h == field.name) {
            Some(idx) => col_idxs.push(idx),
            None => {
                return Err(IngestionError::SchemaMismatch {
                    message: format!(
                        "missing required column '{field}'. headers={:?}",
                        headers.iter().collect::<Vec<_>>(),
                        field = field.name
                    ),
                });
            }
        }
    }

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (row_idx0, result) in rdr.records().enumerate() {
        // 1-based for users, and the header is row 1.
        let user_row = row_idx0 + 2;
        let record = result?;

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &csv_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let raw = record.get(csv_idx).unwrap_or("");
            row.push(parse_typed_value(user_row, &field.name, field.data_type, raw)?);
        }
        rows.push(row);
    }

    Ok(DataSet::new(schema.clone(), rows))
}

/// Infer a [`Schema`] from the header and every record of a CSV reader.
///
/// Each column takes the narrowest type that fits all of its non-empty cells, tried in the order
/// Int64, Float64, Bool (`true`/`false` only), Utf8. Columns with no non-empty cell are Utf8.
/// The reader is consumed.
pub fn infer_csv_schema_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
) -> IngestionResult<Schema> {
    let headers = rdr.headers()?.clone();
    ensure_unique_headers(&headers)?;
    let mut candidates = vec![TypeCandidate::default(); headers.len()];

    for result in rdr.records() {
        let record = result?;
        for (idx, candidate) in candidates.iter_mut().enumerate() {
            candidate.observe(record.get(idx).unwrap_or(""));
        }
    }

    let fields = headers
        .iter()
        .zip(candidates)
        .map(|(name, candidate)| Field::new(name, candidate.resolve()))
        .collect();
    Ok(Schema::new(fields))
}

fn ensure_unique_headers(headers: &csv::StringRecord) -> IngestionResult<()> {
    let mut seen = HashSet::with_capacity(headers.len());
    for name in headers {
        if !seen.insert(name) {
            return Err(IngestionError::SchemaMismatch {
                message: format!("duplicate column '{name}' in header"),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct TypeCandidate {
    seen: bool,
    int: bool,
    float: bool,
    boolean: bool,
}

impl Default for TypeCandidate {
    fn default() -> Self {
        Self {
            seen: false,
            int: true,
            float: true,
            boolean: true,
        }
    }
}

impl TypeCandidate {
    fn observe(&mut self, raw: &str) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        self.seen = true;
        self.int &= trimmed.parse::<i64>().is_ok();
        self.float &= trimmed.parse::<f64>().is_ok();
        self.boolean &= trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false");
    }

    fn resolve(self) -> DataType {
        if !self.seen {
            DataType::Utf8
        } else if self.int {
            DataType::Int64
        } else if self.float {
            DataType::Float64
        } else if self.boolean {
            DataType::Bool
        } else {
            DataType::Utf8
        }
    }
}

fn parse_typed_value(
    row: usize,
    column: &str,
    data_type: DataType,
    raw: &str,
) -> IngestionResult<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(trimmed.to_owned())),
        DataType::Int64 => trimmed.parse::<i64>().map(Value::Int64).map_err(|e| {
            IngestionError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: e.to_string(),
            }
        }),
        DataType::Float64 => trimmed.parse::<f64>().map(Value::Float64).map_err(|e| {
            IngestionError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: e.to_string(),
            }
        }),
        DataType::Bool => parse_bool(trimmed).map(Value::Bool).map_err(|message| {
            IngestionError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message,
            }
        }),
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}
