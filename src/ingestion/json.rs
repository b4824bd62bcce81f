//! JSON ingestion implementation.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - A single JSON object
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! Nested fields are addressed with dot paths in schema field names (e.g. `cliente.nome`). A key
//! that itself contains a dot names the same column as the equivalent nesting, and a row holding
//! both is rejected.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// How a row that lacks a schema field is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingField {
    Error,
    Null,
}

/// Read a JSON file into a [`DataSet`], inferring the schema from its rows.
pub fn read_json_from_path(path: impl AsRef<Path>) -> IngestionResult<DataSet> {
    let text = fs::read_to_string(path)?;
    read_json_from_str(&text)
}

/// Read JSON text into a [`DataSet`], inferring the schema from its rows.
///
/// Columns appear in first-seen key order. Nested objects are flattened into dot-path columns.
/// A key absent from some rows is null in those rows.
pub fn read_json_from_str(input: &str) -> IngestionResult<DataSet> {
    let values = parse_json_rows(input)?;
    let schema = infer_json_schema(&values)?;
    ingest_json_values(&values, &schema, MissingField::Null)
}

/// Ingest JSON into an in-memory `DataSet`.
pub fn ingest_json_from_path(path: impl AsRef<Path>, schema: &Schema) -> IngestionResult<DataSet> {
    let text = fs::read_to_string(path)?;
    ingest_json_from_str(&text, schema)
}

/// Ingest JSON from an in-memory string into a [`DataSet`].
///
/// Every row must contain every schema field.
pub fn ingest_json_from_str(input: &str, schema: &Schema) -> IngestionResult<DataSet> {
    let values = parse_json_rows(input)?;
    ingest_json_values(&values, schema, MissingField::Error)
}

fn parse_json_rows(input: &str) -> IngestionResult<Vec<serde_json::Value>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(IngestionError::SchemaMismatch {
            message: "json input is empty".to_string(),
        });
    }

    // First try parsing as a single JSON value (array or object).
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        match v {
            serde_json::Value::Array(items) => Ok(items),
            serde_json::Value::Object(_) => Ok(vec![v]),
            _ => Err(IngestionError::SchemaMismatch {
                message: "json must be an object, an array of objects, or NDJSON".to_string(),
            }),
        }
    } else {
        // Fall back to NDJSON.
        let mut values = Vec::new();
        for (i, line) in trimmed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| {
                IngestionError::SchemaMismatch {
                    message: format!("invalid ndjson at line {}: {}", i + 1, e),
                }
            })?;
            values.push(v);
        }
        Ok(values)
    }
}

fn ingest_json_values(
    values: &[serde_json::Value],
    schema: &Schema,
    missing: MissingField,
) -> IngestionResult<DataSet> {
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(values.len());

    for (idx0, v) in values.iter().enumerate() {
        let row_num = idx0 + 1;
        let obj = as_row_object(row_num, v)?;
        let flat: HashMap<String, &serde_json::Value> =
            flatten_row(row_num, obj)?.into_iter().collect();

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            match flat.get(field.name.as_str()).copied() {
                Some(jv) => row.push(convert_json_value(row_num, &field.name, field.data_type, jv)?),
                None if missing == MissingField::Null => row.push(Value::Null),
                None => {
                    return Err(IngestionError::SchemaMismatch {
                        message: format!("row {row_num} missing required field '{}'", field.name),
                    });
                }
            }
        }
        rows.push(row);
    }

    Ok(DataSet::new(schema.clone(), rows))
}

fn as_row_object(
    row_num: usize,
    v: &serde_json::Value,
) -> IngestionResult<&serde_json::Map<String, serde_json::Value>> {
    v.as_object().ok_or_else(|| IngestionError::SchemaMismatch {
        message: format!("row {row_num} is not a json object"),
    })
}

/// Value kinds observed for one column during inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonKind {
    /// Only nulls so far.
    Unknown,
    Int,
    Float,
    Bool,
    Str,
}

impl JsonKind {
    fn of(v: &serde_json::Value) -> Option<Self> {
        match v {
            serde_json::Value::Null => Some(Self::Unknown),
            serde_json::Value::Bool(_) => Some(Self::Bool),
            serde_json::Value::Number(n) if n.is_i64() => Some(Self::Int),
            serde_json::Value::Number(_) => Some(Self::Float),
            serde_json::Value::String(_) => Some(Self::Str),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    fn merge(self, other: Self) -> Option<Self> {
        match (self, other) {
            (a, Self::Unknown) => Some(a),
            (Self::Unknown, b) => Some(b),
            (a, b) if a == b => Some(a),
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => Some(Self::Float),
            _ => None,
        }
    }

    fn data_type(self) -> DataType {
        match self {
            Self::Int => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Bool => DataType::Bool,
            Self::Unknown | Self::Str => DataType::Utf8,
        }
    }
}

fn infer_json_schema(values: &[serde_json::Value]) -> IngestionResult<Schema> {
    let mut columns: Vec<(String, JsonKind)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (idx0, v) in values.iter().enumerate() {
        let row_num = idx0 + 1;
        let obj = as_row_object(row_num, v)?;
        for (path, v) in flatten_row(row_num, obj)? {
            observe(path, v, &mut columns, &mut index)?;
        }
    }

    let fields = columns
        .into_iter()
        .map(|(name, kind)| Field::new(name, kind.data_type()))
        .collect();
    Ok(Schema::new(fields))
}

fn observe(
    path: String,
    v: &serde_json::Value,
    columns: &mut Vec<(String, JsonKind)>,
    index: &mut HashMap<String, usize>,
) -> IngestionResult<()> {
    let kind = JsonKind::of(v).ok_or_else(|| IngestionError::SchemaMismatch {
        message: format!("field '{path}' holds an array, which cannot be mapped to a column"),
    })?;

    match index.get(&path) {
        Some(&i) => {
            let current = columns[i].1;
            columns[i].1 = current.merge(kind).ok_or_else(|| IngestionError::SchemaMismatch {
                message: format!(
                    "field '{path}' mixes incompatible json types ({current:?} and {kind:?})"
                ),
            })?;
        }
        None => {
            index.insert(path.clone(), columns.len());
            columns.push((path, kind));
        }
    }
    Ok(())
}

/// Leaf values of one row keyed by dot path, in key order. Objects are descended into; every
/// other value, arrays included, is a leaf.
fn flatten_row(
    row_num: usize,
    obj: &serde_json::Map<String, serde_json::Value>,
) -> IngestionResult<Vec<(String, &serde_json::Value)>> {
    let mut leaves = Vec::with_capacity(obj.len());
    let mut seen = HashSet::new();
    flatten_into(row_num, obj, "", &mut leaves, &mut seen)?;
    Ok(leaves)
}

fn flatten_into<'a>(
    row_num: usize,
    obj: &'a serde_json::Map<String, serde_json::Value>,
    prefix: &str,
    leaves: &mut Vec<(String, &'a serde_json::Value)>,
    seen: &mut HashSet<String>,
) -> IngestionResult<()> {
    for (key, v) in obj {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        if let serde_json::Value::Object(nested) = v {
            flatten_into(row_num, nested, &path, leaves, seen)?;
            continue;
        }

        if !seen.insert(path.clone()) {
            return Err(IngestionError::SchemaMismatch {
                message: format!(
                    "row {row_num} maps both a dotted key and a nested object to column '{path}'"
                ),
            });
        }
        leaves.push((path, v));
    }
    Ok(())
}

fn convert_json_value(
    row: usize,
    column: &str,
    data_type: DataType,
    v: &serde_json::Value,
) -> IngestionResult<Value> {
    if v.is_null() {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Utf8 => v.as_str().map(|s| Value::Utf8(s.to_string())).ok_or_else(|| {
            IngestionError::ParseError {
                row,
                column: column.to_string(),
                raw: v.to_string(),
                message: "expected string".to_string(),
            }
        }),
        DataType::Bool => v.as_bool().map(Value::Bool).ok_or_else(|| IngestionError::ParseError {
            row,
            column: column.to_string(),
            raw: v.to_string(),
            message: "expected bool".to_string(),
        }),
        DataType::Int64 => {
            if let Some(n) = v.as_i64() {
                Ok(Value::Int64(n))
            } else if let Some(n) = v.as_u64() {
                i64::try_from(n).map(Value::Int64).map_err(|_| IngestionError::ParseError {
                    row,
                    column: column.to_string(),
                    raw: v.to_string(),
                    message: "u64 out of range for i64".to_string(),
                })
            } else {
                Err(IngestionError::ParseError {
                    row,
                    column: column.to_string(),
                    raw: v.to_string(),
                    message: "expected integer number".to_string(),
                })
            }
        }
        DataType::Float64 => v.as_f64().map(Value::Float64).ok_or_else(|| IngestionError::ParseError {
            row,
            column: column.to_string(),
            raw: v.to_string(),
            message: "expected number".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::read_json_from_str;
    use crate::types::{DataType, Value};

    #[test]
    fn infers_columns_in_key_order_and_widens_int_to_float() {
        let ds = read_json_from_str(
            r#"[{"produto":"caneta","quantidade":2,"valor":5},{"produto":"lapis","quantidade":3,"valor":10.5}]"#,
        )
        .unwrap();

        let names: Vec<&str> = ds.schema.field_names().collect();
        assert_eq!(names, vec!["produto", "quantidade", "valor"]);
        assert_eq!(ds.schema.fields[1].data_type, DataType::Int64);
        assert_eq!(ds.schema.fields[2].data_type, DataType::Float64);
        assert_eq!(ds.rows[0][2], Value::Float64(5.0));
    }

    #[test]
    fn absent_keys_become_nulls() {
        let ds = read_json_from_str("{\"quantidade\":1,\"valor\":2.0}\n{\"valor\":4.0}\n").unwrap();
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.rows[1][0], Value::Null);
    }

    #[test]
    fn nested_objects_flatten_to_dot_paths() {
        let ds = read_json_from_str(r#"[{"id":1,"cliente":{"nome":"Ada"}}]"#).unwrap();
        assert_eq!(ds.schema.index_of("cliente.nome"), Some(1));
        assert_eq!(ds.rows[0][1], Value::Utf8("Ada".to_string()));
    }

    #[test]
    fn conflicting_types_are_rejected() {
        let err = read_json_from_str(r#"[{"valor":1},{"valor":"dez"}]"#).unwrap_err();
        assert!(err.to_string().contains("mixes incompatible json types"));
    }

    #[test]
    fn dotted_keys_keep_their_values() {
        let ds = read_json_from_str(r#"[{"quantidade":2,"valor.unit":5.0}]"#).unwrap();
        let names: Vec<&str> = ds.schema.field_names().collect();
        assert_eq!(names, vec!["quantidade", "valor.unit"]);
        assert_eq!(ds.rows[0], vec![Value::Int64(2), Value::Float64(5.0)]);
    }

    #[test]
    fn dotted_key_and_nested_object_share_a_column_across_rows() {
        let ds = read_json_from_str(
            "{\"cliente.nome\":\"Ada\"}\n{\"cliente\":{\"nome\":\"Grace\"}}\n",
        )
        .unwrap();
        assert_eq!(ds.schema.fields.len(), 1);
        assert_eq!(ds.rows[0][0], Value::Utf8("Ada".to_string()));
        assert_eq!(ds.rows[1][0], Value::Utf8("Grace".to_string()));
    }

    #[test]
    fn dotted_key_colliding_with_nested_path_in_one_row_is_rejected() {
        let err = read_json_from_str(r#"[{"cliente.nome":"Ada","cliente":{"nome":"Grace"}}]"#)
            .unwrap_err();
        assert!(err.to_string().contains("column 'cliente.nome'"));
    }

    #[test]
    fn arrays_are_rejected() {
        let err = read_json_from_str(r#"[{"tags":["a","b"]}]"#).unwrap_err();
        assert!(err.to_string().contains("holds an array"));
    }
}
