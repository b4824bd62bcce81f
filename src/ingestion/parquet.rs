//! Parquet ingestion implementation.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;

use chrono::{DateTime, NaiveTime};
use parquet::basic::{ConvertedType, LogicalType, Type as PhysicalType};
use parquet::data_type::Decimal;
use parquet::file::reader::{ChunkReader, FileReader};
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::record::Field;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{self, DataSet, DataType, Schema, Value};

/// Read a Parquet file into a [`DataSet`], taking the schema from the file's leaf columns.
///
/// Annotated columns map first: DECIMAL → Float64, DATE → Utf8 (`YYYY-MM-DD`), TIME → Utf8
/// (`HH:MM:SS.fff`) and TIMESTAMP or INT96 → Utf8 (RFC 3339, UTC). Plain physical types map as
/// BOOLEAN → Bool, INT32/INT64 → Int64, FLOAT/DOUBLE and FLOAT16 → Float64 and BYTE_ARRAY → Utf8.
/// Nested columns and other fixed-length byte arrays are rejected.
pub fn read_parquet_from_path(path: impl AsRef<Path>) -> IngestionResult<DataSet> {
    let reader = SerializedFileReader::try_from(path.as_ref())?;
    let schema = infer_parquet_schema(&reader)?;
    ingest_parquet_reader(reader, &schema)
}

/// Ingest a Parquet file into an in-memory `DataSet`.
///
/// Notes:
/// - Validates that all schema fields exist as Parquet leaf columns (by column path string)
/// - Uses the Parquet record API (`RowIter`)
pub fn ingest_parquet_from_path(path: impl AsRef<Path>, schema: &Schema) -> IngestionResult<DataSet> {
    let reader = SerializedFileReader::try_from(path.as_ref())?;

    let available_columns = parquet_leaf_column_paths(&reader);
    for field in &schema.fields {
        if !available_columns.contains(field.name.as_str()) {
            return Err(IngestionError::SchemaMismatch {
                message: format!("missing required column '{}'", field.name),
            });
        }
    }

    ingest_parquet_reader(reader, schema)
}

fn ingest_parquet_reader(
    reader: SerializedFileReader<File>,
    schema: &Schema,
) -> IngestionResult<DataSet> {
    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (idx0, row_res) in reader.into_iter().enumerate() {
        let row_num = idx0 + 1;
        let row = row_res?;

        let mut map: HashMap<&str, &Field> = HashMap::new();
        for (name, field) in row.get_column_iter() {
            map.insert(name.as_str(), field);
        }

        let mut out_row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for f in &schema.fields {
            let v = map.get(f.name.as_str()).ok_or_else(|| IngestionError::SchemaMismatch {
                message: format!("row {row_num} missing required column '{}'", f.name),
            })?;
            out_row.push(convert_parquet_field(row_num, &f.name, f.data_type, v)?);
        }
        rows.push(out_row);
    }

    Ok(DataSet::new(schema.clone(), rows))
}

fn infer_parquet_schema<R: ChunkReader + 'static>(
    reader: &SerializedFileReader<R>,
) -> IngestionResult<Schema> {
    let descr = reader.metadata().file_metadata().schema_descr();
    let mut fields = Vec::with_capacity(descr.num_columns());

    for c in descr.columns() {
        let name = c.path().string();
        if c.path().parts().len() != 1 {
            return Err(IngestionError::SchemaMismatch {
                message: format!("nested parquet column '{name}' is not supported"),
            });
        }

        let data_type = match (c.physical_type(), c.converted_type()) {
            (_, ConvertedType::DECIMAL) => DataType::Float64,
            (
                _,
                ConvertedType::DATE
                | ConvertedType::TIME_MILLIS
                | ConvertedType::TIME_MICROS
                | ConvertedType::TIMESTAMP_MILLIS
                | ConvertedType::TIMESTAMP_MICROS,
            ) => DataType::Utf8,
            (PhysicalType::INT96, _) => DataType::Utf8,
            (PhysicalType::BOOLEAN, _) => DataType::Bool,
            (PhysicalType::INT32 | PhysicalType::INT64, _) => DataType::Int64,
            (PhysicalType::FLOAT | PhysicalType::DOUBLE, _) => DataType::Float64,
            (PhysicalType::BYTE_ARRAY, _) => DataType::Utf8,
            (PhysicalType::FIXED_LEN_BYTE_ARRAY, _)
                if c.logical_type_ref() == Some(&LogicalType::Float16) =>
            {
                DataType::Float64
            }
            (other, _) => {
                return Err(IngestionError::SchemaMismatch {
                    message: format!("unsupported parquet type {other:?} for column '{name}'"),
                });
            }
        };
        fields.push(types::Field::new(name, data_type));
    }

    Ok(Schema::new(fields))
}

fn parquet_leaf_column_paths<R: ChunkReader + 'static>(
    reader: &SerializedFileReader<R>,
) -> HashSet<String> {
    reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| c.path().string())
        .collect()
}

fn convert_parquet_field(
    row: usize,
    column: &str,
    data_type: DataType,
    f: &Field,
) -> IngestionResult<Value> {
    if matches!(f, Field::Null) {
        return Ok(Value::Null);
    }

    let mismatch = |message: &str| IngestionError::ParseError {
        row,
        column: column.to_string(),
        raw: f.to_string(),
        message: message.to_string(),
    };

    match data_type {
        DataType::Utf8 => match f {
            Field::Str(s) => Ok(Value::Utf8(s.clone())),
            // BYTE_ARRAY without a UTF8 annotation.
            Field::Bytes(b) => b
                .as_utf8()
                .map(|s| Value::Utf8(s.to_string()))
                .map_err(|_| mismatch("bytes are not valid utf-8")),
            Field::Date(days) => DateTime::from_timestamp(i64::from(*days) * 86_400, 0)
                .map(|d| Value::Utf8(d.date_naive().to_string()))
                .ok_or_else(|| mismatch("date out of range")),
            Field::TimeMillis(ms) => time_of_day(i64::from(*ms) * 1_000_000)
                .ok_or_else(|| mismatch("time of day out of range")),
            Field::TimeMicros(us) => us
                .checked_mul(1_000)
                .and_then(time_of_day)
                .ok_or_else(|| mismatch("time of day out of range")),
            Field::TimestampMillis(ms) => DateTime::from_timestamp_millis(*ms)
                .map(|d| Value::Utf8(d.to_rfc3339()))
                .ok_or_else(|| mismatch("timestamp out of range")),
            Field::TimestampMicros(us) => DateTime::from_timestamp_micros(*us)
                .map(|d| Value::Utf8(d.to_rfc3339()))
                .ok_or_else(|| mismatch("timestamp out of range")),
            _ => Err(mismatch("expected string")),
        },
        DataType::Bool => match f {
            Field::Bool(b) => Ok(Value::Bool(*b)),
            _ => Err(mismatch("expected bool")),
        },
        DataType::Int64 => match f {
            Field::Byte(v) => Ok(Value::Int64(i64::from(*v))),
            Field::Short(v) => Ok(Value::Int64(i64::from(*v))),
            Field::Int(v) => Ok(Value::Int64(i64::from(*v))),
            Field::Long(v) => Ok(Value::Int64(*v)),
            Field::UByte(v) => Ok(Value::Int64(i64::from(*v))),
            Field::UShort(v) => Ok(Value::Int64(i64::from(*v))),
            Field::UInt(v) => Ok(Value::Int64(i64::from(*v))),
            Field::ULong(v) => i64::try_from(*v)
                .map(Value::Int64)
                .map_err(|_| mismatch("u64 out of range for i64")),
            _ => Err(mismatch("expected integer")),
        },
        DataType::Float64 => match f {
            Field::Float16(v) => Ok(Value::Float64(v.to_f64())),
            Field::Float(v) => Ok(Value::Float64(f64::from(*v))),
            Field::Double(v) => Ok(Value::Float64(*v)),
            Field::Decimal(d) => decimal_to_f64(d)
                .map(Value::Float64)
                .ok_or_else(|| mismatch("decimal wider than 128 bits")),
            _ => Err(mismatch("expected number")),
        },
    }
}

fn time_of_day(nanos: i64) -> Option<Value> {
    let secs = u32::try_from(nanos.div_euclid(1_000_000_000)).ok()?;
    let nano = u32::try_from(nanos.rem_euclid(1_000_000_000)).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nano)
        .map(|t| Value::Utf8(t.format("%H:%M:%S%.3f").to_string()))
}

/// Unscaled big-endian two's complement value divided by `10^scale`.
fn decimal_to_f64(d: &Decimal) -> Option<f64> {
    let bytes = d.data();
    if bytes.is_empty() || bytes.len() > 16 {
        return None;
    }
    let fill = if bytes[0] & 0x80 == 0 { 0x00 } else { 0xff };
    let mut buf = [fill; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    Some(i128::from_be_bytes(buf) as f64 / 10f64.powi(d.scale()))
}
