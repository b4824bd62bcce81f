//! Format dispatch.
//!
//! [`IngestionFormat`] is the closed set of formats the pipeline accepts. [`read`] maps each
//! variant to its reader; [`read_tagged`] parses a free-form tag first and rejects anything
//! unknown with [`IngestionError::UnsupportedFormat`].

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataSet, Schema};

use super::{csv, json, parquet};

/// Supported ingestion formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestionFormat {
    /// Comma-separated values.
    Csv,
    /// JSON array-of-objects, single object or NDJSON.
    Json,
    /// Apache Parquet.
    Parquet,
}

impl IngestionFormat {
    /// Parse an ingestion format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "parquet" => Some(Self::Parquet),
            _ => None,
        }
    }

    /// Infer the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|s| s.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical lowercase tag (`csv`, `json`, `parquet`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Parquet => "parquet",
        }
    }
}

impl fmt::Display for IngestionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IngestionFormat {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| IngestionError::UnsupportedFormat {
            format: s.to_string(),
        })
    }
}

/// Options controlling [`ingest_from_path`].
#[derive(Debug, Clone, Default)]
pub struct IngestionOptions {
    /// If `None`, detect the format from the file extension.
    pub format: Option<IngestionFormat>,
    /// If `None`, infer column types from the file.
    pub schema: Option<Schema>,
}

/// Read `path` as `format`, inferring the schema from the file.
///
/// ```no_run
/// use sales_ingest::ingestion::{read, IngestionFormat};
///
/// # fn main() -> Result<(), sales_ingest::IngestionError> {
/// let ds = read("uploads_etl/vendas_janeiro.csv", IngestionFormat::Csv)?;
/// println!("rows={}", ds.row_count());
/// # Ok(())
/// # }
/// ```
pub fn read(path: impl AsRef<Path>, format: IngestionFormat) -> IngestionResult<DataSet> {
    let path = path.as_ref();
    match format {
        IngestionFormat::Csv => csv::read_csv_from_path(path),
        IngestionFormat::Json => json::read_json_from_path(path),
        IngestionFormat::Parquet => parquet::read_parquet_from_path(path),
    }
}

/// Like [`read`], but takes the format as a string tag (`"csv"`, `"json"`, `"parquet"`).
///
/// Unknown tags fail with [`IngestionError::UnsupportedFormat`] before the file is touched.
pub fn read_tagged(path: impl AsRef<Path>, tag: &str) -> IngestionResult<DataSet> {
    let format: IngestionFormat = tag.parse()?;
    read(path, format)
}

/// Unified ingestion entry point for path-based sources.
///
/// - If `options.format` is `None`, the format is inferred from the file extension.
/// - If `options.schema` is set, the file must contain every schema field and values are parsed
///   into the declared types; otherwise types are inferred.
///
/// ```no_run
/// use sales_ingest::ingestion::{ingest_from_path, IngestionOptions};
/// use sales_ingest::types::{DataType, Field, Schema};
///
/// # fn main() -> Result<(), sales_ingest::IngestionError> {
/// let schema = Schema::new(vec![
///     Field::new("quantidade", DataType::Int64),
///     Field::new("valor", DataType::Float64),
/// ]);
/// let opts = IngestionOptions {
///     schema: Some(schema),
///     ..Default::default()
/// };
/// let ds = ingest_from_path("vendas.parquet", &opts)?;
/// println!("rows={}", ds.row_count());
/// # Ok(())
/// # }
/// ```
pub fn ingest_from_path(
    path: impl AsRef<Path>,
    options: &IngestionOptions,
) -> IngestionResult<DataSet> {
    let path = path.as_ref();
    let fmt = match options.format {
        Some(f) => f,
        None => infer_format_from_path(path)?,
    };

    match &options.schema {
        None => read(path, fmt),
        Some(schema) => match fmt {
            IngestionFormat::Csv => csv::ingest_csv_from_path(path, schema),
            IngestionFormat::Json => json::ingest_json_from_path(path, schema),
            IngestionFormat::Parquet => parquet::ingest_parquet_from_path(path, schema),
        },
    }
}

fn infer_format_from_path(path: &Path) -> IngestionResult<IngestionFormat> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    IngestionFormat::from_extension(ext).ok_or_else(|| IngestionError::UnsupportedFormat {
        format: ext.to_string(),
    })
}
