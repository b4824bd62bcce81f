use std::path::PathBuf;

use thiserror::Error;

use crate::types::DataType;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type returned by the format readers.
///
/// This is a single error enum shared across CSV/JSON/Parquet ingestion.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV ingestion error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet ingestion error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// The format tag is not one of `csv`, `json` or `parquet`.
    #[error("unsupported format '{format}' (expected csv, json or parquet)")]
    UnsupportedFormat { format: String },

    /// The input does not conform to the expected shape (missing columns, mixed types, etc.).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A value could not be parsed into the required [`crate::types::DataType`].
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },
}

/// Error returned by the derived-column transform.
#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    /// A required operand column is absent from the input.
    #[error("missing required column '{column}'")]
    MissingColumn { column: String },

    /// An operand column exists but is not Int64/Float64.
    #[error("column '{column}' must be numeric, found {data_type}")]
    NonNumericColumn { column: String, data_type: DataType },

    /// The output column is already present in the input.
    #[error("output column '{column}' already exists")]
    ColumnExists { column: String },

    /// Integer multiplication overflowed i64.
    #[error("integer overflow computing '{column}' at row {row}")]
    Overflow { column: String, row: usize },

    /// A cell does not match the declared type of its column.
    #[error("row {row} column '{column}' holds a non-numeric value: {found}")]
    ValueTypeMismatch {
        row: usize,
        column: String,
        found: String,
    },
}

/// Error returned by the processed-file registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// SQLite operation failed (open, schema creation, insert, query).
    #[error("registry database error: {0}")]
    Db(#[from] rusqlite::Error),

    /// Could not prepare the registry location on disk.
    #[error("registry io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error returned by a [`crate::warehouse::Warehouse`].
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// The warehouse could not be reached or opened.
    #[error("cannot connect to warehouse '{target}': {message}")]
    Connection { target: String, message: String },

    /// The target table is missing or lacks columns present in the batch.
    #[error("schema mismatch for table '{table}': {message}")]
    SchemaMismatch { table: String, message: String },

    /// The append itself failed after connecting.
    #[error("warehouse write failed: {0}")]
    Write(#[from] rusqlite::Error),

    /// A PostgreSQL statement failed after connecting.
    #[cfg(feature = "postgres")]
    #[error("warehouse write failed: {0}")]
    Postgres(#[from] sqlx::Error),
}

/// Error returned by a [`crate::fetch::SourceFetcher`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// The configured drop folder does not exist.
    #[error("source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The drop folder resolves to the staging directory itself.
    #[error("source directory {} is the staging directory", .0.display())]
    SourceIsStaging(PathBuf),

    /// Copying into the staging directory failed.
    #[error("fetch io error: {0}")]
    Io(#[from] std::io::Error),

    /// Listing the drop folder failed.
    #[error("fetch listing error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Invalid pipeline configuration value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A boolean setting holds something other than true/false/1/0/yes/no.
    #[error("invalid value '{value}' for {key}: expected a boolean")]
    InvalidBool { key: String, value: String },

    /// A setting that must be non-empty is empty.
    #[error("{key} must not be empty")]
    Empty { key: String },

    /// The warehouse target cannot be used.
    #[error("invalid warehouse url '{url}': {message}")]
    InvalidWarehouseUrl { url: String, message: String },

    /// A setting required by the requested command is not set.
    #[error("{key} is not set")]
    Missing { key: String },
}

/// Error that aborts a pipeline run.
///
/// Variants that concern a single staged file carry its name.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The pipeline could not be assembled from its configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Populating the staging directory failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The staging directory could not be listed.
    #[error("cannot list staging directory {}: {source}", .path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The file's format tag is not recognized.
    #[error("unsupported format '{format}' for file '{file}'")]
    UnsupportedFormat { file: String, format: String },

    /// The file could not be read or parsed.
    #[error("failed to read '{file}': {source}")]
    SourceRead {
        file: String,
        #[source]
        source: IngestionError,
    },

    /// The file lacks a column the transform requires.
    #[error("file '{file}' is missing required column '{column}'")]
    MissingColumn { file: String, column: String },

    /// Any other transform failure.
    #[error("failed to transform '{file}': {source}")]
    Transform {
        file: String,
        #[source]
        source: TransformError,
    },

    /// The warehouse table does not accept the batch.
    #[error("cannot load '{file}' into '{table}': {message}")]
    SchemaMismatch {
        file: String,
        table: String,
        message: String,
    },

    /// The warehouse could not be reached.
    #[error("warehouse connection failed while loading '{file}' ({target}): {message}")]
    WarehouseConnection {
        file: String,
        target: String,
        message: String,
    },

    /// The warehouse accepted the connection but the append failed.
    #[error("failed to load '{file}': {source}")]
    WarehouseWrite {
        file: String,
        #[source]
        source: WarehouseError,
    },

    /// Registry schema creation, query or record failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl PipelineError {
    pub(crate) fn read(file: &str, err: IngestionError) -> Self {
        match err {
            IngestionError::UnsupportedFormat { format } => Self::UnsupportedFormat {
                file: file.to_string(),
                format,
            },
            source => Self::SourceRead {
                file: file.to_string(),
                source,
            },
        }
    }

    pub(crate) fn transform(file: &str, err: TransformError) -> Self {
        match err {
            TransformError::MissingColumn { column } => Self::MissingColumn {
                file: file.to_string(),
                column,
            },
            source => Self::Transform {
                file: file.to_string(),
                source,
            },
        }
    }

    pub(crate) fn load(file: &str, err: WarehouseError) -> Self {
        let file = file.to_string();
        match err {
            WarehouseError::Connection { target, message } => Self::WarehouseConnection {
                file,
                target,
                message,
            },
            WarehouseError::SchemaMismatch { table, message } => Self::SchemaMismatch {
                file,
                table,
                message,
            },
            source => Self::WarehouseWrite { file, source },
        }
    }

    /// Name of the staged file the error concerns, if any.
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::UnsupportedFormat { file, .. }
            | Self::SourceRead { file, .. }
            | Self::MissingColumn { file, .. }
            | Self::Transform { file, .. }
            | Self::SchemaMismatch { file, .. }
            | Self::WarehouseConnection { file, .. }
            | Self::WarehouseWrite { file, .. } => Some(file),
            Self::Config(_) | Self::Fetch(_) | Self::Discovery { .. } | Self::Registry(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IngestionError, PipelineError, TransformError, WarehouseError};

    #[test]
    fn unsupported_format_keeps_its_own_variant() {
        let err = PipelineError::read(
            "a.xml",
            IngestionError::UnsupportedFormat {
                format: "xml".to_string(),
            },
        );
        assert!(matches!(err, PipelineError::UnsupportedFormat { ref format, .. } if format == "xml"));
        assert_eq!(err.file(), Some("a.xml"));
    }

    #[test]
    fn missing_column_is_lifted_out_of_transform_errors() {
        let err = PipelineError::transform(
            "b.csv",
            TransformError::MissingColumn {
                column: "valor".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "file 'b.csv' is missing required column 'valor'"
        );
    }

    #[test]
    fn warehouse_errors_map_by_kind() {
        let err = PipelineError::load(
            "c.json",
            WarehouseError::Connection {
                target: "sqlite://nowhere.db".to_string(),
                message: "unable to open".to_string(),
            },
        );
        assert!(matches!(err, PipelineError::WarehouseConnection { .. }));

        let err = PipelineError::load(
            "c.json",
            WarehouseError::SchemaMismatch {
                table: "vendas_calculado".to_string(),
                message: "no column 'x'".to_string(),
            },
        );
        assert!(matches!(err, PipelineError::SchemaMismatch { ref table, .. } if table == "vendas_calculado"));
    }
}
