//! Append-only writes to the warehouse.
//!
//! SQLite is always available. PostgreSQL needs the `postgres` feature.

#[cfg(feature = "postgres")]
mod postgres;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags, params_from_iter};
use tracing::{debug, info};

use crate::error::WarehouseError;
use crate::types::{DataSet, DataType, Schema, Value};

/// Destination of transformed batches.
pub trait Warehouse {
    /// Append every row of `batch` to `table`, matching columns by name.
    ///
    /// Returns the number of rows written.
    fn append(&self, batch: &DataSet, table: &str) -> Result<usize, WarehouseError>;
}

#[cfg(feature = "postgres")]
pub use postgres::PostgresWarehouse;

/// Open the warehouse named by a `DATABASE_URL`-style target.
///
/// `postgres://` and `postgresql://` select [`PostgresWarehouse`] (with the `postgres` feature);
/// anything else goes through [`SqliteWarehouse::from_url`].
pub fn open_warehouse(
    url: &str,
    create_table_if_missing: bool,
) -> Result<Box<dyn Warehouse>, WarehouseError> {
    if is_postgres_url(url) {
        return open_postgres(url, create_table_if_missing);
    }
    Ok(Box::new(
        SqliteWarehouse::from_url(url)?.with_create_table_if_missing(create_table_if_missing),
    ))
}

fn is_postgres_url(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://")
}

#[cfg(feature = "postgres")]
fn open_postgres(
    url: &str,
    create_table_if_missing: bool,
) -> Result<Box<dyn Warehouse>, WarehouseError> {
    Ok(Box::new(
        PostgresWarehouse::new(url)?.with_create_table_if_missing(create_table_if_missing),
    ))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(url: &str, _: bool) -> Result<Box<dyn Warehouse>, WarehouseError> {
    Err(WarehouseError::Connection {
        target: redact_url(url),
        message: "built without the `postgres` feature".to_string(),
    })
}

/// `url` with any password replaced by `***`.
pub(crate) fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}

/// Fail unless every batch column exists in the table.
fn ensure_columns(
    table: &str,
    schema: &Schema,
    existing: &HashSet<String>,
) -> Result<(), WarehouseError> {
    let missing: Vec<&str> = schema
        .field_names()
        .filter(|name| !existing.contains(*name))
        .collect();
    if !missing.is_empty() {
        return Err(WarehouseError::SchemaMismatch {
            table: table.to_string(),
            message: format!("table has no column(s) {missing:?}"),
        });
    }
    Ok(())
}

/// [`Warehouse`] backed by a SQLite database file.
///
/// A connection is opened per [`Warehouse::append`] and all rows of one batch are written in a
/// single transaction.
#[derive(Debug, Clone)]
pub struct SqliteWarehouse {
    path: PathBuf,
    create_table_if_missing: bool,
}

impl SqliteWarehouse {
    /// Warehouse stored at `path`. The file must already exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_table_if_missing: false,
        }
    }

    /// Parse a `DATABASE_URL`-style target: `sqlite://path`, `sqlite:path` or a bare path.
    ///
    /// Any other `scheme://` fails with [`WarehouseError::Connection`].
    pub fn from_url(url: &str) -> Result<Self, WarehouseError> {
        let path = if let Some(rest) = url.strip_prefix("sqlite://") {
            rest
        } else if let Some(rest) = url.strip_prefix("sqlite:") {
            rest
        } else if let Some((scheme, _)) = url.split_once("://") {
            return Err(WarehouseError::Connection {
                target: redact_url(url),
                message: format!("unsupported warehouse scheme '{scheme}'"),
            });
        } else {
            url
        };

        if path.is_empty() {
            return Err(WarehouseError::Connection {
                target: url.to_string(),
                message: "empty database path".to_string(),
            });
        }
        Ok(Self::new(path))
    }

    /// Create the target table (and database file) from the batch schema when absent.
    pub fn with_create_table_if_missing(mut self, create: bool) -> Self {
        self.create_table_if_missing = create;
        self
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, WarehouseError> {
        let mut flags = OpenFlags::default();
        if !self.create_table_if_missing {
            flags.remove(OpenFlags::SQLITE_OPEN_CREATE);
        }

        Connection::open_with_flags(&self.path, flags).map_err(|e| WarehouseError::Connection {
            target: self.path.display().to_string(),
            message: e.to_string(),
        })
    }
}

impl Warehouse for SqliteWarehouse {
    fn append(&self, batch: &DataSet, table: &str) -> Result<usize, WarehouseError> {
        let mut conn = self.connect()?;

        let mut existing = table_columns(&conn, table)?;
        if existing.is_empty() {
            if !self.create_table_if_missing {
                return Err(WarehouseError::SchemaMismatch {
                    table: table.to_string(),
                    message: "table does not exist".to_string(),
                });
            }
            conn.execute(&create_table_sql(table, &batch.schema), [])?;
            info!(table, "created warehouse table");
            existing = table_columns(&conn, table)?;
        }

        ensure_columns(table, &batch.schema, &existing)?;

        let sql = insert_sql(table, &batch.schema);
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in &batch.rows {
                stmt.execute(params_from_iter(row.iter().map(to_sql_value)))?;
            }
        }
        tx.commit()?;

        debug!(table, rows = batch.row_count(), "appended batch");
        Ok(batch.row_count())
    }
}

fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>, WarehouseError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(columns)
}

fn create_table_sql(table: &str, schema: &Schema) -> String {
    let columns: Vec<String> = schema
        .fields
        .iter()
        .map(|f| format!("{} {}", quote_ident(&f.name), sql_type(f.data_type)))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table),
        columns.join(", ")
    )
}

fn insert_sql(table: &str, schema: &Schema) -> String {
    let columns: Vec<String> = schema.field_names().map(quote_ident).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Int64 | DataType::Bool => "INTEGER",
        DataType::Float64 => "REAL",
        DataType::Utf8 => "TEXT",
    }
}

fn to_sql_value(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Null,
        Value::Int64(n) => SqlValue::Integer(*n),
        Value::Float64(n) => SqlValue::Real(*n),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Utf8(s) => SqlValue::Text(s.clone()),
    }
}
