//! Durable record of files already ingested.
//!
//! The registry is the only dedup mechanism of the pipeline: a staged file whose name appears in
//! [`Registry::list_processed`] is never read again. Records are appended after the file's rows
//! reached the warehouse and are never updated or deleted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RegistryError;

/// Table holding one row per ingested file.
pub const REGISTRY_TABLE: &str = "historico_arquivos";

/// One successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedFileRecord {
    /// File name (no directory), the dedup key.
    pub filename: String,
    /// When the file was recorded.
    pub processed_at: DateTime<Utc>,
}

/// Processed-file store used by the pipeline.
pub trait Registry {
    /// Create the backing table if it does not exist. Safe to call repeatedly.
    fn ensure_schema(&self) -> Result<(), RegistryError>;

    /// Every filename ever recorded, including by earlier runs.
    fn list_processed(&self) -> Result<HashSet<String>, RegistryError>;

    /// Append one record. Must be durable when this returns.
    fn record(&self, filename: &str, at: DateTime<Utc>) -> Result<(), RegistryError>;
}

/// SQLite-backed [`Registry`].
///
/// Each [`Registry::record`] is a single autocommit `INSERT`, so it is on disk before the
/// pipeline moves to the next file.
pub struct SqliteRegistry {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteRegistry {
    /// Open (or create) the registry database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened registry");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a throwaway in-memory registry.
    pub fn open_in_memory() -> Result<Self, RegistryError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    /// Location of the database file, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// All records in insertion order.
    pub fn history(&self) -> Result<Vec<ProcessedFileRecord>, RegistryError> {
        let mut stmt = self.conn.prepare(
            "SELECT nome_arquivo, horario_processamento FROM historico_arquivos ORDER BY rowid ASC",
        )?;

        let records = stmt
            .query_map([], |row| {
                let raw = row.get::<_, String>(1)?;
                let processed_at = DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc);

                Ok(ProcessedFileRecord {
                    filename: row.get(0)?,
                    processed_at,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

impl Registry for SqliteRegistry {
    fn ensure_schema(&self) -> Result<(), RegistryError> {
        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS historico_arquivos (
                nome_arquivo TEXT NOT NULL,
                horario_processamento TEXT NOT NULL
            )
            "#,
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_historico_nome ON historico_arquivos(nome_arquivo)",
            [],
        )?;

        Ok(())
    }

    fn list_processed(&self) -> Result<HashSet<String>, RegistryError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT nome_arquivo FROM historico_arquivos")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;

        debug!(count = names.len(), "loaded processed files");
        Ok(names)
    }

    fn record(&self, filename: &str, at: DateTime<Utc>) -> Result<(), RegistryError> {
        self.conn.execute(
            "INSERT INTO historico_arquivos (nome_arquivo, horario_processamento) VALUES (?1, ?2)",
            params![filename, at.to_rfc3339()],
        )?;
        debug!(file = filename, "recorded processed file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{REGISTRY_TABLE, Registry, SqliteRegistry};

    #[test]
    fn ensure_schema_creates_table_and_is_idempotent() {
        let registry = SqliteRegistry::open_in_memory().unwrap();
        registry.ensure_schema().unwrap();
        registry.ensure_schema().unwrap();

        let tables: Vec<String> = registry
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert!(tables.contains(&REGISTRY_TABLE.to_string()));
    }

    #[test]
    fn recorded_names_are_listed() {
        let registry = SqliteRegistry::open_in_memory().unwrap();
        registry.ensure_schema().unwrap();
        assert!(registry.list_processed().unwrap().is_empty());

        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        registry.record("vendas_01.csv", at).unwrap();
        registry.record("vendas_02.json", at).unwrap();

        let names = registry.list_processed().unwrap();
        assert_eq!(names.len(), 2);
        assert!(names.contains("vendas_01.csv"));
        assert!(names.contains("vendas_02.json"));
    }

    #[test]
    fn history_keeps_insertion_order_and_timestamps() {
        let registry = SqliteRegistry::open_in_memory().unwrap();
        registry.ensure_schema().unwrap();

        let first = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 2, 9, 15, 0).unwrap();
        registry.record("b.parquet", first).unwrap();
        registry.record("a.csv", second).unwrap();

        let history = registry.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].filename, "b.parquet");
        assert_eq!(history[0].processed_at, first);
        assert_eq!(history[1].filename, "a.csv");
        assert_eq!(history[1].processed_at, second);
    }

    #[test]
    fn records_survive_reopening_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("historico.db");

        {
            let registry = SqliteRegistry::open(&path).unwrap();
            registry.ensure_schema().unwrap();
            registry.record("vendas.csv", Utc::now()).unwrap();
        }

        let reopened = SqliteRegistry::open(&path).unwrap();
        reopened.ensure_schema().unwrap();
        assert!(reopened.list_processed().unwrap().contains("vendas.csv"));
        assert_eq!(reopened.path(), Some(path.as_path()));
    }
}
