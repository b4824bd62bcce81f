//! `sales-ingest` moves sales files dropped in a staging directory into a warehouse table,
//! exactly once per file name.
//!
//! Each run lists the staging directory, skips every file already present in the processed-file
//! registry, and for the rest reads the file into an in-memory [`types::DataSet`], appends a
//! `total_vendas = quantidade * valor` column, writes the rows to the warehouse and records the
//! file name. The first failure stops the run; files recorded before it stay recorded.
//!
//! ## Formats
//!
//! The format comes from the extension (case-insensitive):
//!
//! - **CSV**: `.csv`, header row, column types inferred
//! - **JSON**: `.json`, an array of objects, a single object or one object per line; nested
//!   objects become dot-separated columns such as `cliente.nome`
//! - **Parquet**: `.parquet`, flat schemas; dates and timestamps become text, decimals become
//!   floats
//!
//! Anything else in the staging directory is ignored. Empty cells, empty strings and JSON `null`
//! become [`types::Value::Null`].
//!
//! ## Running the pipeline
//!
//! ```no_run
//! use sales_ingest::config::PipelineConfig;
//! use sales_ingest::pipeline::run_pipeline;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig {
//!     staging_dir: "uploads_etl".into(),
//!     warehouse_url: Some("sqlite://dw.db".to_string()),
//!     ..Default::default()
//! };
//! for line in run_pipeline(config)? {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Transforming a batch on its own
//!
//! ```rust
//! use sales_ingest::processing::transform;
//! use sales_ingest::types::{DataSet, DataType, Field, Schema, Value};
//!
//! let ds = DataSet::new(
//!     Schema::new(vec![
//!         Field::new("quantidade", DataType::Int64),
//!         Field::new("valor", DataType::Float64),
//!     ]),
//!     vec![
//!         vec![Value::Int64(2), Value::Float64(5.0)],
//!         vec![Value::Null, Value::Float64(4.0)],
//!     ],
//! );
//!
//! let out = transform(ds).unwrap();
//! let idx = out.schema.index_of("total_vendas").unwrap();
//! assert_eq!(out.rows[0][idx], Value::Float64(10.0));
//! assert_eq!(out.rows[1][idx], Value::Null);
//! ```
//!
//! ## Modules
//!
//! - [`pipeline`]: the orchestrator, run report and observers
//! - [`ingestion`]: format dispatch and the CSV/JSON/Parquet readers
//! - [`processing`]: the derived-column transform
//! - [`registry`]: processed-file registry
//! - [`warehouse`]: append-only warehouse writes (SQLite, or PostgreSQL with the `postgres`
//!   feature)
//! - [`fetch`]: populating the staging directory
//! - [`config`]: run settings
//! - [`logging`]: subscriber setup for the binary
//! - [`types`]: schema and in-memory dataset types
//! - [`error`]: error types

pub mod config;
pub mod error;
pub mod fetch;
pub mod ingestion;
pub mod logging;
pub mod pipeline;
pub mod processing;
pub mod registry;
pub mod types;
pub mod warehouse;

pub use config::PipelineConfig;
pub use error::{IngestionError, IngestionResult, PipelineError};
pub use pipeline::{Pipeline, RunAborted, RunReport, run_pipeline};
