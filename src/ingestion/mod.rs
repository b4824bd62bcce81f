//! Format readers.
//!
//! Most callers should use [`read`] (or [`read_tagged`] for string tags), which dispatches on
//! [`IngestionFormat`] and infers column types from the file. [`ingest_from_path`] additionally
//! accepts an explicit [`crate::types::Schema`].
//!
//! Format-specific functions are also available under:
//! - [`csv`]
//! - [`json`]
//! - [`parquet`]

pub mod csv;
pub mod json;
pub mod parquet;
pub mod unified;

pub use unified::{IngestionFormat, IngestionOptions, ingest_from_path, read, read_tagged};
