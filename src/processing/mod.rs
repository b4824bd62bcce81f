//! In-memory dataset transformations.
//!
//! The processing layer operates on [`crate::types::DataSet`] values produced by the readers.
//! It is pure: no I/O, no shared state, and every transform consumes its input and returns a new
//! dataset.
//!
//! Currently implemented:
//!
//! - [`transform()`]: appends `total_vendas = quantidade * valor`
//! - [`DerivedColumn`]: the same product transform over arbitrary column names
//!
//! ## Example
//!
//! ```rust
//! use sales_ingest::processing::transform;
//! use sales_ingest::types::{DataSet, DataType, Field, Schema, Value};
//!
//! let schema = Schema::new(vec![
//!     Field::new("quantidade", DataType::Int64),
//!     Field::new("valor", DataType::Float64),
//! ]);
//! let ds = DataSet::new(
//!     schema,
//!     vec![
//!         vec![Value::Int64(2), Value::Float64(5.0)],
//!         vec![Value::Null, Value::Float64(4.0)],
//!     ],
//! );
//!
//! let out = transform(ds).unwrap();
//! let total = out.schema.index_of("total_vendas").unwrap();
//! assert_eq!(out.rows[0][total], Value::Float64(10.0));
//! assert_eq!(out.rows[1][total], Value::Null);
//! ```

pub mod derive;

pub use derive::{DerivedColumn, QUANTITY_COLUMN, TOTAL_COLUMN, UNIT_PRICE_COLUMN, transform};
