//! Derived product column (`total_vendas = quantidade * valor`).

use crate::error::TransformError;
use crate::types::{DataSet, DataType, Field, Value};

/// Quantity column read by the default transform.
pub const QUANTITY_COLUMN: &str = "quantidade";
/// Unit price column read by the default transform.
pub const UNIT_PRICE_COLUMN: &str = "valor";
/// Column appended by the default transform.
pub const TOTAL_COLUMN: &str = "total_vendas";

/// Appends `output = left * right`, computed row by row.
///
/// - Both operands must be numeric columns. Int64 × Int64 yields Int64; anything involving
///   Float64 yields Float64.
/// - A null in either operand yields null. An operand column holding only nulls is accepted
///   whatever its declared type.
/// - Existing columns and row order are left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedColumn {
    /// Left operand column.
    pub left: String,
    /// Right operand column.
    pub right: String,
    /// Name of the appended column.
    pub output: String,
}

impl Default for DerivedColumn {
    fn default() -> Self {
        Self::new(QUANTITY_COLUMN, UNIT_PRICE_COLUMN, TOTAL_COLUMN)
    }
}

impl DerivedColumn {
    /// Create a product transform over arbitrary column names.
    pub fn new(
        left: impl Into<String>,
        right: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            output: output.into(),
        }
    }

    /// Consume `dataset` and return it with the derived column appended.
    pub fn apply(&self, dataset: DataSet) -> Result<DataSet, TransformError> {
        let (left_idx, left_type) = self.operand(&dataset, &self.left)?;
        let (right_idx, right_type) = self.operand(&dataset, &self.right)?;
        if dataset.schema.index_of(&self.output).is_some() {
            return Err(TransformError::ColumnExists {
                column: self.output.clone(),
            });
        }

        let output_type = if left_type == DataType::Int64 && right_type == DataType::Int64 {
            DataType::Int64
        } else {
            DataType::Float64
        };

        let mut values = Vec::with_capacity(dataset.row_count());
        for (row_idx0, row) in dataset.rows.iter().enumerate() {
            let l = row.get(left_idx).unwrap_or(&Value::Null);
            let r = row.get(right_idx).unwrap_or(&Value::Null);
            values.push(self.multiply(row_idx0 + 1, output_type, l, r)?);
        }

        Ok(dataset.with_column(Field::new(self.output.clone(), output_type), values))
    }

    fn operand(&self, dataset: &DataSet, name: &str) -> Result<(usize, DataType), TransformError> {
        let idx = dataset
            .schema
            .index_of(name)
            .ok_or_else(|| TransformError::MissingColumn {
                column: name.to_string(),
            })?;
        let data_type = dataset.schema.fields[idx].data_type;
        // Readers type an all-empty column as Utf8; its products are all null anyway.
        if !data_type.is_numeric() && dataset.column_values(idx).all(Value::is_null) {
            return Ok((idx, DataType::Float64));
        }
        if !data_type.is_numeric() {
            return Err(TransformError::NonNumericColumn {
                column: name.to_string(),
                data_type,
            });
        }
        Ok((idx, data_type))
    }

    fn multiply(
        &self,
        row: usize,
        output_type: DataType,
        l: &Value,
        r: &Value,
    ) -> Result<Value, TransformError> {
        if l.is_null() || r.is_null() {
            return Ok(Value::Null);
        }

        match output_type {
            DataType::Int64 => match (l, r) {
                (Value::Int64(a), Value::Int64(b)) => {
                    a.checked_mul(*b)
                        .map(Value::Int64)
                        .ok_or_else(|| TransformError::Overflow {
                            column: self.output.clone(),
                            row,
                        })
                }
                (Value::Int64(_), other) => Err(self.value_mismatch(row, &self.right, other)),
                (other, _) => Err(self.value_mismatch(row, &self.left, other)),
            },
            _ => {
                let a = as_f64(l).ok_or_else(|| self.value_mismatch(row, &self.left, l))?;
                let b = as_f64(r).ok_or_else(|| self.value_mismatch(row, &self.right, r))?;
                Ok(Value::Float64(a * b))
            }
        }
    }

    fn value_mismatch(&self, row: usize, column: &str, found: &Value) -> TransformError {
        TransformError::ValueTypeMismatch {
            row,
            column: column.to_string(),
            found: format!("{found:?}"),
        }
    }
}

/// Apply the default sales transform: `total_vendas = quantidade * valor`.
pub fn transform(dataset: DataSet) -> Result<DataSet, TransformError> {
    DerivedColumn::default().apply(dataset)
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int64(n) => Some(*n as f64),
        Value::Float64(n) => Some(*n),
        _ => None,
    }
}
