//! Read-only store seam. Queries return rows as ordered sequences of scalar
//! values, positionally matching the select clause; no column-name access.

use rusqlite::types::Value;
use thiserror::Error;

pub type Row = Vec<Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("unexpected value at column {column}, expected {expected}")]
    Decode { column: usize, expected: &'static str },
    #[error("aggregate query returned no row")]
    MissingAggregate,
}

pub trait Store {
    fn read(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StoreError>;
}

pub fn col_i64(row: &Row, column: usize) -> Result<i64, StoreError> {
    match row.get(column) {
        Some(Value::Integer(n)) => Ok(*n),
        _ => Err(StoreError::Decode {
            column,
            expected: "integer",
        }),
    }
}

pub fn col_opt_i64(row: &Row, column: usize) -> Result<Option<i64>, StoreError> {
    match row.get(column) {
        Some(Value::Integer(n)) => Ok(Some(*n)),
        Some(Value::Null) => Ok(None),
        _ => Err(StoreError::Decode {
            column,
            expected: "integer or null",
        }),
    }
}

pub fn col_text(row: &Row, column: usize) -> Result<String, StoreError> {
    match row.get(column) {
        Some(Value::Text(s)) => Ok(s.clone()),
        _ => Err(StoreError::Decode {
            column,
            expected: "text",
        }),
    }
}

pub fn col_opt_text(row: &Row, column: usize) -> Result<Option<String>, StoreError> {
    match row.get(column) {
        Some(Value::Text(s)) => Ok(Some(s.clone())),
        Some(Value::Null) => Ok(None),
        _ => Err(StoreError::Decode {
            column,
            expected: "text or null",
        }),
    }
}
