use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Row, Statement};

use crate::error::SqlTemplateError;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `SqliteError` if the column cannot be read.
pub fn sqlite_extract_value(row: &Row<'_>, idx: usize) -> Result<RowValues, SqlTemplateError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Read every column of the current row.
pub(crate) fn extract_row(row: &Row<'_>, width: usize) -> Result<Vec<RowValues>, SqlTemplateError> {
    (0..width).map(|i| sqlite_extract_value(row, i)).collect()
}

pub(crate) fn column_names(stmt: &Statement<'_>) -> Arc<Vec<String>> {
    Arc::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    )
}
