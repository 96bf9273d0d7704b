//! Materializing rows into caller types through serde.
//!
//! A destination is any `DeserializeOwned` type. Struct fields are matched to columns by
//! their serde name, so `#[serde(rename = "...")]` maps a field to a differently named
//! column. Tuples read columns in order, and a single-column row can be read straight into
//! a scalar such as `i64` or `String`.

mod de;

use serde::de::DeserializeOwned;

use crate::error::SqlTemplateError;
use crate::results::CustomDbRow;

use de::{OverlayDeserializer, RowDeserializer};

/// Deserialize one row.
///
/// # Errors
///
/// Returns `ScanError` for a missing field, a type mismatch, or a multi-column row scanned
/// into a scalar.
pub fn from_row<T: DeserializeOwned>(row: &CustomDbRow) -> Result<T, SqlTemplateError> {
    T::deserialize(RowDeserializer::new(row))
}

/// Deserialize a row laid over the serialized form of an existing record.
///
/// Columns the row carries replace the record's fields; everything else keeps its current
/// value. A non-object `base` falls back to [`from_row`].
pub(crate) fn overlay_row<T: DeserializeOwned>(
    row: &CustomDbRow,
    base: &serde_json::Value,
) -> Result<T, SqlTemplateError> {
    match base.as_object() {
        Some(fields) => T::deserialize(OverlayDeserializer::new(row, fields)),
        None => from_row(row),
    }
}

/// The view of the current row handed to an iteration visitor.
#[derive(Debug, Clone, Copy)]
pub struct RowScanner<'r> {
    row: &'r CustomDbRow,
}

impl<'r> RowScanner<'r> {
    #[must_use]
    pub fn new(row: &'r CustomDbRow) -> Self {
        Self { row }
    }

    /// Materialize the row as `T`.
    ///
    /// # Errors
    ///
    /// See [`from_row`].
    pub fn scan<T: DeserializeOwned>(&self) -> Result<T, SqlTemplateError> {
        from_row(self.row)
    }

    /// Materialize the row over an existing value.
    ///
    /// # Errors
    ///
    /// See [`from_row`]. `dest` is untouched on error.
    pub fn scan_into<T: DeserializeOwned>(&self, dest: &mut T) -> Result<(), SqlTemplateError> {
        *dest = from_row(self.row)?;
        Ok(())
    }

    #[must_use]
    pub fn row(&self) -> &'r CustomDbRow {
        self.row
    }
}
