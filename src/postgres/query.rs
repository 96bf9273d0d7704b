use std::error::Error;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Kind, Type};
use uuid::Uuid;

use crate::error::SqlTemplateError;
use crate::types::RowValues;

/// Label of a user-defined enum, which arrives as its UTF-8 name.
struct EnumLabel(String);

impl<'a> FromSql<'a> for EnumLabel {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(EnumLabel(std::str::from_utf8(raw)?.to_owned()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty.kind(), Kind::Enum(_))
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Result<Option<T>, SqlTemplateError> {
    row.try_get::<_, Option<T>>(idx).map_err(|e| {
        SqlTemplateError::ScanError(format!("column `{}`: {e}", row.columns()[idx].name()))
    })
}

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// `numeric`, `uuid` and enum labels come back as text. `timestamptz` keeps its zone as
/// UTC. Column types with no mapping here are rejected rather than guessed at.
///
/// # Errors
///
/// Returns `ScanError` naming the column if it cannot be decoded.
pub fn postgres_extract_value(row: &Row, idx: usize) -> Result<RowValues, SqlTemplateError> {
    let column = &row.columns()[idx];
    let ty = column.type_();
    if matches!(ty.kind(), Kind::Enum(_)) {
        return Ok(get::<EnumLabel>(row, idx)?.map_or(RowValues::Null, |v| RowValues::Text(v.0)));
    }
    let value = match ty.name() {
        "int2" => get::<i16>(row, idx)?.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        "int4" => get::<i32>(row, idx)?.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        "int8" => get::<i64>(row, idx)?.map_or(RowValues::Null, RowValues::Int),
        "float4" => {
            get::<f32>(row, idx)?.map_or(RowValues::Null, |v| RowValues::Float(f64::from(v)))
        }
        "float8" => get::<f64>(row, idx)?.map_or(RowValues::Null, RowValues::Float),
        "numeric" => {
            get::<Decimal>(row, idx)?.map_or(RowValues::Null, |v| RowValues::Text(v.to_string()))
        }
        "bool" => get::<bool>(row, idx)?.map_or(RowValues::Null, RowValues::Bool),
        "timestamp" => get::<NaiveDateTime>(row, idx)?.map_or(RowValues::Null, RowValues::Timestamp),
        "timestamptz" => {
            get::<DateTime<Utc>>(row, idx)?.map_or(RowValues::Null, RowValues::TimestampTz)
        }
        "date" => get::<NaiveDate>(row, idx)?
            .map_or(RowValues::Null, |v| RowValues::Timestamp(v.and_time(NaiveTime::MIN))),
        "json" | "jsonb" => get::<Value>(row, idx)?.map_or(RowValues::Null, RowValues::JSON),
        "bytea" => get::<Vec<u8>>(row, idx)?.map_or(RowValues::Null, RowValues::Blob),
        "uuid" => get::<Uuid>(row, idx)?.map_or(RowValues::Null, |v| RowValues::Text(v.to_string())),
        "text" | "varchar" | "bpchar" | "name" | "citext" | "unknown" => {
            get::<String>(row, idx)?.map_or(RowValues::Null, RowValues::Text)
        }
        other => {
            return Err(SqlTemplateError::ScanError(format!(
                "column `{}` has unsupported type {other}; cast it to text in the query",
                column.name()
            )));
        }
    };
    Ok(value)
}

pub(crate) fn column_names(row: &Row) -> Arc<Vec<String>> {
    Arc::new(
        row.columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect(),
    )
}

pub(crate) fn extract_row(row: &Row) -> Result<Vec<RowValues>, SqlTemplateError> {
    (0..row.len()).map(|i| postgres_extract_value(row, i)).collect()
}
