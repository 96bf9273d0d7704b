use std::error::Error;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::{IsNull, ToSql, Type, WrongType};
use tokio_util::bytes;
use uuid::Uuid;

use crate::error::SqlTemplateError;
use crate::types::{ParamConverter, RowValues, parse_bool_text, parse_timestamp};

type BoxError = Box<dyn Error + Sync + Send>;

/// Borrowed Postgres parameters.
pub struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    /// Borrow row values as Postgres parameters.
    #[must_use]
    pub fn convert(params: &'a [RowValues]) -> Params<'a> {
        let references = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        Params { references }
    }

    #[must_use]
    pub fn as_refs(&self) -> &[&'a (dyn ToSql + Sync)] {
        &self.references
    }
}

impl<'a> ParamConverter<'a> for Params<'a> {
    type Converted = Params<'a>;

    fn convert_sql_params(params: &'a [RowValues]) -> Result<Self::Converted, SqlTemplateError> {
        Ok(Self::convert(params))
    }
}

fn is_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

fn kind(value: &RowValues) -> &'static str {
    match value {
        RowValues::Int(_) => "an integer",
        RowValues::Float(_) => "a float",
        RowValues::Text(_) => "text",
        RowValues::Bool(_) => "a boolean",
        RowValues::Timestamp(_) => "a timestamp",
        RowValues::TimestampTz(_) => "a timestamptz",
        RowValues::Null => "null",
        RowValues::JSON(_) => "JSON",
        RowValues::Blob(_) => "bytes",
    }
}

fn mismatch(value: &RowValues, ty: &Type) -> BoxError {
    format!("cannot bind {} to a {ty} parameter", kind(value)).into()
}

fn unparsable(s: &str, ty: &Type) -> BoxError {
    format!("cannot bind text `{s}` to a {ty} parameter").into()
}

/// Widen an integer to a float only when the float holds it exactly.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn exact_float(i: i64, ty: &Type) -> Result<f64, BoxError> {
    let wide = if *ty == Type::FLOAT4 {
        f64::from(i as f32)
    } else {
        i as f64
    };
    if wide as i128 == i128::from(i) {
        Ok(wide)
    } else {
        Err(format!("integer {i} is not exactly representable as {ty}").into())
    }
}

/// Narrow a float to an integer only when it has no fractional part and fits `i64`.
#[allow(clippy::cast_possible_truncation)]
fn exact_int(f: f64, ty: &Type) -> Result<i64, BoxError> {
    if f.is_finite() && f.fract() == 0.0 {
        if let Ok(i) = i64::try_from(f as i128) {
            return Ok(i);
        }
    }
    Err(format!("float {f} is not exactly representable as {ty}").into())
}

fn write_int(i: i64, ty: &Type, out: &mut bytes::BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(i)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(i)?.to_sql(ty, out),
        _ => i.to_sql(ty, out),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn write_float(f: f64, ty: &Type, out: &mut bytes::BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::FLOAT4 {
        let narrow = f as f32;
        if f.is_finite() && !narrow.is_finite() {
            return Err(format!("float {f} overflows {ty}").into());
        }
        narrow.to_sql(ty, out)
    } else {
        f.to_sql(ty, out)
    }
}

fn text_to_sql(s: &str, ty: &Type, out: &mut bytes::BytesMut) -> Result<IsNull, BoxError> {
    let trimmed = s.trim();
    match *ty {
        _ if is_text(ty) => s.to_sql(ty, out),
        Type::BYTEA => s.as_bytes().to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 => {
            let i = trimmed.parse::<i64>().map_err(|_| unparsable(s, ty))?;
            write_int(i, ty, out)
        }
        Type::FLOAT4 | Type::FLOAT8 => {
            let f = trimmed.parse::<f64>().map_err(|_| unparsable(s, ty))?;
            write_float(f, ty, out)
        }
        Type::BOOL => parse_bool_text(s)
            .ok_or_else(|| unparsable(s, ty))?
            .to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(trimmed)
            .ok_or_else(|| unparsable(s, ty))?
            .to_sql(ty, out),
        Type::TIMESTAMPTZ => DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| parse_timestamp(trimmed).map(|dt| dt.and_utc()))
            .ok_or_else(|| unparsable(s, ty))?
            .to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .or_else(|| parse_timestamp(trimmed).map(|dt| dt.date()))
            .ok_or_else(|| unparsable(s, ty))?
            .to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)
            .map_err(|_| unparsable(s, ty))?
            .to_sql(ty, out),
        Type::UUID => Uuid::parse_str(trimmed)
            .map_err(|_| unparsable(s, ty))?
            .to_sql(ty, out),
        Type::NUMERIC => Decimal::from_str(trimmed)
            .map_err(|_| unparsable(s, ty))?
            .to_sql(ty, out),
        _ => Err(mismatch(&RowValues::Text(String::new()), ty)),
    }
}

/// Parameters arrive untyped from JSON input, so each value is written in the
/// representation the server inferred for its placeholder. Only conversions that keep
/// the value intact are performed: an integer bound where the server expects `int4` is
/// narrowed, text bound to a numeric, boolean or temporal placeholder is parsed, and a
/// naive timestamp bound to `timestamptz` is taken as UTC. Every other pairing is an
/// error rather than a reinterpretation of the bytes.
impl ToSql for RowValues {
    fn to_sql(&self, ty: &Type, out: &mut bytes::BytesMut) -> Result<IsNull, BoxError> {
        match self {
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::Int(i) => match *ty {
                Type::INT2 | Type::INT4 | Type::INT8 => write_int(*i, ty, out),
                Type::FLOAT4 | Type::FLOAT8 => write_float(exact_float(*i, ty)?, ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                Type::BOOL if *i == 0 || *i == 1 => (*i == 1).to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::Value::from(*i).to_sql(ty, out),
                _ if is_text(ty) => i.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            RowValues::Float(f) => match *ty {
                Type::FLOAT4 | Type::FLOAT8 => write_float(*f, ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 => write_int(exact_int(*f, ty)?, ty, out),
                Type::NUMERIC => Decimal::try_from(*f)
                    .map_err(|_| mismatch(self, ty))?
                    .to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::Number::from_f64(*f)
                    .map(serde_json::Value::Number)
                    .ok_or_else(|| mismatch(self, ty))?
                    .to_sql(ty, out),
                _ if is_text(ty) => f.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            RowValues::Text(s) => text_to_sql(s, ty, out),
            RowValues::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 => write_int(i64::from(*b), ty, out),
                Type::JSON | Type::JSONB => serde_json::Value::Bool(*b).to_sql(ty, out),
                _ if is_text(ty) => b.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            RowValues::Timestamp(dt) => match *ty {
                Type::TIMESTAMP => dt.to_sql(ty, out),
                Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
                Type::DATE => dt.date().to_sql(ty, out),
                _ if is_text(ty) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            RowValues::TimestampTz(dt) => match *ty {
                Type::TIMESTAMPTZ => dt.to_sql(ty, out),
                Type::TIMESTAMP => dt.naive_utc().to_sql(ty, out),
                Type::DATE => dt.date_naive().to_sql(ty, out),
                _ if is_text(ty) => dt
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true)
                    .to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            RowValues::JSON(jsval) => match *ty {
                Type::JSON | Type::JSONB => jsval.to_sql(ty, out),
                _ if is_text(ty) => jsval.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            RowValues::Blob(bytes) => match *ty {
                Type::BYTEA => bytes.to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
        }
    }

    fn accepts(ty: &Type) -> bool {
        is_text(ty)
            || matches!(
                *ty,
                Type::INT2
                    | Type::INT4
                    | Type::INT8
                    | Type::FLOAT4
                    | Type::FLOAT8
                    | Type::NUMERIC
                    | Type::BOOL
                    | Type::TIMESTAMP
                    | Type::TIMESTAMPTZ
                    | Type::DATE
                    | Type::JSON
                    | Type::JSONB
                    | Type::BYTEA
                    | Type::UUID
            )
    }

    // NULL binds to any placeholder type, including ones `accepts` does not list.
    fn to_sql_checked(&self, ty: &Type, out: &mut bytes::BytesMut) -> Result<IsNull, BoxError> {
        if self.is_null() {
            return Ok(IsNull::Yes);
        }
        if !<Self as ToSql>::accepts(ty) {
            return Err(Box::new(WrongType::new::<Self>(ty.clone())));
        }
        self.to_sql(ty, out)
    }
}
