use chrono::SecondsFormat;
use serde::de::value::{BorrowedStrDeserializer, SeqDeserializer};
use serde::de::{
    self, DeserializeSeed, Deserializer, IntoDeserializer, MapAccess, SeqAccess, Visitor,
};
use serde::forward_to_deserialize_any;

use crate::error::SqlTemplateError;
use crate::results::CustomDbRow;
use crate::types::{RowValues, parse_bool_text};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

impl de::Error for SqlTemplateError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        SqlTemplateError::ScanError(msg.to_string())
    }
}

fn json_error(err: &serde_json::Error) -> SqlTemplateError {
    SqlTemplateError::ScanError(err.to_string())
}

/// Deserializes a whole row.
///
/// Structs and maps see one entry per column, keyed by column name. Sequences and tuples
/// see the values in column order. Anything else needs a single-column row and reads that
/// column.
pub(crate) struct RowDeserializer<'de> {
    row: &'de CustomDbRow,
}

impl<'de> RowDeserializer<'de> {
    pub(crate) fn new(row: &'de CustomDbRow) -> Self {
        Self { row }
    }

    fn width(&self) -> usize {
        self.row.column_names.len().min(self.row.rows.len())
    }

    fn single(&self) -> Result<ValueDeserializer<'de>, SqlTemplateError> {
        let row: &'de CustomDbRow = self.row;
        match row.rows.as_slice() {
            [value] => Ok(ValueDeserializer::new(value)),
            values => Err(SqlTemplateError::ScanError(format!(
                "cannot scan {} columns into a single value",
                values.len()
            ))),
        }
    }
}

macro_rules! forward_to_single_column {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                self.single()?.$method(visitor)
            }
        )*
    };
}

impl<'de> Deserializer<'de> for RowDeserializer<'de> {
    type Error = SqlTemplateError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_map(visitor)
    }

    forward_to_single_column! {
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_f32 deserialize_f64 deserialize_char deserialize_str deserialize_string
        deserialize_bytes deserialize_byte_buf deserialize_unit deserialize_identifier
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.row.rows.as_slice() {
            [RowValues::Null] => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let width = self.width();
        let row: &'de CustomDbRow = self.row;
        visitor.visit_seq(RowSeq {
            values: row.rows[..width].iter(),
        })
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let width = self.width();
        visitor.visit_map(RowMap {
            row: self.row,
            width,
            idx: 0,
            value: None,
        })
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.single()?.deserialize_enum(name, variants, visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}

/// Columns as map entries. A repeated column name only yields its first occurrence.
struct RowMap<'de> {
    row: &'de CustomDbRow,
    width: usize,
    idx: usize,
    value: Option<&'de RowValues>,
}

impl RowMap<'_> {
    fn skip_repeated(&mut self) {
        while self.idx < self.width {
            let name = &self.row.column_names[self.idx];
            if self.row.get_column_index(name) == Some(self.idx) {
                break;
            }
            self.idx += 1;
        }
    }
}

impl<'de> MapAccess<'de> for RowMap<'de> {
    type Error = SqlTemplateError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        self.skip_repeated();
        if self.idx >= self.width {
            return Ok(None);
        }
        let row: &'de CustomDbRow = self.row;
        let i = self.idx;
        self.idx += 1;
        self.value = Some(&row.rows[i]);
        seed.deserialize(BorrowedStrDeserializer::new(row.column_names[i].as_str()))
            .map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, Self::Error> {
        let value = self.value.take().ok_or_else(|| {
            SqlTemplateError::ScanError("column value requested before its name".into())
        })?;
        seed.deserialize(ValueDeserializer::new(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.width - self.idx)
    }
}

struct RowSeq<'de> {
    values: std::slice::Iter<'de, RowValues>,
}

impl<'de> SeqAccess<'de> for RowSeq<'de> {
    type Error = SqlTemplateError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        self.values
            .next()
            .map(|value| seed.deserialize(ValueDeserializer::new(value)))
            .transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.values.len())
    }
}

/// Deserializes a record's current fields with the columns of a row laid over them.
///
/// Columns win; fields the row does not mention keep their serialized value. This is what
/// lets `INSERT ... RETURNING id` fill in just the id of an otherwise complete record.
pub(crate) struct OverlayDeserializer<'de> {
    row: &'de CustomDbRow,
    base: &'de serde_json::Map<String, serde_json::Value>,
}

impl<'de> OverlayDeserializer<'de> {
    pub(crate) fn new(
        row: &'de CustomDbRow,
        base: &'de serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self { row, base }
    }
}

impl<'de> Deserializer<'de> for OverlayDeserializer<'de> {
    type Error = SqlTemplateError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let row: &'de CustomDbRow = self.row;
        visitor.visit_map(OverlayMap {
            columns: RowMap {
                row,
                width: row.column_names.len().min(row.rows.len()),
                idx: 0,
                value: None,
            },
            row,
            base: self.base.iter(),
            field: None,
        })
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

struct OverlayMap<'de> {
    columns: RowMap<'de>,
    row: &'de CustomDbRow,
    base: serde_json::map::Iter<'de>,
    field: Option<&'de serde_json::Value>,
}

impl<'de> MapAccess<'de> for OverlayMap<'de> {
    type Error = SqlTemplateError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        self.columns.skip_repeated();
        if self.columns.idx < self.columns.width {
            return self.columns.next_key_seed(seed);
        }
        self.next_base_key(seed)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, Self::Error> {
        match self.field.take() {
            Some(field) => seed.deserialize(field).map_err(|e| json_error(&e)),
            None => self.columns.next_value_seed(seed),
        }
    }
}

impl<'de> OverlayMap<'de> {
    fn next_base_key<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, SqlTemplateError> {
        let row: &'de CustomDbRow = self.row;
        for (key, value) in self.base.by_ref() {
            if row.get_column_index(key).is_some() {
                continue;
            }
            self.field = Some(value);
            return seed
                .deserialize(BorrowedStrDeserializer::new(key.as_str()))
                .map(Some);
        }
        Ok(None)
    }
}

/// Numbers that arrive as text (untyped Postgres parameters echoed back, `SQLite` text
/// affinity) are parsed before they reach the visitor; the visitor still range-checks.
macro_rules! deserialize_number_from_text {
    ($($method:ident => $wide:ty, $visit:ident;)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                match self.value {
                    RowValues::Text(s) => match s.trim().parse::<$wide>() {
                        Ok(n) => visitor.$visit(n),
                        Err(_) => Err(SqlTemplateError::ScanError(format!(
                            "cannot read `{s}` as {}",
                            stringify!($wide)
                        ))),
                    },
                    _ => self.deserialize_any(visitor),
                }
            }
        )*
    };
}

/// Deserializes one column value.
pub(crate) struct ValueDeserializer<'de> {
    value: &'de RowValues,
}

impl<'de> ValueDeserializer<'de> {
    pub(crate) fn new(value: &'de RowValues) -> Self {
        Self { value }
    }

    /// JSON stored as text (SQLite has no JSON type) parsed for structured targets.
    fn structured(&self) -> Result<Option<serde_json::Value>, SqlTemplateError> {
        match self.value {
            RowValues::Text(s) => serde_json::from_str(s).map(Some).map_err(|e| json_error(&e)),
            _ => Ok(None),
        }
    }
}

impl<'de> Deserializer<'de> for ValueDeserializer<'de> {
    type Error = SqlTemplateError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::Int(i) => visitor.visit_i64(*i),
            RowValues::Float(f) => visitor.visit_f64(*f),
            RowValues::Text(s) => visitor.visit_borrowed_str(s),
            RowValues::Bool(b) => visitor.visit_bool(*b),
            RowValues::Timestamp(dt) => {
                visitor.visit_string(dt.format(TIMESTAMP_FORMAT).to_string())
            }
            RowValues::TimestampTz(dt) => {
                visitor.visit_string(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            RowValues::Null => visitor.visit_none(),
            RowValues::JSON(json) => json.deserialize_any(visitor).map_err(|e| json_error(&e)),
            RowValues::Blob(bytes) => visitor.visit_borrowed_bytes(bytes),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::Text(s) => match parse_bool_text(s) {
                Some(b) => visitor.visit_bool(b),
                None => Err(SqlTemplateError::ScanError(format!(
                    "cannot read `{s}` as a boolean"
                ))),
            },
            value => match value.as_bool() {
                Some(b) => visitor.visit_bool(b),
                None => self.deserialize_any(visitor),
            },
        }
    }

    deserialize_number_from_text! {
        deserialize_i8 => i64, visit_i64;
        deserialize_i16 => i64, visit_i64;
        deserialize_i32 => i64, visit_i64;
        deserialize_i64 => i64, visit_i64;
        deserialize_i128 => i128, visit_i128;
        deserialize_u8 => u64, visit_u64;
        deserialize_u16 => u64, visit_u64;
        deserialize_u32 => u64, visit_u64;
        deserialize_u64 => u64, visit_u64;
        deserialize_u128 => u128, visit_u128;
        deserialize_f32 => f64, visit_f64;
        deserialize_f64 => f64, visit_f64;
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::Int(i) => visitor.visit_string(i.to_string()),
            RowValues::Float(f) => visitor.visit_string(f.to_string()),
            RowValues::Bool(b) => visitor.visit_string(b.to_string()),
            RowValues::JSON(serde_json::Value::String(s)) => visitor.visit_borrowed_str(s),
            RowValues::JSON(json) => visitor.visit_string(json.to_string()),
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::Text(s) => visitor.visit_borrowed_bytes(s.as_bytes()),
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::Null => visitor.visit_none(),
            RowValues::JSON(serde_json::Value::Null) => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::Null => visitor.visit_unit(),
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::JSON(json) => json.deserialize_seq(visitor).map_err(|e| json_error(&e)),
            // Vec<u8> fields deserialize through seq
            RowValues::Blob(bytes) => {
                let mut seq = SeqDeserializer::<_, SqlTemplateError>::new(bytes.iter().copied());
                let value = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(value)
            }
            RowValues::Text(_) => match self.structured()? {
                Some(json) => json.deserialize_seq(visitor).map_err(|e| json_error(&e)),
                None => self.deserialize_any(visitor),
            },
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::JSON(json) => json.deserialize_map(visitor).map_err(|e| json_error(&e)),
            RowValues::Text(_) => match self.structured()? {
                Some(json) => json.deserialize_map(visitor).map_err(|e| json_error(&e)),
                None => self.deserialize_any(visitor),
            },
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::JSON(json) => json
                .deserialize_struct(name, fields, visitor)
                .map_err(|e| json_error(&e)),
            RowValues::Text(_) => match self.structured()? {
                Some(json) => json
                    .deserialize_struct(name, fields, visitor)
                    .map_err(|e| json_error(&e)),
                None => self.deserialize_any(visitor),
            },
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::Text(s) => visitor.visit_enum(s.as_str().into_deserializer()),
            RowValues::JSON(json) => json
                .deserialize_enum(name, variants, visitor)
                .map_err(|e| json_error(&e)),
            _ => self.deserialize_any(visitor),
        }
    }

    forward_to_deserialize_any! {
        char unit_struct tuple_struct identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use serde::Deserialize;

    use super::*;

    fn row(columns: &[&str], values: Vec<RowValues>) -> CustomDbRow {
        CustomDbRow::new(
            Arc::new(columns.iter().map(|c| (*c).to_string()).collect()),
            values,
        )
    }

    fn scan<T: serde::de::DeserializeOwned>(row: &CustomDbRow) -> Result<T, SqlTemplateError> {
        T::deserialize(RowDeserializer::new(row))
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        #[serde(rename = "user_name")]
        name: String,
        active: bool,
        nickname: Option<String>,
    }

    #[test]
    fn struct_fields_match_columns_by_name() {
        let r = row(
            &["active", "nickname", "user_name", "id", "extra"],
            vec![
                RowValues::Int(1),
                RowValues::Null,
                RowValues::Text("ann".into()),
                RowValues::Int(7),
                RowValues::Float(1.5),
            ],
        );
        let user: User = scan(&r).unwrap();
        assert_eq!(
            user,
            User {
                id: 7,
                name: "ann".into(),
                active: true,
                nickname: None,
            }
        );
    }

    #[test]
    fn missing_and_mistyped_fields_are_scan_errors() {
        let r = row(&["id"], vec![RowValues::Int(7)]);
        let err = scan::<User>(&r).unwrap_err();
        assert!(matches!(err, SqlTemplateError::ScanError(ref m) if m.contains("user_name")));

        let r = row(
            &["id", "user_name", "active"],
            vec![
                RowValues::Text("seven".into()),
                RowValues::Text("ann".into()),
                RowValues::Bool(true),
            ],
        );
        assert!(matches!(
            scan::<User>(&r),
            Err(SqlTemplateError::ScanError(_))
        ));
    }

    #[test]
    fn single_column_scalars_and_tuples() {
        let r = row(&["v"], vec![RowValues::Int(5)]);
        assert_eq!(scan::<i32>(&r).unwrap(), 5);
        assert_eq!(scan::<Option<i64>>(&r).unwrap(), Some(5));
        assert_eq!(scan::<String>(&r).unwrap(), "5");

        let null = row(&["v"], vec![RowValues::Null]);
        assert_eq!(scan::<Option<i64>>(&null).unwrap(), None);

        let pair = row(&["a", "b"], vec![RowValues::Int(1), RowValues::Text("x".into())]);
        assert_eq!(scan::<(i64, String)>(&pair).unwrap(), (1, "x".to_string()));
        assert!(scan::<i64>(&pair).is_err());
    }

    #[test]
    fn timestamps_json_and_blobs() {
        #[derive(Deserialize)]
        struct Event {
            at: chrono::NaiveDateTime,
            payload: BTreeMap<String, i64>,
            tags: Vec<String>,
            raw: Vec<u8>,
        }
        let at = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        let r = row(
            &["at", "payload", "tags", "raw"],
            vec![
                RowValues::Timestamp(at),
                RowValues::JSON(serde_json::json!({"n": 3})),
                RowValues::Text("[\"a\",\"b\"]".into()),
                RowValues::Blob(vec![1, 2, 3]),
            ],
        );
        let event: Event = scan(&r).unwrap();
        assert_eq!(event.at, at);
        assert_eq!(event.payload.get("n"), Some(&3));
        assert_eq!(event.tags, vec!["a", "b"]);
        assert_eq!(event.raw, vec![1, 2, 3]);
    }

    #[test]
    fn overlay_keeps_fields_the_row_omits() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Record {
            id: i64,
            name: String,
            active: bool,
        }
        let base = serde_json::json!({"id": 0, "name": "ann", "active": false});
        let base = base.as_object().unwrap();
        let r = row(&["id", "active"], vec![RowValues::Int(9), RowValues::Int(1)]);
        let record = Record::deserialize(OverlayDeserializer::new(&r, base)).unwrap();
        assert_eq!(
            record,
            Record {
                id: 9,
                name: "ann".into(),
                active: true,
            }
        );
    }

    #[test]
    fn maps_and_enums() {
        #[derive(Debug, Deserialize, PartialEq)]
        #[serde(rename_all = "lowercase")]
        enum Role {
            Admin,
            Guest,
        }
        let r = row(&["role"], vec![RowValues::Text("guest".into())]);
        assert_eq!(scan::<Role>(&r).unwrap(), Role::Guest);

        let r = row(&["a", "b"], vec![RowValues::Int(1), RowValues::Null]);
        let map: BTreeMap<String, Option<i64>> = scan(&r).unwrap();
        assert_eq!(map.get("a"), Some(&Some(1)));
        assert_eq!(map.get("b"), Some(&None));
        let _ = Role::Admin;
    }

    #[test]
    fn numbers_and_bools_parse_from_text() {
        let r = row(&["v"], vec![RowValues::Text("5".into())]);
        assert_eq!(scan::<i64>(&r).unwrap(), 5);
        assert_eq!(scan::<u8>(&r).unwrap(), 5);
        assert_eq!(scan::<f64>(&r).unwrap(), 5.0);
        assert_eq!(scan::<Option<i32>>(&r).unwrap(), Some(5));

        let r = row(&["v"], vec![RowValues::Text(" -2.5 ".into())]);
        assert_eq!(scan::<f32>(&r).unwrap(), -2.5);
        assert!(matches!(scan::<i64>(&r), Err(SqlTemplateError::ScanError(_))));
        assert!(scan::<u64>(&row(&["v"], vec![RowValues::Text("-1".into())])).is_err());
        assert!(scan::<i8>(&row(&["v"], vec![RowValues::Text("300".into())])).is_err());

        for (text, expected) in [("t", true), ("true", true), ("1", true), ("f", false)] {
            let r = row(&["v"], vec![RowValues::Text(text.into())]);
            assert_eq!(scan::<bool>(&r).unwrap(), expected, "{text}");
        }
        let r = row(&["v"], vec![RowValues::Text("maybe".into())]);
        assert!(matches!(scan::<bool>(&r), Err(SqlTemplateError::ScanError(_))));
    }

    #[test]
    fn zoned_timestamps_read_as_utc() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_milli_opt(7, 8, 9, 250)
            .unwrap()
            .and_utc();
        let r = row(&["at"], vec![RowValues::TimestampTz(at)]);
        assert_eq!(scan::<chrono::DateTime<chrono::Utc>>(&r).unwrap(), at);
        assert_eq!(scan::<String>(&r).unwrap(), "2024-05-06T07:08:09.250Z");
    }
}
