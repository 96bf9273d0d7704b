use serde_json::{Map, Value};

use super::parsers::scan_identifier;
use super::scanner::SqlScanner;
use crate::error::SqlTemplateError;
use crate::types::RowValues;

/// How a marker name is matched against input field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMatch {
    /// Names must match the serialized field name exactly.
    #[default]
    Exact,
    /// Fall back to an ASCII case-insensitive match when no exact key exists.
    IgnoreAsciiCase,
}

impl KeyMatch {
    fn find<'v>(self, map: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
        match self {
            KeyMatch::Exact => map.get(key),
            KeyMatch::IgnoreAsciiCase => map.get(key).or_else(|| {
                map.iter()
                    .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
                    .map(|(_, value)| value)
            }),
        }
    }
}

/// A resolved parameter before slice expansion.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Scalar(RowValues),
    /// A sequence destined for an `IN (...)` list.
    List(Vec<RowValues>),
}

/// SQL with neutral `?` markers and one [`BindValue`] per marker, in scan order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Vec<BindValue>,
}

/// Replace `:name` markers with neutral `?` markers and resolve each against `input`.
///
/// Markers inside literals, quoted identifiers, comments, and dollar-quoted bodies are left
/// alone, as are `::` casts. Each occurrence is resolved independently, so a repeated marker
/// yields repeated parameters.
///
/// # Errors
///
/// - `BindError` if a marker cannot be resolved, if markers appear with no input, if the text
///   already contains a bare `?`, or if an integer does not fit in `i64`.
/// - `ExpansionError` if a sequence contains a nested sequence.
pub fn bind_named(
    sql: &str,
    input: Option<&Value>,
    key_match: KeyMatch,
) -> Result<BoundStatement, SqlTemplateError> {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut params = Vec::new();
    let mut copied = 0;

    let mut scanner = SqlScanner::new(sql);
    while let Some((idx, b)) = scanner.next() {
        match b {
            b'?' => {
                return Err(SqlTemplateError::BindError(format!(
                    "positional placeholder `?` at byte {idx}; use a named marker instead"
                )));
            }
            b':' if bytes.get(idx + 1) == Some(&b':') => scanner.skip_to(idx + 2),
            b':' => {
                let Some(end) = scan_identifier(bytes, idx + 1) else {
                    continue;
                };
                let name = &sql[idx + 1..end];
                let Some(input) = input else {
                    return Err(SqlTemplateError::BindError(format!(
                        "named parameter `:{name}` requires input, but none was supplied"
                    )));
                };
                let value = lookup(input, name, key_match).ok_or_else(|| {
                    SqlTemplateError::BindError(format!("could not find name `{name}` in input"))
                })?;
                params.push(to_bind_value(name, value)?);

                out.push_str(&sql[copied..idx]);
                out.push('?');
                copied = end;
                scanner.skip_to(end);
            }
            _ => {}
        }
    }
    out.push_str(&sql[copied..]);

    Ok(BoundStatement { sql: out, params })
}

fn lookup<'v>(input: &'v Value, path: &str, key_match: KeyMatch) -> Option<&'v Value> {
    path.split('.')
        .try_fold(input, |current, segment| match current {
            Value::Object(map) => key_match.find(map, segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn to_bind_value(name: &str, value: &Value) -> Result<BindValue, SqlTemplateError> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Array(_) => Err(SqlTemplateError::ExpansionError(format!(
                    "parameter `:{name}` contains a nested sequence"
                ))),
                other => to_scalar(name, other),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(BindValue::List),
        other => to_scalar(name, other).map(BindValue::Scalar),
    }
}

fn to_scalar(name: &str, value: &Value) -> Result<RowValues, SqlTemplateError> {
    match value {
        Value::Null => Ok(RowValues::Null),
        Value::Bool(b) => Ok(RowValues::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(RowValues::Int(i))
            } else if n.is_u64() {
                Err(SqlTemplateError::BindError(format!(
                    "parameter `:{name}` value {n} does not fit in a 64-bit signed integer"
                )))
            } else {
                n.as_f64().map(RowValues::Float).ok_or_else(|| {
                    SqlTemplateError::BindError(format!("parameter `:{name}` is not a number"))
                })
            }
        }
        Value::String(s) => Ok(RowValues::Text(s.clone())),
        Value::Object(_) | Value::Array(_) => Ok(RowValues::JSON(value.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn binds_in_scan_order() {
        let input = json!({"a": 1, "b": "two"});
        let bound = bind_named("select :b, :a, :b", Some(&input), KeyMatch::Exact).unwrap();
        assert_eq!(bound.sql, "select ?, ?, ?");
        assert_eq!(
            bound.params,
            vec![
                BindValue::Scalar(RowValues::Text("two".into())),
                BindValue::Scalar(RowValues::Int(1)),
                BindValue::Scalar(RowValues::Text("two".into())),
            ]
        );
    }

    #[test]
    fn leaves_casts_literals_and_comments() {
        let input = json!({"id": 7});
        let sql = "select ':id', x::int -- :id\n from t where id = :id";
        let bound = bind_named(sql, Some(&input), KeyMatch::Exact).unwrap();
        assert_eq!(
            bound.sql,
            "select ':id', x::int -- :id\n from t where id = ?"
        );
        assert_eq!(bound.params.len(), 1);
    }

    #[test]
    fn resolves_nested_paths_and_case() {
        let input = json!({"user": {"City": "Rio"}, "tags": ["x", "y"]});
        let bound =
            bind_named(":user.city :tags.1", Some(&input), KeyMatch::IgnoreAsciiCase).unwrap();
        assert_eq!(
            bound.params,
            vec![
                BindValue::Scalar(RowValues::Text("Rio".into())),
                BindValue::Scalar(RowValues::Text("y".into())),
            ]
        );
        assert!(bind_named(":user.city", Some(&input), KeyMatch::Exact).is_err());
    }

    #[test]
    fn sequences_become_lists() {
        let input = json!({"cities": ["Tampa", "Rio"], "matrix": [[1]]});
        let bound = bind_named("in (:cities)", Some(&input), KeyMatch::Exact).unwrap();
        assert_eq!(
            bound.params,
            vec![BindValue::List(vec![
                RowValues::Text("Tampa".into()),
                RowValues::Text("Rio".into()),
            ])]
        );
        let err = bind_named(":matrix", Some(&input), KeyMatch::Exact).unwrap_err();
        assert!(matches!(err, SqlTemplateError::ExpansionError(_)));
    }

    #[test]
    fn missing_input_or_name_is_bind_error() {
        let err = bind_named("select :v", None, KeyMatch::Exact).unwrap_err();
        assert!(matches!(err, SqlTemplateError::BindError(_)));

        let input = json!({"w": 1});
        let err = bind_named("select :v", Some(&input), KeyMatch::Exact).unwrap_err();
        assert!(matches!(err, SqlTemplateError::BindError(_)));

        let unbound = bind_named("select 1", None, KeyMatch::Exact).unwrap();
        assert!(unbound.params.is_empty());
    }

    #[test]
    fn rejects_raw_positional_markers() {
        let input = json!({"v": 1});
        let err = bind_named("select ?, :v", Some(&input), KeyMatch::Exact).unwrap_err();
        assert!(matches!(err, SqlTemplateError::BindError(_)));
        // inside a literal it is just text
        assert!(bind_named("select '?', :v", Some(&input), KeyMatch::Exact).is_ok());
    }

    #[test]
    fn oversized_unsigned_is_rejected() {
        let input = json!({"n": u64::MAX});
        let err = bind_named(":n", Some(&input), KeyMatch::Exact).unwrap_err();
        assert!(matches!(err, SqlTemplateError::BindError(_)));
    }
}
