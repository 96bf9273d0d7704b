use super::named::{BindValue, BoundStatement};
use super::scanner::SqlScanner;
use crate::error::SqlTemplateError;
use crate::types::RowValues;

/// What to do with an empty sequence bound to an `IN (...)` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyListPolicy {
    /// Fail the call with `ExpansionError`.
    #[default]
    Error,
    /// Bind a single `NULL`; `x IN (NULL)` never matches.
    Null,
}

/// SQL with neutral `?` markers and a flat list of scalar parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedStatement {
    pub sql: String,
    pub params: Vec<RowValues>,
}

/// Flatten list parameters into comma-separated markers.
///
/// The Nth `?` in `bound.sql` is paired with `bound.params[N-1]`. A list of K values replaces
/// its marker with K markers and splices the values in at the same position.
///
/// # Errors
///
/// Returns `ExpansionError` for an empty list under [`EmptyListPolicy::Error`], or when the
/// marker count and parameter count disagree.
pub fn expand_lists(
    bound: BoundStatement,
    policy: EmptyListPolicy,
) -> Result<ExpandedStatement, SqlTemplateError> {
    let BoundStatement { sql, params } = bound;
    let total = params.iter().fold(0, |acc, p| match p {
        BindValue::Scalar(_) => acc + 1,
        BindValue::List(items) => acc + items.len().max(1),
    });

    let mut out = String::with_capacity(sql.len() + total * 3);
    let mut flat = Vec::with_capacity(total);
    let mut pending = params.into_iter();
    let mut copied = 0;
    let mut markers = 0;

    for (idx, b) in SqlScanner::new(&sql) {
        if b != b'?' {
            continue;
        }
        markers += 1;
        let Some(param) = pending.next() else {
            return Err(SqlTemplateError::ExpansionError(format!(
                "statement has more placeholders than parameters (placeholder {markers})"
            )));
        };
        out.push_str(&sql[copied..idx]);
        copied = idx + 1;

        match param {
            BindValue::Scalar(value) => {
                out.push('?');
                flat.push(value);
            }
            BindValue::List(items) if items.is_empty() => match policy {
                EmptyListPolicy::Error => {
                    return Err(SqlTemplateError::ExpansionError(format!(
                        "empty sequence bound to placeholder {markers}"
                    )));
                }
                EmptyListPolicy::Null => {
                    out.push('?');
                    flat.push(RowValues::Null);
                }
            },
            BindValue::List(items) => {
                for (i, value) in items.into_iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push('?');
                    flat.push(value);
                }
            }
        }
    }

    let leftover = pending.count();
    if leftover > 0 {
        return Err(SqlTemplateError::ExpansionError(format!(
            "statement has {markers} placeholders but {} parameters",
            markers + leftover
        )));
    }
    out.push_str(&sql[copied..]);

    Ok(ExpandedStatement {
        sql: out,
        params: flat,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RowValues {
        RowValues::Text(s.into())
    }

    #[test]
    fn splices_lists_in_place() {
        let bound = BoundStatement {
            sql: "where a = ? and city in (?) and age > ?".into(),
            params: vec![
                BindValue::Scalar(RowValues::Int(1)),
                BindValue::List(vec![text("Tampa"), text("Rio"), text("Lima")]),
                BindValue::Scalar(RowValues::Int(98)),
            ],
        };
        let expanded = expand_lists(bound, EmptyListPolicy::Error).unwrap();
        assert_eq!(expanded.sql, "where a = ? and city in (?, ?, ?) and age > ?");
        assert_eq!(
            expanded.params,
            vec![
                RowValues::Int(1),
                text("Tampa"),
                text("Rio"),
                text("Lima"),
                RowValues::Int(98)
            ]
        );
    }

    #[test]
    fn empty_list_policies() {
        let bound = BoundStatement {
            sql: "id in (?)".into(),
            params: vec![BindValue::List(vec![])],
        };
        let err = expand_lists(bound.clone(), EmptyListPolicy::Error).unwrap_err();
        assert!(matches!(err, SqlTemplateError::ExpansionError(_)));

        let expanded = expand_lists(bound, EmptyListPolicy::Null).unwrap();
        assert_eq!(expanded.sql, "id in (?)");
        assert_eq!(expanded.params, vec![RowValues::Null]);
    }

    #[test]
    fn count_mismatch_is_detected() {
        let bound = BoundStatement {
            sql: "a = ? and b = ?".into(),
            params: vec![BindValue::Scalar(RowValues::Int(1))],
        };
        assert!(expand_lists(bound, EmptyListPolicy::Error).is_err());

        let bound = BoundStatement {
            sql: "a = '?'".into(),
            params: vec![BindValue::Scalar(RowValues::Int(1))],
        };
        assert!(expand_lists(bound, EmptyListPolicy::Error).is_err());
    }
}
