use super::PlaceholderStyle;
use super::expand::ExpandedStatement;
use super::scanner::{SqlScanner, next_is_digit};
use crate::error::SqlTemplateError;
use crate::types::RowValues;

/// Placeholder syntax of a target database.
///
/// New dialects only need to say how the Nth (1-based) placeholder is spelled.
pub trait Dialect {
    fn style(&self) -> PlaceholderStyle;

    fn write_placeholder(&self, out: &mut String, ordinal: usize);
}

impl Dialect for PlaceholderStyle {
    fn style(&self) -> PlaceholderStyle {
        *self
    }

    fn write_placeholder(&self, out: &mut String, ordinal: usize) {
        match self {
            PlaceholderStyle::Postgres => {
                out.push('$');
                out.push_str(&ordinal.to_string());
            }
            PlaceholderStyle::Sqlite => {
                out.push('?');
                out.push_str(&ordinal.to_string());
            }
            PlaceholderStyle::Question => out.push('?'),
        }
    }
}

/// The final statement handed to a database.
#[derive(Debug, Clone, PartialEq)]
pub struct DialectStatement {
    pub sql: String,
    pub params: Vec<RowValues>,
    pub style: PlaceholderStyle,
}

/// Rewrite neutral `?` markers into the dialect's native placeholders.
///
/// Parameters are carried over untouched; only the text changes.
///
/// # Errors
///
/// Returns `RebindError` if the text already holds a numbered placeholder (`?1`, `$1`) that
/// would collide with the generated ones, or if the marker count differs from the parameter
/// count.
pub fn rebind(
    expanded: ExpandedStatement,
    dialect: &dyn Dialect,
) -> Result<DialectStatement, SqlTemplateError> {
    let ExpandedStatement { sql, params } = expanded;
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + params.len() * 2);
    let mut copied = 0;
    let mut ordinal = 0;

    for (idx, b) in SqlScanner::new(&sql) {
        if !matches!(b, b'?' | b'$') {
            continue;
        }
        if next_is_digit(bytes, idx) {
            return Err(SqlTemplateError::RebindError(format!(
                "numbered placeholder `{}` at byte {idx} conflicts with generated placeholders",
                numbered_at(&sql, idx)
            )));
        }
        if b == b'$' {
            continue;
        }
        ordinal += 1;
        out.push_str(&sql[copied..idx]);
        dialect.write_placeholder(&mut out, ordinal);
        copied = idx + 1;
    }
    out.push_str(&sql[copied..]);

    if ordinal != params.len() {
        return Err(SqlTemplateError::RebindError(format!(
            "{ordinal} placeholders for {} parameters",
            params.len()
        )));
    }

    Ok(DialectStatement {
        sql: out,
        params,
        style: dialect.style(),
    })
}

fn numbered_at(sql: &str, idx: usize) -> &str {
    let end = sql[idx + 1..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(sql.len(), |offset| idx + 1 + offset);
    &sql[idx..end]
}
