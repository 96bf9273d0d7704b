use std::fmt::Write;

use crate::error::SqlTemplateError;
use crate::translation::DialectStatement;
use crate::types::RowValues;

/// Render positional parameters for logs, e.g. `[5, 'Tampa', NULL]`.
///
/// Numbers and `NULL` print bare; everything else is single-quoted with embedded quotes
/// doubled. Blobs print as hex literals.
#[must_use]
pub fn format_params(params: &[RowValues]) -> String {
    let mut out = String::from("[");
    for (i, value) in params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match value {
            RowValues::Int(v) => out.push_str(&v.to_string()),
            RowValues::Float(v) => out.push_str(&v.to_string()),
            RowValues::Null => out.push_str("NULL"),
            RowValues::Blob(bytes) => {
                out.push_str("x'");
                for b in bytes {
                    let _ = write!(out, "{b:02x}");
                }
                out.push('\'');
            }
            RowValues::Text(s) => push_quoted(&mut out, s),
            RowValues::Bool(b) => push_quoted(&mut out, &b.to_string()),
            RowValues::Timestamp(dt) => push_quoted(&mut out, &dt.format("%F %T%.f").to_string()),
            RowValues::TimestampTz(dt) => push_quoted(&mut out, &dt.to_rfc3339()),
            RowValues::JSON(v) => push_quoted(&mut out, &v.to_string()),
        }
    }
    out.push(']');
    out
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('\'');
    out.push_str(&s.replace('\'', "''"));
    out.push('\'');
}

/// Record the outcome of a statement that reached the database.
pub(crate) fn statement(
    debug: bool,
    template: &str,
    stmt: &DialectStatement,
    error: Option<&SqlTemplateError>,
) {
    match (error, debug) {
        (None, true) => tracing::info!(
            template,
            sql = %stmt.sql,
            params = %format_params(&stmt.params),
            "executed statement"
        ),
        (None, false) => tracing::debug!(
            template,
            sql = %stmt.sql,
            params = %format_params(&stmt.params),
            "executed statement"
        ),
        (Some(error), true) => tracing::warn!(
            template,
            sql = %stmt.sql,
            params = %format_params(&stmt.params),
            %error,
            "statement failed"
        ),
        (Some(error), false) => tracing::debug!(
            template,
            sql = %stmt.sql,
            params = %format_params(&stmt.params),
            %error,
            "statement failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_non_numeric_values() {
        let params = vec![
            RowValues::Int(5),
            RowValues::Text("Tampa".into()),
            RowValues::Null,
            RowValues::Text("O'Brien".into()),
            RowValues::Bool(true),
            RowValues::Float(1.5),
            RowValues::Blob(vec![0, 255]),
        ];
        assert_eq!(
            format_params(&params),
            "[5, 'Tampa', NULL, 'O''Brien', 'true', 1.5, x'00ff']"
        );
        assert_eq!(format_params(&[]), "[]");
    }
}
