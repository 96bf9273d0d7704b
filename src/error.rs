use std::fmt;

use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "postgres")]
use tokio_postgres;

/// The public operation a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Render, bind, expand, and rebind only.
    Build,
    Exec,
    Get,
    Select,
    Iterate,
    Create,
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::Build => "error executing template",
            Operation::Exec => "error executing query",
            Operation::Get => "error getting record",
            Operation::Select => "error selecting records",
            Operation::Iterate => "error iterating records",
            Operation::Create => "error creating record",
            Operation::Update => "error updating record",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum SqlTemplateError {
    #[error("Template source error: {0}")]
    TemplateSource(String),

    #[error("Template parse error: {0}")]
    TemplateParse(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("error rendering template `{name}`: {message}")]
    RenderError { name: String, message: String },

    #[error("error binding named vars: {0}")]
    BindError(String),

    #[error("error expanding parameter list: {0}")]
    ExpansionError(String),

    #[error("error rebinding placeholders: {0}")]
    RebindError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[error("no rows in result set")]
    NotFound,

    #[error("error scanning row: {0}")]
    ScanError(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("{op}: {source}")]
    Operation {
        op: Operation,
        #[source]
        source: Box<SqlTemplateError>,
    },
}

impl SqlTemplateError {
    /// Wrap a stage error with the public operation that failed.
    ///
    /// Already-wrapped errors are returned untouched so the caller only ever sees one label.
    #[must_use]
    pub fn during(self, op: Operation) -> Self {
        match self {
            wrapped @ SqlTemplateError::Operation { .. } => wrapped,
            other => SqlTemplateError::Operation {
                op,
                source: Box::new(other),
            },
        }
    }

    /// The stage-level error beneath any operation wrapper.
    #[must_use]
    pub fn root(&self) -> &SqlTemplateError {
        match self {
            SqlTemplateError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// The public operation this error was raised from, if any.
    #[must_use]
    pub fn operation(&self) -> Option<Operation> {
        match self {
            SqlTemplateError::Operation { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// True when a single-row call matched nothing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), SqlTemplateError::NotFound)
    }

    /// True when the database rejected the statement.
    #[must_use]
    pub fn is_execution_error(&self) -> bool {
        match self.root() {
            SqlTemplateError::ExecutionError(_) => true,
            #[cfg(feature = "sqlite")]
            SqlTemplateError::SqliteError(_) => true,
            #[cfg(feature = "postgres")]
            SqlTemplateError::PostgresError(_) => true,
            _ => false,
        }
    }
}

impl From<tera::Error> for SqlTemplateError {
    fn from(err: tera::Error) -> Self {
        SqlTemplateError::TemplateParse(describe_chain(&err))
    }
}

impl From<tokio::task::JoinError> for SqlTemplateError {
    fn from(err: tokio::task::JoinError) -> Self {
        SqlTemplateError::ExecutionError(format!("blocking task join error: {err}"))
    }
}

/// Flatten an error and its sources into one line.
///
/// tera reports the useful part (undefined variable, bad filter) in the source chain, not in
/// the top-level message.
pub(crate) fn describe_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        current = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_once_and_keeps_root() {
        let err = SqlTemplateError::NotFound
            .during(Operation::Get)
            .during(Operation::Select);
        assert_eq!(err.operation(), Some(Operation::Get));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "error getting record: no rows in result set");
    }

    #[test]
    fn execution_classification() {
        let err = SqlTemplateError::ExecutionError("syntax error".into()).during(Operation::Exec);
        assert!(err.is_execution_error());
        assert!(!SqlTemplateError::BindError("x".into()).is_execution_error());
    }
}
