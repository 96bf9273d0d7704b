//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::context::QueryContext;
pub use crate::database::{AnyDatabase, Database, DatabaseConfig, RowCursor};
pub use crate::error::{Operation, SqlTemplateError};
pub use crate::executor::{
    EngineOptions, SingleRowPolicy, SqlTemplates, SqlTemplatesBuilder, format_params,
};
pub use crate::results::{CustomDbRow, ExecSummary};
pub use crate::scan::{RowScanner, from_row};
pub use crate::template::{
    DirSource, MemorySource, RenderedStatement, TemplateRegistry, TemplateSource, render,
};
pub use crate::translation::{
    BindValue, BoundStatement, Dialect, DialectStatement, EmptyListPolicy, ExpandedStatement,
    KeyMatch, PlaceholderStyle, bind_named, expand_lists, rebind,
};
pub use crate::types::{DatabaseType, RowValues};

#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresDatabase, PostgresOptions};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteDatabase, SqliteOptions, SqliteOptionsBuilder};
