//! Named SQL templates, rendered and bound per call, executed against `SQLite` or Postgres.
//!
//! A template is ordinary SQL with tera control flow and `:name` markers:
//!
//! ```sql
//! select id, name, city from users
//! where city in (:cities) {% if min_age %} and age > :min_age {% endif %}
//! ```
//!
//! [`SqlTemplates`] renders it with the caller's input, resolves every marker against the same
//! input, expands sequences into `IN` lists, rewrites the markers for the target database,
//! runs the statement and deserializes the rows into the caller's types.
//!
//! ```rust,no_run
//! use serde::{Deserialize, Serialize};
//! use sql_templates::prelude::*;
//!
//! #[derive(Serialize)]
//! struct Filter<'a> {
//!     cities: Vec<&'a str>,
//!     min_age: i64,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! # async fn demo() -> Result<(), SqlTemplateError> {
//! let db = SqliteOptionsBuilder::new("app.db").build().await?;
//! let engine = SqlTemplates::builder(db)
//!     .templates_dir("sql")
//!     .pattern("user/*.sql")
//!     .build()?;
//!
//! let filter = Filter { cities: vec!["Tampa", "Rio"], min_age: 30 };
//! let users: Vec<User> = engine
//!     .select(&QueryContext::new(), "user/search", Some(&filter))
//!     .await?;
//! # let _ = users;
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub mod context;
pub mod database;
pub mod error;
pub mod executor;
pub mod results;
pub mod scan;
pub mod template;
pub mod translation;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use context::QueryContext;
pub use database::{AnyDatabase, Database, DatabaseConfig, RowCursor};
pub use error::{Operation, SqlTemplateError};
pub use executor::{EngineOptions, SingleRowPolicy, SqlTemplates, SqlTemplatesBuilder};
pub use results::{CustomDbRow, ExecSummary};
pub use scan::{RowScanner, from_row};
pub use types::{DatabaseType, ParamConverter, RowValues};
