//! Turning rendered template text into a dialect-ready statement.
//!
//! Three passes share one SQL scanner, so quoted strings, quoted identifiers, comments, and
//! dollar-quoted bodies are skipped consistently:
//!
//! 1. [`bind_named`] replaces `:name` markers with neutral `?` markers.
//! 2. [`expand_lists`] flattens sequence parameters for `IN (...)` lists.
//! 3. [`rebind`] rewrites neutral markers into the target's native syntax.
//!
//! ```rust
//! use sql_templates::prelude::*;
//! use serde_json::json;
//!
//! let input = json!({"cities": ["Tampa", "Rio"], "age": 98});
//! let bound = bind_named(
//!     "select * from users where city in (:cities) and age > :age",
//!     Some(&input),
//!     KeyMatch::Exact,
//! )?;
//! let expanded = expand_lists(bound, EmptyListPolicy::Error)?;
//! let stmt = rebind(expanded, &PlaceholderStyle::Postgres)?;
//! assert_eq!(stmt.sql, "select * from users where city in ($1, $2) and age > $3");
//! assert_eq!(stmt.params.len(), 3);
//! # Ok::<(), SqlTemplateError>(())
//! ```

mod expand;
mod named;
mod parsers;
mod rebind;
mod scanner;

pub use expand::{EmptyListPolicy, ExpandedStatement, expand_lists};
pub use named::{BindValue, BoundStatement, KeyMatch, bind_named};
pub use rebind::{Dialect, DialectStatement, rebind};

/// Target placeholder style for rebinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style ordinal placeholders like `$1`.
    Postgres,
    /// SQLite-style ordinal placeholders like `?1`.
    Sqlite,
    /// Unindexed `?` placeholders.
    Question,
}
