use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SqlTemplateError;
use crate::results::{CustomDbRow, ExecSummary};
use crate::translation::PlaceholderStyle;
use crate::types::{DatabaseType, RowValues};

#[cfg(feature = "postgres")]
use crate::postgres::{PostgresDatabase, PostgresOptions};
#[cfg(feature = "sqlite")]
use crate::sqlite::{SqliteDatabase, SqliteOptions};

/// A database the engine can run finished statements against.
///
/// `sql` always uses the placeholder syntax reported by [`Database::placeholder_style`], and
/// `params[n]` binds the `n + 1`th placeholder.
///
/// Cancellation is by drop. Dropping an unfinished `execute` or `query` future, or a
/// [`RowCursor`] that has not been closed, must abort the statement that call started and
/// nothing else; other callers sharing the database are not affected.
#[async_trait]
pub trait Database: Send + Sync {
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Run a statement for its side effects.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the statement fails.
    async fn execute(&self, sql: &str, params: &[RowValues])
    -> Result<ExecSummary, SqlTemplateError>;

    /// Open a cursor over the rows a statement returns.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the statement cannot be prepared or started.
    async fn query(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn RowCursor>, SqlTemplateError>;
}

/// Rows of one query, pulled one at a time.
#[async_trait]
pub trait RowCursor: Send {
    /// The next row, or `None` once the result is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the driver error if fetching or converting a row fails.
    async fn next_row(&mut self) -> Result<Option<CustomDbRow>, SqlTemplateError>;

    /// Release the statement, aborting it if rows are still being produced. Safe to call
    /// more than once.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails while finalizing the statement.
    async fn close(&mut self) -> Result<(), SqlTemplateError>;
}

#[async_trait]
impl<D: Database + ?Sized> Database for Arc<D> {
    fn placeholder_style(&self) -> PlaceholderStyle {
        (**self).placeholder_style()
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecSummary, SqlTemplateError> {
        (**self).execute(sql, params).await
    }

    async fn query(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn RowCursor>, SqlTemplateError> {
        (**self).query(sql, params).await
    }
}

/// Connection settings for any enabled backend.
#[derive(Debug, Clone)]
pub enum DatabaseConfig {
    #[cfg(feature = "postgres")]
    Postgres(PostgresOptions),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteOptions),
}

impl DatabaseConfig {
    /// Settings for `db_type` from a single string: a file path (or `:memory:`) for SQLite,
    /// a libpq-style connection string or URL for Postgres.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the Postgres connection string cannot be parsed.
    pub fn from_str_for(db_type: DatabaseType, value: &str) -> Result<Self, SqlTemplateError> {
        match db_type {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => Ok(DatabaseConfig::Postgres(PostgresOptions::from_conn_str(
                value,
            )?)),
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => Ok(DatabaseConfig::Sqlite(SqliteOptions::new(value))),
        }
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "postgres")]
            DatabaseConfig::Postgres(_) => DatabaseType::Postgres,
            #[cfg(feature = "sqlite")]
            DatabaseConfig::Sqlite(_) => DatabaseType::Sqlite,
        }
    }
}

/// A connected database of a type chosen at runtime.
#[derive(Debug)]
pub enum AnyDatabase {
    #[cfg(feature = "postgres")]
    Postgres(PostgresDatabase),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteDatabase),
}

impl AnyDatabase {
    /// Open a connection described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` (or the driver error) if the connection cannot be opened.
    pub async fn connect(config: DatabaseConfig) -> Result<Self, SqlTemplateError> {
        match config {
            #[cfg(feature = "postgres")]
            DatabaseConfig::Postgres(opts) => {
                Ok(AnyDatabase::Postgres(PostgresDatabase::connect(opts).await?))
            }
            #[cfg(feature = "sqlite")]
            DatabaseConfig::Sqlite(opts) => {
                Ok(AnyDatabase::Sqlite(SqliteDatabase::open(opts).await?))
            }
        }
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "postgres")]
            AnyDatabase::Postgres(_) => DatabaseType::Postgres,
            #[cfg(feature = "sqlite")]
            AnyDatabase::Sqlite(_) => DatabaseType::Sqlite,
        }
    }
}

#[async_trait]
impl Database for AnyDatabase {
    fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            #[cfg(feature = "postgres")]
            AnyDatabase::Postgres(db) => db.placeholder_style(),
            #[cfg(feature = "sqlite")]
            AnyDatabase::Sqlite(db) => db.placeholder_style(),
        }
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecSummary, SqlTemplateError> {
        match self {
            #[cfg(feature = "postgres")]
            AnyDatabase::Postgres(db) => db.execute(sql, params).await,
            #[cfg(feature = "sqlite")]
            AnyDatabase::Sqlite(db) => db.execute(sql, params).await,
        }
    }

    async fn query(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn RowCursor>, SqlTemplateError> {
        match self {
            #[cfg(feature = "postgres")]
            AnyDatabase::Postgres(db) => db.query(sql, params).await,
            #[cfg(feature = "sqlite")]
            AnyDatabase::Sqlite(db) => db.query(sql, params).await,
        }
    }
}
