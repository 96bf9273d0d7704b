use std::time::Duration;

use crate::error::SqlTemplateError;

use super::executor::SqliteDatabase;

/// Options for opening a `SQLite` database.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// File path, or `:memory:`.
    pub db_path: String,
    /// Switch the database to WAL journaling on open.
    pub wal: bool,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Option<Duration>,
    /// Rows a cursor may read ahead of the consumer.
    pub cursor_buffer: usize,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            wal: true,
            busy_timeout: Some(Duration::from_secs(5)),
            cursor_buffer: 64,
        }
    }

    #[must_use]
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, busy_timeout: Option<Duration>) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn with_cursor_buffer(mut self, cursor_buffer: usize) -> Self {
        self.cursor_buffer = cursor_buffer;
        self
    }

    pub(crate) fn is_memory(&self) -> bool {
        self.db_path == ":memory:"
    }

    pub(crate) fn validate(&self) -> Result<(), SqlTemplateError> {
        if self.db_path.is_empty() {
            return Err(SqlTemplateError::ConfigError(
                "sqlite db_path must not be empty".into(),
            ));
        }
        if self.cursor_buffer == 0 {
            return Err(SqlTemplateError::ConfigError(
                "sqlite cursor_buffer must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(busy_timeout);
        self
    }

    #[must_use]
    pub fn cursor_buffer(mut self, cursor_buffer: usize) -> Self {
        self.opts.cursor_buffer = cursor_buffer;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open the database.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for invalid options, or the driver error if opening fails.
    pub async fn build(self) -> Result<SqliteDatabase, SqlTemplateError> {
        SqliteDatabase::open(self.finish()).await
    }
}

impl SqliteDatabase {
    #[must_use]
    pub fn builder(db_path: impl Into<String>) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }
}
