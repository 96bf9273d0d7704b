use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::{JoinHandle, spawn_blocking};

use crate::database::{Database, RowCursor};
use crate::error::SqlTemplateError;
use crate::results::{CustomDbRow, ExecSummary};
use crate::translation::PlaceholderStyle;
use crate::types::{ParamConverter, RowValues};

use super::config::SqliteOptions;
use super::params::Params;
use super::query::{column_names, extract_row};

type SharedConnection = Arc<Mutex<Connection>>;
type RowResult = Result<CustomDbRow, SqlTemplateError>;

/// Virtual machine instructions between checks of a call's abort flag.
const PROGRESS_OPS: i32 = 1000;

/// Abort switch owned by one call.
#[derive(Clone, Default)]
struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Raises the call's flag if dropped while still armed.
struct AbortOnDrop {
    flag: AbortFlag,
    armed: bool,
}

impl AbortOnDrop {
    fn new() -> Self {
        Self {
            flag: AbortFlag::default(),
            armed: true,
        }
    }

    fn flag(&self) -> AbortFlag {
        self.flag.clone()
    }

    fn disarm(mut self) -> AbortFlag {
        self.armed = false;
        self.flag.clone()
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.flag.raise();
        }
    }
}

/// Watches one call's flag while that call holds the connection.
///
/// The handler is installed after the lock is taken and removed before it is released, so
/// raising a flag only ever stops the statement of the call that owns it.
struct Watch<'c> {
    conn: &'c Connection,
}

impl<'c> Watch<'c> {
    fn start(conn: &'c Connection, flag: &AbortFlag) -> Result<Self, SqlTemplateError> {
        if flag.is_raised() {
            return Err(SqlTemplateError::Cancelled);
        }
        let watched = flag.clone();
        conn.progress_handler(PROGRESS_OPS, Some(move || watched.is_raised()))?;
        Ok(Self { conn })
    }
}

impl Drop for Watch<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.conn.progress_handler(0, None::<fn() -> bool>) {
            tracing::warn!(error = %e, "failed to remove sqlite progress handler");
        }
    }
}

/// One `SQLite` connection driven from tokio.
///
/// Driver calls run on the blocking pool while holding the connection lock, so statements
/// on one `SqliteDatabase` are serialized. Each call carries its own abort flag; a call
/// abandoned while queued never runs, and one abandoned while running is stopped at its
/// next progress check.
pub struct SqliteDatabase {
    conn: SharedConnection,
    db_path: String,
    cursor_buffer: usize,
}

impl SqliteDatabase {
    /// Open (creating if needed) the database described by `opts`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for invalid options, `ConnectionError` if the file cannot be
    /// opened, or `SqliteError` if a pragma fails.
    pub async fn open(opts: SqliteOptions) -> Result<Self, SqlTemplateError> {
        opts.validate()?;
        let path = opts.db_path.clone();
        let wal = opts.wal && !opts.is_memory();
        let busy_timeout = opts.busy_timeout;

        let conn = spawn_blocking(move || -> Result<Connection, SqlTemplateError> {
            let conn = Connection::open(&path).map_err(|e| {
                SqlTemplateError::ConnectionError(format!("failed to open sqlite db {path}: {e}"))
            })?;
            if let Some(timeout) = busy_timeout {
                conn.busy_timeout(timeout)?;
            }
            if wal {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            Ok(conn)
        })
        .await??;

        tracing::debug!(path = %opts.db_path, wal, "opened sqlite database");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: opts.db_path,
            cursor_buffer: opts.cursor_buffer,
        })
    }

    /// Run several `;`-separated statements with no parameters, e.g. a schema script.
    ///
    /// # Errors
    ///
    /// Returns `SqliteError` if any statement fails.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SqlTemplateError> {
        let sql_owned = sql.to_owned();
        run_blocking(Arc::clone(&self.conn), move |conn| {
            conn.execute_batch(&sql_owned)?;
            Ok(())
        })
        .await
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.db_path
    }
}

impl fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("db_path", &self.db_path)
            .field("cursor_buffer", &self.cursor_buffer)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Sqlite
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecSummary, SqlTemplateError> {
        let values = <Params as ParamConverter>::convert_sql_params(params)?.0;
        let sql_owned = sql.to_owned();
        run_blocking(Arc::clone(&self.conn), move |conn| {
            let mut stmt = conn.prepare(&sql_owned)?;
            let affected = stmt.execute(params_from_iter(values.iter()))?;
            let rows_affected = u64::try_from(affected).map_err(|e| {
                SqlTemplateError::ExecutionError(format!(
                    "sqlite affected rows conversion error: {e}"
                ))
            })?;
            let rowid = conn.last_insert_rowid();
            Ok(ExecSummary::new(rows_affected, (rowid != 0).then_some(rowid)))
        })
        .await
    }

    async fn query(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn RowCursor>, SqlTemplateError> {
        let values = <Params as ParamConverter>::convert_sql_params(params)?.0;
        let sql_owned = sql.to_owned();
        let conn = Arc::clone(&self.conn);
        let (row_tx, row_rx) = mpsc::channel::<RowResult>(self.cursor_buffer);
        let (ready_tx, ready_rx) = oneshot::channel();
        let abort = AbortOnDrop::new();
        let flag = abort.flag();

        let producer = spawn_blocking(move || {
            let guard = conn.blocking_lock();
            match Watch::start(&guard, &flag) {
                Ok(_watch) => produce_rows(&guard, &sql_owned, &values, ready_tx, &row_tx),
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            }
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(Box::new(SqliteCursor {
                rows: Some(row_rx),
                producer: Some(producer),
                abort: abort.disarm(),
            })),
            Ok(Err(err)) => {
                producer.await?;
                Err(err)
            }
            Err(_) => {
                producer.await?;
                Err(SqlTemplateError::ExecutionError(
                    "sqlite cursor producer exited before starting".into(),
                ))
            }
        }
    }
}

/// Step the statement on the blocking thread, handing rows to the cursor.
///
/// Returns once the rows run out, a step fails, or the cursor drops its receiver.
fn produce_rows(
    conn: &Connection,
    sql: &str,
    params: &[Value],
    ready: oneshot::Sender<Result<(), SqlTemplateError>>,
    rows_out: &mpsc::Sender<RowResult>,
) {
    let mut stmt = match conn.prepare(sql) {
        Ok(stmt) => stmt,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };
    let names = column_names(&stmt);
    let index = CustomDbRow::index_columns(&names);
    let width = names.len();

    let mut rows = match stmt.query(params_from_iter(params.iter())) {
        Ok(rows) => rows,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    loop {
        let item = match rows.next() {
            Ok(Some(row)) => extract_row(row, width)
                .map(|values| CustomDbRow::with_index(Arc::clone(&names), Arc::clone(&index), values)),
            Ok(None) => break,
            Err(e) => Err(e.into()),
        };
        let failed = item.is_err();
        if rows_out.blocking_send(item).is_err() || failed {
            break;
        }
    }
}

/// Rows streamed from a statement running on the blocking pool.
///
/// The producer holds the connection until the statement is done, so an unfinished cursor
/// raises its flag on close or drop to free the connection for other calls.
struct SqliteCursor {
    rows: Option<mpsc::Receiver<RowResult>>,
    producer: Option<JoinHandle<()>>,
    abort: AbortFlag,
}

#[async_trait]
impl RowCursor for SqliteCursor {
    async fn next_row(&mut self) -> Result<Option<CustomDbRow>, SqlTemplateError> {
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };
        match rows.recv().await {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), SqlTemplateError> {
        // the flag stops a producer still stepping; dropping the receiver stops one
        // waiting on a full channel
        self.abort.raise();
        drop(self.rows.take());
        if let Some(producer) = self.producer.take() {
            producer.await?;
            tracing::trace!("sqlite cursor closed");
        }
        Ok(())
    }
}

impl Drop for SqliteCursor {
    fn drop(&mut self) {
        self.abort.raise();
    }
}

async fn run_blocking<F, R>(conn: SharedConnection, func: F) -> Result<R, SqlTemplateError>
where
    F: FnOnce(&Connection) -> Result<R, SqlTemplateError> + Send + 'static,
    R: Send + 'static,
{
    let abort = AbortOnDrop::new();
    let flag = abort.flag();
    let result = spawn_blocking(move || {
        let guard = conn.blocking_lock();
        let _watch = Watch::start(&guard, &flag)?;
        func(&guard)
    })
    .await;
    abort.disarm();
    result?
}
