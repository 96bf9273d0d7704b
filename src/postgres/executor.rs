use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{FutureExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_postgres::{CancelToken, Client, NoTls, RowStream};

use crate::database::{Database, RowCursor};
use crate::error::SqlTemplateError;
use crate::results::{CustomDbRow, ExecSummary};
use crate::translation::PlaceholderStyle;
use crate::types::{ParamConverter, RowValues};

use super::config::PostgresOptions;
use super::params::Params;
use super::query::{column_names, extract_row};

/// One Postgres client connection.
///
/// The connection future runs on its own task for as long as the client lives. A server
/// cancel request targets whatever the connection is running, so calls take turns: each
/// holds the turn until its statement is finished, and an abandoned call keeps it until
/// the cancel has landed and the connection is idle again.
pub struct PostgresDatabase {
    client: Arc<Client>,
    cancel_token: CancelToken,
    turn: Arc<Mutex<()>>,
}

impl PostgresDatabase {
    /// Connect without TLS.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for incomplete settings or `ConnectionError` if the server
    /// cannot be reached.
    pub async fn connect(opts: PostgresOptions) -> Result<Self, SqlTemplateError> {
        opts.validate()?;
        let (client, connection) = opts.config.connect(NoTls).await.map_err(|e| {
            SqlTemplateError::ConnectionError(format!("failed to connect to postgres: {e}"))
        })?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres connection error");
            }
        });
        tracing::debug!(
            user = ?opts.config.get_user(),
            dbname = ?opts.config.get_dbname(),
            "connected to postgres"
        );
        let cancel_token = client.cancel_token();
        Ok(Self {
            client: Arc::new(client),
            cancel_token,
            turn: Arc::new(Mutex::new(())),
        })
    }

    async fn begin(&self) -> InFlight {
        let turn = Arc::clone(&self.turn).lock_owned().await;
        InFlight {
            client: Arc::clone(&self.client),
            cancel_token: self.cancel_token.clone(),
            turn: Some(turn),
        }
    }

    /// Run several `;`-separated statements with no parameters, e.g. a schema script.
    ///
    /// # Errors
    ///
    /// Returns `PostgresError` if any statement fails.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SqlTemplateError> {
        let in_flight = self.begin().await;
        let result = self.client.batch_execute(sql).await;
        in_flight.done();
        result?;
        Ok(())
    }

    /// The underlying client. Statements run through it do not take a turn.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("closed", &self.client.is_closed())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Postgres
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecSummary, SqlTemplateError> {
        let converted = <Params as ParamConverter>::convert_sql_params(params)?;
        let in_flight = self.begin().await;
        let result = self.client.execute(sql, converted.as_refs()).await;
        in_flight.done();
        Ok(ExecSummary::new(result?, None))
    }

    async fn query(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn RowCursor>, SqlTemplateError> {
        let converted = <Params as ParamConverter>::convert_sql_params(params)?;
        let in_flight = self.begin().await;
        let stream = match self
            .client
            .query_raw(sql, converted.as_refs().iter().copied())
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                in_flight.done();
                return Err(e.into());
            }
        };
        Ok(Box::new(PostgresCursor {
            stream: Some(Box::pin(stream)),
            columns: None,
            in_flight: Some(in_flight),
        }))
    }
}

/// One call's turn on the connection.
///
/// Dropped before [`InFlight::done`], it asks the server to cancel the statement from a
/// background task and gives the turn back once a follow-up round trip shows the
/// connection is idle.
struct InFlight {
    client: Arc<Client>,
    cancel_token: CancelToken,
    turn: Option<OwnedMutexGuard<()>>,
}

impl InFlight {
    /// The statement finished on its own; release the turn.
    fn done(mut self) {
        self.turn.take();
    }

    /// Cancel the statement and wait for the connection to settle before releasing.
    async fn abort(mut self) {
        if let Some(turn) = self.turn.take() {
            settle(&self.client, &self.cancel_token).await;
            drop(turn);
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(turn) = self.turn.take()
            && let Ok(handle) = Handle::try_current()
        {
            let client = Arc::clone(&self.client);
            let cancel_token = self.cancel_token.clone();
            handle.spawn(async move {
                settle(&client, &cancel_token).await;
                drop(turn);
            });
        }
    }
}

async fn settle(client: &Client, cancel_token: &CancelToken) {
    tracing::debug!("cancelling abandoned postgres statement");
    if let Err(e) = cancel_token.cancel_query(NoTls).await {
        tracing::warn!(error = %e, "failed to cancel postgres query");
    }
    // queued behind the cancelled statement; absorbs a cancel that lands late
    if let Err(e) = client.batch_execute("SELECT 1").await {
        tracing::debug!(error = %e, "postgres connection check after cancel failed");
    }
}

/// Rows a closing cursor reads without waiting before it falls back to a cancel.
const BUFFERED_ROWS: usize = 64;

/// Rows streamed from the server as the portal is read.
struct PostgresCursor {
    stream: Option<Pin<Box<RowStream>>>,
    // built from the first row; RowStream exposes no columns before that
    columns: Option<(Arc<Vec<String>>, Arc<HashMap<String, usize>>)>,
    // held until the stream ends; dropping it early cancels the statement
    in_flight: Option<InFlight>,
}

impl PostgresCursor {
    fn release(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.done();
        }
    }
}

#[async_trait]
impl RowCursor for PostgresCursor {
    async fn next_row(&mut self) -> Result<Option<CustomDbRow>, SqlTemplateError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        let next = stream.next().await;
        let row = match next {
            Some(Ok(row)) => row,
            Some(Err(e)) => {
                self.release();
                return Err(e.into());
            }
            None => {
                self.stream = None;
                self.release();
                return Ok(None);
            }
        };
        let (names, index) = self.columns.get_or_insert_with(|| {
            let names = column_names(&row);
            let index = CustomDbRow::index_columns(&names);
            (names, index)
        });
        let values = extract_row(&row)?;
        Ok(Some(CustomDbRow::with_index(
            Arc::clone(names),
            Arc::clone(index),
            values,
        )))
    }

    async fn close(&mut self) -> Result<(), SqlTemplateError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        // a short result has usually arrived in full; finishing it avoids a cancel
        for _ in 0..BUFFERED_ROWS {
            match stream.next().now_or_never() {
                Some(Some(Ok(_))) => {}
                Some(Some(Err(_)) | None) => {
                    self.release();
                    break;
                }
                None => break,
            }
        }
        drop(stream);
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.abort().await;
        }
        tracing::trace!("postgres cursor closed");
        Ok(())
    }
}
