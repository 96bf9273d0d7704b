//! The engine: render, bind, expand, rebind, execute, materialize.

mod builder;
mod options;
mod trace;

use std::ops::ControlFlow;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::QueryContext;
use crate::database::{Database, RowCursor};
use crate::error::{Operation, SqlTemplateError};
use crate::results::{CustomDbRow, ExecSummary};
use crate::scan::{RowScanner, from_row, overlay_row};
use crate::template::{TemplateRegistry, TemplateSource, render};
use crate::translation::{DialectStatement, bind_named, expand_lists, rebind};

pub use builder::SqlTemplatesBuilder;
pub use options::{EngineOptions, SingleRowPolicy};
pub use trace::format_params;

/// Named SQL templates bound to one database.
///
/// Every operation runs the same pipeline: the template is rendered with the input as its
/// context, `:name` markers are resolved against the same input, sequences are expanded for
/// `IN (...)` lists, and markers are rewritten in the database's placeholder syntax. Failures
/// are wrapped once with the operation that failed, so `err.to_string()` reads like
/// `error getting record: no rows in result set`.
///
/// The engine holds no per-call state; share it across tasks behind an `Arc`.
pub struct SqlTemplates<D> {
    registry: Arc<TemplateRegistry>,
    db: D,
    options: EngineOptions,
}

impl<D: Database> SqlTemplates<D> {
    #[must_use]
    pub fn builder(db: D) -> SqlTemplatesBuilder<D> {
        SqlTemplatesBuilder::new(db)
    }

    /// Load the templates selected by `patterns` from `source` with default options.
    ///
    /// # Errors
    ///
    /// Returns `TemplateSource` or `TemplateParse` if any template fails to load or parse.
    pub fn new(
        db: D,
        source: &dyn TemplateSource,
        patterns: &[&str],
    ) -> Result<Self, SqlTemplateError> {
        let registry = TemplateRegistry::new(source, patterns)?;
        Ok(Self::from_parts(
            Arc::new(registry),
            db,
            EngineOptions::default(),
        ))
    }

    #[must_use]
    pub fn from_parts(registry: Arc<TemplateRegistry>, db: D, options: EngineOptions) -> Self {
        Self {
            registry,
            db,
            options,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn database(&self) -> &D {
        &self.db
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Run the pipeline without touching the database.
    ///
    /// # Errors
    ///
    /// Returns the failing stage's error wrapped as "error executing template".
    pub fn build<I: Serialize + ?Sized>(
        &self,
        name: &str,
        input: Option<&I>,
    ) -> Result<DialectStatement, SqlTemplateError> {
        to_input(input)
            .and_then(|value| self.prepare(name, value.as_ref()))
            .map_err(|e| e.during(Operation::Build))
    }

    /// Execute a statement that returns no rows.
    ///
    /// # Errors
    ///
    /// Returns the failing stage's error wrapped as "error executing query".
    pub async fn exec<I: Serialize + ?Sized>(
        &self,
        ctx: &QueryContext,
        name: &str,
        input: Option<&I>,
    ) -> Result<ExecSummary, SqlTemplateError> {
        let result = match to_input(input) {
            Ok(value) => self.run_exec(ctx, name, value.as_ref()).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| e.during(Operation::Exec))
    }

    /// Fetch one row as `T`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the query returns no rows; otherwise the failing stage's error. Both
    /// are wrapped as "error getting record".
    pub async fn get<T, I>(
        &self,
        ctx: &QueryContext,
        name: &str,
        input: Option<&I>,
    ) -> Result<T, SqlTemplateError>
    where
        T: DeserializeOwned,
        I: Serialize + ?Sized,
    {
        let result = match to_input(input) {
            Ok(value) => self
                .fetch_one(ctx, name, value.as_ref())
                .await
                .and_then(|row| from_row(&row)),
            Err(e) => Err(e),
        };
        result.map_err(|e| e.during(Operation::Get))
    }

    /// Fetch one row over `dest`, which is left untouched on failure.
    ///
    /// # Errors
    ///
    /// As [`SqlTemplates::get`].
    pub async fn get_into<T, I>(
        &self,
        ctx: &QueryContext,
        name: &str,
        input: Option<&I>,
        dest: &mut T,
    ) -> Result<(), SqlTemplateError>
    where
        T: DeserializeOwned,
        I: Serialize + ?Sized,
    {
        *dest = self.get(ctx, name, input).await?;
        Ok(())
    }

    /// Fetch every row, in order. No rows is an empty `Vec`.
    ///
    /// # Errors
    ///
    /// Returns the failing stage's error wrapped as "error selecting records".
    pub async fn select<T, I>(
        &self,
        ctx: &QueryContext,
        name: &str,
        input: Option<&I>,
    ) -> Result<Vec<T>, SqlTemplateError>
    where
        T: DeserializeOwned,
        I: Serialize + ?Sized,
    {
        let result = match to_input(input) {
            Ok(value) => self.collect(ctx, name, value.as_ref()).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| e.during(Operation::Select))
    }

    /// Append every row to `dest`. Nothing is appended unless all rows scan.
    ///
    /// # Errors
    ///
    /// As [`SqlTemplates::select`].
    pub async fn select_into<T, I>(
        &self,
        ctx: &QueryContext,
        name: &str,
        input: Option<&I>,
        dest: &mut Vec<T>,
    ) -> Result<(), SqlTemplateError>
    where
        T: DeserializeOwned,
        I: Serialize + ?Sized,
    {
        let rows = self.select(ctx, name, input).await?;
        dest.extend(rows);
        Ok(())
    }

    /// Stream rows to `visitor` one at a time.
    ///
    /// Returning `ControlFlow::Break(())` stops early without error. The cursor is closed on
    /// every exit path.
    ///
    /// ```rust,no_run
    /// # use std::ops::ControlFlow;
    /// # use sql_templates::prelude::*;
    /// # async fn demo(engine: SqlTemplates<AnyDatabase>) -> Result<(), SqlTemplateError> {
    /// let mut names: Vec<String> = Vec::new();
    /// engine
    ///     .iterate(&QueryContext::new(), "user/names", None::<&()>, |row| {
    ///         names.push(row.scan()?);
    ///         Ok(if names.len() == 10 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) })
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the visitor's error or the failing stage's error, wrapped as "error iterating
    /// records".
    pub async fn iterate<I, F>(
        &self,
        ctx: &QueryContext,
        name: &str,
        input: Option<&I>,
        mut visitor: F,
    ) -> Result<(), SqlTemplateError>
    where
        I: Serialize + ?Sized,
        F: FnMut(&RowScanner<'_>) -> Result<ControlFlow<()>, SqlTemplateError>,
    {
        let result = match to_input(input) {
            Ok(value) => self.for_each_row(ctx, name, value.as_ref(), &mut visitor).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| e.during(Operation::Iterate))
    }

    /// Insert `record` and read the returned row back into it.
    ///
    /// The record is the template input. Columns of the first returned row (typically from
    /// `RETURNING`) overwrite the matching fields; other fields keep their values.
    ///
    /// # Errors
    ///
    /// As [`SqlTemplates::get`], wrapped as "error creating record".
    pub async fn create<R>(
        &self,
        ctx: &QueryContext,
        name: &str,
        record: &mut R,
    ) -> Result<(), SqlTemplateError>
    where
        R: Serialize + DeserializeOwned,
    {
        self.round_trip(ctx, name, record)
            .await
            .map_err(|e| e.during(Operation::Create))
    }

    /// Update `record` and read the returned row back into it.
    ///
    /// # Errors
    ///
    /// As [`SqlTemplates::create`], wrapped as "error updating record".
    pub async fn update<R>(
        &self,
        ctx: &QueryContext,
        name: &str,
        record: &mut R,
    ) -> Result<(), SqlTemplateError>
    where
        R: Serialize + DeserializeOwned,
    {
        self.round_trip(ctx, name, record)
            .await
            .map_err(|e| e.during(Operation::Update))
    }

    fn prepare(
        &self,
        name: &str,
        input: Option<&Value>,
    ) -> Result<DialectStatement, SqlTemplateError> {
        let rendered = render(&self.registry, name, input)?;
        let bound = bind_named(&rendered.sql, input, self.options.key_match)?;
        let expanded = expand_lists(bound, self.options.empty_list)?;
        rebind(expanded, &self.db.placeholder_style())
    }

    async fn run_exec(
        &self,
        ctx: &QueryContext,
        name: &str,
        input: Option<&Value>,
    ) -> Result<ExecSummary, SqlTemplateError> {
        let stmt = self.prepare(name, input)?;
        let result = ctx.guard(self.db.execute(&stmt.sql, &stmt.params)).await;
        trace::statement(self.options.debug, name, &stmt, result.as_ref().err());
        result
    }

    async fn open(
        &self,
        ctx: &QueryContext,
        name: &str,
        input: Option<&Value>,
    ) -> Result<(DialectStatement, Box<dyn RowCursor>), SqlTemplateError> {
        let stmt = self.prepare(name, input)?;
        match ctx.guard(self.db.query(&stmt.sql, &stmt.params)).await {
            Ok(cursor) => Ok((stmt, cursor)),
            Err(e) => {
                trace::statement(self.options.debug, name, &stmt, Some(&e));
                Err(e)
            }
        }
    }

    async fn fetch_one(
        &self,
        ctx: &QueryContext,
        name: &str,
        input: Option<&Value>,
    ) -> Result<CustomDbRow, SqlTemplateError> {
        let (stmt, mut cursor) = self.open(ctx, name, input).await?;
        let result = self.first_row(ctx, cursor.as_mut()).await;
        let result = finish(ctx, result, cursor.as_mut()).await;
        trace::statement(self.options.debug, name, &stmt, result.as_ref().err());
        result
    }

    async fn first_row(
        &self,
        ctx: &QueryContext,
        cursor: &mut dyn RowCursor,
    ) -> Result<CustomDbRow, SqlTemplateError> {
        let first = ctx
            .guard(cursor.next_row())
            .await?
            .ok_or(SqlTemplateError::NotFound)?;
        if self.options.single_row == SingleRowPolicy::Strict
            && ctx.guard(cursor.next_row()).await?.is_some()
        {
            return Err(SqlTemplateError::ScanError(
                "expected exactly one row, got more".into(),
            ));
        }
        Ok(first)
    }

    async fn collect<T: DeserializeOwned>(
        &self,
        ctx: &QueryContext,
        name: &str,
        input: Option<&Value>,
    ) -> Result<Vec<T>, SqlTemplateError> {
        let mut rows = Vec::new();
        self.for_each_row(ctx, name, input, &mut |row: &RowScanner<'_>| {
            rows.push(row.scan()?);
            Ok(ControlFlow::Continue(()))
        })
        .await?;
        Ok(rows)
    }

    async fn for_each_row<F>(
        &self,
        ctx: &QueryContext,
        name: &str,
        input: Option<&Value>,
        visitor: &mut F,
    ) -> Result<(), SqlTemplateError>
    where
        F: FnMut(&RowScanner<'_>) -> Result<ControlFlow<()>, SqlTemplateError>,
    {
        let (stmt, mut cursor) = self.open(ctx, name, input).await?;
        let result = self.drain(ctx, cursor.as_mut(), visitor).await;
        let result = finish(ctx, result, cursor.as_mut()).await;
        trace::statement(self.options.debug, name, &stmt, result.as_ref().err());
        result
    }

    async fn drain<F>(
        &self,
        ctx: &QueryContext,
        cursor: &mut dyn RowCursor,
        visitor: &mut F,
    ) -> Result<(), SqlTemplateError>
    where
        F: FnMut(&RowScanner<'_>) -> Result<ControlFlow<()>, SqlTemplateError>,
    {
        while let Some(row) = ctx.guard(cursor.next_row()).await? {
            if visitor(&RowScanner::new(&row))?.is_break() {
                break;
            }
        }
        Ok(())
    }

    async fn round_trip<R>(
        &self,
        ctx: &QueryContext,
        name: &str,
        record: &mut R,
    ) -> Result<(), SqlTemplateError>
    where
        R: Serialize + DeserializeOwned,
    {
        let value = to_input(Some(&*record))?;
        let row = self.fetch_one(ctx, name, value.as_ref()).await?;
        *record = match &value {
            Some(base) => overlay_row(&row, base)?,
            None => from_row(&row)?,
        };
        Ok(())
    }
}

impl<D> std::fmt::Debug for SqlTemplates<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlTemplates")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Close the cursor, keeping the first error.
///
/// Closing is raced against `ctx` like any other database await. If the context has
/// already fired, the cursor is left to abort its statement when it is dropped.
async fn finish<T>(
    ctx: &QueryContext,
    result: Result<T, SqlTemplateError>,
    cursor: &mut dyn RowCursor,
) -> Result<T, SqlTemplateError> {
    let closed = ctx.guard(cursor.close()).await;
    let value = result?;
    closed?;
    Ok(value)
}

/// Convert caller input once; the same value feeds rendering and binding.
fn to_input<I: Serialize + ?Sized>(input: Option<&I>) -> Result<Option<Value>, SqlTemplateError> {
    input
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| SqlTemplateError::BindError(format!("input cannot be serialized: {e}")))
}
