use std::path::PathBuf;
use std::sync::Arc;

use crate::database::Database;
use crate::error::SqlTemplateError;
use crate::template::{DirSource, TemplateRegistry, TemplateSource};
use crate::translation::{EmptyListPolicy, KeyMatch};

use super::SqlTemplates;
use super::options::{EngineOptions, SingleRowPolicy};

/// Fluent builder for [`SqlTemplates`].
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), sql_templates::SqlTemplateError> {
/// use sql_templates::prelude::*;
///
/// let db = SqliteOptionsBuilder::new("app.db").build().await?;
/// let engine = SqlTemplates::builder(db)
///     .templates_dir("sql")
///     .pattern("**/*.sql")
///     .debug(true)
///     .build()?;
/// # let _ = engine;
/// # Ok(())
/// # }
/// ```
pub struct SqlTemplatesBuilder<D> {
    db: D,
    source: Option<Box<dyn TemplateSource + Send + Sync>>,
    registry: Option<Arc<TemplateRegistry>>,
    patterns: Vec<String>,
    options: EngineOptions,
}

impl<D: Database> SqlTemplatesBuilder<D> {
    #[must_use]
    pub fn new(db: D) -> Self {
        Self {
            db,
            source: None,
            registry: None,
            patterns: Vec::new(),
            options: EngineOptions::default(),
        }
    }

    #[must_use]
    pub fn source(mut self, source: impl TemplateSource + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Load templates from files under `root`.
    #[must_use]
    pub fn templates_dir(self, root: impl Into<PathBuf>) -> Self {
        self.source(DirSource::new(root))
    }

    /// Reuse an already parsed registry, e.g. one shared with another engine.
    #[must_use]
    pub fn registry(mut self, registry: Arc<TemplateRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    #[must_use]
    pub fn patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.options.debug = debug;
        self
    }

    #[must_use]
    pub fn single_row(mut self, policy: SingleRowPolicy) -> Self {
        self.options.single_row = policy;
        self
    }

    #[must_use]
    pub fn empty_list(mut self, policy: EmptyListPolicy) -> Self {
        self.options.empty_list = policy;
        self
    }

    #[must_use]
    pub fn key_match(mut self, key_match: KeyMatch) -> Self {
        self.options.key_match = key_match;
        self
    }

    #[must_use]
    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Load and parse the templates and assemble the engine.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if neither a source nor a registry was given, and
    /// `TemplateSource`/`TemplateParse` if loading or parsing fails.
    pub fn build(self) -> Result<SqlTemplates<D>, SqlTemplateError> {
        let registry = match (self.registry, self.source) {
            (Some(registry), _) => registry,
            (None, Some(source)) => {
                let patterns: Vec<&str> = self.patterns.iter().map(String::as_str).collect();
                Arc::new(TemplateRegistry::new(source.as_ref(), &patterns)?)
            }
            (None, None) => {
                return Err(SqlTemplateError::ConfigError(
                    "no template source or registry configured".into(),
                ));
            }
        };
        Ok(SqlTemplates::from_parts(registry, self.db, self.options))
    }
}
