use std::collections::BTreeSet;
use std::fmt;

use tera::{Context, Tera};

use super::source::TemplateSource;
use crate::error::{SqlTemplateError, describe_chain};

/// The parsed set of named SQL templates.
///
/// Every template is parsed when the registry is built, so syntax errors, unknown parents,
/// and missing macros fail construction instead of the first call that uses them. The
/// registry is immutable afterwards and can be shared across tasks behind an `Arc`.
pub struct TemplateRegistry {
    tera: Tera,
    names: BTreeSet<String>,
}

impl TemplateRegistry {
    /// Load templates from `source` and parse them all.
    ///
    /// # Errors
    ///
    /// Returns `TemplateSource` if loading fails and `TemplateParse` if any template fails
    /// to parse.
    pub fn new(
        source: &dyn TemplateSource,
        patterns: &[&str],
    ) -> Result<Self, SqlTemplateError> {
        let templates = source.load(patterns)?;
        Self::from_templates(templates)
    }

    /// Parse an in-memory set of `(name, text)` templates.
    ///
    /// # Errors
    ///
    /// Returns `TemplateParse` if any template fails to parse.
    pub fn from_templates<I, N, T>(templates: I) -> Result<Self, SqlTemplateError>
    where
        I: IntoIterator<Item = (N, T)>,
        N: AsRef<str>,
        T: AsRef<str>,
    {
        let templates: Vec<(N, T)> = templates.into_iter().collect();
        let mut tera = Tera::default();
        // rendered text is SQL, not HTML
        tera.autoescape_on(Vec::new());
        tera.add_raw_templates(
            templates
                .iter()
                .map(|(name, text)| (name.as_ref(), text.as_ref())),
        )?;

        let names: BTreeSet<String> = templates
            .iter()
            .map(|(name, _)| name.as_ref().to_string())
            .collect();
        tracing::debug!(count = names.len(), "parsed SQL templates");
        Ok(Self { tera, names })
    }

    /// Look up a template by name.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` if no template has that name.
    pub fn resolve(&self, name: &str) -> Result<Template<'_>, SqlTemplateError> {
        self.names
            .get(name)
            .map(|name| Template {
                name: name.as_str(),
                tera: &self.tera,
            })
            .ok_or_else(|| SqlTemplateError::TemplateNotFound(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

/// A resolved template, borrowed from its registry.
#[derive(Clone, Copy)]
pub struct Template<'r> {
    name: &'r str,
    tera: &'r Tera,
}

impl<'r> Template<'r> {
    #[must_use]
    pub fn name(&self) -> &'r str {
        self.name
    }

    /// Render against a prepared tera context.
    ///
    /// # Errors
    ///
    /// Returns `RenderError` if tera fails, e.g. on an undefined variable.
    pub fn render(&self, context: &Context) -> Result<String, SqlTemplateError> {
        self.tera
            .render(self.name, context)
            .map_err(|e| SqlTemplateError::RenderError {
                name: self.name.to_string(),
                message: describe_chain(&e),
            })
    }
}

impl fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::source::MemorySource;

    #[test]
    fn parses_eagerly() {
        let err = TemplateRegistry::from_templates([("bad", "select {% if %}")]).unwrap_err();
        assert!(matches!(err, SqlTemplateError::TemplateParse(_)));

        let err = TemplateRegistry::from_templates([("child", "{% extends \"missing\" %}")])
            .unwrap_err();
        assert!(matches!(err, SqlTemplateError::TemplateParse(_)));
    }

    #[test]
    fn resolves_by_name() -> Result<(), SqlTemplateError> {
        let source = MemorySource::new([("user/get", "select 1"), ("user/list", "select 2")]);
        let registry = TemplateRegistry::new(&source, &["user/*"])?;
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["user/get", "user/list"]);
        assert_eq!(registry.resolve("user/get")?.name(), "user/get");

        let err = registry.resolve("user/delete").unwrap_err();
        assert!(matches!(err, SqlTemplateError::TemplateNotFound(ref n) if n == "user/delete"));
        Ok(())
    }

    #[test]
    fn no_autoescape() -> Result<(), SqlTemplateError> {
        let registry = TemplateRegistry::from_templates([("t", "where {{ clause }}")])?;
        let mut context = Context::new();
        context.insert("clause", "a <> 'x' & b > 1");
        let sql = registry.resolve("t")?.render(&context)?;
        assert_eq!(sql, "where a <> 'x' & b > 1");
        Ok(())
    }
}
