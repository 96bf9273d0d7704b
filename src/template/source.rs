use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob::Pattern;

use crate::error::SqlTemplateError;

/// Somewhere named SQL templates come from.
pub trait TemplateSource {
    /// Return `(name, raw text)` for every template selected by `patterns`.
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::TemplateSource` if a pattern is invalid, matches nothing, or
    /// a template cannot be read.
    fn load(&self, patterns: &[&str]) -> Result<Vec<(String, String)>, SqlTemplateError>;
}

/// Templates on disk under a root directory.
///
/// A file at `<root>/user/create.sql` is registered as `user/create`. At least one pattern
/// is required; the directory is never loaded wholesale.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn template_name(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .with_extension("")
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl TemplateSource for DirSource {
    fn load(&self, patterns: &[&str]) -> Result<Vec<(String, String)>, SqlTemplateError> {
        if patterns.is_empty() {
            return Err(SqlTemplateError::TemplateSource(format!(
                "no template patterns given for {}",
                self.root.display()
            )));
        }
        let root = self.root.to_str().ok_or_else(|| {
            SqlTemplateError::TemplateSource(format!(
                "template root {} is not valid UTF-8",
                self.root.display()
            ))
        })?;
        let root = Pattern::escape(root);

        let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut templates = Vec::new();
        for pattern in patterns {
            let full = format!("{root}/{pattern}");
            let entries = glob::glob(&full).map_err(|e| {
                SqlTemplateError::TemplateSource(format!("invalid pattern `{pattern}`: {e}"))
            })?;

            let mut matched = false;
            for entry in entries {
                let path = entry.map_err(|e| SqlTemplateError::TemplateSource(e.to_string()))?;
                if !path.is_file() {
                    continue;
                }
                matched = true;
                let name = self.template_name(&path);
                if let Some(previous) = seen.get(&name) {
                    if previous == &path {
                        continue;
                    }
                    return Err(SqlTemplateError::TemplateSource(format!(
                        "{} and {} both map to template `{name}`",
                        previous.display(),
                        path.display()
                    )));
                }
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    SqlTemplateError::TemplateSource(format!("reading {}: {e}", path.display()))
                })?;
                tracing::trace!(template = %name, path = %path.display(), "loaded template");
                seen.insert(name.clone(), path);
                templates.push((name, text));
            }

            if !matched {
                return Err(SqlTemplateError::TemplateSource(format!(
                    "pattern matches no files: `{pattern}`"
                )));
            }
        }
        Ok(templates)
    }
}

/// Templates held in memory, typically built with `include_str!`.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    templates: Vec<(String, String)>,
}

impl MemorySource {
    pub fn new<I, N, T>(templates: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<String>,
    {
        Self {
            templates: templates
                .into_iter()
                .map(|(name, text)| (name.into(), text.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn with_template(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.templates.push((name.into(), text.into()));
        self
    }
}

impl TemplateSource for MemorySource {
    fn load(&self, patterns: &[&str]) -> Result<Vec<(String, String)>, SqlTemplateError> {
        if patterns.is_empty() {
            return Ok(self.templates.clone());
        }
        let compiled = patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    SqlTemplateError::TemplateSource(format!("invalid pattern `{p}`: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(unmatched) = patterns
            .iter()
            .zip(&compiled)
            .find(|(_, pattern)| !self.templates.iter().any(|(name, _)| pattern.matches(name)))
            .map(|(raw, _)| raw)
        {
            return Err(SqlTemplateError::TemplateSource(format!(
                "pattern matches no files: `{unmatched}`"
            )));
        }

        Ok(self
            .templates
            .iter()
            .filter(|(name, _)| compiled.iter().any(|pattern| pattern.matches(name)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_source_names_by_relative_path() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join("user"))?;
        std::fs::write(dir.path().join("user/get.sql"), "select 1")?;
        std::fs::write(dir.path().join("user/list.sql"), "select 2")?;
        std::fs::write(dir.path().join("notes.txt"), "ignored")?;

        let source = DirSource::new(dir.path());
        let mut loaded = source.load(&["user/*.sql"])?;
        loaded.sort();
        assert_eq!(
            loaded,
            vec![
                ("user/get".to_string(), "select 1".to_string()),
                ("user/list".to_string(), "select 2".to_string()),
            ]
        );

        let err = source.load(&["missing/*.sql"]).unwrap_err();
        assert!(matches!(err, SqlTemplateError::TemplateSource(_)));
        Ok(())
    }

    #[test]
    fn dir_source_needs_a_pattern() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("a.sql"), "select 1")?;
        let err = DirSource::new(dir.path()).load(&[]).unwrap_err();
        assert!(
            matches!(err, SqlTemplateError::TemplateSource(ref m) if m.contains("no template patterns"))
        );
        Ok(())
    }

    #[test]
    fn dir_source_rejects_name_collisions() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("a.sql"), "select 1")?;
        std::fs::write(dir.path().join("a.tera"), "select 2")?;
        let err = DirSource::new(dir.path()).load(&["a.*"]).unwrap_err();
        assert!(err.to_string().contains("both map to template `a`"));
        Ok(())
    }

    #[test]
    fn memory_source_filters_by_pattern() {
        let source = MemorySource::new([("user/get", "a"), ("user/list", "b"), ("misc", "c")]);
        let loaded = source.load(&["user/*"]).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(source.load(&[]).unwrap().len(), 3);
        assert!(source.load(&["nope/*"]).is_err());
    }
}
