use serde_json::Value;
use tera::Context;

use super::registry::TemplateRegistry;
use crate::error::{SqlTemplateError, describe_chain};

/// Raw SQL produced by a template, still carrying `:name` markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedStatement {
    pub name: String,
    pub sql: String,
}

/// Render the named template with `input` as its context.
///
/// Object inputs expose their fields as top-level template variables. `None` (or JSON
/// `null`) renders with an empty context, which suits parameterless templates.
///
/// # Errors
///
/// Returns `TemplateNotFound` for an unknown name and `RenderError` if the input is not an
/// object or the template fails to execute.
pub fn render(
    registry: &TemplateRegistry,
    name: &str,
    input: Option<&Value>,
) -> Result<RenderedStatement, SqlTemplateError> {
    let template = registry.resolve(name)?;
    let context = match input {
        None | Some(Value::Null) => Context::new(),
        Some(value) => {
            Context::from_serialize(value).map_err(|e| SqlTemplateError::RenderError {
                name: name.to_string(),
                message: describe_chain(&e),
            })?
        }
    };
    let sql = template.render(&context)?;
    Ok(RenderedStatement {
        name: template.name().to_string(),
        sql,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::from_templates([
            (
                "user/list",
                "select * from users\
                 {% if where %} where {{ where }}{% endif %}\
                 {% if limit %} limit :limit{% endif %}",
            ),
            ("schema", "create table t (id integer)"),
            ("strict", "select {{ missing.field }}"),
        ])
        .unwrap()
    }

    #[test]
    fn conditionals_shape_the_query() {
        let registry = registry();
        let input = json!({"where": "age > :age", "limit": 10, "age": 3});
        let rendered = render(&registry, "user/list", Some(&input)).unwrap();
        assert_eq!(
            rendered.sql,
            "select * from users where age > :age limit :limit"
        );

        let input = json!({"where": "", "limit": 0});
        let rendered = render(&registry, "user/list", Some(&input)).unwrap();
        assert_eq!(rendered.sql, "select * from users");
    }

    #[test]
    fn nil_input_renders_parameterless_templates() {
        let rendered = render(&registry(), "schema", None).unwrap();
        assert_eq!(rendered.sql, "create table t (id integer)");
    }

    #[test]
    fn failures_are_classified() {
        let registry = registry();
        let err = render(&registry, "nope", None).unwrap_err();
        assert!(matches!(err, SqlTemplateError::TemplateNotFound(_)));

        let err = render(&registry, "strict", Some(&json!({}))).unwrap_err();
        assert!(matches!(err, SqlTemplateError::RenderError { ref name, .. } if name == "strict"));

        let err = render(&registry, "schema", Some(&json!([1, 2]))).unwrap_err();
        assert!(matches!(err, SqlTemplateError::RenderError { .. }));
    }
}
