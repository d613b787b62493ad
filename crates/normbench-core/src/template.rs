//! Prompt templates.
//!
//! The core only needs two things from a template: the variable names it
//! declares, and a rendered string for a context that supplies them.
//! `JinjaTemplate` is the stock implementation.

use std::collections::BTreeSet;
use std::path::Path;

use minijinja::Environment;

use crate::domain::error::TemplateError;

/// Named variables in, rendered string out.
pub trait PromptTemplate: Send + Sync {
    fn name(&self) -> &str;

    /// Top-level variables the template reads.
    fn declared_variables(&self) -> &BTreeSet<String>;

    /// Render against a JSON object context. Every declared variable must be
    /// a key of `context`.
    fn render(&self, context: &serde_json::Value) -> Result<String, TemplateError>;
}

/// Check that `context` supplies every variable `template` declares.
pub fn check_supplied(
    template: &dyn PromptTemplate,
    context: &serde_json::Value,
) -> Result<(), TemplateError> {
    for variable in template.declared_variables() {
        if context.get(variable).is_none() {
            return Err(TemplateError::MissingVariable {
                name: template.name().to_string(),
                variable: variable.clone(),
            });
        }
    }
    Ok(())
}

/// Functions every minijinja environment resolves on its own. A template
/// calling them reads nothing from the render context.
const BUILTIN_GLOBALS: &[&str] = &["range", "dict", "debug", "namespace"];

/// Jinja-syntax template backed by minijinja.
pub struct JinjaTemplate {
    name: String,
    env: Environment<'static>,
    declared: BTreeSet<String>,
}

impl JinjaTemplate {
    /// Compile `source`; syntax errors surface here, not at render time.
    pub fn new(name: &str, source: &str) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.add_template_owned(name.to_string(), source.to_string())
            .map_err(|e| TemplateError::Syntax {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        let declared = env
            .get_template(name)
            .map_err(|e| TemplateError::Syntax {
                name: name.to_string(),
                message: e.to_string(),
            })?
            .undeclared_variables(false)
            .into_iter()
            .filter(|variable| !BUILTIN_GLOBALS.contains(&variable.as_str()))
            .collect();

        Ok(Self {
            name: name.to_string(),
            env,
            declared,
        })
    }

    /// Load and compile a template file; the file name becomes the template name.
    pub fn from_file(path: &Path) -> Result<Self, TemplateError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let source = std::fs::read_to_string(path).map_err(|e| TemplateError::Syntax {
            name: name.clone(),
            message: format!("read {}: {}", path.display(), e),
        })?;
        Self::new(&name, &source)
    }
}

impl PromptTemplate for JinjaTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn declared_variables(&self) -> &BTreeSet<String> {
        &self.declared
    }

    fn render(&self, context: &serde_json::Value) -> Result<String, TemplateError> {
        check_supplied(self, context)?;

        let template = self
            .env
            .get_template(&self.name)
            .map_err(|e| TemplateError::Render {
                name: self.name.clone(),
                message: e.to_string(),
            })?;
        template.render(context).map_err(|e| TemplateError::Render {
            name: self.name.clone(),
            message: e.to_string(),
        })
    }
}

impl std::fmt::Debug for JinjaTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JinjaTemplate")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RAG: &str = "Candidates:\n{% for r in vec_results %}- {{ r.content }}\n{% endfor %}Informal name: {{ informal_name }}{{ eot_token }}";

    #[test]
    fn declared_variables_are_top_level_names() {
        let t = JinjaTemplate::new("rag", RAG).unwrap();
        let vars: Vec<&str> = t.declared_variables().iter().map(String::as_str).collect();
        assert_eq!(vars, vec!["eot_token", "informal_name", "vec_results"]);
    }

    #[test]
    fn renders_candidates_in_order() {
        let t = JinjaTemplate::new("rag", RAG).unwrap();
        let out = t
            .render(&json!({
                "informal_name": "tylenol",
                "eot_token": "",
                "vec_results": [{"content": "Acetaminophen"}, {"content": "Tylenol"}],
            }))
            .unwrap();
        assert_eq!(
            out,
            "Candidates:\n- Acetaminophen\n- Tylenol\nInformal name: tylenol"
        );
    }

    #[test]
    fn missing_variable_is_reported() {
        let t = JinjaTemplate::new("plain", "Name: {{ informal_name }}").unwrap();
        let err = t.render(&json!({})).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::MissingVariable { variable, .. } if variable == "informal_name"
        ));
    }

    #[test]
    fn builtin_functions_are_not_declared_variables() {
        let t = JinjaTemplate::new(
            "loop",
            "{% set ns = namespace(n=0) %}{% for i in range(2) %}{{ informal_name }}{% endfor %}",
        )
        .unwrap();
        let vars: Vec<&str> = t.declared_variables().iter().map(String::as_str).collect();
        assert_eq!(vars, vec!["informal_name"]);

        let out = t.render(&json!({"informal_name": "x"})).unwrap();
        assert_eq!(out, "xx");
    }

    #[test]
    fn syntax_error_fails_construction() {
        let err = JinjaTemplate::new("broken", "{% for x in %}").unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { .. }));
    }

    #[test]
    fn from_file_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm.j2");
        std::fs::write(&path, "Name: {{ informal_name }}").unwrap();

        let t = JinjaTemplate::from_file(&path).unwrap();
        assert_eq!(t.name(), "llm.j2");
    }
}
