//! Template expansion
//!
//! Stack files are rendered with Tera before parsing, so resource names
//! like `"sg-http-{{ user }}"` pick up per-user or per-environment values.

use crate::error::{FlowError, Result};
use std::collections::HashMap;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{debug, info};

/// Variable context
pub type Variables = HashMap<String, serde_json::Value>;

/// Environment variables with these prefixes are exposed to templates
const ALLOWED_ENV_PREFIXES: &[&str] = &["STACK_", "CI_", "APP_"];

/// Template processor
pub struct TemplateProcessor {
    tera: Tera,
    context: Context,
}

impl TemplateProcessor {
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
            context: Context::new(),
        }
    }

    pub fn add_variable(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.context.insert(key.into(), &value);
    }

    pub fn add_variables(&mut self, variables: Variables) {
        for (key, value) in variables {
            self.context.insert(key, &value);
        }
    }

    /// Add prefix-filtered environment variables (`STACK_*`, `CI_*`, `APP_*`)
    #[tracing::instrument(skip(self))]
    pub fn add_env_variables(&mut self) {
        let mut count = 0;
        for (key, value) in std::env::vars() {
            if ALLOWED_ENV_PREFIXES
                .iter()
                .any(|prefix| key.starts_with(prefix))
            {
                debug!(key = %key, "Adding environment variable");
                self.context.insert(key, &serde_json::Value::String(value));
                count += 1;
            }
        }
        info!(env_var_count = count, "Added filtered environment variables");
    }

    /// Load `KEY=VALUE` lines from a `.env` file.
    ///
    /// Unlike process environment variables these are not prefix-filtered,
    /// since the file was placed next to the stack on purpose.
    #[tracing::instrument(skip(self))]
    pub fn add_env_file_variables(&mut self, env_file_path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(env_file_path).map_err(|e| FlowError::IoError {
            path: env_file_path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut count = 0;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = strip_quotes(value.trim());
                self.context
                    .insert(key, &serde_json::Value::String(value.to_string()));
                count += 1;
            }
        }

        info!(
            env_file = %env_file_path.display(),
            variable_count = count,
            "Loaded variables from .env file"
        );
        Ok(())
    }

    pub fn render_str(&mut self, template: &str) -> Result<String> {
        self.tera
            .render_str(template, &self.context)
            .map_err(|e| FlowError::TemplateRenderError(error_chain(&e)))
    }

    pub fn render_file(&mut self, path: &Path) -> Result<String> {
        let content = std::fs::read_to_string(path).map_err(|e| FlowError::IoError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        self.render_str(&content).map_err(|e| match e {
            FlowError::TemplateRenderError(message) => FlowError::TemplateError {
                file: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Tera nests the useful message in the error source chain
fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Extract the top-level `variables { ... }` block from raw stack content.
///
/// The block is located textually because the rest of the document may
/// contain `{{ ... }}` placeholders that are not valid KDL until rendered.
pub fn extract_variables(kdl_content: &str) -> Result<Variables> {
    use regex::Regex;

    let re = Regex::new(r"(?m)^\s*variables\s*\{")
        .map_err(|e| FlowError::InvalidConfig(format!("regex compile error: {}", e)))?;

    let mut variables = Variables::new();
    let mut scanner = BraceScanner::default();
    let mut scanned = 0;
    for mat in re.find_iter(kdl_content) {
        scanner.feed(&kdl_content[scanned..mat.start()]);
        scanned = mat.start();
        // Blocks nested in a resource (e.g. function environment variables)
        // belong to that resource
        if scanner.depth != 0 || scanner.in_string {
            continue;
        }

        let open = mat.end() - 1;
        let Some(close) = find_matching_brace(kdl_content, open) else {
            return Err(FlowError::InvalidConfig(
                "unterminated variables block".to_string(),
            ));
        };
        let body = &kdl_content[open + 1..close];
        let doc: kdl::KdlDocument = body.parse()?;
        for node in doc.nodes() {
            let key = node.name().value().to_string();
            let Some(entry) = node.entries().first() else {
                continue;
            };
            let value = entry.value();
            let json = if let Some(s) = value.as_string() {
                serde_json::Value::String(s.to_string())
            } else if let Some(b) = value.as_bool() {
                serde_json::Value::Bool(b)
            } else if let Some(i) = value.as_integer() {
                i64::try_from(i)
                    .map(serde_json::Value::from)
                    .unwrap_or_else(|_| serde_json::Value::String(i.to_string()))
            } else if let Some(f) = value.as_float() {
                serde_json::json!(f)
            } else {
                serde_json::Value::Null
            };
            variables.insert(key, json);
        }
    }

    debug!(count = variables.len(), "Extracted stack variables");
    Ok(variables)
}

/// Brace depth outside of string literals
#[derive(Debug, Default)]
struct BraceScanner {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl BraceScanner {
    /// Advance over one character; true when it closed the outermost block
    fn step(&mut self, c: char) -> bool {
        if self.in_string {
            match c {
                '\\' if !self.escaped => self.escaped = true,
                '"' if !self.escaped => self.in_string = false,
                _ => self.escaped = false,
            }
            return false;
        }
        match c {
            '"' => self.in_string = true,
            '{' => self.depth += 1,
            '}' => {
                self.depth = self.depth.saturating_sub(1);
                return self.depth == 0;
            }
            _ => {}
        }
        false
    }

    fn feed(&mut self, text: &str) {
        for c in text.chars() {
            self.step(c);
        }
    }
}

/// Index of the `}` matching the `{` at `open`
fn find_matching_brace(content: &str, open: usize) -> Option<usize> {
    let mut scanner = BraceScanner::default();
    content[open..]
        .char_indices()
        .find(|&(_, c)| scanner.step(c))
        .map(|(i, _)| open + i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_simple_variable_expansion() {
        let mut processor = TemplateProcessor::new();
        processor.add_variable("user", serde_json::Value::String("wyne".to_string()));

        let result = processor
            .render_str(r#"resource "sg-http-{{ user }}" kind="security-group""#)
            .unwrap();
        assert_eq!(result, r#"resource "sg-http-wyne" kind="security-group""#);
    }

    #[test]
    fn test_undefined_variable_is_error() {
        let mut processor = TemplateProcessor::new();
        let err = processor.render_str("{{ missing }}").unwrap_err();
        assert!(matches!(err, FlowError::TemplateRenderError(_)));
    }

    #[test]
    fn test_extract_variables() {
        let content = r#"
stack "demo"
variables {
    user "wyne"
    replicas 2
    public #true
}
resource "sg-{{ user }}" kind="security-group"
"#;
        let vars = extract_variables(content).unwrap();
        assert_eq!(vars.get("user"), Some(&serde_json::json!("wyne")));
        assert_eq!(vars.get("replicas"), Some(&serde_json::json!(2)));
        assert_eq!(vars.get("public"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn test_extract_variables_skips_nested_blocks() {
        let content = r#"
variables {
    user "wyne"
}
resource "fn" kind="function" {
    variables {
        user "lambda"
        LOG_LEVEL "debug"
    }
}
"#;
        let vars = extract_variables(content).unwrap();
        assert_eq!(vars.get("user"), Some(&serde_json::json!("wyne")));
        assert!(!vars.contains_key("LOG_LEVEL"));
    }

    #[test]
    fn test_extract_variables_ignores_braces_in_strings() {
        let content = r#"
variables {
    banner "{not a block}"
}
"#;
        let vars = extract_variables(content).unwrap();
        assert_eq!(vars.get("banner"), Some(&serde_json::json!("{not a block}")));
    }

    #[test]
    fn test_extract_variables_without_block() {
        let vars = extract_variables(r#"resource "b" kind="bucket""#).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn test_env_file_variables() {
        let temp_dir = tempfile::tempdir().unwrap();
        let env_path = temp_dir.path().join(".env");
        std::fs::write(&env_path, "# comment\nREGION=\"ap-northeast-1\"\n\nUSER='wyne'\n").unwrap();

        let mut processor = TemplateProcessor::new();
        processor.add_env_file_variables(&env_path).unwrap();
        assert_eq!(
            processor.render_str("{{ REGION }}/{{ USER }}").unwrap(),
            "ap-northeast-1/wyne"
        );
    }

    #[test]
    #[serial]
    fn test_env_variables_are_prefix_filtered() {
        unsafe {
            std::env::set_var("STACK_TEST_OWNER", "ops");
            std::env::set_var("SECRET_TEST_TOKEN", "hidden");
        }

        let mut processor = TemplateProcessor::new();
        processor.add_env_variables();
        assert_eq!(processor.render_str("{{ STACK_TEST_OWNER }}").unwrap(), "ops");
        assert!(processor.render_str("{{ SECRET_TEST_TOKEN }}").is_err());

        unsafe {
            std::env::remove_var("STACK_TEST_OWNER");
            std::env::remove_var("SECRET_TEST_TOKEN");
        }
    }
}
