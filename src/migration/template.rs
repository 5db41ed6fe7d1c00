//! SQL templating with named placeholders
//!
//! Statements are written as templates such as
//! `CREATE EXTENSION {if_not_exists} "{name}" {schema}`. Optional clauses are
//! set conditionally; an unset clause renders empty and the surrounding
//! whitespace collapses, so the output never carries doubled or trailing
//! spaces.

use super::error::MigrationError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_][a-z0-9_]*)\}").expect("placeholder pattern is valid"));

/// A statement template plus the values for its placeholders
#[derive(Debug, Clone)]
pub struct SqlTemplate<'t> {
    template: &'t str,
    values: HashMap<&'static str, String>,
}

impl<'t> SqlTemplate<'t> {
    pub fn new(template: &'t str) -> Self {
        Self {
            template,
            values: HashMap::new(),
        }
    }

    #[must_use]
    pub fn set(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    /// Set `key` to `value` when `condition` holds, to the empty string otherwise.
    #[must_use]
    pub fn set_if(self, key: &'static str, condition: bool, value: impl Into<String>) -> Self {
        if condition {
            self.set(key, value)
        } else {
            self.set(key, String::new())
        }
    }

    /// Substitute every placeholder and normalise whitespace.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Template` if a placeholder has no value.
    pub fn render(&self) -> Result<String, MigrationError> {
        if let Some(missing) = PLACEHOLDER
            .captures_iter(self.template)
            .map(|caps| caps[1].to_string())
            .find(|key| !self.values.contains_key(key.as_str()))
        {
            return Err(MigrationError::Template(format!(
                "no value for placeholder {{{missing}}} in {:?}",
                self.template
            )));
        }

        let rendered = PLACEHOLDER.replace_all(self.template, |caps: &regex::Captures<'_>| {
            self.values.get(&caps[1]).cloned().unwrap_or_default()
        });

        Ok(collapse_whitespace(&rendered))
    }
}

/// Quote a PostgreSQL identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// Collapses whitespace runs outside quoted sections and trims the ends.
fn collapse_whitespace(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;

    for c in sql.chars() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if c.is_whitespace() => pending_space = !out.is_empty(),
            None => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }

    out
}
