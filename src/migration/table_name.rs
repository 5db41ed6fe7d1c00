//! Schema-qualified table names

use super::template::quote_ident;
use std::fmt;

/// A `(schema, name)` pair; the schema falls back to the configured default
///
/// `"billing.invoices"` parses into schema `billing` and name `invoices`;
/// `"invoices"` leaves the schema open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    schema: Option<String>,
    name: String,
}

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.split_once('.') {
            Some((schema, table)) if !schema.is_empty() && !table.is_empty() => Self {
                schema: Some(schema.to_string()),
                name: table.to_string(),
            },
            _ => Self { schema: None, name },
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// The explicit schema, or `default` when none was given.
    pub fn schema_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.schema.as_deref().unwrap_or(default)
    }

    /// `"schema"."name"` with identifiers quoted.
    pub fn quoted(&self, default_schema: &str) -> String {
        format!(
            "{}.{}",
            quote_ident(self.schema_or(default_schema)),
            quote_ident(&self.name)
        )
    }

    /// Rendering with the default schema filled in, used in events and logs.
    pub fn qualified(&self, default_schema: &str) -> String {
        format!("{}.{}", self.schema_or(default_schema), self.name)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl From<&str> for TableName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TableName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}
