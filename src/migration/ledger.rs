//! Version ledger: the table recording which migrations are applied
//!
//! One row per applied migration, keyed by the version id (the migration's
//! date as `YYYYMMDDHHMMSS` in UTC). The mutations here are bookkeeping run
//! by the driver, so they always execute forward whatever the context
//! direction is.

use super::context::SchemaEvent;
use super::direction::{resolve, Resolution, Reversibility};
use super::error::MigrationError;
use super::schema::Schema;
use super::template::SqlTemplate;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_query::{Alias, ColumnDef, PostgresQueryBuilder, Table, TableCreateStatement};

/// `chrono` format of a version id
pub const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{14}$").expect("version pattern is valid"));

/// Render a migration date as its version id.
pub fn format_version(date: DateTime<Utc>) -> String {
    date.format(VERSION_FORMAT).to_string()
}

/// Check that `version` is a 14-digit timestamp id.
///
/// # Errors
///
/// Returns `MigrationError::InvalidVersion` otherwise.
pub fn validate_version(version: &str) -> Result<(), MigrationError> {
    if VERSION_PATTERN.is_match(version) {
        Ok(())
    } else {
        Err(MigrationError::InvalidVersion(version.to_string()))
    }
}

/// `CREATE TABLE IF NOT EXISTS` statement for the ledger table
pub fn version_table_statement(schema: &str, table: &str) -> TableCreateStatement {
    Table::create()
        .table((Alias::new(schema.to_string()), Alias::new(table.to_string())))
        .if_not_exists()
        .col(
            ColumnDef::new("id")
                .string()
                .string_len(255)
                .not_null()
                .primary_key()
        )
        .to_owned()
}

impl Schema<'_> {
    /// Create the ledger table (and its schema) if missing.
    pub fn ensure_version_table(&self) {
        if !self.bookkeeping_applies() {
            return;
        }
        let options = self.context().options();
        let table = options.version_table_name();
        let schema = table.schema_or(&options.schema);

        let Some(create_schema) = self.render(
            SqlTemplate::new("CREATE SCHEMA IF NOT EXISTS {name}")
                .set("name", super::template::quote_ident(schema)),
        ) else {
            return;
        };
        if !self.run("creating version schema", &create_schema, &[]) {
            return;
        }

        let sql = version_table_statement(schema, table.name()).build(PostgresQueryBuilder);
        if self.run("creating version table", &sql, &[]) {
            self.context().notify(SchemaEvent::VersionTableEnsured {
                table: table.qualified(&options.schema),
            });
        }
    }

    /// Record `version` as applied. Runs forward in every direction.
    pub fn add_version(&self, version: &str) {
        if !self.bookkeeping_applies() {
            return;
        }
        if let Err(err) = validate_version(version) {
            return self.context().raise(err);
        }

        let Some(sql) = self.render(
            SqlTemplate::new("INSERT INTO {version_table} (id) VALUES ($1)")
                .set("version_table", self.version_table()),
        ) else {
            return;
        };

        if self.run("adding version", &sql, &[&version]) {
            self.context().notify(SchemaEvent::VersionCreated {
                version: version.to_string(),
            });
        }
    }

    /// Forget `version`. Runs forward in every direction.
    pub fn remove_version(&self, version: &str) {
        if !self.bookkeeping_applies() {
            return;
        }
        if let Err(err) = validate_version(version) {
            return self.context().raise(err);
        }

        let Some(sql) = self.render(
            SqlTemplate::new("DELETE FROM {version_table} WHERE id = $1")
                .set("version_table", self.version_table()),
        ) else {
            return;
        };

        if self.run("removing version", &sql, &[&version]) {
            self.context().notify(SchemaEvent::VersionDeleted {
                version: version.to_string(),
            });
        }
    }

    /// All applied versions, oldest first.
    ///
    /// On failure the error is raised on the context and the list is empty.
    pub fn find_applied_versions(&self) -> Vec<String> {
        let Some(sql) = self.render(
            SqlTemplate::new("SELECT id FROM {version_table} ORDER BY id ASC")
                .set("version_table", self.version_table()),
        ) else {
            return Vec::new();
        };

        self.read_strings("fetching applied versions", &sql, &[])
            .unwrap_or_default()
    }

    /// Whether the ledger table exists yet.
    pub fn version_table_exists(&self) -> bool {
        self.table_exists(self.context().options().version_table_name())
    }

    // Irreversible always resolves to the primary statement.
    fn bookkeeping_applies(&self) -> bool {
        matches!(
            resolve::<()>(self.direction(), Reversibility::Irreversible),
            Resolution::Primary
        )
    }

    fn version_table(&self) -> String {
        let options = self.context().options();
        options.version_table_name().quoted(&options.schema)
    }
}
