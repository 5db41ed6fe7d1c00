//! Reversible schema operations
//!
//! Each operation follows the same shape: normalise its options, resolve the
//! context direction, render a statement from a template, execute it, and
//! notify the context of the change. Natural inverses:
//!
//! | Operation | Down behaviour |
//! |---|---|
//! | [`Schema::add_extension`] | drops the extension (`IF EXISTS`) |
//! | [`Schema::drop_extension`] | re-creates it only if `reversible` is set |
//! | [`Schema::create_schema`] | drops the schema (`IF EXISTS`) |
//! | [`Schema::drop_schema`] | re-creates it only if `reversible` is set |
//! | [`Schema::create_table`] | drops the table (`IF EXISTS`) |
//! | [`Schema::drop_table`] | re-creates it only if `reversible` columns are set |
//! | [`Schema::rename_column`] | renames the column back |
//! | [`Schema::exec`] | skipped |

use super::context::SchemaEvent;
use super::direction::{resolve, Reversibility, Resolution};
use super::schema::Schema;
use super::table_name::TableName;
use super::template::{quote_ident, SqlTemplate};
use sea_query::{Alias, ColumnDef, PostgresQueryBuilder, Table};

/// Short extension names accepted in place of their registry names
const EXTENSION_ALIASES: &[(&str, &str)] = &[("uuid", "uuid-ossp")];

/// Resolve an extension alias to its registry name.
pub fn normalize_extension(name: &str) -> &str {
    EXTENSION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, canonical)| canonical)
}

/// Options for [`Schema::add_extension`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionOptions {
    pub if_not_exists: bool,
    /// Schema to install the extension's objects into
    pub schema: Option<String>,
}

/// Options for [`Schema::drop_extension`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropExtensionOptions {
    pub if_exists: bool,
    /// How to re-create the extension when this drop is rolled back
    pub reversible: Option<ExtensionOptions>,
}

/// Options for [`Schema::create_schema`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    pub if_not_exists: bool,
}

/// Options for [`Schema::drop_schema`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropSchemaOptions {
    pub if_exists: bool,
    pub cascade: bool,
    /// How to re-create the schema when this drop is rolled back
    pub reversible: Option<SchemaOptions>,
}

/// Options for [`Schema::create_table`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateTableOptions {
    pub if_not_exists: bool,
}

/// Options for [`Schema::drop_table`]
#[derive(Debug, Clone, Default)]
pub struct DropTableOptions {
    pub if_exists: bool,
    pub cascade: bool,
    /// Column definitions to re-create the table with on rollback
    pub reversible: Option<Vec<ColumnDef>>,
}

impl<'run> Schema<'run> {
    /// Install a PostgreSQL extension.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use tideline::migration::{Schema, ExtensionOptions};
    /// # fn change(s: &Schema<'_>) {
    /// s.add_extension("uuid", ExtensionOptions { if_not_exists: true, ..Default::default() });
    /// # }
    /// ```
    ///
    /// Generates:
    ///
    /// ```sql
    /// CREATE EXTENSION IF NOT EXISTS "uuid-ossp"
    /// ```
    ///
    /// Rolled back as `DROP EXTENSION IF EXISTS "uuid-ossp"`.
    pub fn add_extension(&self, name: &str, options: ExtensionOptions) {
        let name = normalize_extension(name);

        let inverse = DropExtensionOptions {
            if_exists: true,
            reversible: None,
        };
        match resolve(self.direction(), Reversibility::Natural(inverse)) {
            Resolution::Inverse(drop) => return self.rollback_mode().drop_extension(name, drop),
            Resolution::Skip => return,
            Resolution::Primary => {}
        }

        let Some(sql) = self.render(
            SqlTemplate::new("CREATE EXTENSION {if_not_exists} {name} {schema}")
                .set_if("if_not_exists", options.if_not_exists, "IF NOT EXISTS")
                .set("name", quote_ident(name))
                .set(
                    "schema",
                    options
                        .schema
                        .as_deref()
                        .map(|schema| format!("SCHEMA {}", quote_ident(schema)))
                        .unwrap_or_default(),
                ),
        ) else {
            return;
        };

        if self.run("adding extension", &sql, &[]) {
            self.context().notify(SchemaEvent::ExtensionCreated {
                name: name.to_string(),
                schema: options.schema,
            });
        }
    }

    /// Remove an installed extension.
    ///
    /// Dropping is destructive, so rolling it back needs to be told what to
    /// re-create:
    ///
    /// ```rust,no_run
    /// # use tideline::migration::{Schema, DropExtensionOptions, ExtensionOptions};
    /// # fn change(s: &Schema<'_>) {
    /// s.drop_extension("uuid", DropExtensionOptions {
    ///     if_exists: true,
    ///     reversible: Some(ExtensionOptions::default()),
    /// });
    /// # }
    /// ```
    ///
    /// Without `reversible` the drop is skipped on rollback.
    pub fn drop_extension(&self, name: &str, options: DropExtensionOptions) {
        let name = normalize_extension(name);

        match resolve(self.direction(), Reversibility::OptIn(options.reversible)) {
            Resolution::Inverse(create) => return self.rollback_mode().add_extension(name, create),
            Resolution::Skip => return self.skip("dropping extension", name),
            Resolution::Primary => {}
        }

        let Some(sql) = self.render(
            SqlTemplate::new("DROP EXTENSION {if_exists} {name}")
                .set_if("if_exists", options.if_exists, "IF EXISTS")
                .set("name", quote_ident(name)),
        ) else {
            return;
        };

        if self.run("dropping extension", &sql, &[]) {
            self.context().notify(SchemaEvent::ExtensionDropped {
                name: name.to_string(),
            });
        }
    }

    /// Create a schema (namespace); rolled back by dropping it.
    pub fn create_schema(&self, name: &str, options: SchemaOptions) {
        let inverse = DropSchemaOptions {
            if_exists: true,
            ..DropSchemaOptions::default()
        };
        match resolve(self.direction(), Reversibility::Natural(inverse)) {
            Resolution::Inverse(drop) => return self.rollback_mode().drop_schema(name, drop),
            Resolution::Skip => return,
            Resolution::Primary => {}
        }

        let Some(sql) = self.render(
            SqlTemplate::new("CREATE SCHEMA {if_not_exists} {name}")
                .set_if("if_not_exists", options.if_not_exists, "IF NOT EXISTS")
                .set("name", quote_ident(name)),
        ) else {
            return;
        };

        if self.run("creating schema", &sql, &[]) {
            self.context().notify(SchemaEvent::SchemaCreated {
                name: name.to_string(),
            });
        }
    }

    /// Drop a schema; reversed only with `reversible`.
    pub fn drop_schema(&self, name: &str, options: DropSchemaOptions) {
        match resolve(self.direction(), Reversibility::OptIn(options.reversible)) {
            Resolution::Inverse(create) => return self.rollback_mode().create_schema(name, create),
            Resolution::Skip => return self.skip("dropping schema", name),
            Resolution::Primary => {}
        }

        let Some(sql) = self.render(
            SqlTemplate::new("DROP SCHEMA {if_exists} {name} {cascade}")
                .set_if("if_exists", options.if_exists, "IF EXISTS")
                .set("name", quote_ident(name))
                .set_if("cascade", options.cascade, "CASCADE"),
        ) else {
            return;
        };

        if self.run("dropping schema", &sql, &[]) {
            self.context().notify(SchemaEvent::SchemaDropped {
                name: name.to_string(),
            });
        }
    }

    /// Create a table from sea-query column definitions.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use tideline::migration::{Schema, CreateTableOptions};
    /// use sea_query::ColumnDef;
    /// # fn change(s: &Schema<'_>) {
    /// s.create_table(
    ///     "users",
    ///     vec![
    ///         ColumnDef::new("id").big_integer().not_null().primary_key().to_owned(),
    ///         ColumnDef::new("email").string().not_null().to_owned(),
    ///     ],
    ///     CreateTableOptions::default(),
    /// );
    /// # }
    /// ```
    ///
    /// Rolled back as `DROP TABLE IF EXISTS "public"."users"`.
    pub fn create_table(
        &self,
        table: impl Into<TableName>,
        columns: Vec<ColumnDef>,
        options: CreateTableOptions,
    ) {
        let table = table.into();

        let inverse = DropTableOptions {
            if_exists: true,
            ..DropTableOptions::default()
        };
        match resolve(self.direction(), Reversibility::Natural(inverse)) {
            Resolution::Inverse(drop) => return self.rollback_mode().drop_table(table, drop),
            Resolution::Skip => return,
            Resolution::Primary => {}
        }

        let schema = table.schema_or(self.default_schema());
        let mut statement = Table::create();
        statement.table((Alias::new(schema.to_string()), Alias::new(table.name().to_string())));
        if options.if_not_exists {
            statement.if_not_exists();
        }
        for mut column in columns {
            statement.col(&mut column);
        }
        let sql = statement.build(PostgresQueryBuilder);

        if self.run("creating table", &sql, &[]) {
            self.context().notify(SchemaEvent::TableCreated {
                table: table.qualified(self.default_schema()),
            });
        }
    }

    /// Drop a table; reversed only when `reversible` columns are given.
    pub fn drop_table(&self, table: impl Into<TableName>, options: DropTableOptions) {
        let table = table.into();

        match resolve(self.direction(), Reversibility::OptIn(options.reversible)) {
            Resolution::Inverse(columns) => {
                let create = CreateTableOptions { if_not_exists: true };
                return self.rollback_mode().create_table(table, columns, create);
            }
            Resolution::Skip => return self.skip("dropping table", &table.to_string()),
            Resolution::Primary => {}
        }

        let Some(sql) = self.render(
            SqlTemplate::new("DROP TABLE {if_exists} {table} {cascade}")
                .set_if("if_exists", options.if_exists, "IF EXISTS")
                .set("table", table.quoted(self.default_schema()))
                .set_if("cascade", options.cascade, "CASCADE"),
        ) else {
            return;
        };

        if self.run("dropping table", &sql, &[]) {
            self.context().notify(SchemaEvent::TableDropped {
                table: table.qualified(self.default_schema()),
            });
        }
    }

    /// Rename a column; rolled back by renaming it back.
    pub fn rename_column(&self, table: impl Into<TableName>, from: &str, to: &str) {
        let table = table.into();

        match resolve(self.direction(), Reversibility::Natural((to, from))) {
            Resolution::Inverse((back_from, back_to)) => {
                return self.rollback_mode().rename_column(table, back_from, back_to)
            }
            Resolution::Skip => return,
            Resolution::Primary => {}
        }

        let Some(sql) = self.render(
            SqlTemplate::new("ALTER TABLE {table} RENAME COLUMN {from} TO {to}")
                .set("table", table.quoted(self.default_schema()))
                .set("from", quote_ident(from))
                .set("to", quote_ident(to)),
        ) else {
            return;
        };

        if self.run("renaming column", &sql, &[]) {
            self.context().notify(SchemaEvent::ColumnRenamed {
                table: table.qualified(self.default_schema()),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
    }

    /// Run raw SQL. It has no derivable inverse and is skipped on rollback;
    /// pair it with [`Schema::reversible`] when the rollback needs SQL too.
    pub fn exec(&self, sql: &str) {
        match resolve::<()>(self.direction(), Reversibility::OptIn(None)) {
            Resolution::Skip => return self.skip("executing raw SQL", sql),
            Resolution::Inverse(()) | Resolution::Primary => {}
        }

        if self.run("executing query", sql, &[]) {
            self.context().notify(SchemaEvent::SqlExecuted {
                sql: sql.to_string(),
            });
        }
    }

    /// Run `up` when applying and `down` when rolling back.
    ///
    /// `down` receives a forward-only handle, so operations inside it run
    /// exactly as written.
    ///
    /// ```rust,no_run
    /// # use tideline::migration::Schema;
    /// # fn change(s: &Schema<'_>) {
    /// s.reversible(
    ///     |s| s.exec("UPDATE users SET active = true"),
    ///     |s| s.exec("UPDATE users SET active = false"),
    /// );
    /// # }
    /// ```
    pub fn reversible(&self, up: impl FnOnce(&Schema<'run>), down: impl FnOnce(&Schema<'run>)) {
        match resolve(self.direction(), Reversibility::Natural(())) {
            Resolution::Inverse(()) => down(&self.rollback_mode()),
            Resolution::Primary => up(self),
            Resolution::Skip => {}
        }
    }
}
