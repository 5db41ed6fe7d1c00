//! Read-only existence probes against the catalog views
//!
//! A probe that cannot run raises on the context and answers `false`, so
//! callers treat an unknown state as "does not exist".

use super::schema::Schema;
use super::table_name::TableName;

impl Schema<'_> {
    /// Whether `table` exists, in its own schema or the default one.
    pub fn table_exists(&self, table: impl Into<TableName>) -> bool {
        let table = table.into();
        let schema = table.schema_or(self.default_schema());
        self.probe(
            "checking if table exists",
            "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_name = $1 AND table_schema = $2)",
            &[&table.name(), &schema],
        )
    }

    /// Whether `table` has a column named `column`.
    pub fn column_exists(&self, table: impl Into<TableName>, column: &str) -> bool {
        let table = table.into();
        let schema = table.schema_or(self.default_schema());
        self.probe(
            "checking if column exists",
            "SELECT EXISTS(SELECT 1 FROM information_schema.columns WHERE table_name = $1 AND column_name = $2 AND table_schema = $3)",
            &[&table.name(), &column, &schema],
        )
    }

    /// Whether an index named `index` exists on `table`.
    pub fn index_exists(&self, table: impl Into<TableName>, index: &str) -> bool {
        let table = table.into();
        let schema = table.schema_or(self.default_schema());
        self.probe(
            "checking if index exists",
            "SELECT EXISTS(SELECT 1 FROM pg_indexes WHERE tablename = $1 AND indexname = $2 AND schemaname = $3)",
            &[&table.name(), &index, &schema],
        )
    }

    /// Whether `table` carries a constraint named `constraint`.
    pub fn constraint_exists(&self, table: impl Into<TableName>, constraint: &str) -> bool {
        let table = table.into();
        let schema = table.schema_or(self.default_schema());
        self.probe(
            "checking if constraint exists",
            "SELECT EXISTS(SELECT 1 FROM information_schema.table_constraints WHERE table_name = $1 AND constraint_name = $2 AND constraint_schema = $3)",
            &[&table.name(), &constraint, &schema],
        )
    }

    /// Whether `table` has a primary key.
    pub fn primary_key_exists(&self, table: impl Into<TableName>) -> bool {
        let table = table.into();
        let schema = table.schema_or(self.default_schema());
        self.probe(
            "checking if primary key exists",
            "SELECT EXISTS(SELECT 1 FROM information_schema.table_constraints WHERE table_name = $1 AND constraint_type = 'PRIMARY KEY' AND constraint_schema = $2)",
            &[&table.name(), &schema],
        )
    }
}
