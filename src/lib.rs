//! # Tideline
//!
//! Reversible schema migrations for PostgreSQL over `may_postgres`.
//!
//! A migration exposes a single [`Migration::change`] body. The same body is
//! replayed forward when applying and reversed when rolling back: operations
//! with a natural inverse derive it automatically, destructive operations
//! reverse only when the author says what to recreate.
//!
//! See [`migration`] for the execution model.

pub mod config;
pub mod connection;
pub mod executor;
pub mod migration;

#[cfg(test)]
mod test_helpers;

pub use config::{DatabaseConfig, TidelineConfig};
pub use connection::{connect, ConnectionError};
pub use executor::{DbError, Executor, PostgresExecutor};
pub use migration::{
    CancelToken, Direction, Migration, MigrationDirection, MigrationError, MigrationReport,
    MigrationStatus, Migrator, MigratorContext, MigratorOptions, Schema, TableName,
};
