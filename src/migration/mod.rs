//! Migration system for Tideline
//!
//! This module provides:
//! - the [`Migration`] trait, one `change` body per migration
//! - the [`Schema`] operation catalog, where every operation knows its inverse
//! - the version ledger and existence probes
//! - the [`Migrator`] driver that applies and reverts migrations
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::{DateTime, TimeZone, Utc};
//! use sea_query::ColumnDef;
//! use tideline::migration::{CreateTableOptions, ExtensionOptions, Migration, Schema};
//!
//! pub struct CreateUserTable;
//!
//! impl Migration for CreateUserTable {
//!     fn name(&self) -> &str {
//!         "create_user_table"
//!     }
//!
//!     fn date(&self) -> DateTime<Utc> {
//!         Utc.with_ymd_and_hms(2024, 5, 30, 6, 39, 40).unwrap()
//!     }
//!
//!     fn change(&self, s: &Schema<'_>) {
//!         s.add_extension("uuid", ExtensionOptions { if_not_exists: true, ..Default::default() });
//!         s.create_table(
//!             "users",
//!             vec![
//!                 ColumnDef::new("id").uuid().not_null().primary_key().to_owned(),
//!                 ColumnDef::new("email").string().not_null().to_owned(),
//!             ],
//!             CreateTableOptions::default(),
//!         );
//!     }
//! }
//! ```
//!
//! Running it:
//!
//! ```rust,no_run
//! # use tideline::migration::Migration;
//! # fn registered() -> Vec<Box<dyn Migration>> { Vec::new() }
//! use tideline::{connect, Migrator, MigratorOptions, PostgresExecutor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = PostgresExecutor::new(connect("postgresql://localhost/app")?);
//! let migrator = Migrator::new(&executor, MigratorOptions::default());
//!
//! let report = migrator.up(&registered(), None)?;
//! println!("{}", report.to_json()?);
//!
//! // Revert the newest migration
//! migrator.down(&registered(), None)?;
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod direction;
pub mod error;
pub mod ledger;
pub mod migration;
pub mod migrator;
pub mod operations;
mod probes;
pub mod report;
pub mod schema;
pub mod status;
pub mod table_name;
pub mod template;

pub use context::{CancelToken, Journal, MigratorContext, MigratorOptions, SchemaEvent};
pub use direction::{resolve, Direction, MigrationDirection, Resolution, Reversibility};
pub use error::MigrationError;
pub use ledger::{format_version, validate_version};
pub use migration::Migration;
pub use migrator::Migrator;
pub use operations::{
    normalize_extension, CreateTableOptions, DropExtensionOptions, DropSchemaOptions,
    DropTableOptions, ExtensionOptions, SchemaOptions,
};
pub use report::{MigrationOutcome, MigrationReport};
pub use schema::Schema;
pub use status::{MigrationStatus, MigrationSummary};
pub use table_name::TableName;
pub use template::{quote_ident, SqlTemplate};
