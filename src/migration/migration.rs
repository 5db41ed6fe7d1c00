//! Migration trait definition

use super::ledger::format_version;
use super::schema::Schema;
use chrono::{DateTime, Utc};

/// Trait that all migrations must implement
///
/// A migration describes its schema change once, in [`Migration::change`].
/// The driver replays that body with the context set to `Up` to apply it and
/// to `Down` to revert it; each operation derives its own inverse.
///
/// `change` returns nothing: failures are raised on the schema's context and
/// keep the driver from recording the version.
pub trait Migration {
    /// Get the migration name (human-readable identifier)
    fn name(&self) -> &str;

    /// Creation time; its UTC rendering is the version id
    fn date(&self) -> DateTime<Utc>;

    /// Describe the schema change
    fn change(&self, schema: &Schema<'_>);

    /// Get the migration version (`YYYYMMDDHHMMSS`)
    fn version(&self) -> String {
        format_version(self.date())
    }
}
