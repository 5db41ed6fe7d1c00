//! Migration status tracking

/// Migration status information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Applied migrations, oldest first
    pub applied: Vec<MigrationSummary>,

    /// Registered migrations not yet applied, oldest first
    pub pending: Vec<MigrationSummary>,

    /// Versions in the ledger with no registered migration
    pub unknown: Vec<String>,
}

/// Version and name of a registered migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSummary {
    pub version: String,
    pub name: String,
}

impl MigrationStatus {
    /// Check if all migrations are applied
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    /// Get the latest applied migration version
    #[must_use]
    pub fn latest_applied_version(&self) -> Option<&str> {
        self.applied.last().map(|m| m.version.as_str())
    }

    /// Get the next pending migration version
    #[must_use]
    pub fn next_pending_version(&self) -> Option<&str> {
        self.pending.first().map(|m| m.version.as_str())
    }
}
