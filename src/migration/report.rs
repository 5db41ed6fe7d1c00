//! What a driver run did, for logs and dry-run style reporting

use super::context::SchemaEvent;
use super::direction::Direction;
use serde::Serialize;

/// Result of one `up` or `down` run
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub direction: Direction,
    pub migrations: Vec<MigrationOutcome>,
}

/// One migration applied or reverted during a run
#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    pub version: String,
    pub name: String,
    pub elapsed_ms: u64,
    /// Changes recorded by the migration's operations, in order
    pub events: Vec<SchemaEvent>,
}

impl MigrationReport {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            migrations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn versions(&self) -> Vec<&str> {
        self.migrations.iter().map(|m| m.version.as_str()).collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
