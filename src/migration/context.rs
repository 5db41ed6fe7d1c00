//! Per-run migration state
//!
//! A [`MigratorContext`] is a small `Copy` value: the direction an operation
//! observes plus borrowed handles to the run's options, journal and
//! cancellation token. Overriding the direction produces a new value, so a
//! derived inverse can never change what sibling operations see.

use super::direction::{Direction, MigrationDirection};
use super::error::MigrationError;
use super::table_name::TableName;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Options the driver configures once per run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MigratorOptions {
    /// Default schema for unqualified tables and for the version ledger
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Name of the version ledger table
    #[serde(default = "default_version_table")]
    pub version_table: String,
    /// Wrap each migration in `BEGIN` / `COMMIT`
    #[serde(default = "default_transactional")]
    pub transactional: bool,
    /// Deadline for a whole `up`/`down` run
    #[serde(default)]
    pub run_timeout_seconds: Option<u64>,
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_version_table() -> String {
    "mig_schema_versions".to_string()
}

fn default_transactional() -> bool {
    true
}

impl Default for MigratorOptions {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            version_table: default_version_table(),
            transactional: default_transactional(),
            run_timeout_seconds: None,
        }
    }
}

impl MigratorOptions {
    /// The ledger table, qualified with the configured schema.
    #[must_use]
    pub fn version_table_name(&self) -> TableName {
        TableName::new(self.version_table.as_str()).with_schema(self.schema.as_str())
    }
}

/// Cooperative cancellation flag shared between a driver and whoever stops it
///
/// Checked before each statement and query, so a statement already running
/// finishes first. Bound long statements with `run_timeout_seconds` instead.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A schema change that completed successfully
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchemaEvent {
    ExtensionCreated { name: String, schema: Option<String> },
    ExtensionDropped { name: String },
    SchemaCreated { name: String },
    SchemaDropped { name: String },
    TableCreated { table: String },
    TableDropped { table: String },
    ColumnRenamed { table: String, from: String, to: String },
    SqlExecuted { sql: String },
    VersionTableEnsured { table: String },
    VersionCreated { version: String },
    VersionDeleted { version: String },
}

/// Errors and events accumulated during one migration's run
#[derive(Debug, Default)]
pub struct Journal {
    errors: RefCell<Vec<MigrationError>>,
    events: RefCell<Vec<SchemaEvent>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.borrow().is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.borrow().len()
    }

    pub fn take_errors(&self) -> Vec<MigrationError> {
        self.errors.take()
    }

    pub fn events(&self) -> Vec<SchemaEvent> {
        self.events.borrow().clone()
    }

    pub fn take_events(&self) -> Vec<SchemaEvent> {
        self.events.take()
    }

    fn push_error(&self, error: MigrationError) {
        self.errors.borrow_mut().push(error);
    }

    fn push_event(&self, event: SchemaEvent) {
        self.events.borrow_mut().push(event);
    }
}

/// State every operation reads: direction, options and where to report
#[derive(Debug, Clone, Copy)]
pub struct MigratorContext<'run> {
    direction: MigrationDirection,
    options: &'run MigratorOptions,
    journal: &'run Journal,
    cancel: &'run CancelToken,
    deadline: Option<Instant>,
}

impl<'run> MigratorContext<'run> {
    pub fn new(
        direction: Direction,
        options: &'run MigratorOptions,
        journal: &'run Journal,
        cancel: &'run CancelToken,
    ) -> Self {
        Self {
            direction: direction.into(),
            options,
            journal,
            cancel,
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn direction(&self) -> MigrationDirection {
        self.direction
    }

    pub fn options(&self) -> &'run MigratorOptions {
        self.options
    }

    pub fn journal(&self) -> &'run Journal {
        self.journal
    }

    /// Copy of this context forced into `NotReversible`.
    ///
    /// Only used to run a derived inverse; `self` is left untouched.
    #[must_use]
    pub fn not_reversible(&self) -> Self {
        Self {
            direction: MigrationDirection::NotReversible,
            ..*self
        }
    }

    /// Record an error without unwinding the migration body.
    pub fn raise(&self, error: MigrationError) {
        log::error!("{error}");
        self.journal.push_error(error);
    }

    /// Record a completed side effect.
    pub fn notify(&self, event: SchemaEvent) {
        self.journal.push_event(event);
    }

    pub fn has_errors(&self) -> bool {
        self.journal.has_errors()
    }

    /// Fails once the run was cancelled or its deadline has passed.
    pub fn check_live(&self) -> Result<(), MigrationError> {
        if self.cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(MigrationError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}
