//! Migrator - in-process migration driver

use super::context::{CancelToken, Journal, MigratorContext, MigratorOptions};
use super::direction::Direction;
use super::error::MigrationError;
use super::ledger::validate_version;
use super::migration::Migration;
use super::report::{MigrationOutcome, MigrationReport};
use super::schema::Schema;
use super::status::{MigrationStatus, MigrationSummary};
use crate::executor::Executor;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Runs registered migrations against one database handle
///
/// The `Migrator` decides which migrations to run, sets the direction on a
/// fresh context for each, invokes `change`, and records or removes the
/// version only when the run raised nothing. With `transactional` set, each
/// migration and its ledger update share one `BEGIN`/`COMMIT`.
///
/// Runs are expected to be serialized by the caller; no locking is done here.
pub struct Migrator<'a> {
    executor: &'a dyn Executor,
    options: MigratorOptions,
    cancel: CancelToken,
}

impl<'a> Migrator<'a> {
    pub fn new(executor: &'a dyn Executor, options: MigratorOptions) -> Self {
        Self {
            executor,
            options,
            cancel: CancelToken::new(),
        }
    }

    pub fn options(&self) -> &MigratorOptions {
        &self.options
    }

    /// Token that stops the current and any later run before its next statement.
    ///
    /// Cancelling does not interrupt a statement already on the wire; the
    /// run deadline does, through `statement_timeout`.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Get migration status (applied vs pending)
    ///
    /// Read-only: a database without a ledger table reports everything pending.
    ///
    /// # Errors
    ///
    /// Returns an error if registered versions are malformed or duplicated,
    /// or if the ledger cannot be read.
    pub fn status(&self, migrations: &[Box<dyn Migration>]) -> Result<MigrationStatus, MigrationError> {
        let deadline = self.deadline();
        let registered = sorted_migrations(migrations)?;
        // A missing ledger means nothing was applied yet
        let applied = self.bookkeeping(deadline, |s| {
            if s.version_table_exists() {
                s.find_applied_versions()
            } else {
                Vec::new()
            }
        })?;

        let applied_set: HashSet<&str> = applied.iter().map(String::as_str).collect();
        let registered_set: HashSet<&str> = registered.iter().map(|(v, _)| v.as_str()).collect();

        let mut status = MigrationStatus::default();
        for (version, migration) in &registered {
            let summary = MigrationSummary {
                version: version.clone(),
                name: migration.name().to_string(),
            };
            if applied_set.contains(version.as_str()) {
                status.applied.push(summary);
            } else {
                status.pending.push(summary);
            }
        }
        status.unknown = applied
            .iter()
            .filter(|v| !registered_set.contains(v.as_str()))
            .cloned()
            .collect();

        Ok(status)
    }

    /// Apply pending migrations, oldest first
    ///
    /// `steps` limits how many are applied; `None` applies all of them.
    ///
    /// # Errors
    ///
    /// Stops at the first migration that raises and returns
    /// `MigrationError::Failed`; migrations applied before it stay applied.
    pub fn up(
        &self,
        migrations: &[Box<dyn Migration>],
        steps: Option<usize>,
    ) -> Result<MigrationReport, MigrationError> {
        let deadline = self.deadline();
        let registered = sorted_migrations(migrations)?;
        self.bookkeeping(deadline, |s| s.ensure_version_table())?;
        let applied: HashSet<String> = self
            .bookkeeping(deadline, |s| s.find_applied_versions())?
            .into_iter()
            .collect();

        let pending = registered
            .iter()
            .filter(|(version, _)| !applied.contains(version))
            .take(steps.unwrap_or(usize::MAX));

        let mut report = MigrationReport::new(Direction::Up);
        for (_, migration) in pending {
            report.migrations.push(self.run_one(*migration, Direction::Up, deadline)?);
        }

        if report.is_empty() {
            log::debug!("No pending migrations to apply");
        } else {
            log::info!("Applied {} migration(s)", report.len());
        }
        Ok(report)
    }

    /// Revert applied migrations, newest first
    ///
    /// `steps` defaults to 1.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::UnknownVersion` before running anything if a
    /// version to revert has no registered migration, and
    /// `MigrationError::Failed` if a migration raises while reverting.
    pub fn down(
        &self,
        migrations: &[Box<dyn Migration>],
        steps: Option<usize>,
    ) -> Result<MigrationReport, MigrationError> {
        let deadline = self.deadline();
        let registered: HashMap<String, &dyn Migration> =
            sorted_migrations(migrations)?.into_iter().collect();
        self.bookkeeping(deadline, |s| s.ensure_version_table())?;
        let applied = self.bookkeeping(deadline, |s| s.find_applied_versions())?;

        let targets = applied
            .iter()
            .rev()
            .take(steps.unwrap_or(1))
            .map(|version| {
                registered
                    .get(version)
                    .copied()
                    .ok_or_else(|| MigrationError::UnknownVersion(version.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = MigrationReport::new(Direction::Down);
        for migration in targets {
            report.migrations.push(self.run_one(migration, Direction::Down, deadline)?);
        }

        if report.is_empty() {
            log::debug!("No applied migrations to revert");
        } else {
            log::info!("Reverted {} migration(s)", report.len());
        }
        Ok(report)
    }

    fn run_one(
        &self,
        migration: &dyn Migration,
        direction: Direction,
        deadline: Option<Instant>,
    ) -> Result<MigrationOutcome, MigrationError> {
        let version = migration.version();
        let name = migration.name().to_string();

        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "tideline.migration",
            version = %version,
            name = %name,
            direction = %direction
        )
        .entered();

        log::info!("{} {version} {name}", direction.verb());

        let journal = Journal::new();
        let ctx = MigratorContext::new(direction, &self.options, &journal, &self.cancel)
            .with_deadline(deadline);
        let schema = Schema::new(self.executor, ctx);
        let start = Instant::now();

        let transactional = self.options.transactional;
        let began = !transactional || schema.run("beginning transaction", "BEGIN", &[]);
        if began && self.limit_statement_time(&schema, deadline) {
            migration.change(&schema);

            if !journal.has_errors() {
                match direction {
                    Direction::Up => schema.add_version(&version),
                    Direction::Down => schema.remove_version(&version),
                }
            }
            if transactional && !journal.has_errors() {
                schema.run("committing transaction", "COMMIT", &[]);
            }
        }

        if !transactional && deadline.is_some() {
            self.reset_statement_timeout();
        }

        if let Some(err) = MigrationError::failed(version.as_str(), name.as_str(), journal.take_errors()) {
            if transactional && began {
                self.rollback_transaction();
            }
            return Err(err);
        }

        Ok(MigrationOutcome {
            version,
            name,
            elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            events: journal.take_events(),
        })
    }

    /// Cap every statement of this migration at the time left before the deadline.
    ///
    /// Inside a transaction the setting is `LOCAL` and ends with it; otherwise
    /// it is set on the session and reset once the migration is done.
    fn limit_statement_time(&self, schema: &Schema<'_>, deadline: Option<Instant>) -> bool {
        let Some(deadline) = deadline else {
            return true;
        };
        let remaining = deadline.saturating_duration_since(Instant::now()).as_millis().max(1);
        let scope = if self.options.transactional { "SET LOCAL" } else { "SET" };
        schema.run(
            "limiting statement time",
            &format!("{scope} statement_timeout = {remaining}"),
            &[],
        )
    }

    fn reset_statement_timeout(&self) {
        if let Err(err) = self.executor.execute("RESET statement_timeout", &[]) {
            log::warn!("failed to reset statement_timeout: {err}");
        }
    }

    // Issued straight on the executor so it still goes out after cancellation.
    fn rollback_transaction(&self) {
        if let Err(err) = self.executor.execute("ROLLBACK", &[]) {
            log::warn!("rollback after failed migration also failed: {err}");
        }
    }

    /// Run driver bookkeeping on a forward context, surfacing its first error.
    fn bookkeeping<T>(
        &self,
        deadline: Option<Instant>,
        body: impl FnOnce(&Schema<'_>) -> T,
    ) -> Result<T, MigrationError> {
        let journal = Journal::new();
        let ctx = MigratorContext::new(Direction::Up, &self.options, &journal, &self.cancel)
            .with_deadline(deadline);
        let value = body(&Schema::new(self.executor, ctx));

        match journal.take_errors().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.options
            .run_timeout_seconds
            .map(|secs| Instant::now() + Duration::from_secs(secs))
    }
}

/// Registered migrations keyed and ordered by version.
fn sorted_migrations(
    migrations: &[Box<dyn Migration>],
) -> Result<Vec<(String, &dyn Migration)>, MigrationError> {
    let mut sorted = Vec::with_capacity(migrations.len());
    for migration in migrations {
        let version = migration.version();
        validate_version(&version)?;
        sorted.push((version, &**migration));
    }
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    if let Some(pair) = sorted.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(MigrationError::DuplicateVersion(pair[0].0.clone()));
    }
    Ok(sorted)
}
