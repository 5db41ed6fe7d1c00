//! Schema - the handle a migration's `change` body operates on

use super::context::MigratorContext;
use super::direction::MigrationDirection;
use super::error::MigrationError;
use super::template::SqlTemplate;
use crate::executor::Executor;
use may_postgres::types::ToSql;

/// Schema provides the operation catalog to migrations
///
/// It pairs the run's database handle with a [`MigratorContext`]. Operations
/// never return errors: a failure is raised on the context and the operation
/// stops its own work, leaving the rest of the `change` body to run.
///
/// Every operation resolves the context direction first (see
/// [`resolve`](super::direction::resolve)). When it must run its inverse, it
/// does so through [`Schema::rollback_mode`], a copy bound to a
/// `NotReversible` context, so the inverse always executes forward.
pub struct Schema<'run> {
    executor: &'run dyn Executor,
    ctx: MigratorContext<'run>,
}

impl<'run> Schema<'run> {
    /// Create a new Schema over the given executor and context
    pub fn new(executor: &'run dyn Executor, ctx: MigratorContext<'run>) -> Self {
        Self { executor, ctx }
    }

    /// Get the context this handle reports to
    pub fn context(&self) -> &MigratorContext<'run> {
        &self.ctx
    }

    /// Direction operations on this handle observe
    pub fn direction(&self) -> MigrationDirection {
        self.ctx.direction()
    }

    /// Get a reference to the underlying executor
    pub fn executor(&self) -> &'run dyn Executor {
        self.executor
    }

    /// Copy of this handle whose operations always run forward.
    ///
    /// The original handle and its context keep their direction.
    pub(crate) fn rollback_mode(&self) -> Schema<'run> {
        Schema {
            executor: self.executor,
            ctx: self.ctx.not_reversible(),
        }
    }

    pub(crate) fn default_schema(&self) -> &'run str {
        self.ctx.options().schema.as_str()
    }

    /// Render a template, raising on the context if it is malformed.
    pub(crate) fn render(&self, template: SqlTemplate<'_>) -> Option<String> {
        match template.render() {
            Ok(sql) => Some(sql),
            Err(err) => {
                self.ctx.raise(err);
                None
            }
        }
    }

    /// Execute one statement. Returns whether it succeeded.
    pub(crate) fn run(&self, operation: &'static str, sql: &str, params: &[&dyn ToSql]) -> bool {
        if let Err(err) = self.ctx.check_live() {
            self.ctx.raise(err);
            return false;
        }

        log::debug!(target: "tideline::sql", "{sql}");
        match self.executor.execute(sql, params) {
            Ok(_) => true,
            Err(source) => {
                self.ctx.raise(MigrationError::Statement { operation, source });
                false
            }
        }
    }

    /// Run a boolean query; a failure is raised and read as `false`.
    pub(crate) fn probe(&self, operation: &'static str, sql: &str, params: &[&dyn ToSql]) -> bool {
        if let Err(err) = self.ctx.check_live() {
            self.ctx.raise(err);
            return false;
        }

        log::debug!(target: "tideline::sql", "{sql}");
        match self.executor.query_exists(sql, params) {
            Ok(exists) => exists,
            Err(source) => {
                self.ctx.raise(MigrationError::from_query(operation, source));
                false
            }
        }
    }

    /// Run a single-column text query; a failure is raised and read as `None`.
    pub(crate) fn read_strings(
        &self,
        operation: &'static str,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Option<Vec<String>> {
        if let Err(err) = self.ctx.check_live() {
            self.ctx.raise(err);
            return None;
        }

        log::debug!(target: "tideline::sql", "{sql}");
        match self.executor.query_strings(sql, params) {
            Ok(values) => Some(values),
            Err(source) => {
                self.ctx.raise(MigrationError::from_query(operation, source));
                None
            }
        }
    }

    pub(crate) fn skip(&self, operation: &'static str, target: &str) {
        log::warn!("skipped {operation} {target} on rollback: no reversible payload given");
    }
}
