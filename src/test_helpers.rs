//! In-memory stand-in for PostgreSQL used by unit tests
//!
//! `FakeDatabase` understands the statement shapes the operation catalog
//! emits and keeps a tiny catalog (extensions, schemas, tables, the version
//! ledger) so tests can assert on state as well as on captured SQL.

use crate::executor::{DbError, Executor};
use may_postgres::types::ToSql;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap()
}

static CREATE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| pattern(r#"^CREATE EXTENSION (IF NOT EXISTS )?"([^"]+)""#));
static DROP_EXTENSION: Lazy<Regex> = Lazy::new(|| pattern(r#"^DROP EXTENSION (IF EXISTS )?"([^"]+)""#));
static CREATE_SCHEMA: Lazy<Regex> = Lazy::new(|| pattern(r#"^CREATE SCHEMA (IF NOT EXISTS )?"([^"]+)""#));
static DROP_SCHEMA: Lazy<Regex> =
    Lazy::new(|| pattern(r#"^DROP SCHEMA (IF EXISTS )?"([^"]+)"( CASCADE)?"#));
static CREATE_TABLE: Lazy<Regex> =
    Lazy::new(|| pattern(r#"^CREATE TABLE (IF NOT EXISTS )?"([^"]+)"\."([^"]+)""#));
static TABLE_COLUMN: Lazy<Regex> = Lazy::new(|| pattern(r#"[(,]\s*"([^"]+)"\s+[a-z]"#));
static DROP_TABLE: Lazy<Regex> = Lazy::new(|| pattern(r#"^DROP TABLE (IF EXISTS )?"([^"]+)"\."([^"]+)""#));
static RENAME_COLUMN: Lazy<Regex> = Lazy::new(|| {
    pattern(r#"^ALTER TABLE "([^"]+)"\."([^"]+)" RENAME COLUMN "([^"]+)" TO "([^"]+)""#)
});
static INSERT_VERSION: Lazy<Regex> = Lazy::new(|| pattern(r#"^INSERT INTO "([^"]+)"\."([^"]+)" \(id\)"#));
static DELETE_VERSION: Lazy<Regex> = Lazy::new(|| pattern(r#"^DELETE FROM "([^"]+)"\."([^"]+)" WHERE id"#));
static SELECT_VERSIONS: Lazy<Regex> =
    Lazy::new(|| pattern(r#"^SELECT id FROM "([^"]+)"\."([^"]+)"(?: ORDER BY id (ASC|DESC))?$"#));

type TableKey = (String, String);

#[derive(Default)]
struct Catalog {
    extensions: BTreeSet<String>,
    schemas: BTreeSet<String>,
    tables: BTreeMap<TableKey, Vec<String>>,
    indexes: BTreeSet<(String, String, String)>,
    constraints: BTreeSet<(String, String, String)>,
    primary_keys: BTreeSet<TableKey>,
    /// Insertion order, like rows in a heap table
    ledger: Vec<String>,
}

/// Executor double that applies statements to an in-memory catalog
#[derive(Clone)]
pub struct FakeDatabase {
    catalog: Arc<Mutex<Catalog>>,
    statements: Arc<Mutex<Vec<String>>>,
    last_params: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<Vec<(String, DbError)>>>,
    delays: Arc<Mutex<Vec<(String, Duration)>>>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        let mut catalog = Catalog::default();
        catalog.schemas.insert("public".to_string());
        Self {
            catalog: Arc::new(Mutex::new(catalog)),
            statements: Arc::new(Mutex::new(Vec::new())),
            last_params: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(Vec::new())),
            delays: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail every statement or query containing `needle`.
    pub fn fail_on(&self, needle: &str) {
        self.fail_with(needle, DbError::Query(format!("forced failure on {needle}")));
    }

    pub fn fail_with(&self, needle: &str, error: DbError) {
        self.failures.lock().unwrap().push((needle.to_string(), error));
    }

    /// Hold every statement containing `needle` for `delay` before applying it.
    pub fn delay_on(&self, needle: &str, delay: Duration) {
        self.delays.lock().unwrap().push((needle.to_string(), delay));
    }

    /// Statements passed to `execute`, in order. Queries are not captured.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    /// Parameters of the most recent call, rendered without quotes
    pub fn last_params(&self) -> Vec<String> {
        self.last_params.lock().unwrap().clone()
    }

    pub fn extensions(&self) -> Vec<String> {
        self.catalog.lock().unwrap().extensions.iter().cloned().collect()
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.catalog.lock().unwrap().extensions.contains(name)
    }

    pub fn seed_extension(&self, name: &str) {
        self.catalog.lock().unwrap().extensions.insert(name.to_string());
    }

    pub fn has_schema(&self, name: &str) -> bool {
        self.catalog.lock().unwrap().schemas.contains(name)
    }

    pub fn seed_schema(&self, name: &str) {
        self.catalog.lock().unwrap().schemas.insert(name.to_string());
    }

    pub fn has_table(&self, schema: &str, name: &str) -> bool {
        self.catalog.lock().unwrap().tables.contains_key(&key(schema, name))
    }

    pub fn has_column(&self, schema: &str, table: &str, column: &str) -> bool {
        self.catalog
            .lock()
            .unwrap()
            .tables
            .get(&key(schema, table))
            .is_some_and(|columns| columns.iter().any(|c| c == column))
    }

    pub fn seed_table(&self, schema: &str, name: &str, columns: &[&str]) {
        let mut catalog = self.catalog.lock().unwrap();
        catalog.schemas.insert(schema.to_string());
        catalog
            .tables
            .insert(key(schema, name), columns.iter().map(|c| (*c).to_string()).collect());
    }

    pub fn seed_index(&self, schema: &str, table: &str, index: &str) {
        self.catalog
            .lock()
            .unwrap()
            .indexes
            .insert((schema.to_string(), table.to_string(), index.to_string()));
    }

    pub fn seed_constraint(&self, schema: &str, table: &str, constraint: &str) {
        self.catalog
            .lock()
            .unwrap()
            .constraints
            .insert((schema.to_string(), table.to_string(), constraint.to_string()));
    }

    pub fn seed_primary_key(&self, schema: &str, table: &str) {
        self.catalog.lock().unwrap().primary_keys.insert(key(schema, table));
    }

    /// Record a version as applied without going through the ledger SQL.
    pub fn seed_version(&self, version: &str) {
        self.catalog.lock().unwrap().ledger.push(version.to_string());
    }

    /// Applied versions, ascending
    pub fn ledger(&self) -> Vec<String> {
        let mut versions = self.catalog.lock().unwrap().ledger.clone();
        versions.sort();
        versions
    }

    fn capture_params(&self, params: &[&dyn ToSql]) -> Vec<String> {
        let rendered: Vec<String> = params
            .iter()
            .map(|p| format!("{p:?}").trim_matches('"').to_string())
            .collect();
        *self.last_params.lock().unwrap() = rendered.clone();
        rendered
    }

    fn forced_failure(&self, sql: &str) -> Option<DbError> {
        self.failures
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, error)| replay(error))
    }

    fn apply(&self, sql: &str) -> Result<u64, DbError> {
        let mut catalog = self.catalog.lock().unwrap();

        if let Some(caps) = CREATE_EXTENSION.captures(sql) {
            let name = group(&caps, 2);
            if !catalog.extensions.insert(name.clone()) && caps.get(1).is_none() {
                return Err(rejected(format!("extension \"{name}\" already exists")));
            }
        } else if let Some(caps) = DROP_EXTENSION.captures(sql) {
            let name = group(&caps, 2);
            if !catalog.extensions.remove(&name) && caps.get(1).is_none() {
                return Err(rejected(format!("extension \"{name}\" does not exist")));
            }
        } else if let Some(caps) = CREATE_SCHEMA.captures(sql) {
            let name = group(&caps, 2);
            if !catalog.schemas.insert(name.clone()) && caps.get(1).is_none() {
                return Err(rejected(format!("schema \"{name}\" already exists")));
            }
        } else if let Some(caps) = DROP_SCHEMA.captures(sql) {
            let name = group(&caps, 2);
            if !catalog.schemas.remove(&name) {
                return if caps.get(1).is_none() {
                    Err(rejected(format!("schema \"{name}\" does not exist")))
                } else {
                    Ok(0)
                };
            }
            let has_tables = catalog.tables.keys().any(|(schema, _)| *schema == name);
            if has_tables && caps.get(3).is_none() {
                catalog.schemas.insert(name.clone());
                return Err(rejected(format!("cannot drop schema {name} because other objects depend on it")));
            }
            catalog.tables.retain(|(schema, _), _| *schema != name);
        } else if let Some(caps) = CREATE_TABLE.captures(sql) {
            let table = key(&group(&caps, 2), &group(&caps, 3));
            if !catalog.schemas.contains(&table.0) {
                return Err(rejected(format!("schema \"{}\" does not exist", table.0)));
            }
            if catalog.tables.contains_key(&table) {
                return if caps.get(1).is_none() {
                    Err(rejected(format!("relation \"{}\" already exists", table.1)))
                } else {
                    Ok(0)
                };
            }
            let columns = TABLE_COLUMN
                .captures_iter(&sql[caps.get(0).map_or(0, |m| m.end())..])
                .map(|c| group(&c, 1))
                .collect();
            catalog.tables.insert(table, columns);
        } else if let Some(caps) = DROP_TABLE.captures(sql) {
            let table = key(&group(&caps, 2), &group(&caps, 3));
            if catalog.tables.remove(&table).is_none() && caps.get(1).is_none() {
                return Err(rejected(format!("table \"{}\" does not exist", table.1)));
            }
            catalog.primary_keys.remove(&table);
        } else if let Some(caps) = RENAME_COLUMN.captures(sql) {
            let table = key(&group(&caps, 1), &group(&caps, 2));
            let (from, to) = (group(&caps, 3), group(&caps, 4));
            let columns = catalog
                .tables
                .get_mut(&table)
                .ok_or_else(|| rejected(format!("relation \"{}\" does not exist", table.1)))?;
            let column = columns
                .iter_mut()
                .find(|c| **c == from)
                .ok_or_else(|| rejected(format!("column \"{from}\" does not exist")))?;
            *column = to;
        }

        Ok(0)
    }

    fn apply_ledger(&self, sql: &str, params: &[String]) -> Option<Result<u64, DbError>> {
        let (caps, insert) = match (INSERT_VERSION.captures(sql), DELETE_VERSION.captures(sql)) {
            (Some(caps), _) => (caps, true),
            (None, Some(caps)) => (caps, false),
            (None, None) => return None,
        };
        let mut catalog = self.catalog.lock().unwrap();
        if let Err(err) = require_table(&catalog, &caps) {
            return Some(Err(err));
        }

        let version = params.first().cloned().unwrap_or_default();
        Some(if insert {
            if catalog.ledger.contains(&version) {
                Err(rejected(format!("duplicate key value violates unique constraint: {version}")))
            } else {
                catalog.ledger.push(version);
                Ok(1)
            }
        } else {
            let before = catalog.ledger.len();
            catalog.ledger.retain(|v| *v != version);
            Ok((before - catalog.ledger.len()) as u64)
        })
    }
}

impl Executor for FakeDatabase {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, DbError> {
        self.statements.lock().unwrap().push(query.to_string());
        let delay = self
            .delays
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let params = self.capture_params(params);
        if let Some(err) = self.forced_failure(query) {
            return Err(err);
        }

        match self.apply_ledger(query, &params) {
            Some(result) => result,
            None => self.apply(query),
        }
    }

    fn query_exists(&self, query: &str, params: &[&dyn ToSql]) -> Result<bool, DbError> {
        let params = self.capture_params(params);
        if let Some(err) = self.forced_failure(query) {
            return Err(err);
        }

        let param = |i: usize| params.get(i).cloned().unwrap_or_default();
        let catalog = self.catalog.lock().unwrap();

        if query.contains("information_schema.tables") {
            Ok(catalog.tables.contains_key(&key(&param(1), &param(0))))
        } else if query.contains("information_schema.columns") {
            Ok(catalog
                .tables
                .get(&key(&param(2), &param(0)))
                .is_some_and(|columns| columns.contains(&param(1))))
        } else if query.contains("pg_indexes") {
            Ok(catalog.indexes.contains(&(param(2), param(0), param(1))))
        } else if query.contains("'PRIMARY KEY'") {
            Ok(catalog.primary_keys.contains(&key(&param(1), &param(0))))
        } else if query.contains("information_schema.table_constraints") {
            Ok(catalog.constraints.contains(&(param(2), param(0), param(1))))
        } else {
            Err(DbError::Query(format!("unsupported probe: {query}")))
        }
    }

    fn query_strings(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<String>, DbError> {
        self.capture_params(params);
        if let Some(err) = self.forced_failure(query) {
            return Err(err);
        }

        let catalog = self.catalog.lock().unwrap();
        match SELECT_VERSIONS.captures(query) {
            Some(caps) => {
                require_table(&catalog, &caps)?;
                let mut versions = catalog.ledger.clone();
                match caps.get(3).map(|m| m.as_str()) {
                    Some("ASC") => versions.sort(),
                    Some(_) => versions.sort_by(|a, b| b.cmp(a)),
                    None => {}
                }
                Ok(versions)
            }
            None => Err(DbError::Query(format!("unsupported query: {query}"))),
        }
    }
}

fn key(schema: &str, name: &str) -> TableKey {
    (schema.to_string(), name.to_string())
}

fn group(caps: &Captures<'_>, index: usize) -> String {
    caps.get(index).map_or_else(String::new, |m| m.as_str().to_string())
}

fn require_table(catalog: &Catalog, caps: &Captures<'_>) -> Result<(), DbError> {
    let table = key(&group(caps, 1), &group(caps, 2));
    if catalog.tables.contains_key(&table) {
        Ok(())
    } else {
        Err(rejected(format!("relation \"{}.{}\" does not exist", table.0, table.1)))
    }
}

fn rejected(message: String) -> DbError {
    DbError::Query(message)
}

fn replay(error: &DbError) -> DbError {
    match error {
        DbError::Decode(message) => DbError::Decode(message.clone()),
        DbError::Query(message) => DbError::Query(message.clone()),
        other => DbError::Query(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> FakeDatabase {
        let db = FakeDatabase::new();
        db.seed_table("public", "mig_schema_versions", &["id"]);
        for version in ["20240601000000", "20230101000000", "20240315120000"] {
            db.seed_version(version);
        }
        db
    }

    #[test]
    fn test_version_reads_follow_order_by() {
        let db = seeded();
        let base = r#"SELECT id FROM "public"."mig_schema_versions""#;

        assert_eq!(
            db.query_strings(base, &[]).unwrap(),
            vec!["20240601000000", "20230101000000", "20240315120000"]
        );
        assert_eq!(
            db.query_strings(&format!("{base} ORDER BY id ASC"), &[]).unwrap(),
            vec!["20230101000000", "20240315120000", "20240601000000"]
        );
        assert_eq!(
            db.query_strings(&format!("{base} ORDER BY id DESC"), &[]).unwrap(),
            vec!["20240601000000", "20240315120000", "20230101000000"]
        );
    }

    #[test]
    fn test_unrecognised_version_read_is_rejected() {
        let db = seeded();
        let sql = r#"SELECT id FROM "public"."mig_schema_versions" ORDER BY applied_at"#;
        assert!(db.query_strings(sql, &[]).is_err());
    }
}
