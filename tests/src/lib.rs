//! Fixtures shared by the end-to-end tests.

mod fake;
pub use fake::FakeConnection;

use strata::{
    db::Builder, Db, FieldDefinition, FieldType, MigrateOptions, Reference, ScopeContext,
    TableDefinition,
};
use tempfile::TempDir;

use std::path::PathBuf;

/// A [`Db`] whose databases are SQLite files in a temporary directory.
pub struct Setup {
    pub db: Db,
    dir: TempDir,
}

impl Setup {
    pub fn new() -> Setup {
        Setup::with(|_| {})
    }

    /// Builds the handle after `configure` adjusted the builder.
    pub fn with(configure: impl FnOnce(&mut Builder)) -> Setup {
        let dir = tempfile::tempdir().unwrap();
        let template = format!("sqlite://{}/{{database}}.db", dir.path().display());

        let mut builder = Db::builder();
        builder.url(&template);
        configure(&mut builder);

        Setup {
            db: builder.build().unwrap(),
            dir,
        }
    }

    /// Path of the file backing `database`.
    pub fn path(&self, database: &str) -> PathBuf {
        self.dir.path().join(format!("{database}.db"))
    }

    /// Opens `database` directly, bypassing strata.
    pub fn sqlite(&self, database: &str) -> rusqlite::Connection {
        rusqlite::Connection::open(self.path(database)).unwrap()
    }

    /// Names of the user tables in `database`, sorted.
    pub fn tables(&self, database: &str) -> Vec<String> {
        if !self.path(database).exists() {
            return vec![];
        }

        let conn = self.sqlite(database);
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type = 'table' \
                 AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .unwrap();
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        names
    }
}

impl Default for Setup {
    fn default() -> Self {
        Setup::new()
    }
}

pub fn acme() -> ScopeContext {
    ScopeContext::tenant("acme")
}

pub fn field(name: &str, ty: FieldType) -> FieldDefinition {
    FieldDefinition::new(name, ty)
}

pub fn required(name: &str, ty: FieldType) -> FieldDefinition {
    FieldDefinition {
        required: true,
        ..FieldDefinition::new(name, ty)
    }
}

pub fn choice(name: &str, options: &[&str]) -> FieldDefinition {
    FieldDefinition {
        options: options.iter().map(|option| option.to_string()).collect(),
        ..FieldDefinition::new(name, FieldType::Choice)
    }
}

pub fn reference(name: &str, table: &str) -> FieldDefinition {
    FieldDefinition {
        reference: Some(Reference::new(table)),
        ..FieldDefinition::new(name, FieldType::Reference)
    }
}

/// `invoices` with a single required `amount`.
pub fn invoices() -> TableDefinition {
    TableDefinition::new("invoices", vec![required("amount", FieldType::Number)])
}

pub fn destructive() -> MigrateOptions {
    MigrateOptions::new().allow_destructive(true)
}

/// `(field, rule)` pairs of a validation error.
pub fn rules(err: &strata::Error) -> Vec<(String, String)> {
    err.violations()
        .unwrap_or_else(|| panic!("expected a validation error, got {err}"))
        .iter()
        .map(|violation| (violation.field.clone(), violation.rule.clone()))
        .collect()
}
