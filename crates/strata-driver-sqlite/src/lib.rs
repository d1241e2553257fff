mod describe;
mod lock;

use rusqlite::{params, Connection as RusqliteConnection, OptionalExtension};
use std::{
    borrow::Cow,
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};
use strata_core::{
    async_trait,
    driver::{Capability, Driver, Operation, Transaction},
    migration::{LedgerDetail, LedgerRow},
    schema::db::Table,
    Error, Result,
};
use tokio::sync::OwnedMutexGuard;
use url::Url;

/// How long a statement waits on a database file locked by another
/// connection before failing with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum Sqlite {
    File(PathBuf),
    InMemory,
}

impl Sqlite {
    /// Create a new SQLite driver with an arbitrary connection URL
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url_str = url.into();
        let url = Url::parse(&url_str).map_err(Error::driver_operation_failed)?;

        if url.scheme() != "sqlite" {
            return Err(Error::invalid_connection_url(format!(
                "connection URL does not have a `sqlite` scheme; url={url_str}"
            )));
        }

        if url.path() == ":memory:" {
            Ok(Self::InMemory)
        } else {
            Ok(Self::File(PathBuf::from(url.path())))
        }
    }

    /// Create an in-memory SQLite database
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    /// Open a SQLite database at the specified file path
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }
}

#[async_trait]
impl Driver for Sqlite {
    fn url(&self) -> Cow<'_, str> {
        match self {
            Sqlite::InMemory => Cow::Borrowed("sqlite::memory:"),
            Sqlite::File(path) => Cow::Owned(format!("sqlite:{}", path.display())),
        }
    }

    fn capability(&self) -> &'static Capability {
        &Capability::SQLITE
    }

    async fn connect(&self) -> Result<Box<dyn strata_core::Connection>> {
        let connection = match self {
            Sqlite::File(path) => Connection::open(path)?,
            Sqlite::InMemory => Connection::in_memory()?,
        };
        Ok(Box::new(connection))
    }

    fn max_connections(&self) -> Option<usize> {
        matches!(self, Self::InMemory).then_some(1)
    }
}

#[derive(Debug)]
pub struct Connection {
    connection: RusqliteConnection,

    /// Namespace for in-process migration locks. Connections to the same
    /// file share it.
    lock_namespace: String,

    /// Migration locks held by this connection, by key.
    held: HashMap<String, OwnedMutexGuard<()>>,
}

impl Connection {
    pub fn in_memory() -> Result<Self> {
        let connection =
            RusqliteConnection::open_in_memory().map_err(Error::driver_operation_failed)?;

        // Every in-memory connection is its own database
        let lock_namespace = format!(":memory:{}", lock::unique_id());
        Self::configure(connection, lock_namespace)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let connection = RusqliteConnection::open(path).map_err(Error::driver_operation_failed)?;

        let lock_namespace = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string();
        Self::configure(connection, lock_namespace)
    }

    fn configure(connection: RusqliteConnection, lock_namespace: String) -> Result<Self> {
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(Error::driver_operation_failed)?;

        Ok(Self {
            connection,
            lock_namespace,
            held: HashMap::new(),
        })
    }

    fn execute(&self, sql: &str) -> Result<u64> {
        let count = self
            .connection
            .execute(sql, [])
            .map_err(Error::driver_operation_failed)?;
        Ok(count as u64)
    }
}

#[async_trait]
impl strata_core::Connection for Connection {
    async fn exec(&mut self, op: Operation) -> Result<u64> {
        match op {
            Operation::Sql(sql) => {
                tracing::trace!(%sql, "executing");
                self.execute(&sql)
            }
            // Take the write lock up front so a second writer waits for the
            // whole migration instead of failing partway through
            Operation::Transaction(Transaction::Start) => self.execute("BEGIN IMMEDIATE"),
            Operation::Transaction(Transaction::Commit) => self.execute("COMMIT"),
            Operation::Transaction(Transaction::Rollback) => self.execute("ROLLBACK"),
        }
    }

    async fn lock(&mut self, key: &str, timeout: Duration) -> Result<bool> {
        if self.held.contains_key(key) {
            return Ok(true);
        }

        let mutex = lock::named(&self.lock_namespace, key);

        match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => {
                self.held.insert(key.to_string(), guard);
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    async fn unlock(&mut self, key: &str) -> Result<()> {
        self.held.remove(key);
        Ok(())
    }

    async fn ensure_ledger(&mut self) -> Result<()> {
        self.connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS migrations (
                    id INTEGER PRIMARY KEY,
                    timestamp INTEGER NOT NULL,
                    name TEXT NOT NULL UNIQUE
                );
                CREATE TABLE IF NOT EXISTS migration_definitions (
                    name TEXT PRIMARY KEY,
                    scope TEXT NOT NULL,
                    database TEXT NOT NULL,
                    table_name TEXT NOT NULL,
                    parent TEXT,
                    reversible INTEGER NOT NULL,
                    definition TEXT NOT NULL,
                    operations TEXT NOT NULL
                );",
            )
            .map_err(Error::driver_operation_failed)
    }

    async fn ledger(&mut self) -> Result<Vec<LedgerRow>> {
        let mut stmt = self
            .connection
            .prepare(
                "SELECT m.id, m.name, m.timestamp,
                        d.scope, d.database, d.table_name, d.parent,
                        d.reversible, d.definition, d.operations
                 FROM migrations m
                 LEFT JOIN migration_definitions d ON d.name = m.name
                 ORDER BY m.id",
            )
            .map_err(Error::driver_operation_failed)?;

        let rows = stmt
            .query_map([], |row| {
                let scope: Option<String> = row.get(3)?;

                let detail = match scope {
                    Some(scope) => Some(LedgerDetail {
                        scope,
                        database: row.get(4)?,
                        table: row.get(5)?,
                        parent: row.get(6)?,
                        reversible: row.get(7)?,
                        definition: row.get(8)?,
                        operations: row.get(9)?,
                    }),
                    None => None,
                };

                Ok(LedgerRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    timestamp: row.get(2)?,
                    detail,
                })
            })
            .map_err(Error::driver_operation_failed)?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::driver_operation_failed)
    }

    async fn insert_record(
        &mut self,
        name: &str,
        timestamp: i64,
        detail: &LedgerDetail,
    ) -> Result<u64> {
        self.connection
            .execute(
                "INSERT INTO migrations (timestamp, name) VALUES (?1, ?2)",
                params![timestamp, name],
            )
            .map_err(Error::driver_operation_failed)?;
        let id = self.connection.last_insert_rowid();

        self.connection
            .execute(
                "INSERT INTO migration_definitions
                    (name, scope, database, table_name, parent, reversible, definition, operations)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    name,
                    detail.scope,
                    detail.database,
                    detail.table,
                    detail.parent,
                    detail.reversible,
                    detail.definition,
                    detail.operations,
                ],
            )
            .map_err(Error::driver_operation_failed)?;

        Ok(id as u64)
    }

    async fn delete_record(&mut self, name: &str) -> Result<()> {
        self.connection
            .execute(
                "DELETE FROM migration_definitions WHERE name = ?1",
                params![name],
            )
            .map_err(Error::driver_operation_failed)?;
        self.connection
            .execute("DELETE FROM migrations WHERE name = ?1", params![name])
            .map_err(Error::driver_operation_failed)?;
        Ok(())
    }

    async fn describe_table(&mut self, name: &str) -> Result<Option<Table>> {
        let sql: Option<String> = self
            .connection
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::driver_operation_failed)?;

        match sql {
            Some(sql) => describe::table(&self.connection, name, &sql).map(Some),
            None => Ok(None),
        }
    }
}
