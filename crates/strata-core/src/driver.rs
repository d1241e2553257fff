mod capability;
pub use capability::{Capability, Dialect, SchemaMutations};

pub mod operation;
pub use operation::{Operation, Transaction};

use crate::{async_trait, migration::LedgerDetail, migration::LedgerRow, schema::db, Result};

use std::{borrow::Cow, fmt::Debug, time::Duration};

#[async_trait]
pub trait Driver: Debug + Send + Sync + 'static {
    /// Returns the URL this driver is connecting to.
    fn url(&self) -> Cow<'_, str>;

    /// Describes the driver's capability, which informs SQL lowering.
    fn capability(&self) -> &'static Capability;

    /// Creates a new connection to the database.
    ///
    /// This method is called by the connection pool whenever a new
    /// connection is needed.
    async fn connect(&self) -> Result<Box<dyn Connection>>;

    /// Returns the maximum number of simultaneous database connections
    /// supported. For example, this is `Some(1)` for an in-memory SQLite
    /// database because every connection opens a separate database.
    fn max_connections(&self) -> Option<usize> {
        None
    }
}

#[async_trait]
pub trait Connection: Debug + Send + 'static {
    /// Execute a database operation and return the affected row count.
    async fn exec(&mut self, op: Operation) -> Result<u64>;

    /// Acquire the migration lock named `key`, waiting at most `timeout`.
    ///
    /// Returns `false` when the lock is still held elsewhere after the
    /// timeout.
    async fn lock(&mut self, key: &str, timeout: Duration) -> Result<bool>;

    /// Release a lock acquired with [`Connection::lock`].
    async fn unlock(&mut self, key: &str) -> Result<()>;

    /// Create the ledger tables if they do not exist yet.
    async fn ensure_ledger(&mut self) -> Result<()>;

    /// Read every ledger row, in insertion order.
    async fn ledger(&mut self) -> Result<Vec<LedgerRow>>;

    /// Insert a ledger row and its detail, returning the assigned id.
    async fn insert_record(&mut self, name: &str, timestamp: i64, detail: &LedgerDetail)
        -> Result<u64>;

    /// Delete the ledger row named `name` and its detail.
    async fn delete_record(&mut self, name: &str) -> Result<()>;

    /// Read back the physical schema of a table, or `None` if it does not
    /// exist.
    async fn describe_table(&mut self, name: &str) -> Result<Option<db::Table>>;
}
