mod describe;

use mysql_async::{prelude::Queryable, Conn, Pool};
use std::{borrow::Cow, collections::HashSet, time::Duration};
use strata_core::{
    async_trait,
    driver::{Capability, Driver, Operation, Transaction},
    migration::{advisory_lock_id, LedgerDetail, LedgerRow},
    schema::db::Table,
    Error, Result,
};
use url::Url;

/// Longest name `GET_LOCK` accepts.
const MAX_LOCK_NAME: usize = 64;

#[derive(Debug)]
pub struct MySQL {
    url: String,
    pool: Pool,
}

impl MySQL {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url_str = url.into();
        let url = Url::parse(&url_str).map_err(Error::driver_operation_failed)?;

        if url.scheme() != "mysql" {
            return Err(Error::invalid_connection_url(format!(
                "connection url does not have a `mysql` scheme; url={url_str}"
            )));
        }

        url.host_str().ok_or_else(|| {
            Error::invalid_connection_url(format!("missing host in connection URL; url={url_str}"))
        })?;

        if url.path().trim_start_matches('/').is_empty() {
            return Err(Error::invalid_connection_url(format!(
                "no database specified - missing path in connection URL; url={url_str}"
            )));
        }

        let opts = mysql_async::Opts::from_url(url.as_ref())
            .map_err(|err| Error::invalid_connection_url(err.to_string()))?;
        let opts = mysql_async::OptsBuilder::from_opts(opts).client_found_rows(true);

        Ok(Self {
            url: url_str,
            pool: Pool::new(opts),
        })
    }
}

#[async_trait]
impl Driver for MySQL {
    fn url(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.url)
    }

    fn capability(&self) -> &'static Capability {
        &Capability::MYSQL
    }

    async fn connect(&self) -> Result<Box<dyn strata_core::Connection>> {
        let conn = self
            .pool
            .get_conn()
            .await
            .map_err(Error::driver_operation_failed)?;
        Ok(Box::new(Connection::new(conn)))
    }
}

#[derive(Debug)]
pub struct Connection {
    conn: Conn,

    /// Named locks held by this session.
    held: HashSet<String>,
}

impl Connection {
    pub fn new(conn: Conn) -> Self {
        Self {
            conn,
            held: HashSet::new(),
        }
    }

    async fn query_drop(&mut self, sql: &str) -> Result<()> {
        self.conn
            .query_drop(sql)
            .await
            .map_err(Error::driver_operation_failed)
    }
}

impl From<Conn> for Connection {
    fn from(conn: Conn) -> Self {
        Self::new(conn)
    }
}

/// `GET_LOCK` names are limited to 64 characters.
fn lock_name(key: &str) -> String {
    if key.len() <= MAX_LOCK_NAME {
        key.to_string()
    } else {
        format!("strata_migrate:{:016x}", advisory_lock_id(key))
    }
}

#[async_trait]
impl strata_core::Connection for Connection {
    async fn exec(&mut self, op: Operation) -> Result<u64> {
        match op {
            Operation::Sql(sql) => {
                tracing::trace!(%sql, "executing");
                self.query_drop(&sql).await?;
                Ok(self.conn.affected_rows())
            }
            Operation::Transaction(Transaction::Start) => {
                self.query_drop("START TRANSACTION").await.map(|_| 0)
            }
            Operation::Transaction(Transaction::Commit) => self.query_drop("COMMIT").await.map(|_| 0),
            Operation::Transaction(Transaction::Rollback) => {
                self.query_drop("ROLLBACK").await.map(|_| 0)
            }
        }
    }

    async fn lock(&mut self, key: &str, timeout: Duration) -> Result<bool> {
        let name = lock_name(key);

        if self.held.contains(&name) {
            return Ok(true);
        }

        tracing::debug!(key, ?timeout, "waiting for named lock");

        let acquired: Option<Option<i64>> = self
            .conn
            .exec_first("SELECT GET_LOCK(?, ?)", (&name, timeout.as_secs_f64()))
            .await
            .map_err(Error::driver_operation_failed)?;

        if acquired.flatten() == Some(1) {
            self.held.insert(name);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn unlock(&mut self, key: &str) -> Result<()> {
        let name = lock_name(key);

        // A wait cut short may have been granted without being recorded.
        // `RELEASE_LOCK` on a lock held elsewhere or not at all is harmless.
        self.held.remove(&name);
        self.conn
            .exec_drop("SELECT RELEASE_LOCK(?)", (&name,))
            .await
            .map_err(Error::driver_operation_failed)?;

        Ok(())
    }

    async fn ensure_ledger(&mut self) -> Result<()> {
        self.query_drop(
            "CREATE TABLE IF NOT EXISTS migrations (
                id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                timestamp BIGINT NOT NULL,
                name VARCHAR(255) NOT NULL UNIQUE
            )",
        )
        .await?;

        self.query_drop(
            "CREATE TABLE IF NOT EXISTS migration_definitions (
                name VARCHAR(255) NOT NULL PRIMARY KEY,
                scope VARCHAR(32) NOT NULL,
                `database` VARCHAR(255) NOT NULL,
                table_name VARCHAR(255) NOT NULL,
                parent VARCHAR(255),
                reversible BOOLEAN NOT NULL,
                definition LONGTEXT NOT NULL,
                operations LONGTEXT NOT NULL
            )",
        )
        .await
    }

    async fn ledger(&mut self) -> Result<Vec<LedgerRow>> {
        type Row = (
            u64,
            String,
            i64,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<bool>,
            Option<String>,
            Option<String>,
        );

        let rows: Vec<Row> = self
            .conn
            .query(
                "SELECT m.id, m.name, m.timestamp,
                        d.scope, d.`database`, d.table_name, d.parent,
                        d.reversible, d.definition, d.operations
                 FROM migrations m
                 LEFT JOIN migration_definitions d ON d.name = m.name
                 ORDER BY m.id",
            )
            .await
            .map_err(Error::driver_operation_failed)?;

        Ok(rows
            .into_iter()
            .map(
                |(id, name, timestamp, scope, database, table, parent, reversible, definition, operations)| {
                    let detail = match (scope, database, table, definition, operations) {
                        (Some(scope), Some(database), Some(table), Some(definition), Some(operations)) => {
                            Some(LedgerDetail {
                                scope,
                                database,
                                table,
                                parent,
                                reversible: reversible.unwrap_or(false),
                                definition,
                                operations,
                            })
                        }
                        _ => None,
                    };

                    LedgerRow {
                        id,
                        name,
                        timestamp,
                        detail,
                    }
                },
            )
            .collect())
    }

    async fn insert_record(
        &mut self,
        name: &str,
        timestamp: i64,
        detail: &LedgerDetail,
    ) -> Result<u64> {
        self.conn
            .exec_drop(
                "INSERT INTO migrations (timestamp, name) VALUES (?, ?)",
                (timestamp, name),
            )
            .await
            .map_err(Error::driver_operation_failed)?;

        let id = self
            .conn
            .last_insert_id()
            .ok_or_else(|| Error::invalid_ledger("ledger insert returned no id"))?;

        self.conn
            .exec_drop(
                "INSERT INTO migration_definitions
                    (name, scope, `database`, table_name, parent, reversible, definition, operations)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    name,
                    &detail.scope,
                    &detail.database,
                    &detail.table,
                    &detail.parent,
                    detail.reversible,
                    &detail.definition,
                    &detail.operations,
                ),
            )
            .await
            .map_err(Error::driver_operation_failed)?;

        Ok(id)
    }

    async fn delete_record(&mut self, name: &str) -> Result<()> {
        self.conn
            .exec_drop("DELETE FROM migration_definitions WHERE name = ?", (name,))
            .await
            .map_err(Error::driver_operation_failed)?;
        self.conn
            .exec_drop("DELETE FROM migrations WHERE name = ?", (name,))
            .await
            .map_err(Error::driver_operation_failed)?;
        Ok(())
    }

    async fn describe_table(&mut self, name: &str) -> Result<Option<Table>> {
        describe::table(&mut self.conn, name).await
    }
}
