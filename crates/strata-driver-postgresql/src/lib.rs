mod describe;

use std::{borrow::Cow, collections::HashSet, time::Duration};
use strata_core::{
    async_trait,
    driver::{Capability, Driver, Operation, Transaction},
    migration::{advisory_lock_id, LedgerDetail, LedgerRow},
    schema::db::Table,
    Error, Result,
};
use tokio::time::Instant;
use tokio_postgres::{tls::MakeTlsConnect, Client, Config, NoTls, Socket};
use url::Url;

/// Interval between `pg_try_advisory_lock` attempts while waiting for the
/// migration lock.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct PostgreSQL {
    url: String,
    config: Config,
}

impl PostgreSQL {
    /// Creates a driver for a `postgresql://` connection URL.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url_str = url.into();
        let url = Url::parse(&url_str).map_err(Error::driver_operation_failed)?;

        if url.scheme() != "postgresql" && url.scheme() != "postgres" {
            return Err(Error::invalid_connection_url(format!(
                "connection URL does not have a `postgresql` scheme; url={url_str}"
            )));
        }

        let host = url.host_str().ok_or_else(|| {
            Error::invalid_connection_url(format!("missing host in connection URL; url={url_str}"))
        })?;

        let dbname = url.path().trim_start_matches('/');
        if dbname.is_empty() {
            return Err(Error::invalid_connection_url(format!(
                "no database specified - missing path in connection URL; url={url_str}"
            )));
        }

        let mut config = Config::new();
        config.host(host);
        config.dbname(dbname);

        if let Some(port) = url.port() {
            config.port(port);
        }

        if !url.username().is_empty() {
            config.user(url.username());
        }

        if let Some(password) = url.password() {
            config.password(password);
        }

        Ok(Self {
            url: url_str,
            config,
        })
    }

    /// Connects with a TLS implementation instead of the plaintext default.
    pub async fn connect_with_tls<T>(&self, tls: T) -> Result<Connection>
    where
        T: MakeTlsConnect<Socket> + 'static,
        T::Stream: Send,
    {
        let (client, connection) = self
            .config
            .connect(tls)
            .await
            .map_err(Error::driver_operation_failed)?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(%err, "postgresql connection error");
            }
        });

        Ok(Connection::new(client))
    }
}

#[async_trait]
impl Driver for PostgreSQL {
    fn url(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.url)
    }

    fn capability(&self) -> &'static Capability {
        &Capability::POSTGRESQL
    }

    async fn connect(&self) -> Result<Box<dyn strata_core::Connection>> {
        Ok(Box::new(self.connect_with_tls(NoTls).await?))
    }
}

#[derive(Debug)]
pub struct Connection {
    client: Client,

    /// Advisory lock ids held by this session.
    held: HashSet<i64>,
}

impl Connection {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            held: HashSet::new(),
        }
    }

    async fn batch(&self, sql: &str) -> Result<()> {
        self.client
            .batch_execute(sql)
            .await
            .map_err(Error::driver_operation_failed)
    }
}

impl From<Client> for Connection {
    fn from(client: Client) -> Self {
        Self::new(client)
    }
}

#[async_trait]
impl strata_core::Connection for Connection {
    async fn exec(&mut self, op: Operation) -> Result<u64> {
        match op {
            Operation::Sql(sql) => {
                tracing::trace!(%sql, "executing");
                self.client
                    .execute(sql.as_str(), &[])
                    .await
                    .map_err(Error::driver_operation_failed)
            }
            Operation::Transaction(Transaction::Start) => self.batch("BEGIN").await.map(|_| 0),
            Operation::Transaction(Transaction::Commit) => self.batch("COMMIT").await.map(|_| 0),
            Operation::Transaction(Transaction::Rollback) => {
                self.batch("ROLLBACK").await.map(|_| 0)
            }
        }
    }

    async fn lock(&mut self, key: &str, timeout: Duration) -> Result<bool> {
        let id = advisory_lock_id(key);

        if self.held.contains(&id) {
            return Ok(true);
        }

        let deadline = Instant::now() + timeout;

        loop {
            let row = self
                .client
                .query_one("SELECT pg_try_advisory_lock($1)", &[&id])
                .await
                .map_err(Error::driver_operation_failed)?;

            if row.get::<_, bool>(0) {
                self.held.insert(id);
                return Ok(true);
            }

            if Instant::now() + LOCK_POLL_INTERVAL > deadline {
                return Ok(false);
            }

            tracing::debug!(key, "waiting for advisory lock");
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    async fn unlock(&mut self, key: &str) -> Result<()> {
        let id = advisory_lock_id(key);

        // A wait cut short may have been granted without being recorded.
        // Unlocking a lock this session does not hold only raises a warning.
        self.held.remove(&id);
        self.client
            .execute("SELECT pg_advisory_unlock($1)", &[&id])
            .await
            .map_err(Error::driver_operation_failed)?;

        Ok(())
    }

    async fn ensure_ledger(&mut self) -> Result<()> {
        self.batch(
            "CREATE TABLE IF NOT EXISTS migrations (
                id BIGSERIAL PRIMARY KEY,
                timestamp BIGINT NOT NULL,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS migration_definitions (
                name TEXT PRIMARY KEY,
                scope TEXT NOT NULL,
                database TEXT NOT NULL,
                table_name TEXT NOT NULL,
                parent TEXT,
                reversible BOOLEAN NOT NULL,
                definition TEXT NOT NULL,
                operations TEXT NOT NULL
            );",
        )
        .await
    }

    async fn ledger(&mut self) -> Result<Vec<LedgerRow>> {
        let rows = self
            .client
            .query(
                "SELECT m.id::int8, m.name::text, m.timestamp::int8,
                        d.scope, d.database, d.table_name, d.parent,
                        d.reversible, d.definition, d.operations
                 FROM migrations m
                 LEFT JOIN migration_definitions d ON d.name = m.name
                 ORDER BY m.id",
                &[],
            )
            .await
            .map_err(Error::driver_operation_failed)?;

        rows.iter()
            .map(|row| {
                let scope: Option<String> = row.try_get(3)?;

                let detail = match scope {
                    Some(scope) => Some(LedgerDetail {
                        scope,
                        database: row.try_get(4)?,
                        table: row.try_get(5)?,
                        parent: row.try_get(6)?,
                        reversible: row.try_get(7)?,
                        definition: row.try_get(8)?,
                        operations: row.try_get(9)?,
                    }),
                    None => None,
                };

                Ok(LedgerRow {
                    id: row.try_get::<_, i64>(0)? as u64,
                    name: row.try_get(1)?,
                    timestamp: row.try_get(2)?,
                    detail,
                })
            })
            .collect::<std::result::Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(Error::driver_operation_failed)
    }

    async fn insert_record(
        &mut self,
        name: &str,
        timestamp: i64,
        detail: &LedgerDetail,
    ) -> Result<u64> {
        let row = self
            .client
            .query_one(
                "INSERT INTO migrations (timestamp, name) VALUES ($1, $2) RETURNING id",
                &[&timestamp, &name],
            )
            .await
            .map_err(Error::driver_operation_failed)?;
        let id: i64 = row.get(0);

        self.client
            .execute(
                "INSERT INTO migration_definitions
                    (name, scope, database, table_name, parent, reversible, definition, operations)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    &name,
                    &detail.scope,
                    &detail.database,
                    &detail.table,
                    &detail.parent,
                    &detail.reversible,
                    &detail.definition,
                    &detail.operations,
                ],
            )
            .await
            .map_err(Error::driver_operation_failed)?;

        Ok(id as u64)
    }

    async fn delete_record(&mut self, name: &str) -> Result<()> {
        self.client
            .execute("DELETE FROM migration_definitions WHERE name = $1", &[&name])
            .await
            .map_err(Error::driver_operation_failed)?;
        self.client
            .execute("DELETE FROM migrations WHERE name = $1", &[&name])
            .await
            .map_err(Error::driver_operation_failed)?;
        Ok(())
    }

    async fn describe_table(&mut self, name: &str) -> Result<Option<Table>> {
        describe::table(&self.client, name).await
    }
}
