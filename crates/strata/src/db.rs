mod builder;
pub use builder::{Builder, Config};

mod connect;
pub use connect::driver_for;

mod pool;
pub use pool::{Pool, PoolConfig, PoolConnection, Timeouts};

use crate::{
    migrate::{Applied, MigrateOptions, MigrationConfig, Migrator},
    registry::Registry,
    router::Router,
};

use strata_core::{
    schema::{
        app::{Definitions, TableDefinition},
        db::Table,
        verify::verify,
    },
    Ledger, Result, ScopeContext, Target,
};

use std::sync::Arc;

/// Shared state between all `Db` clones.
struct Shared {
    router: Router,
    registry: Registry,
    migration: MigrationConfig,
}

/// Entry point for schema changes across every scoped database.
///
/// Cloning is cheap; clones share the connection pools.
#[derive(Clone)]
pub struct Db {
    shared: Arc<Shared>,
}

impl Db {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub(crate) fn new(router: Router, registry: Registry, migration: MigrationConfig) -> Db {
        Db {
            shared: Arc::new(Shared {
                router,
                registry,
                migration,
            }),
        }
    }

    /// Creates a table in the database selected by `cx`.
    ///
    /// An invalid definition is rejected before any database is contacted.
    pub async fn define_table(
        &self,
        cx: &ScopeContext,
        definition: &TableDefinition,
        options: &MigrateOptions,
    ) -> Result<Applied> {
        verify(definition)?;
        let (target, pool, mut connection) = self.connect(cx).await?;
        let result = self
            .migrator(target, &pool, &mut connection)
            .define(definition, options)
            .await;
        settle(connection, &result);
        result
    }

    /// Migrates an existing table to `definition`.
    pub async fn update_table(
        &self,
        cx: &ScopeContext,
        definition: &TableDefinition,
        options: &MigrateOptions,
    ) -> Result<Applied> {
        verify(definition)?;
        let (target, pool, mut connection) = self.connect(cx).await?;
        let result = self
            .migrator(target, &pool, &mut connection)
            .update(definition, options)
            .await;
        settle(connection, &result);
        result
    }

    /// Down-migrates the latest change of table `name`.
    pub async fn revert_table(
        &self,
        cx: &ScopeContext,
        name: &str,
        options: &MigrateOptions,
    ) -> Result<Applied> {
        let (target, pool, mut connection) = self.connect(cx).await?;
        let result = self
            .migrator(target, &pool, &mut connection)
            .revert_table(name, options)
            .await;
        settle(connection, &result);
        result
    }

    /// Reads back the physical schema of table `name`.
    pub async fn describe_table(&self, cx: &ScopeContext, name: &str) -> Result<Option<Table>> {
        let (target, pool, mut connection) = self.connect(cx).await?;

        let ledger = self.migrator(target, &pool, &mut connection).ledger().await?;
        let physical = ledger
            .definition(name)
            .map(TableDefinition::table_name)
            .unwrap_or(name)
            .to_string();

        connection.describe_table(&physical).await
    }

    /// The ledger of the database selected by `cx`.
    pub async fn ledger(&self, cx: &ScopeContext) -> Result<Ledger> {
        let (target, pool, mut connection) = self.connect(cx).await?;
        self.migrator(target, &pool, &mut connection).ledger().await
    }

    /// The database `cx` routes to.
    pub fn target(&self, cx: &ScopeContext) -> Result<Target> {
        self.shared.router.resolve(cx)
    }

    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    /// Closes every connection pool. Pools are created again on next use.
    pub fn close(&self) {
        let closed = self.shared.registry.close_all();
        tracing::debug!(pools = closed, "closed database handle");
    }

    async fn connect(&self, cx: &ScopeContext) -> Result<(Target, Arc<Pool>, PoolConnection)> {
        let target = self.shared.router.resolve(cx)?;
        let pool = self.shared.registry.pool(&target)?;
        let connection = pool.get().await?;
        Ok((target, pool, connection))
    }

    fn migrator<'c>(
        &self,
        target: Target,
        pool: &Pool,
        connection: &'c mut PoolConnection,
    ) -> Migrator<'c> {
        Migrator::new(
            &mut ***connection,
            pool.capability(),
            target,
            self.shared.migration.clone(),
        )
    }
}

/// A call cut short by its deadline may leave session state behind, such as
/// a migration lock granted after the wait was dropped. Closing the session
/// clears it.
fn settle(connection: PoolConnection, result: &Result<Applied>) {
    if let Err(err) = result {
        if err.is_deadline_exceeded() {
            tracing::debug!("discarding connection after expired deadline");
            connection.discard();
        }
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("prefix", &self.shared.router.prefix())
            .field("registry", &self.shared.registry)
            .finish()
    }
}
