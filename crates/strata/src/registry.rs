//! One lazily created connection pool per target database.

use crate::db::{Pool, PoolConfig};

use serde::Deserialize;
use strata_core::{driver::Driver, Error, Result, Scope, Target};

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// Placeholder replaced by the target's database name in URL templates.
pub const DATABASE_PLACEHOLDER: &str = "{database}";

/// Produces the driver for a target database.
pub trait Resolve: Send + Sync + 'static {
    fn driver(&self, target: &Target) -> Result<Box<dyn Driver>>;
}

impl<F> Resolve for F
where
    F: Fn(&Target) -> Result<Box<dyn Driver>> + Send + Sync + 'static,
{
    fn driver(&self, target: &Target) -> Result<Box<dyn Driver>> {
        self(target)
    }
}

/// Resolves targets through connection URL templates, for example
/// `postgresql://app@db.internal/{database}`.
///
/// A scope without its own template uses the default one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct UrlResolver {
    pub default: Option<String>,
    pub scopes: HashMap<Scope, String>,
}

impl UrlResolver {
    pub fn new(default: impl Into<String>) -> UrlResolver {
        UrlResolver {
            default: Some(default.into()),
            scopes: HashMap::new(),
        }
    }

    /// Uses `template` for databases in `scope`.
    pub fn scope(mut self, scope: Scope, template: impl Into<String>) -> UrlResolver {
        self.scopes.insert(scope, template.into());
        self
    }

    /// The connection URL of `target`.
    pub fn url(&self, target: &Target) -> Result<String> {
        let Some(template) = self.scopes.get(&target.scope).or(self.default.as_ref()) else {
            return Err(Error::invalid_connection_url(format!(
                "no connection URL configured for {} scope",
                target.scope
            )));
        };

        if !template.contains(DATABASE_PLACEHOLDER) {
            return Err(Error::invalid_connection_url(format!(
                "connection URL template `{template}` has no `{DATABASE_PLACEHOLDER}` placeholder"
            )));
        }

        Ok(template.replace(DATABASE_PLACEHOLDER, &target.database))
    }
}

impl Resolve for UrlResolver {
    fn driver(&self, target: &Target) -> Result<Box<dyn Driver>> {
        crate::db::driver_for(&self.url(target)?)
    }
}

/// Connection pools keyed by [`Target`].
///
/// The registry lock is only held while a pool is looked up, created or
/// removed, never while a connection is in use.
pub struct Registry {
    resolver: Arc<dyn Resolve>,
    config: PoolConfig,
    pools: Mutex<HashMap<Target, Arc<Pool>>>,
}

impl Registry {
    pub fn new(resolver: Arc<dyn Resolve>, config: PoolConfig) -> Registry {
        Registry {
            resolver,
            config,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the pool for `target`, creating it on first use.
    pub fn pool(&self, target: &Target) -> Result<Arc<Pool>> {
        let mut pools = self.lock();

        if let Some(pool) = pools.get(target) {
            return Ok(pool.clone());
        }

        let driver = self.resolver.driver(target)?;
        let pool = Arc::new(Pool::new(driver, &self.config)?);
        tracing::debug!(
            database = %target.database,
            scope = %target.scope,
            url = %pool.url(),
            "created connection pool"
        );

        pools.insert(target.clone(), pool.clone());
        Ok(pool)
    }

    /// Closes and forgets the pool of `target`. Returns `false` if there was
    /// none.
    pub fn close(&self, target: &Target) -> bool {
        let Some(pool) = self.lock().remove(target) else {
            return false;
        };

        pool.close();
        tracing::debug!(database = %target.database, "closed connection pool");
        true
    }

    /// Closes every pool, returning how many were open.
    pub fn close_all(&self) -> usize {
        let pools = std::mem::take(&mut *self.lock());
        let count = pools.len();

        for (target, pool) in pools {
            pool.close();
            tracing::debug!(database = %target.database, "closed connection pool");
        }

        count
    }

    /// Targets with an open pool.
    pub fn targets(&self) -> Vec<Target> {
        let mut targets: Vec<_> = self.lock().keys().cloned().collect();
        targets.sort();
        targets
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Target, Arc<Pool>>> {
        self.pools.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("targets", &self.targets())
            .finish()
    }
}
