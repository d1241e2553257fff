//! Connection pooling for database connections.

use std::{
    ops::{Deref, DerefMut},
    time::Duration,
};

pub use deadpool::managed::Timeouts;
use deadpool::managed::PoolError;
use serde::Deserialize;
use strata_core::{
    driver::{Capability, Connection, Driver},
    Error, Result,
};

/// Get the default maximum size of a pool, which is `cpu_core_count * 2`
/// including logical cores (Hyper-Threading).
fn get_default_pool_max_size() -> usize {
    deadpool::managed::PoolConfig::default().max_size
}

/// Configuration for connection pool behavior.
///
/// Timeouts are given in milliseconds when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PoolConfig {
    pub max_size: usize,

    /// How long to wait for a free connection.
    #[serde(deserialize_with = "crate::duration::millis_opt")]
    pub wait_timeout: Option<Duration>,

    /// How long to wait for a new connection to open.
    #[serde(deserialize_with = "crate::duration::millis_opt")]
    pub create_timeout: Option<Duration>,

    #[serde(deserialize_with = "crate::duration::millis_opt")]
    pub recycle_timeout: Option<Duration>,
}

impl PoolConfig {
    /// Creates a new pool configuration with default settings.
    pub fn new() -> Self {
        Self {
            max_size: get_default_pool_max_size(),
            wait_timeout: None,
            create_timeout: None,
            recycle_timeout: None,
        }
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    pub fn create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = Some(timeout);
        self
    }

    pub fn recycle_timeout(mut self, timeout: Duration) -> Self {
        self.recycle_timeout = Some(timeout);
        self
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts {
            wait: self.wait_timeout,
            create: self.create_timeout,
            recycle: self.recycle_timeout,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A connection pool for one database.
///
/// No connection is opened until the first [`Pool::get`].
#[derive(Debug)]
pub struct Pool {
    inner: deadpool::managed::Pool<Manager>,
    capability: &'static Capability,
}

impl Pool {
    /// Creates a new connection pool from the given driver.
    pub fn new(driver: Box<dyn Driver>, config: &PoolConfig) -> Result<Self> {
        let capability = driver.capability();
        let max_size = match driver.max_connections() {
            Some(max_connections) => max_connections.min(config.max_size),
            None => config.max_size,
        };

        let inner = deadpool::managed::Pool::builder(Manager { driver })
            .runtime(deadpool::Runtime::Tokio1)
            .max_size(max_size)
            .timeouts(config.timeouts())
            .build()
            .map_err(Error::connection_pool)?;

        Ok(Self { inner, capability })
    }

    /// Retrieves a connection from the pool.
    pub async fn get(&self) -> Result<PoolConnection> {
        let connection = self.inner.get().await.map_err(|err| match err {
            PoolError::Backend(err) => err,
            err => Error::connection_pool(err),
        })?;
        Ok(PoolConnection { inner: connection })
    }

    /// Returns the database driver's capabilities.
    pub fn capability(&self) -> &'static Capability {
        self.capability
    }

    /// URL of the database this pool connects to.
    pub fn url(&self) -> String {
        self.inner.manager().driver.url().into_owned()
    }

    /// Closes the pool. Idle connections are dropped right away, checked out
    /// ones when they are returned.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Number of open connections, idle or checked out.
    pub fn size(&self) -> usize {
        self.inner.status().size
    }
}

#[derive(Debug)]
struct Manager {
    driver: Box<dyn Driver>,
}

impl deadpool::managed::Manager for Manager {
    type Type = Box<dyn Connection>;
    type Error = Error;

    async fn create(&self) -> std::result::Result<Self::Type, Self::Error> {
        self.driver.connect().await
    }

    async fn recycle(
        &self,
        _obj: &mut Self::Type,
        _metrics: &deadpool::managed::Metrics,
    ) -> deadpool::managed::RecycleResult<Self::Error> {
        Ok(())
    }
}

/// A connection retrieved from a pool.
///
/// When dropped, the connection is returned to the pool for reuse.
pub struct PoolConnection {
    inner: deadpool::managed::Object<Manager>,
}

impl std::fmt::Debug for PoolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConnection").finish_non_exhaustive()
    }
}

impl PoolConnection {
    /// Removes the connection from its pool and closes it.
    pub fn discard(self) {
        drop(deadpool::managed::Object::take(self.inner));
    }
}

impl Deref for PoolConnection {
    type Target = Box<dyn Connection>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for PoolConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
