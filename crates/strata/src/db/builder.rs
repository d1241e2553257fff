use super::{Db, PoolConfig};
use crate::{
    migrate::MigrationConfig,
    registry::{Registry, Resolve, UrlResolver},
    router::{Router, RouterConfig},
    Result, Scope,
};

use serde::Deserialize;
use std::sync::Arc;

/// Everything a [`Db`] can be configured with, in the shape host
/// applications embed in their own configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    pub pool: PoolConfig,
    pub router: RouterConfig,
    pub migration: MigrationConfig,

    /// Connection URL templates, used unless a resolver is set on the
    /// builder.
    pub connections: UrlResolver,
}

#[derive(Default)]
pub struct Builder {
    config: Config,

    /// Takes precedence over `config.connections`
    resolver: Option<Arc<dyn Resolve>>,
}

impl Builder {
    pub fn from_config(config: Config) -> Builder {
        Builder {
            config,
            resolver: None,
        }
    }

    pub fn pool(&mut self, config: PoolConfig) -> &mut Self {
        self.config.pool = config;
        self
    }

    pub fn router(&mut self, config: RouterConfig) -> &mut Self {
        self.config.router = config;
        self
    }

    pub fn migration(&mut self, config: MigrationConfig) -> &mut Self {
        self.config.migration = config;
        self
    }

    /// Set the prefix of every database name
    pub fn prefix(&mut self, prefix: &str) -> &mut Self {
        self.config.router.prefix = prefix.to_string();
        self
    }

    /// Connection URL template for scopes without their own, containing a
    /// `{database}` placeholder.
    pub fn url(&mut self, template: &str) -> &mut Self {
        self.config.connections.default = Some(template.to_string());
        self
    }

    /// Connection URL template for databases in `scope`.
    pub fn scope_url(&mut self, scope: Scope, template: &str) -> &mut Self {
        self.config.connections.scopes.insert(scope, template.to_string());
        self
    }

    /// Resolve drivers with `resolver` instead of the URL templates.
    pub fn resolver(&mut self, resolver: impl Resolve) -> &mut Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Builds the handle. No database is contacted until first use.
    pub fn build(&self) -> Result<Db> {
        let router = Router::new(&self.config.router)?;

        let resolver: Arc<dyn Resolve> = match &self.resolver {
            Some(resolver) => resolver.clone(),
            None => Arc::new(self.config.connections.clone()),
        };
        let registry = Registry::new(resolver, self.config.pool.clone());

        Ok(Db::new(router, registry, self.config.migration.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn config_deserializes_nested_sections() {
        let config: Config = serde_json::from_str(
            r#"{
                "pool": {"max_size": 2},
                "router": {"prefix": "ops"},
                "migration": {"lock_timeout": 250, "deadline": 10000},
                "connections": {"default": "sqlite:///srv/{database}.db"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.pool.max_size, 2);
        assert_eq!(config.router.prefix, "ops");
        assert_eq!(config.migration.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.migration.deadline, Some(Duration::from_secs(10)));
        assert_eq!(
            config.connections.default.as_deref(),
            Some("sqlite:///srv/{database}.db")
        );
    }

    #[test]
    fn build_rejects_an_invalid_prefix() {
        let err = Db::builder().prefix("Bad-Prefix").build().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn build_does_not_connect() {
        let db = Db::builder()
            .url("postgresql://nobody@unreachable.invalid/{database}")
            .build()
            .unwrap();
        assert!(db.registry().targets().is_empty());
    }
}
