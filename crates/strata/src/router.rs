//! Maps a caller's [`ScopeContext`] to the physical database it may touch.

use serde::Deserialize;
use strata_core::{
    schema::verify::{is_identifier, IDENTIFIER_PATTERN},
    Error, Result, Scope, ScopeContext, Target,
};

/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "eam";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RouterConfig {
    /// Prepended to every database name, as in `eam_tenant_acme`.
    pub prefix: String,
}

impl RouterConfig {
    pub fn new() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves scope contexts to targets. There is no fallback between scopes:
/// a tenant context never reaches the platform database.
#[derive(Debug, Clone)]
pub struct Router {
    prefix: String,
}

impl Router {
    pub fn new(config: &RouterConfig) -> Result<Router> {
        if !is_identifier(&config.prefix) {
            return Err(Error::violation(
                "prefix",
                "identifier",
                format!("database prefix `{}` must match {IDENTIFIER_PATTERN}", config.prefix),
            ));
        }

        Ok(Router {
            prefix: config.prefix.clone(),
        })
    }

    pub fn resolve(&self, cx: &ScopeContext) -> Result<Target> {
        let tenant = cx.scope.takes_tenant();
        let instance = cx.scope.takes_instance();

        if !tenant {
            if let Some(id) = &cx.tenant_id {
                return Err(Error::scope_mismatch(
                    cx.scope,
                    format!("tenant id `{id}` given for a scope without tenants"),
                ));
            }
        }
        if !instance {
            if let Some(id) = &cx.instance_id {
                return Err(Error::scope_mismatch(
                    cx.scope,
                    format!("instance id `{id}` given for a scope without instances"),
                ));
            }
        }

        let database = match cx.scope {
            Scope::Platform => format!("{}_platform", self.prefix),
            Scope::ControlPlane => format!("{}_control_plane", self.prefix),
            Scope::Tenant => {
                let id = required(cx.scope, "tenantId", cx.tenant_id.as_deref())?;
                format!("{}_tenant_{id}", self.prefix)
            }
            Scope::Instance => {
                let id = required(cx.scope, "instanceId", cx.instance_id.as_deref())?;
                format!("{}_instance_{id}", self.prefix)
            }
        };

        Ok(Target::new(cx.scope, database))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

fn required<'a>(scope: Scope, field: &str, id: Option<&'a str>) -> Result<&'a str> {
    let Some(id) = id else {
        return Err(Error::scope_mismatch(
            scope,
            format!("{scope} scope requires `{field}`"),
        ));
    };

    // The id becomes part of a database name.
    if !is_identifier(id) {
        return Err(Error::violation(
            field,
            "identifier",
            format!("`{id}` must match {IDENTIFIER_PATTERN}"),
        ));
    }

    Ok(id)
}
