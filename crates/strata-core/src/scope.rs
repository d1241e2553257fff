use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::Error;

/// A database isolation boundary.
///
/// Every physical database belongs to exactly one scope, and every schema
/// operation is compiled for exactly one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Platform,
    Tenant,
    Instance,
    ControlPlane,
}

impl Scope {
    pub const ALL: [Scope; 4] = [
        Scope::Platform,
        Scope::Tenant,
        Scope::Instance,
        Scope::ControlPlane,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Platform => "platform",
            Scope::Tenant => "tenant",
            Scope::Instance => "instance",
            Scope::ControlPlane => "control_plane",
        }
    }

    /// Returns `true` if databases in this scope are keyed by a tenant
    /// identifier.
    pub fn takes_tenant(self) -> bool {
        matches!(self, Scope::Tenant)
    }

    /// Returns `true` if databases in this scope are keyed by an instance
    /// identifier.
    pub fn takes_instance(self) -> bool {
        matches!(self, Scope::Instance)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "platform" => Ok(Scope::Platform),
            "tenant" => Ok(Scope::Tenant),
            "instance" => Ok(Scope::Instance),
            "control_plane" | "control-plane" => Ok(Scope::ControlPlane),
            _ => Err(crate::err!("unknown scope `{s}`")),
        }
    }
}

/// The resolved request context supplied by the caller's authorization
/// layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeContext {
    pub scope: Scope,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

impl ScopeContext {
    pub fn platform() -> Self {
        Self {
            scope: Scope::Platform,
            tenant_id: None,
            instance_id: None,
        }
    }

    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            scope: Scope::Tenant,
            tenant_id: Some(tenant_id.into()),
            instance_id: None,
        }
    }

    pub fn instance(instance_id: impl Into<String>) -> Self {
        Self {
            scope: Scope::Instance,
            tenant_id: None,
            instance_id: Some(instance_id.into()),
        }
    }

    pub fn control_plane() -> Self {
        Self {
            scope: Scope::ControlPlane,
            tenant_id: None,
            instance_id: None,
        }
    }
}

/// A concrete database a plan executes against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target {
    pub scope: Scope,

    /// Physical database identifier, for example `eam_tenant_acme`.
    pub database: String,
}

impl Target {
    pub fn new(scope: Scope, database: impl Into<String>) -> Self {
        Self {
            scope,
            database: database.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.database, self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_names_round_trip() {
        for scope in Scope::ALL {
            assert_eq!(scope, scope.as_str().parse::<Scope>().unwrap());
        }
        assert_eq!(
            Scope::ControlPlane,
            "control-plane".parse::<Scope>().unwrap()
        );
        assert!("global".parse::<Scope>().is_err());
    }

    #[test]
    fn context_deserializes_from_camel_case() {
        let cx: ScopeContext =
            serde_json::from_str(r#"{"scope":"tenant","tenantId":"acme"}"#).unwrap();
        assert_eq!(cx, ScopeContext::tenant("acme"));
    }
}
