pub mod db;
pub use db::{Builder, Config, Db};

mod duration;

pub mod migrate;
pub use migrate::{Applied, MigrateOptions, MigrationConfig, Migrator, Outcome};

pub mod registry;
pub use registry::{Registry, Resolve, UrlResolver};

pub mod router;
pub use router::{Router, RouterConfig};

pub use strata_core::{
    driver::{Capability, Driver},
    schema::{
        app::{FieldDefinition, FieldType, Reference, TableDefinition},
        db::Table,
        operation::SchemaOperation,
    },
    Checksum, Error, Ledger, MigrationRecord, PartialFailure, Result, Scope, ScopeContext, Target,
    Violation,
};
