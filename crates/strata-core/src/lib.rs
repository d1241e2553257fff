pub mod driver;
pub use driver::{Connection, Driver};

mod error;
pub use error::{Error, IntoError, PartialFailure, Violation};

pub mod migration;
pub use migration::{Checksum, Ledger, MigrationRecord};

pub mod schema;

pub mod scope;
pub use scope::{Scope, ScopeContext, Target};

/// A Result type alias that uses Strata's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

pub use async_trait::async_trait;
