//! In-process migration locks.
//!
//! SQLite has no advisory locks. Migrations against the same database file
//! from one process serialize through a named async mutex instead. The
//! mutex for a name lives for the rest of the process.
//!
//! The mutex does not reach other processes. Their transactions still
//! serialize on the file's write lock (`BEGIN IMMEDIATE`), but the ledger is
//! read before that lock is taken, so a process that loses the race reports
//! a rolled back `PartialFailure` instead of an unchanged migration. Run
//! migrations for one database file from a single process.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, OnceLock, PoisonError,
    },
};

type Locks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

fn locks() -> &'static Locks {
    static LOCKS: OnceLock<Locks> = OnceLock::new();
    LOCKS.get_or_init(Default::default)
}

/// The mutex guarding `key` within `namespace`.
pub(crate) fn named(namespace: &str, key: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = locks().lock().unwrap_or_else(PoisonError::into_inner);

    locks
        .entry(format!("{namespace}#{key}"))
        .or_default()
        .clone()
}

pub(crate) fn unique_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_mutex() {
        let a = named("/tmp/eam_platform.db", "strata_migrate:eam_platform");
        let b = named("/tmp/eam_platform.db", "strata_migrate:eam_platform");
        let c = named("/tmp/eam_tenant_acme.db", "strata_migrate:eam_platform");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
