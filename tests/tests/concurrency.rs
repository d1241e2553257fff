use strata::{FieldType, MigrateOptions, Outcome, TableDefinition};
use strata_core::{migration::lock_key, Connection};
use tests::{acme, invoices, required, Setup};

use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_defines_apply_once() {
    let setup = Setup::new();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let db = setup.db.clone();
            tokio::spawn(async move {
                db.define_table(&acme(), &invoices(), &MigrateOptions::new())
                    .await
            })
        })
        .collect();

    let mut outcomes = vec![];
    for task in tasks {
        outcomes.push(task.await.unwrap().unwrap().outcome);
    }

    let applied = outcomes
        .iter()
        .filter(|outcome| **outcome == Outcome::Applied)
        .count();
    assert_eq!(applied, 1);
    assert!(outcomes
        .iter()
        .all(|outcome| matches!(outcome, Outcome::Applied | Outcome::Unchanged)));

    let ledger = setup.db.ledger(&acme()).await.unwrap();
    assert_eq!(ledger.records().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tables_of_one_database_migrate_in_turn() {
    let setup = Setup::new();

    let tasks: Vec<_> = ["assets", "locations", "vendors", "parts"]
        .into_iter()
        .map(|name| {
            let db = setup.db.clone();
            let def = TableDefinition::new(name, vec![required("label", FieldType::String)]);
            tokio::spawn(async move {
                db.define_table(&acme(), &def, &MigrateOptions::new())
                    .await
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().outcome, Outcome::Applied);
    }

    let ledger = setup.db.ledger(&acme()).await.unwrap();
    assert_eq!(ledger.records().len(), 4);
}

#[tokio::test]
async fn a_held_lock_is_contention() {
    let setup = Setup::new();
    let key = lock_key("eam_tenant_acme");

    let mut holder = strata_driver_sqlite::Connection::open(setup.path("eam_tenant_acme")).unwrap();
    assert!(holder.lock(&key, Duration::from_secs(1)).await.unwrap());

    let options = MigrateOptions::new().lock_timeout(Duration::from_millis(50));
    let err = setup
        .db
        .define_table(&acme(), &invoices(), &options)
        .await
        .unwrap_err();
    assert!(err.is_lock_contention());
    assert!(err.is_retryable());
    assert!(!setup.tables("eam_tenant_acme").contains(&"invoices".to_string()));

    holder.unlock(&key).await.unwrap();

    let applied = setup
        .db
        .define_table(&acme(), &invoices(), &options)
        .await
        .unwrap();
    assert_eq!(applied.outcome, Outcome::Applied);
}

#[tokio::test]
async fn an_expired_deadline_leaves_nothing_behind() {
    let setup = Setup::new();

    let options = MigrateOptions::new().deadline(Duration::ZERO);
    let err = setup
        .db
        .define_table(&acme(), &invoices(), &options)
        .await
        .unwrap_err();
    assert!(err.is_deadline_exceeded());

    assert!(!setup.tables("eam_tenant_acme").contains(&"invoices".to_string()));
    assert!(setup.db.ledger(&acme()).await.unwrap().records().is_empty());

    // The lock was released.
    setup
        .db
        .define_table(&acme(), &invoices(), &MigrateOptions::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn an_expired_call_closes_its_connection() {
    let setup = Setup::new();
    let target = setup.db.target(&acme()).unwrap();

    setup.db.ledger(&acme()).await.unwrap();
    let pool = setup.db.registry().pool(&target).unwrap();
    assert_eq!(pool.size(), 1);

    let options = MigrateOptions::new().deadline(Duration::ZERO);
    let err = setup
        .db
        .define_table(&acme(), &invoices(), &options)
        .await
        .unwrap_err();
    assert!(err.is_deadline_exceeded());
    assert_eq!(pool.size(), 0);

    setup
        .db
        .define_table(&acme(), &invoices(), &MigrateOptions::new())
        .await
        .unwrap();
    assert_eq!(pool.size(), 1);
}
