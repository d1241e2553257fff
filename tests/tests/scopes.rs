use pretty_assertions::assert_eq;
use strata::{MigrateOptions, Scope, ScopeContext, Target};
use tests::{acme, invoices, Setup};

use std::sync::Arc;

#[tokio::test]
async fn tenants_get_separate_databases() {
    let setup = Setup::new();
    let globex = ScopeContext::tenant("globex");

    setup
        .db
        .define_table(&acme(), &invoices(), &MigrateOptions::new())
        .await
        .unwrap();

    assert!(setup.path("eam_tenant_acme").exists());
    assert!(setup
        .db
        .describe_table(&globex, "invoices")
        .await
        .unwrap()
        .is_none());
    assert!(setup.db.ledger(&globex).await.unwrap().records().is_empty());
}

#[tokio::test]
async fn every_scope_has_its_own_database() {
    let setup = Setup::new();

    let contexts = [
        ScopeContext::platform(),
        ScopeContext::control_plane(),
        ScopeContext::instance("plant_7"),
        acme(),
    ];

    for cx in &contexts {
        let applied = setup
            .db
            .define_table(cx, &invoices(), &MigrateOptions::new())
            .await
            .unwrap();
        assert_eq!(applied.record.scope, cx.scope);
    }

    assert_eq!(
        setup.db.registry().targets(),
        [
            Target::new(Scope::Platform, "eam_platform"),
            Target::new(Scope::Tenant, "eam_tenant_acme"),
            Target::new(Scope::Instance, "eam_instance_plant_7"),
            Target::new(Scope::ControlPlane, "eam_control_plane"),
        ]
    );
}

#[tokio::test]
async fn mismatched_contexts_are_rejected_before_connecting() {
    let setup = Setup::new();

    let cx = ScopeContext {
        tenant_id: Some("acme".to_string()),
        ..ScopeContext::platform()
    };
    let err = setup
        .db
        .define_table(&cx, &invoices(), &MigrateOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_scope_mismatch());

    let cx = ScopeContext {
        scope: Scope::Tenant,
        tenant_id: None,
        instance_id: None,
    };
    let err = setup
        .db
        .define_table(&cx, &invoices(), &MigrateOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_scope_mismatch());

    assert!(setup.db.registry().targets().is_empty());
    assert!(!setup.path("eam_platform").exists());
}

#[tokio::test]
async fn pools_are_shared_per_target() {
    let setup = Setup::new();
    let target = setup.db.target(&acme()).unwrap();

    let a = setup.db.registry().pool(&target).unwrap();
    let b = setup.db.clone().registry().pool(&target).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let other = setup
        .db
        .registry()
        .pool(&Target::new(Scope::Tenant, "eam_tenant_globex"))
        .unwrap();
    assert!(!Arc::ptr_eq(&a, &other));
}

#[tokio::test]
async fn close_tears_down_every_pool() {
    let setup = Setup::new();
    let target = setup.db.target(&acme()).unwrap();

    setup
        .db
        .define_table(&acme(), &invoices(), &MigrateOptions::new())
        .await
        .unwrap();
    let before = setup.db.registry().pool(&target).unwrap();

    setup.db.close();
    assert!(before.is_closed());
    assert!(setup.db.registry().targets().is_empty());

    // A later call opens a fresh pool.
    let ledger = setup.db.ledger(&acme()).await.unwrap();
    assert_eq!(ledger.records().len(), 1);
    let after = setup.db.registry().pool(&target).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));

    assert!(setup.db.registry().close(&target));
    assert!(!setup.db.registry().close(&target));
}

#[tokio::test]
async fn database_prefix_is_configurable() {
    let setup = Setup::with(|builder| {
        builder.prefix("ops");
    });

    setup
        .db
        .define_table(&acme(), &invoices(), &MigrateOptions::new())
        .await
        .unwrap();

    assert!(setup.path("ops_tenant_acme").exists());
    assert!(!setup.path("eam_tenant_acme").exists());
}
