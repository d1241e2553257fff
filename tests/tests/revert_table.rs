use pretty_assertions::assert_eq;
use strata::{FieldType, MigrateOptions, Outcome, SchemaOperation};
use tests::{acme, destructive, field, invoices, rules, Setup};

#[tokio::test]
async fn reverting_a_table_that_was_never_migrated() {
    let setup = Setup::new();

    let err = setup
        .db
        .revert_table(&acme(), "invoices", &destructive())
        .await
        .unwrap_err();

    assert!(err.is_not_applied());
    assert!(!setup.tables("eam_tenant_acme").contains(&"invoices".to_string()));
}

#[tokio::test]
async fn define_then_revert_restores_the_database() {
    let setup = Setup::new();

    let defined = setup
        .db
        .define_table(&acme(), &invoices(), &MigrateOptions::new())
        .await
        .unwrap();

    let reverted = setup
        .db
        .revert_table(&acme(), "invoices", &destructive())
        .await
        .unwrap();

    assert_eq!(reverted.outcome, Outcome::Reverted);
    assert_eq!(reverted.record.checksum, defined.record.checksum);
    assert!(matches!(
        reverted.operations.last(),
        Some(SchemaOperation::DropTable { table, .. }) if table == "invoices"
    ));

    assert_eq!(
        setup.tables("eam_tenant_acme"),
        ["migration_definitions", "migrations"]
    );
    assert!(setup.db.ledger(&acme()).await.unwrap().records().is_empty());
    assert!(setup
        .db
        .describe_table(&acme(), "invoices")
        .await
        .unwrap()
        .is_none());

    // Defining again reproduces the same record.
    let again = setup
        .db
        .define_table(&acme(), &invoices(), &MigrateOptions::new())
        .await
        .unwrap();
    assert_eq!(again.outcome, Outcome::Applied);
    assert_eq!(again.record.checksum, defined.record.checksum);
}

#[tokio::test]
async fn revert_requires_confirmation() {
    let setup = Setup::new();

    setup
        .db
        .define_table(&acme(), &invoices(), &MigrateOptions::new())
        .await
        .unwrap();

    let err = setup
        .db
        .revert_table(&acme(), "invoices", &MigrateOptions::new())
        .await
        .unwrap_err();
    assert!(rules(&err)
        .iter()
        .all(|(_, rule)| rule == "confirm_destructive"));

    assert!(setup.tables("eam_tenant_acme").contains(&"invoices".to_string()));
    assert_eq!(setup.db.ledger(&acme()).await.unwrap().records().len(), 1);
}

#[tokio::test]
async fn reverting_an_update_restores_the_prior_shape() {
    let setup = Setup::new();
    let options = MigrateOptions::new();

    let defined = setup
        .db
        .define_table(&acme(), &invoices(), &options)
        .await
        .unwrap();

    let mut def = invoices();
    def.fields.push(field("due_date", FieldType::Date));
    setup
        .db
        .update_table(&acme(), &def, &options)
        .await
        .unwrap();

    setup
        .sqlite("eam_tenant_acme")
        .execute(
            "INSERT INTO invoices (amount, due_date) VALUES (7, '2026-03-01')",
            [],
        )
        .unwrap();

    setup
        .db
        .revert_table(&acme(), "invoices", &destructive())
        .await
        .unwrap();

    let table = setup
        .db
        .describe_table(&acme(), "invoices")
        .await
        .unwrap()
        .unwrap();
    assert!(table.column("due_date").is_none());
    assert!(table.column("amount").is_some());

    let ledger = setup.db.ledger(&acme()).await.unwrap();
    assert_eq!(
        ledger.latest("invoices").unwrap().checksum,
        defined.record.checksum
    );

    // The row written before the revert is still there.
    let count: i64 = setup
        .sqlite("eam_tenant_acme")
        .query_row("SELECT COUNT(*) FROM invoices WHERE amount = 7", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(count, 1);

    // The table can evolve again from the restored definition.
    let applied = setup
        .db
        .update_table(&acme(), &def, &options)
        .await
        .unwrap();
    assert_eq!(applied.outcome, Outcome::Applied);
}
