use pretty_assertions::assert_eq;
use strata::{FieldType, MigrateOptions, Outcome, SchemaOperation};
use tests::{acme, choice, destructive, field, invoices, required, rules, Setup};

#[tokio::test]
async fn adding_an_optional_field() {
    let setup = Setup::new();
    let options = MigrateOptions::new();

    let first = setup
        .db
        .define_table(&acme(), &invoices(), &options)
        .await
        .unwrap();

    let mut def = invoices();
    def.fields.push(field("due_date", FieldType::Date));

    let applied = setup
        .db
        .update_table(&acme(), &def, &options)
        .await
        .unwrap();

    assert_eq!(applied.outcome, Outcome::Applied);
    assert_eq!(applied.record.parent.as_ref(), Some(&first.record.checksum));
    assert!(matches!(
        &applied.operations[..],
        [SchemaOperation::AddColumn { column, .. }] if column.name == "due_date"
    ));

    let table = setup
        .db
        .describe_table(&acme(), "invoices")
        .await
        .unwrap()
        .unwrap();
    assert!(table.column("due_date").unwrap().nullable);

    let ledger = setup.db.ledger(&acme()).await.unwrap();
    assert_eq!(ledger.records().len(), 2);
    assert_eq!(ledger.latest("invoices").unwrap().definition, Some(def));
}

#[tokio::test]
async fn updating_a_table_that_was_never_defined() {
    let setup = Setup::new();

    let err = setup
        .db
        .update_table(&acme(), &invoices(), &MigrateOptions::new())
        .await
        .unwrap_err();

    assert!(err.is_not_applied());
    assert!(!setup.tables("eam_tenant_acme").contains(&"invoices".to_string()));
}

#[tokio::test]
async fn unchanged_update_is_a_noop() {
    let setup = Setup::new();
    let options = MigrateOptions::new();

    setup
        .db
        .define_table(&acme(), &invoices(), &options)
        .await
        .unwrap();
    let applied = setup
        .db
        .update_table(&acme(), &invoices(), &options)
        .await
        .unwrap();

    assert_eq!(applied.outcome, Outcome::Unchanged);
    assert_eq!(setup.db.ledger(&acme()).await.unwrap().records().len(), 1);
}

#[tokio::test]
async fn removing_a_field_requires_confirmation() {
    let setup = Setup::new();

    let mut def = invoices();
    def.fields.push(field("note", FieldType::String));
    setup
        .db
        .define_table(&acme(), &def, &MigrateOptions::new())
        .await
        .unwrap();

    def.fields.retain(|field| field.name != "note");

    let err = setup
        .db
        .update_table(&acme(), &def, &MigrateOptions::new())
        .await
        .unwrap_err();
    assert_eq!(
        rules(&err),
        [(
            "operations[0]".to_string(),
            "confirm_destructive".to_string()
        )]
    );

    let table = setup
        .db
        .describe_table(&acme(), "invoices")
        .await
        .unwrap()
        .unwrap();
    assert!(table.column("note").is_some());

    let applied = setup
        .db
        .update_table(&acme(), &def, &destructive())
        .await
        .unwrap();
    assert!(!applied.record.reversible);

    let table = setup
        .db
        .describe_table(&acme(), "invoices")
        .await
        .unwrap()
        .unwrap();
    assert!(table.column("note").is_none());
}

#[tokio::test]
async fn rows_survive_a_table_rebuild() {
    let setup = Setup::new();
    let options = MigrateOptions::new();

    let mut def = invoices();
    def.fields.push(choice("status", &["draft", "paid"]));
    setup
        .db
        .define_table(&acme(), &def, &options)
        .await
        .unwrap();

    setup
        .sqlite("eam_tenant_acme")
        .execute(
            "INSERT INTO invoices (amount, status) VALUES (12.5, 'paid')",
            [],
        )
        .unwrap();

    // SQLite cannot alter a CHECK in place, so this rebuilds the table.
    def.fields[1] = choice("status", &["draft", "paid", "void"]);
    let applied = setup
        .db
        .update_table(&acme(), &def, &options)
        .await
        .unwrap();
    assert!(matches!(
        &applied.operations[..],
        [SchemaOperation::AlterColumn { .. }]
    ));

    let conn = setup.sqlite("eam_tenant_acme");
    let status: String = conn
        .query_row("SELECT status FROM invoices WHERE amount = 12.5", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(status, "paid");

    conn.execute(
        "INSERT INTO invoices (amount, status) VALUES (1, 'void')",
        [],
    )
    .unwrap();

    assert_eq!(
        setup.tables("eam_tenant_acme"),
        ["invoices", "migration_definitions", "migrations"]
    );
}

#[tokio::test]
async fn adding_a_required_field_to_a_populated_table_fails_cleanly() {
    let setup = Setup::new();
    let options = MigrateOptions::new();

    setup
        .db
        .define_table(&acme(), &invoices(), &options)
        .await
        .unwrap();
    setup
        .sqlite("eam_tenant_acme")
        .execute("INSERT INTO invoices (amount) VALUES (3)", [])
        .unwrap();

    let mut def = invoices();
    def.fields.push(required("number", FieldType::String));

    let err = setup
        .db
        .update_table(&acme(), &def, &options)
        .await
        .unwrap_err();
    let failure = err.partial_failure_details().unwrap();
    assert_eq!(failure.position(), 0);
    assert_eq!(failure.target(), "invoices.number");

    // Rolled back: old shape, old rows, one ledger record.
    let table = setup
        .db
        .describe_table(&acme(), "invoices")
        .await
        .unwrap()
        .unwrap();
    assert!(table.column("number").is_none());
    assert_eq!(setup.db.ledger(&acme()).await.unwrap().records().len(), 1);

    let count: i64 = setup
        .sqlite("eam_tenant_acme")
        .query_row("SELECT COUNT(*) FROM invoices", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn label_changes_are_recorded_without_ddl() {
    let setup = Setup::new();
    let options = MigrateOptions::new();

    setup
        .db
        .define_table(&acme(), &invoices(), &options)
        .await
        .unwrap();

    let mut def = invoices();
    def.display_name = "Customer invoices".to_string();
    def.fields[0].label = "Amount due".to_string();

    let applied = setup
        .db
        .update_table(&acme(), &def, &options)
        .await
        .unwrap();
    assert_eq!(applied.outcome, Outcome::Applied);
    assert!(applied.operations.is_empty());

    let ledger = setup.db.ledger(&acme()).await.unwrap();
    assert_eq!(ledger.latest("invoices").unwrap().definition, Some(def));
}
