use pretty_assertions::assert_eq;
use strata::{FieldType, MigrateOptions, Outcome, Scope, TableDefinition};
use strata_core::schema::db::Type;
use tests::{acme, choice, field, invoices, reference, required, rules, Setup};

#[tokio::test]
async fn define_creates_the_table_in_the_tenant_database() {
    let setup = Setup::new();

    let applied = setup
        .db
        .define_table(&acme(), &invoices(), &MigrateOptions::new())
        .await
        .unwrap();

    assert_eq!(applied.outcome, Outcome::Applied);
    assert_eq!(applied.record.scope, Scope::Tenant);
    assert_eq!(applied.record.database, "eam_tenant_acme");
    assert_eq!(applied.record.table.as_deref(), Some("invoices"));
    assert_eq!(applied.record.parent, None);
    assert!(applied.record.reversible);
    assert_eq!(applied.operations.len(), 2);

    assert_eq!(
        setup.tables("eam_tenant_acme"),
        ["invoices", "migration_definitions", "migrations"]
    );

    let table = setup
        .db
        .describe_table(&acme(), "invoices")
        .await
        .unwrap()
        .unwrap();
    let names: Vec<_> = table.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "amount"]);

    let amount = table.column("amount").unwrap();
    assert_eq!(
        amount.ty,
        Type::Numeric {
            precision: 18,
            scale: 4
        }
    );
    assert!(!amount.nullable);

    let ledger = setup.db.ledger(&acme()).await.unwrap();
    assert_eq!(ledger.records().len(), 1);
    assert_eq!(ledger.records()[0].checksum, applied.record.checksum);
    assert_eq!(ledger.records()[0].definition, Some(invoices()));
}

#[tokio::test]
async fn ledger_rows_keep_the_plain_migrations_shape() {
    let setup = Setup::new();
    let applied = setup
        .db
        .define_table(&acme(), &invoices(), &MigrateOptions::new())
        .await
        .unwrap();

    let conn = setup.sqlite("eam_tenant_acme");
    let (name, timestamp): (String, i64) = conn
        .query_row("SELECT name, timestamp FROM migrations", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();

    assert_eq!(name, applied.record.checksum.as_str());
    assert_eq!(timestamp, applied.record.applied_at.timestamp_millis());
}

#[tokio::test]
async fn defining_the_same_table_twice_is_a_noop() {
    let setup = Setup::new();
    let options = MigrateOptions::new();

    let first = setup
        .db
        .define_table(&acme(), &invoices(), &options)
        .await
        .unwrap();
    let second = setup
        .db
        .define_table(&acme(), &invoices(), &options)
        .await
        .unwrap();

    assert_eq!(second.outcome, Outcome::Unchanged);
    assert!(second.operations.is_empty());
    assert_eq!(second.record.checksum, first.record.checksum);
    assert_eq!(second.record.id, first.record.id);

    let ledger = setup.db.ledger(&acme()).await.unwrap();
    assert_eq!(ledger.records().len(), 1);
}

#[tokio::test]
async fn redefining_a_table_with_changes_is_rejected() {
    let setup = Setup::new();
    let options = MigrateOptions::new();

    setup
        .db
        .define_table(&acme(), &invoices(), &options)
        .await
        .unwrap();

    let mut changed = invoices();
    changed.fields.push(field("due_date", FieldType::Date));

    let err = setup
        .db
        .define_table(&acme(), &changed, &options)
        .await
        .unwrap_err();
    assert_eq!(rules(&err), [("name".to_string(), "exists".to_string())]);
}

#[tokio::test]
async fn invalid_definitions_touch_no_database() {
    let setup = Setup::new();

    let def = TableDefinition::new(
        "1invoices",
        vec![required("amount", FieldType::Number), choice("status", &[])],
    );

    let err = setup
        .db
        .define_table(&acme(), &def, &MigrateOptions::new())
        .await
        .unwrap_err();

    assert_eq!(
        rules(&err),
        [
            ("name".to_string(), "identifier".to_string()),
            ("fields[1].options".to_string(), "options".to_string()),
        ]
    );
    assert!(!setup.path("eam_tenant_acme").exists());
    assert!(setup.db.registry().targets().is_empty());
}

#[tokio::test]
async fn choice_options_are_enforced() {
    let setup = Setup::new();

    let def = TableDefinition::new(
        "invoices",
        vec![
            required("amount", FieldType::Number),
            choice("status", &["draft", "paid"]),
        ],
    );
    setup
        .db
        .define_table(&acme(), &def, &MigrateOptions::new())
        .await
        .unwrap();

    let conn = setup.sqlite("eam_tenant_acme");
    conn.execute(
        "INSERT INTO invoices (amount, status) VALUES (10, 'paid')",
        [],
    )
    .unwrap();
    assert!(conn
        .execute(
            "INSERT INTO invoices (amount, status) VALUES (10, 'void')",
            [],
        )
        .is_err());
}

#[tokio::test]
async fn unique_fields_are_enforced() {
    let setup = Setup::new();

    let mut number = required("number", FieldType::String);
    number.is_unique = true;
    let def = TableDefinition::new("invoices", vec![number]);

    setup
        .db
        .define_table(&acme(), &def, &MigrateOptions::new())
        .await
        .unwrap();

    let table = setup
        .db
        .describe_table(&acme(), "invoices")
        .await
        .unwrap()
        .unwrap();
    assert!(table.constraint("uq_invoices_number").is_some());

    let conn = setup.sqlite("eam_tenant_acme");
    conn.execute("INSERT INTO invoices (number) VALUES ('INV-1')", [])
        .unwrap();
    assert!(conn
        .execute("INSERT INTO invoices (number) VALUES ('INV-1')", [])
        .is_err());
}

#[tokio::test]
async fn references_must_name_a_defined_table() {
    let setup = Setup::new();
    let options = MigrateOptions::new();

    let def = TableDefinition::new(
        "invoices",
        vec![
            required("amount", FieldType::Number),
            reference("customer_id", "customers"),
        ],
    );

    let err = setup
        .db
        .define_table(&acme(), &def, &options)
        .await
        .unwrap_err();
    assert_eq!(
        rules(&err),
        [(
            "fields[1].reference".to_string(),
            "reference".to_string()
        )]
    );

    let customers = TableDefinition::new("customers", vec![required("name", FieldType::String)]);
    setup
        .db
        .define_table(&acme(), &customers, &options)
        .await
        .unwrap();
    setup
        .db
        .define_table(&acme(), &def, &options)
        .await
        .unwrap();

    let table = setup
        .db
        .describe_table(&acme(), "invoices")
        .await
        .unwrap()
        .unwrap();
    let fk = table.foreign_keys().next().unwrap();
    assert_eq!(fk.name, "fk_invoices_customer_id");
    assert_eq!(fk.foreign_table, "customers");
}

#[tokio::test]
async fn definitions_decode_from_the_wire_form() {
    let setup = Setup::new();

    let def = TableDefinition::from_json(
        r#"{
            "name": "work_orders",
            "displayName": "Work orders",
            "category": "maintenance",
            "fields": [
                {"name": "title", "label": "Title", "type": "string", "required": true},
                {"name": "priority", "type": "choice", "options": ["low", "high"], "isIndexed": true},
                {"name": "due", "type": "date", "defaultValue": "2026-01-01"}
            ]
        }"#,
    )
    .unwrap();

    setup
        .db
        .define_table(&acme(), &def, &MigrateOptions::new())
        .await
        .unwrap();

    let table = setup
        .db
        .describe_table(&acme(), "work_orders")
        .await
        .unwrap()
        .unwrap();
    assert!(table.index("idx_work_orders_priority").is_some());
    assert_eq!(table.column("due").unwrap().ty, Type::Date);
}

#[tokio::test]
async fn generated_names_may_not_collide_across_tables() {
    let setup = Setup::new();
    let options = MigrateOptions::new();

    let mut c = field("c", FieldType::String);
    c.is_indexed = true;
    setup
        .db
        .define_table(&acme(), &TableDefinition::new("a_b", vec![c]), &options)
        .await
        .unwrap();

    let mut b_c = field("b_c", FieldType::String);
    b_c.is_indexed = true;
    let err = setup
        .db
        .define_table(&acme(), &TableDefinition::new("a", vec![b_c]), &options)
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(
        rules(&err),
        [("a.idx_a_b_c".to_string(), "name".to_string())]
    );
    assert!(!setup.tables("eam_tenant_acme").contains(&"a".to_string()));
}
