//! Failure paths of the migrator, driven through a scripted connection.

use pretty_assertions::assert_eq;
use strata::{
    Capability, Checksum, FieldType, MigrateOptions, MigrationConfig, MigrationRecord, Migrator,
    Outcome, Scope, TableDefinition, Target,
};
use strata_core::{
    driver::{Operation, Transaction},
    migration::LedgerRow,
    schema::{
        compile::{compile, Prior},
        operation::OperationKind,
    },
};
use tests::{destructive, field, invoices, required, FakeConnection};

use std::{collections::HashMap, time::Duration};

fn target() -> Target {
    Target::new(Scope::Tenant, "eam_tenant_acme")
}

fn no_tables() -> HashMap<String, TableDefinition> {
    HashMap::new()
}

fn numbered_invoices() -> TableDefinition {
    let mut number = required("number", FieldType::String);
    number.is_unique = true;
    TableDefinition::new(
        "invoices",
        vec![required("amount", FieldType::Number), number],
    )
}

fn migrator<'a>(conn: &'a mut FakeConnection, capability: &'static Capability) -> Migrator<'a> {
    Migrator::new(conn, capability, target(), MigrationConfig::default())
}

#[tokio::test]
async fn transactional_failure_rolls_back() {
    let fake = FakeConnection::new();
    fake.fail_on("uq_invoices_number");

    let mut conn = fake.clone();
    let err = migrator(&mut conn, &Capability::POSTGRESQL)
        .define(&numbered_invoices(), &MigrateOptions::new())
        .await
        .unwrap_err();

    let failure = err.partial_failure_details().unwrap();
    assert_eq!(failure.position(), 3);
    assert_eq!(failure.kind(), OperationKind::AddConstraint);
    assert_eq!(failure.target(), "invoices.uq_invoices_number");

    let log = fake.log();
    assert_eq!(log.first(), Some(&Operation::Transaction(Transaction::Start)));
    assert_eq!(
        log.last(),
        Some(&Operation::Transaction(Transaction::Rollback))
    );
    assert!(!log.contains(&Operation::Transaction(Transaction::Commit)));

    assert!(fake.rows().is_empty());
    assert!(!fake.is_locked());
}

#[tokio::test]
async fn two_phase_compensates_completed_operations() {
    let fake = FakeConnection::new();
    fake.fail_on("uq_invoices_number");

    let mut conn = fake.clone();
    let err = migrator(&mut conn, &Capability::MYSQL)
        .define(&numbered_invoices(), &MigrateOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.partial_failure_details().unwrap().position(), 3);

    // No transaction on MySQL: create, the failed constraint, then the
    // compensating drop.
    assert!(fake
        .log()
        .iter()
        .all(|op| matches!(op, Operation::Sql(_))));

    let statements = fake.statements();
    assert_eq!(statements.len(), 3);
    assert!(statements[0].starts_with("CREATE TABLE `invoices`"));
    assert!(statements[1].contains("uq_invoices_number"));
    assert_eq!(statements[2], "DROP TABLE `invoices`;");

    assert!(fake.rows().is_empty());
    assert!(!fake.is_locked());
}

#[tokio::test]
async fn two_phase_keeps_the_ledger_at_the_prior_record() {
    let fake = FakeConnection::new();
    let mut conn = fake.clone();

    migrator(&mut conn, &Capability::MYSQL)
        .define(&invoices(), &MigrateOptions::new())
        .await
        .unwrap();
    fake.clear_log();
    fake.fail_on("`status`");

    let mut def = invoices();
    def.fields.push(field("due_date", FieldType::Date));
    def.fields.push(tests::choice("status", &["draft", "paid"]));

    let err = migrator(&mut conn, &Capability::MYSQL)
        .update(&def, &MigrateOptions::new())
        .await
        .unwrap_err();

    let failure = err.partial_failure_details().unwrap();
    assert_eq!(failure.position(), 1);
    assert_eq!(failure.target(), "invoices.status");

    let statements = fake.statements();
    assert!(statements[0].contains("ADD COLUMN `due_date`"));
    assert!(statements.last().unwrap().contains("DROP COLUMN `due_date`"));

    let rows = fake.rows();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn a_plan_built_on_a_stale_parent_is_contention() {
    let fake = FakeConnection::new();
    let mut conn = fake.clone();

    migrator(&mut conn, &Capability::POSTGRESQL)
        .define(&invoices(), &MigrateOptions::new())
        .await
        .unwrap();
    fake.clear_log();

    // Built as if the table did not exist yet.
    let stale = compile(
        Scope::Tenant,
        &numbered_invoices(),
        None,
        &no_tables(),
    )
    .unwrap();

    let err = migrator(&mut conn, &Capability::POSTGRESQL)
        .apply(&stale, &MigrateOptions::new())
        .await
        .unwrap_err();

    assert!(err.is_lock_contention());
    assert!(fake.statements().is_empty());
    assert_eq!(fake.rows().len(), 1);
}

#[tokio::test]
async fn applying_a_plan_twice_is_a_noop() {
    let fake = FakeConnection::new();
    let mut conn = fake.clone();

    let plan = compile(Scope::Tenant, &invoices(), None, &no_tables()).unwrap();

    let first = migrator(&mut conn, &Capability::POSTGRESQL)
        .apply(&plan, &MigrateOptions::new())
        .await
        .unwrap();
    assert_eq!(first.outcome, Outcome::Applied);
    let executed = fake.statements().len();

    let second = migrator(&mut conn, &Capability::POSTGRESQL)
        .apply(&plan, &MigrateOptions::new())
        .await
        .unwrap();
    assert_eq!(second.outcome, Outcome::Unchanged);
    assert_eq!(second.record.checksum, plan.checksum);
    assert_eq!(fake.statements().len(), executed);
    assert_eq!(fake.rows().len(), 1);
}

#[tokio::test]
async fn plans_for_another_scope_are_rejected() {
    let fake = FakeConnection::new();
    let mut conn = fake.clone();

    let plan = compile(Scope::Platform, &invoices(), None, &no_tables()).unwrap();
    let err = migrator(&mut conn, &Capability::POSTGRESQL)
        .apply(&plan, &MigrateOptions::new())
        .await
        .unwrap_err();

    assert!(err.is_scope_mismatch());
    assert!(fake.log().is_empty());
    assert!(!fake.is_locked());
}

#[tokio::test]
async fn a_contended_lock_runs_nothing() {
    let fake = FakeConnection::new();
    fake.contend();

    let mut conn = fake.clone();
    let options = MigrateOptions::new().lock_timeout(Duration::from_millis(10));
    let err = migrator(&mut conn, &Capability::POSTGRESQL)
        .define(&invoices(), &options)
        .await
        .unwrap_err();

    assert!(err.is_lock_contention());
    assert!(err.is_retryable());
    assert!(fake.log().is_empty());
}

#[tokio::test]
async fn an_expired_deadline_runs_nothing() {
    let fake = FakeConnection::new();
    let mut conn = fake.clone();

    let config = MigrationConfig::new().deadline(Duration::ZERO);
    let err = Migrator::new(&mut conn, &Capability::MYSQL, target(), config)
        .define(&invoices(), &MigrateOptions::new())
        .await
        .unwrap_err();

    assert!(err.is_deadline_exceeded());
    assert!(fake.statements().is_empty());
    assert!(fake.rows().is_empty());
    assert!(!fake.is_locked());
}

#[tokio::test]
async fn a_lock_granted_after_the_deadline_is_released() {
    let fake = FakeConnection::new();
    fake.delay_lock(Duration::from_millis(200));

    let mut conn = fake.clone();
    let options = MigrateOptions::new().deadline(Duration::from_millis(50));
    let err = migrator(&mut conn, &Capability::POSTGRESQL)
        .define(&invoices(), &options)
        .await
        .unwrap_err();

    assert!(err.is_deadline_exceeded());
    assert!(!fake.is_locked());
    assert!(fake.log().is_empty());
}

#[tokio::test]
async fn a_slow_commit_is_not_cut_short() {
    let fake = FakeConnection::new();
    fake.delay_commit(Duration::from_millis(200));

    let mut conn = fake.clone();
    let options = MigrateOptions::new().deadline(Duration::from_millis(50));
    let applied = migrator(&mut conn, &Capability::POSTGRESQL)
        .define(&invoices(), &options)
        .await
        .unwrap();

    assert_eq!(applied.outcome, Outcome::Applied);
    assert_eq!(
        fake.log().last(),
        Some(&Operation::Transaction(Transaction::Commit))
    );
    assert_eq!(fake.rows().len(), 1);
    assert!(!fake.is_locked());
}

#[tokio::test]
async fn sibling_plans_without_operations_are_not_conflated() {
    let fake = FakeConnection::new();
    let mut conn = fake.clone();

    let first = migrator(&mut conn, &Capability::POSTGRESQL)
        .define(&invoices(), &MigrateOptions::new())
        .await
        .unwrap();
    let prior = first.record.definition.clone().unwrap();

    let relabel = |label: &str| {
        let mut def = invoices();
        def.fields[0].label = label.to_string();
        let prior = Prior {
            definition: &prior,
            checksum: &first.record.checksum,
        };
        compile(Scope::Tenant, &def, Some(prior), &no_tables()).unwrap()
    };
    let due = relabel("Amount due");
    let paid = relabel("Amount paid");
    assert!(due.operations.is_empty());
    assert_eq!(due.checksum, paid.checksum);

    let applied = migrator(&mut conn, &Capability::POSTGRESQL)
        .apply(&due, &MigrateOptions::new())
        .await
        .unwrap();
    assert_eq!(applied.outcome, Outcome::Applied);

    // Same plan again is still a no-op.
    let again = migrator(&mut conn, &Capability::POSTGRESQL)
        .apply(&due, &MigrateOptions::new())
        .await
        .unwrap();
    assert_eq!(again.outcome, Outcome::Unchanged);

    let err = migrator(&mut conn, &Capability::POSTGRESQL)
        .apply(&paid, &MigrateOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_lock_contention());
    assert_eq!(fake.rows().len(), 2);
}

#[tokio::test]
async fn only_the_latest_record_can_be_reverted() {
    let fake = FakeConnection::new();
    let mut conn = fake.clone();

    let first = migrator(&mut conn, &Capability::POSTGRESQL)
        .define(&invoices(), &MigrateOptions::new())
        .await
        .unwrap();

    let mut def = invoices();
    def.fields.push(field("due_date", FieldType::Date));
    migrator(&mut conn, &Capability::POSTGRESQL)
        .update(&def, &MigrateOptions::new())
        .await
        .unwrap();

    let err = migrator(&mut conn, &Capability::POSTGRESQL)
        .revert(&first.record.checksum, &destructive())
        .await
        .unwrap_err();
    let violations = err.violations().unwrap();
    assert_eq!(violations[0].rule, "latest");

    let missing = Checksum::from("0".repeat(64));
    let err = migrator(&mut conn, &Capability::POSTGRESQL)
        .revert(&missing, &destructive())
        .await
        .unwrap_err();
    assert!(err.is_not_applied());
}

#[tokio::test]
async fn reverting_in_a_transaction_deletes_the_record() {
    let fake = FakeConnection::new();
    let mut conn = fake.clone();

    migrator(&mut conn, &Capability::POSTGRESQL)
        .define(&invoices(), &MigrateOptions::new())
        .await
        .unwrap();
    fake.clear_log();

    let reverted = migrator(&mut conn, &Capability::POSTGRESQL)
        .revert_table("invoices", &destructive())
        .await
        .unwrap();
    assert_eq!(reverted.outcome, Outcome::Reverted);

    assert_eq!(
        fake.log(),
        [
            Operation::Transaction(Transaction::Start),
            Operation::Sql("DROP TABLE \"invoices\";".to_string()),
            Operation::Transaction(Transaction::Commit),
        ]
    );
    assert!(fake.rows().is_empty());
}

#[tokio::test]
async fn legacy_rows_count_as_applied_but_cannot_be_reverted() {
    let fake = FakeConnection::new();
    fake.seed(LedgerRow {
        id: 1,
        name: "0001_init".to_string(),
        timestamp: 1_700_000_000_000,
        detail: None,
    });

    let mut conn = fake.clone();
    let err = migrator(&mut conn, &Capability::POSTGRESQL)
        .revert(&Checksum::from("0001_init".to_string()), &destructive())
        .await
        .unwrap_err();
    assert!(err.is_unsupported_feature());

    // Records of new tables are added next to the legacy row.
    migrator(&mut conn, &Capability::POSTGRESQL)
        .define(&invoices(), &MigrateOptions::new())
        .await
        .unwrap();
    assert_eq!(fake.rows().len(), 2);
}

#[tokio::test]
async fn tampered_records_are_invalid() {
    let fake = FakeConnection::new();

    let plan = compile(Scope::Tenant, &invoices(), None, &no_tables()).unwrap();
    let forged = Checksum::of(&plan.operations[..1], None).unwrap();
    let record = MigrationRecord::new(
        &target(),
        &invoices(),
        plan.operations.clone(),
        forged.clone(),
        None,
    );
    fake.seed(LedgerRow {
        id: 1,
        name: forged.to_string(),
        timestamp: record.timestamp(),
        detail: Some(record.detail().unwrap()),
    });

    let mut conn = fake.clone();
    let err = migrator(&mut conn, &Capability::POSTGRESQL)
        .revert_table("invoices", &destructive())
        .await
        .unwrap_err();
    assert!(err.is_invalid_ledger());
    assert!(fake.log().is_empty());
}
