//! Executes compiled plans against one database.
//!
//! Every call runs under the per-database migration lock. On databases with
//! transactional DDL the lowered statements and the ledger change share one
//! transaction. MySQL commits DDL implicitly, so there each operation runs
//! on its own and a failure replays the inverses of the operations that
//! already completed before the error is reported. The ledger row is only
//! written once every operation succeeded.

use serde::Deserialize;
use strata_core::{
    driver::{Capability, Connection, Operation, Transaction},
    err,
    migration::lock_key,
    schema::{
        app::TableDefinition,
        compile::{compile, Plan, Prior},
        db::Table,
        operation::{inverse_of, SchemaOperation},
        verify::{
            verify, verify_capability, verify_destructive, verify_names, verify_references,
        },
    },
    Checksum, Error, Ledger, MigrationRecord, PartialFailure, Result, Scope, Target,
};
use strata_sql::{lower, Serializer, Step};
use tokio::time::Instant;

use std::{future::Future, time::Duration};

/// Lock timeout used when none is configured.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Database wide migration settings.
///
/// Durations are given in milliseconds when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct MigrationConfig {
    /// How long to wait for another migration of the same database.
    #[serde(deserialize_with = "crate::duration::millis")]
    pub lock_timeout: Duration,

    /// Bound on a whole migration call, lock wait included. `None` means
    /// unbounded.
    #[serde(deserialize_with = "crate::duration::millis_opt")]
    pub deadline: Option<Duration>,
}

impl MigrationConfig {
    pub fn new() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            deadline: None,
        }
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Per call options, overriding [`MigrationConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MigrateOptions {
    /// Confirms that dropping columns or tables is intended.
    pub allow_destructive: bool,

    #[serde(deserialize_with = "crate::duration::millis_opt")]
    pub deadline: Option<Duration>,

    #[serde(deserialize_with = "crate::duration::millis_opt")]
    pub lock_timeout: Option<Duration>,
}

impl MigrateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_destructive(mut self, allow: bool) -> Self {
        self.allow_destructive = allow;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operations ran and a ledger record was written.
    Applied,

    /// The ledger already proved the requested state; nothing ran.
    Unchanged,

    /// The inverse operations ran and the ledger record was removed.
    Reverted,
}

/// Result of a migration call.
#[derive(Debug, Clone)]
pub struct Applied {
    /// The ledger record written, found, or removed.
    pub record: MigrationRecord,

    /// Operations executed by this call, empty when unchanged.
    pub operations: Vec<SchemaOperation>,

    pub outcome: Outcome,
}

/// Runs migrations for one target over one connection.
pub struct Migrator<'a> {
    connection: &'a mut dyn Connection,
    capability: &'static Capability,
    serializer: Serializer,
    target: Target,
    config: MigrationConfig,
    lock: String,
    locked: bool,
    transaction_open: bool,
    deadline: Option<(Instant, Duration)>,

    /// Operations executed without a transaction, tracked so they can be
    /// compensated.
    progress: Option<Progress>,
}

#[derive(Debug)]
struct Progress {
    operations: Vec<SchemaOperation>,
    before: Option<Table>,

    /// Length of the prefix of `operations` that fully ran.
    completed: usize,
}

enum Action<'p> {
    Define(&'p TableDefinition),
    Update(&'p TableDefinition),
    Apply(&'p Plan),
    RevertTable(&'p str),
    Revert(&'p Checksum),
}

enum LedgerChange<'r> {
    Insert(&'r mut MigrationRecord),
    Delete(&'r Checksum),
}

impl<'a> Migrator<'a> {
    pub fn new(
        connection: &'a mut dyn Connection,
        capability: &'static Capability,
        target: Target,
        config: MigrationConfig,
    ) -> Migrator<'a> {
        Migrator {
            connection,
            capability,
            serializer: Serializer::for_dialect(capability.dialect),
            lock: lock_key(&target.database),
            target,
            config,
            locked: false,
            transaction_open: false,
            deadline: None,
            progress: None,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Creates the table described by `definition`.
    ///
    /// Defining a table again with an identical definition is a no-op.
    /// Changing an existing table goes through [`Migrator::update`].
    pub async fn define(
        &mut self,
        definition: &TableDefinition,
        options: &MigrateOptions,
    ) -> Result<Applied> {
        verify(definition)?;
        self.guarded(options, Action::Define(definition)).await
    }

    /// Migrates an existing table to `definition`.
    pub async fn update(
        &mut self,
        definition: &TableDefinition,
        options: &MigrateOptions,
    ) -> Result<Applied> {
        verify(definition)?;
        self.guarded(options, Action::Update(definition)).await
    }

    /// Applies a plan compiled elsewhere. A plan whose checksum is already in
    /// the ledger is not applied again.
    pub async fn apply(&mut self, plan: &Plan, options: &MigrateOptions) -> Result<Applied> {
        self.check_scope(plan.scope)?;
        verify_destructive(&plan.operations, options.allow_destructive)?;
        verify_capability(&plan.operations, self.capability)?;
        self.guarded(options, Action::Apply(plan)).await
    }

    /// Down-migrates the latest record of `table`.
    pub async fn revert_table(&mut self, table: &str, options: &MigrateOptions) -> Result<Applied> {
        self.guarded(options, Action::RevertTable(table)).await
    }

    /// Down-migrates the record `checksum`, which must be the latest of its
    /// table.
    pub async fn revert(&mut self, checksum: &Checksum, options: &MigrateOptions) -> Result<Applied> {
        self.guarded(options, Action::Revert(checksum)).await
    }

    /// Reads the ledger, creating its tables on first use.
    pub async fn ledger(&mut self) -> Result<Ledger> {
        let database = &self.target.database;
        bounded(self.deadline, database, self.connection.ensure_ledger()).await?;
        let rows = bounded(self.deadline, database, self.connection.ledger()).await?;
        Ledger::from_rows(rows, &self.target)
    }

    /// Runs `action` under the call's deadline.
    ///
    /// Each database round trip is bounded by the deadline except `COMMIT`,
    /// the ledger write outside a transaction, and cleanup. Those run only
    /// after an explicit check, so an expired call never leaves a record.
    async fn guarded(&mut self, options: &MigrateOptions, action: Action<'_>) -> Result<Applied> {
        self.deadline = options
            .deadline
            .or(self.config.deadline)
            .map(|limit| (Instant::now() + limit, limit));

        let result = self.locked(options, action).await;
        self.deadline = None;
        result
    }

    async fn locked(&mut self, options: &MigrateOptions, action: Action<'_>) -> Result<Applied> {
        let timeout = options.lock_timeout.unwrap_or(self.config.lock_timeout);

        let result = match self.acquire(timeout).await {
            Ok(()) => self.run(options, action).await,
            Err(err) => Err(err),
        };
        let released = self.release().await;

        match (result, released) {
            (Ok(applied), Ok(())) => Ok(applied),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(release)) => {
                tracing::warn!(
                    database = %self.target.database,
                    error = %release,
                    "failed to release migration lock"
                );
                Err(err)
            }
        }
    }

    async fn acquire(&mut self, timeout: Duration) -> Result<()> {
        tracing::debug!(database = %self.target.database, ?timeout, "waiting for migration lock");

        // The server may grant the lock after the wait is cut short, so it
        // counts as held until this connection hears otherwise.
        self.locked = true;
        let database = &self.target.database;
        let acquired = bounded(
            self.deadline,
            database,
            self.connection.lock(&self.lock, timeout),
        )
        .await?;

        if !acquired {
            self.locked = false;
            return Err(Error::lock_contention(
                &self.target.database,
                format!("migration lock not acquired within {timeout:?}"),
            ));
        }
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        if !self.locked {
            return Ok(());
        }
        self.locked = false;
        self.connection.unlock(&self.lock).await
    }

    async fn run(&mut self, options: &MigrateOptions, action: Action<'_>) -> Result<Applied> {
        let ledger = self.ledger().await?;

        match action {
            Action::Define(definition) => {
                if let Some(latest) = ledger.latest(&definition.name) {
                    if latest.definition.as_ref() == Some(definition) {
                        return Ok(self.unchanged(latest));
                    }
                    return Err(Error::violation(
                        "name",
                        "exists",
                        format!(
                            "table `{}` already exists in `{}`",
                            definition.name, self.target.database
                        ),
                    ));
                }

                let plan = self.plan(definition, None, &ledger, options)?;
                self.apply_locked(&plan, &ledger).await
            }
            Action::Update(definition) => {
                let Some(latest) = ledger.latest(&definition.name) else {
                    return Err(Error::not_applied(
                        &self.target.database,
                        format!("table `{}`", definition.name),
                    ));
                };
                let Some(prior) = &latest.definition else {
                    return Err(Error::invalid_ledger(format!(
                        "migration `{}` has no definition",
                        latest.checksum
                    )));
                };
                if prior == definition {
                    return Ok(self.unchanged(latest));
                }

                let prior = Prior {
                    definition: prior,
                    checksum: &latest.checksum,
                };
                let plan = self.plan(definition, Some(prior), &ledger, options)?;
                self.apply_locked(&plan, &ledger).await
            }
            Action::Apply(plan) => self.apply_locked(plan, &ledger).await,
            Action::RevertTable(table) => {
                let Some(record) = ledger.latest(table) else {
                    return Err(Error::not_applied(
                        &self.target.database,
                        format!("table `{table}`"),
                    ));
                };
                self.revert_locked(record, &ledger, options).await
            }
            Action::Revert(checksum) => {
                let Some(record) = ledger.find(checksum) else {
                    return Err(Error::not_applied(
                        &self.target.database,
                        format!("migration `{checksum}`"),
                    ));
                };
                self.revert_locked(record, &ledger, options).await
            }
        }
    }

    fn plan(
        &self,
        definition: &TableDefinition,
        prior: Option<Prior<'_>>,
        ledger: &Ledger,
        options: &MigrateOptions,
    ) -> Result<Plan> {
        verify_references(definition, ledger)?;
        let plan = compile(self.target.scope, definition, prior, ledger)?;
        verify_destructive(&plan.operations, options.allow_destructive)?;
        verify_capability(&plan.operations, self.capability)?;
        Ok(plan)
    }

    async fn apply_locked(&mut self, plan: &Plan, ledger: &Ledger) -> Result<Applied> {
        self.check_scope(plan.scope)?;

        // Plans without operations share a checksum per parent, so the
        // recorded definition must match too. A mismatch falls through to
        // the parent check and is reported as a stale plan.
        if let Some(record) = ledger.find(&plan.checksum) {
            let recorded = record.definition.as_ref();
            if recorded.map_or(true, |definition| *definition == plan.definition) {
                return Ok(self.unchanged(record));
            }
        }

        let latest = ledger.latest(plan.table()).map(|record| &record.checksum);
        if latest != plan.parent.as_ref() {
            return Err(Error::lock_contention(
                &self.target.database,
                format!(
                    "table `{}` is at {} but the plan builds on {}",
                    plan.table(),
                    describe(latest),
                    describe(plan.parent.as_ref()),
                ),
            ));
        }

        let others = ledger
            .tables()
            .filter(|table| *table != plan.table())
            .filter_map(|table| ledger.physical(table).transpose())
            .collect::<Result<Vec<_>>>()?;
        verify_names(&plan.operations, &others)?;

        let mut record = MigrationRecord::new(
            &self.target,
            &plan.definition,
            plan.operations.clone(),
            plan.checksum.clone(),
            plan.parent.clone(),
        );

        self.execute(
            &plan.operations,
            plan.before.as_ref(),
            LedgerChange::Insert(&mut record),
        )
        .await?;

        tracing::info!(
            database = %self.target.database,
            table = plan.table(),
            checksum = %plan.checksum,
            operations = plan.operations.len(),
            "applied migration"
        );

        Ok(Applied {
            record,
            operations: plan.operations.clone(),
            outcome: Outcome::Applied,
        })
    }

    async fn revert_locked(
        &mut self,
        record: &MigrationRecord,
        ledger: &Ledger,
        options: &MigrateOptions,
    ) -> Result<Applied> {
        self.check_scope(record.scope)?;

        let (Some(table), Some(_)) = (&record.table, &record.definition) else {
            return Err(Error::unsupported_feature(format!(
                "migration `{}` was recorded without its operations and cannot be reverted",
                record.checksum
            )));
        };

        if ledger.latest(table).map(|latest| &latest.checksum) != Some(&record.checksum) {
            return Err(Error::violation(
                "checksum",
                "latest",
                format!("only the latest migration of `{table}` can be reverted"),
            ));
        }

        if Checksum::of(&record.operations, record.parent.as_ref())? != record.checksum {
            return Err(Error::invalid_ledger(format!(
                "operations of migration `{}` do not match its checksum",
                record.checksum
            )));
        }

        let inverse = inverse_of(&record.operations);
        verify_destructive(&inverse, options.allow_destructive)?;
        verify_capability(&inverse, self.capability)?;

        let before = ledger.physical(table)?;
        self.execute(
            &inverse,
            before.as_ref(),
            LedgerChange::Delete(&record.checksum),
        )
        .await?;

        tracing::info!(
            database = %self.target.database,
            table = %table,
            checksum = %record.checksum,
            operations = inverse.len(),
            "reverted migration"
        );

        Ok(Applied {
            record: record.clone(),
            operations: inverse,
            outcome: Outcome::Reverted,
        })
    }

    fn unchanged(&self, record: &MigrationRecord) -> Applied {
        tracing::info!(
            database = %self.target.database,
            table = record.table.as_deref().unwrap_or_default(),
            checksum = %record.checksum,
            "migration already applied"
        );

        Applied {
            record: record.clone(),
            operations: vec![],
            outcome: Outcome::Unchanged,
        }
    }

    fn check_scope(&self, scope: Scope) -> Result<()> {
        if scope != self.target.scope {
            return Err(Error::scope_mismatch(
                scope,
                format!("cannot migrate {}", self.target),
            ));
        }
        Ok(())
    }

    fn check_deadline(&self) -> Result<()> {
        match self.deadline {
            Some((at, limit)) if Instant::now() >= at => {
                Err(Error::deadline_exceeded(&self.target.database, limit))
            }
            _ => Ok(()),
        }
    }

    async fn execute(
        &mut self,
        operations: &[SchemaOperation],
        before: Option<&Table>,
        change: LedgerChange<'_>,
    ) -> Result<()> {
        let steps = lower(operations, before, self.capability)?;
        self.check_deadline()?;

        if self.capability.transactional_ddl {
            self.execute_in_transaction(operations, &steps, change).await
        } else {
            self.execute_two_phase(operations, before, &steps, change)
                .await
        }
    }

    async fn execute_in_transaction(
        &mut self,
        operations: &[SchemaOperation],
        steps: &[Step],
        change: LedgerChange<'_>,
    ) -> Result<()> {
        let database = &self.target.database;
        bounded(
            self.deadline,
            database,
            self.connection.exec(Transaction::Start.into()),
        )
        .await?;
        self.transaction_open = true;

        let mut result = self.run_steps(operations, steps).await;
        if result.is_ok() {
            result = self.write_ledger(change).await;
        }
        if result.is_ok() {
            result = self.check_deadline();
        }
        if let Err(err) = result {
            self.rollback().await;
            return Err(err);
        }

        match self.connection.exec(Transaction::Commit.into()).await {
            Ok(_) => {
                self.transaction_open = false;
                Ok(())
            }
            Err(err) => {
                self.rollback().await;
                Err(err)
            }
        }
    }

    /// Phase one runs the operations, phase two undoes the completed ones
    /// if anything failed.
    async fn execute_two_phase(
        &mut self,
        operations: &[SchemaOperation],
        before: Option<&Table>,
        steps: &[Step],
        change: LedgerChange<'_>,
    ) -> Result<()> {
        self.progress = Some(Progress {
            operations: operations.to_vec(),
            before: before.cloned(),
            completed: 0,
        });

        let mut result = self.run_steps(operations, steps).await;
        if result.is_ok() {
            result = self.check_deadline();
        }
        if result.is_ok() {
            result = self.write_ledger(change).await;
        }

        let progress = self.progress.take();
        let Err(err) = result else {
            return Ok(());
        };

        if let Some(progress) = progress {
            if let Err(compensation) = self.compensate(progress).await {
                return Err(compensation.context(err!(
                    "{err}; compensation failed and `{}` needs manual repair",
                    self.target.database
                )));
            }
        }

        Err(err)
    }

    async fn run_steps(&mut self, operations: &[SchemaOperation], steps: &[Step]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.check_deadline()?;

            let sql = self.serializer.serialize(&step.statement);
            tracing::debug!(database = %self.target.database, %sql, "executing");

            let database = &self.target.database;
            let executed = bounded(
                self.deadline,
                database,
                self.connection.exec(Operation::Sql(sql)),
            )
            .await;

            if let Err(cause) = executed {
                if cause.is_deadline_exceeded() {
                    return Err(cause);
                }
                let op = &operations[step.position];
                return Err(cause.context(Error::partial_failure(PartialFailure::new(
                    step.position,
                    op.kind(),
                    op.target(),
                ))));
            }

            let finished = steps
                .get(i + 1)
                .map_or(true, |next| next.position != step.position);
            if let Some(progress) = self.progress.as_mut().filter(|_| finished) {
                progress.completed = step.position + 1;
            }
        }

        if let Some(progress) = &mut self.progress {
            progress.completed = operations.len();
        }
        Ok(())
    }

    /// Inside a transaction the write is bounded by the deadline. Outside
    /// one it completes the migration and runs to the end.
    async fn write_ledger(&mut self, change: LedgerChange<'_>) -> Result<()> {
        let deadline = self.deadline.filter(|_| self.transaction_open);
        let database = &self.target.database;

        match change {
            LedgerChange::Insert(record) => {
                let detail = record.detail()?;
                let insert = self.connection.insert_record(
                    record.checksum.as_str(),
                    record.timestamp(),
                    &detail,
                );
                record.id = bounded(deadline, database, insert).await?;
            }
            LedgerChange::Delete(checksum) => {
                let delete = self.connection.delete_record(checksum.as_str());
                bounded(deadline, database, delete).await?;
            }
        }
        Ok(())
    }

    async fn rollback(&mut self) {
        self.transaction_open = false;

        match self.connection.exec(Transaction::Rollback.into()).await {
            Ok(_) => tracing::warn!(database = %self.target.database, "rolled back migration"),
            Err(err) => tracing::warn!(
                database = %self.target.database,
                error = %err,
                "failed to roll back migration"
            ),
        }
    }

    /// Replays the inverses of the completed operations in reverse order.
    async fn compensate(&mut self, progress: Progress) -> Result<()> {
        let Progress {
            operations,
            before,
            completed,
        } = progress;

        if completed == 0 {
            return Ok(());
        }

        let prefix = &operations[..completed];
        let state = advance(before, prefix)?;
        let inverse = inverse_of(prefix);
        let steps = lower(&inverse, state.as_ref(), self.capability)?;

        tracing::warn!(
            database = %self.target.database,
            operations = completed,
            "compensating completed operations"
        );

        for step in &steps {
            let sql = self.serializer.serialize(&step.statement);
            self.connection
                .exec(Operation::Sql(sql))
                .await
                .map_err(|cause| {
                    cause.context(err!("compensating operation #{} failed", step.position))
                })?;
        }

        Ok(())
    }
}

/// State of the table after `operations` ran on `state`.
fn advance(mut state: Option<Table>, operations: &[SchemaOperation]) -> Result<Option<Table>> {
    for op in operations {
        state = match (state, op) {
            (_, SchemaOperation::CreateTable { table, primary_key }) => Some(Table {
                columns: vec![primary_key.clone()],
                ..Table::new(table.clone())
            }),
            (_, SchemaOperation::DropTable { .. }) => None,
            (Some(mut table), op) => {
                table.apply(op)?;
                Some(table)
            }
            (None, op) => {
                return Err(err!(
                    "{} on `{}` without a known table state",
                    op.kind(),
                    op.table()
                ))
            }
        };
    }
    Ok(state)
}

/// Awaits `future`, failing with [`Error::deadline_exceeded`] once
/// `deadline` passes first.
async fn bounded<T>(
    deadline: Option<(Instant, Duration)>,
    database: &str,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    let Some((at, limit)) = deadline else {
        return future.await;
    };

    match tokio::time::timeout_at(at, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::deadline_exceeded(database, limit)),
    }
}

fn describe(checksum: Option<&Checksum>) -> String {
    match checksum {
        Some(checksum) => format!("`{checksum}`"),
        None => "no migration".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_deserialize_from_camel_case() {
        let options: MigrateOptions =
            serde_json::from_str(r#"{"allowDestructive":true,"deadline":1500}"#).unwrap();
        assert_eq!(
            options,
            MigrateOptions::new()
                .allow_destructive(true)
                .deadline(Duration::from_millis(1500))
        );
    }

    #[test]
    fn config_defaults() {
        let config: MigrationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.lock_timeout, DEFAULT_LOCK_TIMEOUT);
        assert_eq!(config.deadline, None);

        let config: MigrationConfig = serde_json::from_str(r#"{"lock_timeout":100}"#).unwrap();
        assert_eq!(config.lock_timeout, Duration::from_millis(100));
    }
}
