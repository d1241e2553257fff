use strata_core::{
    async_trait, err,
    driver::{Connection, Operation, Transaction},
    migration::{LedgerDetail, LedgerRow},
    schema::db,
    Result,
};

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

/// A connection that records every operation instead of running it.
///
/// Ledger writes are kept in memory and undone by a rollback. Statements
/// matching a registered pattern fail. Clones share their state, so a test
/// can hand one clone to a migrator and inspect another.
#[derive(Debug, Clone, Default)]
pub struct FakeConnection {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    log: Vec<Operation>,
    fail_on: Vec<String>,
    rows: Vec<LedgerRow>,
    snapshot: Option<Vec<LedgerRow>>,
    next_id: u64,
    contended: bool,
    locked: bool,
    lock_delay: Option<Duration>,
    commit_delay: Option<Duration>,
}

impl FakeConnection {
    pub fn new() -> FakeConnection {
        FakeConnection::default()
    }

    /// Fails every statement containing `pattern`.
    pub fn fail_on(&self, pattern: &str) {
        self.state().fail_on.push(pattern.to_string());
    }

    /// Makes the migration lock unavailable.
    pub fn contend(&self) {
        self.state().contended = true;
    }

    /// Grants the migration lock right away but answers `delay` later.
    pub fn delay_lock(&self, delay: Duration) {
        self.state().lock_delay = Some(delay);
    }

    /// Commits right away but answers `delay` later.
    pub fn delay_commit(&self, delay: Duration) {
        self.state().commit_delay = Some(delay);
    }

    pub fn seed(&self, row: LedgerRow) {
        let mut state = self.state();
        state.next_id = state.next_id.max(row.id);
        state.rows.push(row);
    }

    pub fn log(&self) -> Vec<Operation> {
        self.state().log.clone()
    }

    /// The SQL statements run so far.
    pub fn statements(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|op| match op {
                Operation::Sql(sql) => Some(sql),
                Operation::Transaction(_) => None,
            })
            .collect()
    }

    pub fn rows(&self) -> Vec<LedgerRow> {
        self.state().rows.clone()
    }

    pub fn is_locked(&self) -> bool {
        self.state().locked
    }

    pub fn clear_log(&self) {
        self.state().log.clear();
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Applies `op` to the in-memory state and returns how long to wait
    /// before answering.
    fn record(&self, op: Operation) -> Result<Option<Duration>> {
        let mut state = self.state();
        state.log.push(op.clone());

        match op {
            Operation::Sql(sql) => {
                if let Some(pattern) = state.fail_on.iter().find(|p| sql.contains(p.as_str())) {
                    return Err(err!("statement matched `{pattern}`"));
                }
            }
            Operation::Transaction(Transaction::Start) => {
                state.snapshot = Some(state.rows.clone());
            }
            Operation::Transaction(Transaction::Commit) => {
                state.snapshot = None;
                return Ok(state.commit_delay);
            }
            Operation::Transaction(Transaction::Rollback) => {
                if let Some(rows) = state.snapshot.take() {
                    state.rows = rows;
                }
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn exec(&mut self, op: Operation) -> Result<u64> {
        let delay = self.record(op)?;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(0)
    }

    async fn lock(&mut self, _key: &str, _timeout: Duration) -> Result<bool> {
        let delay = {
            let mut state = self.state();
            if state.contended {
                return Ok(false);
            }
            state.locked = true;
            state.lock_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(true)
    }

    async fn unlock(&mut self, _key: &str) -> Result<()> {
        self.state().locked = false;
        Ok(())
    }

    async fn ensure_ledger(&mut self) -> Result<()> {
        Ok(())
    }

    async fn ledger(&mut self) -> Result<Vec<LedgerRow>> {
        Ok(self.rows())
    }

    async fn insert_record(
        &mut self,
        name: &str,
        timestamp: i64,
        detail: &LedgerDetail,
    ) -> Result<u64> {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state.rows.push(LedgerRow {
            id,
            name: name.to_string(),
            timestamp,
            detail: Some(detail.clone()),
        });
        Ok(id)
    }

    async fn delete_record(&mut self, name: &str) -> Result<()> {
        self.state().rows.retain(|row| row.name != name);
        Ok(())
    }

    async fn describe_table(&mut self, _name: &str) -> Result<Option<db::Table>> {
        Ok(None)
    }
}
