//! Recording in-memory driver for unit tests.

use super::{Driver, PreparedStatement, SqlParam};
use crate::error::DriverError;
use crate::value::Record;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Prepare(String),
    Begin,
    Commit,
    Rollback,
    Bind(String, SqlParam),
    Execute,
    Fetch,
    LastInsertId,
}

#[derive(Debug)]
struct State {
    calls: Vec<Call>,
    results: VecDeque<Vec<Record>>,
    affected_per_execute: u64,
    executes: usize,
    fail_execute_at: Option<usize>,
    fail_bind: Option<String>,
    fail_rollback: bool,
    pending: u64,
    committed: u64,
    next_id: i64,
    last_id: Option<i64>,
}

/// Records every driver call and simulates transactions.
///
/// Executed rows count as pending until commit and are discarded on rollback.
/// Each executed `INSERT` hands out the next id. `execute` yields to the
/// runtime once before doing its work.
#[derive(Debug)]
pub struct MockDriver {
    state: Mutex<State>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                calls: Vec::new(),
                results: VecDeque::new(),
                affected_per_execute: 1,
                executes: 0,
                fail_execute_at: None,
                fail_bind: None,
                fail_rollback: false,
                pending: 0,
                committed: 0,
                next_id: 1,
                last_id: None,
            }),
        }
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue rows returned by the next `fetch_all`.
    pub fn push_result(&self, rows: Vec<Record>) -> &Self {
        self.state.lock().unwrap().results.push_back(rows);
        self
    }

    pub fn affected_per_execute(&self, n: u64) -> &Self {
        self.state.lock().unwrap().affected_per_execute = n;
        self
    }

    /// Make the `n`th execute (1-based, counted across the driver's lifetime) fail.
    pub fn fail_execute_at(&self, n: usize) -> &Self {
        self.state.lock().unwrap().fail_execute_at = Some(n);
        self
    }

    /// Make binding the placeholder called `name` fail.
    pub fn fail_bind(&self, name: &str) -> &Self {
        self.state.lock().unwrap().fail_bind = Some(name.to_string());
        self
    }

    pub fn fail_rollback(&self) -> &Self {
        self.state.lock().unwrap().fail_rollback = true;
        self
    }

    pub fn next_id(&self, id: i64) -> &Self {
        self.state.lock().unwrap().next_id = id;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// SQL of every prepared statement, in order.
    pub fn prepared(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Prepare(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn binds(&self) -> Vec<(String, SqlParam)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Bind(name, param) => Some((name, param)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| *c == call)
            .count()
    }

    /// Rows affected by committed transactions.
    pub fn committed_rows(&self) -> u64 {
        self.state.lock().unwrap().committed
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

pub struct MockStatement<'a> {
    driver: &'a MockDriver,
    sql: String,
}

impl Driver for MockDriver {
    type Statement<'a> = MockStatement<'a>;

    async fn prepare<'a>(&'a self, sql: &'a str) -> Result<MockStatement<'a>, DriverError> {
        self.record(Call::Prepare(sql.to_string()));
        Ok(MockStatement {
            driver: self,
            sql: sql.to_string(),
        })
    }

    async fn begin(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Begin);
        state.pending = 0;
        Ok(())
    }

    async fn commit(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Commit);
        state.committed += state.pending;
        state.pending = 0;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Rollback);
        state.pending = 0;
        if state.fail_rollback {
            return Err(DriverError::new("connection lost"));
        }
        Ok(())
    }

    async fn last_insert_id(&self) -> Result<Option<i64>, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::LastInsertId);
        Ok(state.last_id)
    }
}

impl PreparedStatement for MockStatement<'_> {
    fn bind_value(&mut self, name: &str, param: &SqlParam) -> Result<(), DriverError> {
        let mut state = self.driver.state.lock().unwrap();
        state.calls.push(Call::Bind(name.to_string(), param.clone()));
        if state.fail_bind.as_deref() == Some(name) {
            return Err(DriverError::new(format!("cannot bind {name}")));
        }
        Ok(())
    }

    async fn execute(&mut self) -> Result<u64, DriverError> {
        // Suspend once so concurrent callers get a chance to run in between.
        tokio::task::yield_now().await;
        let mut state = self.driver.state.lock().unwrap();
        state.calls.push(Call::Execute);
        state.executes += 1;
        if state.fail_execute_at == Some(state.executes) {
            return Err(DriverError::with_code("23505", "duplicate key value"));
        }
        if self.sql.starts_with("INSERT") {
            state.last_id = Some(state.next_id);
            state.next_id += 1;
        }
        let affected = state.affected_per_execute;
        state.pending += affected;
        Ok(affected)
    }

    async fn fetch_all(&mut self) -> Result<Vec<Record>, DriverError> {
        let mut state = self.driver.state.lock().unwrap();
        state.calls.push(Call::Fetch);
        Ok(state.results.pop_front().unwrap_or_default())
    }
}
