use async_trait::async_trait;
use rsslap_core::{Connection, DbError, Driver, Row};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

const EXISTS_PREFIX: &str = "MOCK EXISTS ";

#[derive(Debug, Clone, Default)]
struct Config {
    latency: Duration,
    fail_every: Option<u64>,
    fail_matching: Vec<String>,
    fail_commits: bool,
    fail_begins: bool,
    max_connections: Option<usize>,
    disconnect_after: Option<u64>,
}

#[derive(Debug, Default)]
struct State {
    databases: BTreeSet<String>,
    log: Vec<String>,
    executed: u64,
    begins: u64,
    commits: u64,
    rollbacks: u64,
    connects: u64,
    open: usize,
    closed: u64,
}

/// In-memory database server with failure injection.
///
/// Clones share the same server state, so a test can keep one handle while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    config: Arc<Config>,
    state: Arc<Mutex<State>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn configure(mut self, f: impl FnOnce(&mut Config)) -> Self {
        f(Arc::make_mut(&mut self.config));
        self
    }

    /// Server-side time taken by every statement.
    pub fn latency(self, latency: Duration) -> Self {
        self.configure(|c| c.latency = latency)
    }

    /// Every `n`th statement served fails.
    pub fn fail_every(self, n: u64) -> Self {
        self.configure(|c| c.fail_every = Some(n))
    }

    /// Statements containing `pattern` fail.
    pub fn fail_matching(self, pattern: &str) -> Self {
        self.configure(|c| c.fail_matching.push(pattern.to_string()))
    }

    pub fn fail_commits(self) -> Self {
        self.configure(|c| c.fail_commits = true)
    }

    pub fn fail_begins(self) -> Self {
        self.configure(|c| c.fail_begins = true)
    }

    /// Refuse connections while `n` are open.
    pub fn max_connections(self, n: usize) -> Self {
        self.configure(|c| c.max_connections = Some(n))
    }

    pub fn refuse_connections(self) -> Self {
        self.max_connections(0)
    }

    /// Each connection breaks after serving `n` statements.
    pub fn disconnect_after(self, n: u64) -> Self {
        self.configure(|c| c.disconnect_after = Some(n))
    }

    /// Start with `database` already present.
    pub fn with_database(self, database: &str) -> Self {
        self.state().databases.insert(database.to_string());
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Every statement received, transaction control included, in order.
    pub fn log(&self) -> Vec<String> {
        self.state().log.clone()
    }

    pub fn databases(&self) -> Vec<String> {
        self.state().databases.iter().cloned().collect()
    }

    /// Statements served through `execute`, failed ones included.
    pub fn executed_count(&self) -> u64 {
        self.state().executed
    }

    pub fn begin_count(&self) -> u64 {
        self.state().begins
    }

    pub fn commit_count(&self) -> u64 {
        self.state().commits
    }

    pub fn rollback_count(&self) -> u64 {
        self.state().rollbacks
    }

    pub fn connect_count(&self) -> u64 {
        self.state().connects
    }

    pub fn closed_count(&self) -> u64 {
        self.state().closed
    }

    pub fn open_connections(&self) -> usize {
        self.state().open
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Driver for MockDriver {
    type Conn = MockConnection;

    async fn connect(&self, database: Option<&str>) -> Result<MockConnection, DbError> {
        let mut state = self.state();

        if let Some(max) = self.config.max_connections {
            if state.open >= max {
                return Err(DbError::Connection(
                    "sorry, too many clients already".to_string(),
                ));
            }
        }

        if let Some(database) = database {
            if !state.databases.contains(database) {
                return Err(DbError::Connection(format!(
                    "database \"{database}\" does not exist"
                )));
            }
        }

        state.connects += 1;
        state.open += 1;
        debug!("Mock connection opened to {database:?}");

        Ok(MockConnection {
            config: self.config.clone(),
            state: self.state.clone(),
            served: 0,
            broken: false,
            open: true,
        })
    }

    fn database_exists_query(&self, database: &str) -> String {
        format!("{EXISTS_PREFIX}{database}")
    }
}

#[derive(Debug)]
pub struct MockConnection {
    config: Arc<Config>,
    state: Arc<Mutex<State>>,
    served: u64,
    broken: bool,
    open: bool,
}

impl MockConnection {
    fn check(&self) -> Result<(), DbError> {
        if self.broken || !self.open {
            Err(DbError::Connection("connection closed".to_string()))
        } else {
            Ok(())
        }
    }

    /// Apply a statement to the server state, returning the rows it affected.
    fn apply(&mut self, statement: &str) -> Result<u64, DbError> {
        self.check()?;

        if self
            .config
            .disconnect_after
            .is_some_and(|n| self.served >= n)
        {
            self.broken = true;
            return Err(DbError::Connection("server closed the connection".to_string()));
        }
        self.served += 1;

        let mut state = lock(&self.state);
        state.log.push(statement.to_string());
        state.executed += 1;

        if self
            .config
            .fail_every
            .is_some_and(|n| n > 0 && state.executed % n == 0)
            || self
                .config
                .fail_matching
                .iter()
                .any(|p| statement.contains(p.as_str()))
        {
            return Err(DbError::Statement(format!("rejected: {statement}")));
        }

        if let Some(name) = database_name(statement, "CREATE DATABASE ") {
            if !state.databases.insert(name.clone()) {
                return Err(DbError::Statement(format!(
                    "database \"{name}\" already exists"
                )));
            }
        } else if let Some(name) = database_name(statement, "DROP DATABASE ") {
            if !state.databases.remove(&name) {
                return Err(DbError::Statement(format!(
                    "database \"{name}\" does not exist"
                )));
            }
        }

        Ok(u64::from(statement.starts_with("INSERT") || statement.starts_with("UPDATE")))
    }

    fn control(&mut self, statement: &str) -> Result<(), DbError> {
        self.check()?;
        let mut state = lock(&self.state);
        state.log.push(statement.to_string());
        match statement {
            "BEGIN" if self.config.fail_begins => {
                return Err(DbError::Statement("current transaction is aborted".to_string()))
            }
            "BEGIN" => state.begins += 1,
            "COMMIT" if self.config.fail_commits => {
                return Err(DbError::Statement("could not serialize access".to_string()))
            }
            "COMMIT" => state.commits += 1,
            _ => state.rollbacks += 1,
        }
        Ok(())
    }
}

fn database_name(statement: &str, prefix: &str) -> Option<String> {
    let name = statement.strip_prefix(prefix)?;
    Some(name.trim_matches('"').replace("\"\"", "\""))
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&mut self, statement: &str) -> Result<u64, DbError> {
        let rows = self.apply(statement);
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
        rows
    }

    async fn query(&mut self, statement: &str) -> Result<Vec<Row>, DbError> {
        self.check()?;
        let mut state = lock(&self.state);
        state.log.push(statement.to_string());

        match statement.strip_prefix(EXISTS_PREFIX) {
            Some(database) if state.databases.contains(database) => {
                Ok(vec![vec![Some("1".to_string())]])
            }
            _ => Ok(vec![]),
        }
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        self.control("BEGIN")
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.control("COMMIT")
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.control("ROLLBACK")
    }

    async fn close(&mut self) -> Result<(), DbError> {
        if self.open {
            self.open = false;
            let mut state = lock(&self.state);
            state.open -= 1;
            state.closed += 1;
        }
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        if self.open {
            lock(&self.state).open -= 1;
        }
    }
}
