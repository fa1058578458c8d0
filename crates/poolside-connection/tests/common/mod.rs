//! Common test utilities and an in-memory driver

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use poolside_connection::ConnectionFactory;
use poolside_core::{
    Connection, IsolationLevel, QueryResult, Result, Row, Savepoint, SqlError, Statement,
    StatementResult, Value,
};

/// Session state of one in-memory connection
#[derive(Debug, Default)]
struct Session {
    committed: Vec<String>,
    /// Rows written since the last commit outside auto-commit
    pending: Vec<String>,
    auto_commit: bool,
    read_only: bool,
    isolation: IsolationLevel,
    catalog: Option<String>,
    open_statements: usize,
}

impl Session {
    /// `INSERT <value>` stores a row; anything else is accepted and ignored
    fn apply(&mut self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let Some(rest) = sql.strip_prefix("INSERT ") else {
            return Ok(StatementResult::command(0));
        };
        if self.read_only {
            return Err(SqlError::new("cannot execute INSERT in a read-only transaction")
                .with_sql_state("25006")
                .into());
        }

        let value = match (rest, params.first()) {
            ("?", Some(param)) => param.to_string(),
            _ => rest.to_string(),
        };
        if self.auto_commit {
            self.committed.push(value);
        } else {
            self.pending.push(value);
        }
        Ok(StatementResult::command(1))
    }

    fn rows(&self) -> QueryResult {
        let columns = vec!["value".to_string()];
        let mut result = QueryResult::empty();
        result.rows = self
            .committed
            .iter()
            .chain(&self.pending)
            .map(|v| Row::new(columns.clone(), vec![Value::String(v.clone())]))
            .collect();
        result.columns = columns;
        result
    }
}

/// A physical connection keeping its rows in memory.
///
/// Uncommitted rows are visible on the same connection and discarded by
/// `rollback()`. [`MemoryConnection::sever`] makes every later call fail
/// with SQL state 08006.
pub struct MemoryConnection {
    session: Arc<Mutex<Session>>,
    severed: AtomicBool,
    closed: AtomicBool,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self {
            session: Arc::new(Mutex::new(Session {
                auto_commit: true,
                ..Session::default()
            })),
            severed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Driver-specific capability reachable through `unwrap`
    pub fn server_version(&self) -> &'static str {
        "memory-1.0"
    }

    pub fn sever(&self) {
        self.severed.store(true, Ordering::SeqCst);
    }

    pub fn open_statements(&self) -> usize {
        self.session.lock().open_statements
    }

    pub fn committed_rows(&self) -> Vec<String> {
        self.session.lock().committed.clone()
    }

    fn check(&self) -> Result<()> {
        if self.severed.load(Ordering::SeqCst) {
            return Err(SqlError::new("connection reset by peer")
                .with_sql_state("08006")
                .into());
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn driver_name(&self) -> &str {
        "memory"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.check()?;
        self.session.lock().apply(sql, params)
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.check()?;
        Ok(self.session.lock().rows())
    }

    async fn prepare_statement(&self, sql: &str) -> Result<Box<dyn Statement>> {
        self.check()?;
        self.session.lock().open_statements += 1;
        Ok(Box::new(MemoryStatement {
            sql: sql.to_string(),
            session: Arc::clone(&self.session),
            closed: AtomicBool::new(false),
        }))
    }

    async fn auto_commit(&self) -> Result<bool> {
        self.check()?;
        Ok(self.session.lock().auto_commit)
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.check()?;
        let mut session = self.session.lock();
        if auto_commit && !session.auto_commit {
            // switching auto-commit on commits the open transaction
            let pending = std::mem::take(&mut session.pending);
            session.committed.extend(pending);
        }
        session.auto_commit = auto_commit;
        Ok(())
    }

    async fn read_only(&self) -> Result<bool> {
        self.check()?;
        Ok(self.session.lock().read_only)
    }

    async fn set_read_only(&self, read_only: bool) -> Result<()> {
        self.check()?;
        self.session.lock().read_only = read_only;
        Ok(())
    }

    async fn transaction_isolation(&self) -> Result<IsolationLevel> {
        self.check()?;
        Ok(self.session.lock().isolation)
    }

    async fn set_transaction_isolation(&self, level: IsolationLevel) -> Result<()> {
        self.check()?;
        self.session.lock().isolation = level;
        Ok(())
    }

    async fn catalog(&self) -> Result<Option<String>> {
        self.check()?;
        Ok(self.session.lock().catalog.clone())
    }

    async fn set_catalog(&self, catalog: Option<&str>) -> Result<()> {
        self.check()?;
        self.session.lock().catalog = catalog.map(str::to_string);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.check()?;
        let mut session = self.session.lock();
        let pending = std::mem::take(&mut session.pending);
        session.committed.extend(pending);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.check()?;
        self.session.lock().pending.clear();
        Ok(())
    }

    async fn set_savepoint(&self, name: &str) -> Result<Savepoint> {
        self.check()?;
        Ok(Savepoint::new(name))
    }

    async fn rollback_to_savepoint(&self, _savepoint: &Savepoint) -> Result<()> {
        self.check()
    }

    async fn release_savepoint(&self, _savepoint: &Savepoint) -> Result<()> {
        self.check()
    }

    async fn is_valid(&self, _timeout: Duration) -> Result<bool> {
        Ok(!self.severed.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct MemoryStatement {
    sql: String,
    session: Arc<Mutex<Session>>,
    closed: AtomicBool,
}

#[async_trait]
impl Statement for MemoryStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn execute(&self, params: &[Value]) -> Result<StatementResult> {
        self.session.lock().apply(&self.sql, params)
    }

    async fn query(&self, _params: &[Value]) -> Result<QueryResult> {
        Ok(self.session.lock().rows())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.session.lock().open_statements -= 1;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Factory remembering every connection it opened
#[derive(Default)]
pub struct MemoryFactory {
    opened: Mutex<Vec<Arc<MemoryConnection>>>,
}

impl MemoryFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opened(&self) -> Vec<Arc<MemoryConnection>> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl ConnectionFactory for MemoryFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        let connection = Arc::new(MemoryConnection::new());
        self.opened.lock().push(Arc::clone(&connection));
        Ok(connection)
    }
}
