//! Recording doubles shared by the unit tests

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use poolside_core::{
    Connection, IsolationLevel, QueryResult, Result, Savepoint, SqlError, Statement,
    StatementResult, Value,
};
use uuid::Uuid;

use crate::config::SessionDefaults;
use crate::leak::LeakRegistration;
use crate::proxy::{PoolEntry, PoolGateway, ProxyConnection};

type CallLog = Arc<Mutex<Vec<String>>>;
type Failures = Arc<Mutex<HashMap<String, SqlError>>>;

/// A physical connection that records every call made on it.
///
/// Calls are logged as `name(args)`; statement calls as `[sql].name`.
/// Any call can be made to fail with [`MockConnection::fail`].
pub(crate) struct MockConnection {
    log: CallLog,
    failures: Failures,
    auto_commit: AtomicBool,
    read_only: AtomicBool,
    isolation: Mutex<IsolationLevel>,
    catalog: Mutex<Option<String>>,
    closed: AtomicBool,
    yield_on_prepare: AtomicBool,
}

impl MockConnection {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            log: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            auto_commit: AtomicBool::new(true),
            read_only: AtomicBool::new(false),
            isolation: Mutex::new(IsolationLevel::ReadCommitted),
            catalog: Mutex::new(None),
            closed: AtomicBool::new(false),
            yield_on_prepare: AtomicBool::new(false),
        })
    }

    /// Suspend once inside every prepare call, letting other futures run
    pub(crate) fn yield_on_prepare(&self) {
        self.yield_on_prepare.store(true, Ordering::SeqCst);
    }

    async fn maybe_yield(&self) {
        if self.yield_on_prepare.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    /// Make every call logged as `call` fail with `error`
    pub(crate) fn fail(&self, call: impl Into<String>, error: SqlError) {
        self.failures.lock().insert(call.into(), error);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.log.lock().clear();
    }

    /// How many logged calls start with `prefix`
    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub(crate) fn current_auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::SeqCst)
    }

    fn record(&self, call: String, key: &str) -> Result<()> {
        record(&self.log, &self.failures, call, key)
    }
}

fn record(log: &CallLog, failures: &Failures, call: String, key: &str) -> Result<()> {
    log.lock().push(call);
    match failures.lock().get(key) {
        Some(error) => Err(error.clone().into()),
        None => Ok(()),
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, sql: &str, _params: &[Value]) -> Result<StatementResult> {
        self.record(format!("execute({sql})"), "execute")?;
        Ok(StatementResult::command(1))
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.record(format!("query({sql})"), "query")?;
        Ok(QueryResult::empty())
    }

    async fn prepare_statement(&self, sql: &str) -> Result<Box<dyn Statement>> {
        self.record(format!("prepare_statement({sql})"), "prepare_statement")?;
        self.maybe_yield().await;
        Ok(Box::new(MockStatement::new(sql, self)))
    }

    async fn prepare_call(&self, sql: &str) -> Result<Box<dyn Statement>> {
        self.record(format!("prepare_call({sql})"), "prepare_call")?;
        self.maybe_yield().await;
        Ok(Box::new(MockStatement::new(sql, self)))
    }

    async fn auto_commit(&self) -> Result<bool> {
        self.record("auto_commit()".into(), "auto_commit")?;
        Ok(self.auto_commit.load(Ordering::SeqCst))
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.record(format!("set_auto_commit({auto_commit})"), "set_auto_commit")?;
        self.auto_commit.store(auto_commit, Ordering::SeqCst);
        Ok(())
    }

    async fn read_only(&self) -> Result<bool> {
        self.record("read_only()".into(), "read_only")?;
        Ok(self.read_only.load(Ordering::SeqCst))
    }

    async fn set_read_only(&self, read_only: bool) -> Result<()> {
        self.record(format!("set_read_only({read_only})"), "set_read_only")?;
        self.read_only.store(read_only, Ordering::SeqCst);
        Ok(())
    }

    async fn transaction_isolation(&self) -> Result<IsolationLevel> {
        self.record("transaction_isolation()".into(), "transaction_isolation")?;
        Ok(*self.isolation.lock())
    }

    async fn set_transaction_isolation(&self, level: IsolationLevel) -> Result<()> {
        self.record(
            format!("set_transaction_isolation({level})"),
            "set_transaction_isolation",
        )?;
        *self.isolation.lock() = level;
        Ok(())
    }

    async fn catalog(&self) -> Result<Option<String>> {
        self.record("catalog()".into(), "catalog")?;
        Ok(self.catalog.lock().clone())
    }

    async fn set_catalog(&self, catalog: Option<&str>) -> Result<()> {
        self.record(format!("set_catalog({catalog:?})"), "set_catalog")?;
        *self.catalog.lock() = catalog.map(str::to_string);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.record("commit()".into(), "commit")
    }

    async fn rollback(&self) -> Result<()> {
        self.record("rollback()".into(), "rollback")
    }

    async fn set_savepoint(&self, name: &str) -> Result<Savepoint> {
        self.record(format!("set_savepoint({name})"), "set_savepoint")?;
        Ok(Savepoint::new(name))
    }

    async fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        self.record(
            format!("rollback_to_savepoint({})", savepoint.name()),
            "rollback_to_savepoint",
        )
    }

    async fn release_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        self.record(
            format!("release_savepoint({})", savepoint.name()),
            "release_savepoint",
        )
    }

    async fn is_valid(&self, _timeout: Duration) -> Result<bool> {
        self.record("is_valid()".into(), "is_valid")?;
        Ok(!self.closed.load(Ordering::SeqCst))
    }

    async fn clear_warnings(&self) -> Result<()> {
        self.record("clear_warnings()".into(), "clear_warnings")
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.record("close()".into(), "close")
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A statement whose calls land in its connection's log.
///
/// Fails a call when the connection has a failure registered under
/// `[sql].name`.
pub(crate) struct MockStatement {
    sql: String,
    log: CallLog,
    failures: Failures,
    closed: AtomicBool,
}

impl MockStatement {
    fn new(sql: &str, connection: &MockConnection) -> Self {
        Self {
            sql: sql.to_string(),
            log: Arc::clone(&connection.log),
            failures: Arc::clone(&connection.failures),
            closed: AtomicBool::new(false),
        }
    }

    fn record(&self, name: &str) -> Result<()> {
        let call = format!("[{}].{name}", self.sql);
        record(&self.log, &self.failures, call.clone(), &call)
    }
}

#[async_trait]
impl Statement for MockStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn execute(&self, _params: &[Value]) -> Result<StatementResult> {
        self.record("execute")?;
        Ok(StatementResult::command(1))
    }

    async fn query(&self, _params: &[Value]) -> Result<QueryResult> {
        self.record("query")?;
        Ok(QueryResult::empty())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.record("close")
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A pool gateway that remembers every hand-back
pub(crate) struct MockPool {
    defaults: SessionDefaults,
    releases: Mutex<Vec<(Uuid, bool)>>,
}

impl MockPool {
    pub(crate) fn new(defaults: SessionDefaults) -> Arc<Self> {
        Arc::new(Self {
            defaults,
            releases: Mutex::new(Vec::new()),
        })
    }

    /// `(entry id, force_evict)` for every release, in order
    pub(crate) fn releases(&self) -> Vec<(Uuid, bool)> {
        self.releases.lock().clone()
    }
}

impl PoolGateway for MockPool {
    fn name(&self) -> &str {
        "mock-pool"
    }

    fn session_defaults(&self) -> &SessionDefaults {
        &self.defaults
    }

    fn release_connection(&self, entry: PoolEntry, force_evict: bool) {
        self.releases.lock().push((entry.id(), force_evict));
    }
}

/// Leak registration counting how often it was cancelled
#[derive(Default)]
pub(crate) struct CountingLeak {
    cancelled: Arc<AtomicUsize>,
}

impl CountingLeak {
    pub(crate) fn new() -> (Self, Arc<AtomicUsize>) {
        let cancelled = Arc::new(AtomicUsize::new(0));
        (
            Self {
                cancelled: Arc::clone(&cancelled),
            },
            cancelled,
        )
    }
}

impl LeakRegistration for CountingLeak {
    fn cancel(&self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}

/// Borrow `connection` from `pool` with leak cancellation counted
pub(crate) fn borrow(
    pool: &Arc<MockPool>,
    connection: &Arc<MockConnection>,
) -> (ProxyConnection, Arc<AtomicUsize>) {
    let entry = PoolEntry::new(Arc::clone(connection) as Arc<dyn Connection>);
    let (leak, cancelled) = CountingLeak::new();
    let gateway = Arc::clone(pool) as Arc<dyn PoolGateway>;
    (ProxyConnection::new(entry, gateway, Box::new(leak)), cancelled)
}

/// Buffer collecting formatted log output
#[derive(Clone, Default)]
pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Capture warnings logged on this thread until the guard is dropped
pub(crate) fn capture_warnings() -> (tracing::subscriber::DefaultGuard, LogBuffer) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (tracing::subscriber::set_default(subscriber), buffer)
}
