//! The logical connection handed to pool borrowers

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use poolside_core::{
    Connection, IsolationLevel, PoolsideError, QueryResult, Result, Savepoint, Statement,
    StatementResult, Value, unwrap_connection,
};
use uuid::Uuid;

use super::classifier;
use super::dirty::{DirtySettings, SessionRestore};
use super::gateway::{PoolEntry, PoolGateway, ReleaseGuard};
use super::registry::HandleRegistry;
use super::state::{ConnectionState, Lifecycle};
use super::statement::{ProxyStatement, StatementInner, StatementKind};
use crate::config::SessionDefaults;
use crate::leak::LeakRegistration;

/// State shared between a logical connection and the statements it created
pub(crate) struct ProxyInner {
    id: Uuid,
    entry_id: Uuid,
    delegate: Arc<dyn Connection>,
    pool: Arc<dyn PoolGateway>,
    /// Present until the physical connection has been handed back
    entry: Mutex<Option<PoolEntry>>,
    state: Mutex<ConnectionState>,
    statements: Mutex<HandleRegistry<StatementInner>>,
    leak: Mutex<Option<Box<dyn LeakRegistration>>>,
}

impl ProxyInner {
    fn defaults(&self) -> &SessionDefaults {
        self.pool.session_defaults()
    }

    fn check_closed(&self) -> Result<()> {
        if self.state.lock().is_closed() {
            return Err(PoolsideError::ConnectionClosed);
        }
        Ok(())
    }

    /// Inspect a driver error and mark the connection for eviction if it
    /// reports a lost session. The error is returned unchanged.
    pub(crate) fn check_error(&self, error: PoolsideError) -> PoolsideError {
        let fatal = classifier::fatal_links(&error);
        if !fatal.is_empty() {
            self.state.lock().mark_evict();
            for link in fatal {
                tracing::warn!(
                    connection = %self.entry_id,
                    driver = %self.delegate.driver_name(),
                    pool = %self.pool.name(),
                    sql_state = link.sql_state().unwrap_or_default(),
                    vendor_code = link.vendor_code(),
                    error = %link,
                    "connection marked as broken"
                );
            }
        }
        error
    }

    pub(crate) fn mark_commit_pending(&self) {
        self.state.lock().mark_commit_pending();
    }

    /// Called by a statement closing itself.
    pub(crate) fn untrack_statement(&self, statement: &Arc<StatementInner>) {
        let state = self.state.lock();
        // close() drains the registry in bulk
        if state.is_closed() {
            return;
        }
        self.statements.lock().deregister(statement);
    }
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        let Some(entry) = self.entry.get_mut().take() else {
            return;
        };

        let state = self.state.get_mut();
        state.mark_closed();
        state.mark_evict();
        if let Some(leak) = self.leak.get_mut().take() {
            leak.cancel();
        }

        tracing::warn!(
            connection = %self.entry_id,
            pool = %self.pool.name(),
            "connection dropped without being closed, evicting it from the pool"
        );
        self.pool.release_connection(entry, true);
    }
}

/// A borrowed connection.
///
/// Wraps one physical connection for the duration of a borrow. Session
/// settings changed through it are restored, open statements are closed and
/// any pending transaction is rolled back when it is closed, after which the
/// physical connection is handed back to the pool exactly once.
///
/// Intended for a single owner; it is `Send + Sync` only so it can move
/// between tasks.
pub struct ProxyConnection {
    inner: Arc<ProxyInner>,
}

impl ProxyConnection {
    /// Wrap a physical connection lent by `pool`
    pub fn new(
        entry: PoolEntry,
        pool: Arc<dyn PoolGateway>,
        leak: Box<dyn LeakRegistration>,
    ) -> Self {
        let state = ConnectionState::new(pool.session_defaults());
        Self {
            inner: Arc::new(ProxyInner {
                id: Uuid::new_v4(),
                entry_id: entry.id(),
                delegate: Arc::clone(entry.connection()),
                pool,
                entry: Mutex::new(Some(entry)),
                state: Mutex::new(state),
                statements: Mutex::new(HandleRegistry::new()),
                leak: Mutex::new(Some(leak)),
            }),
        }
    }

    /// Identifier of this borrow
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Identifier of the physical connection's pool entry
    pub fn pool_entry_id(&self) -> Uuid {
        self.inner.entry_id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state.lock().lifecycle()
    }

    /// Whether the physical connection will be discarded on hand-back
    pub fn is_force_evict(&self) -> bool {
        self.inner.state.lock().force_evict()
    }

    /// Whether a transaction may be open that close() must roll back
    pub fn is_commit_pending(&self) -> bool {
        self.inner.state.lock().is_commit_pending()
    }

    /// Session settings that currently differ from the pool defaults
    pub fn dirty_settings(&self) -> DirtySettings {
        self.inner.state.lock().dirty().settings()
    }

    pub fn open_statement_count(&self) -> usize {
        self.inner.statements.lock().len()
    }

    /// Prepare a statement; it is closed automatically when this connection closes
    pub async fn prepare_statement(&self, sql: &str) -> Result<ProxyStatement> {
        self.open_statement(StatementKind::Prepared, sql).await
    }

    /// Prepare a procedure call; it is closed automatically when this connection closes
    pub async fn prepare_call(&self, sql: &str) -> Result<ProxyStatement> {
        self.open_statement(StatementKind::Callable, sql).await
    }

    async fn open_statement(&self, kind: StatementKind, sql: &str) -> Result<ProxyStatement> {
        self.inner.check_closed()?;

        let created = match kind {
            StatementKind::Prepared => self.inner.delegate.prepare_statement(sql).await,
            StatementKind::Callable => self.inner.delegate.prepare_call(sql).await,
        };
        let delegate = created.map_err(|e| self.inner.check_error(e))?;

        let statement = ProxyStatement::new(kind, delegate, Arc::downgrade(&self.inner));

        // close() may have drained the registry while the delegate was preparing
        let registered = {
            let state = self.inner.state.lock();
            if state.is_closed() {
                false
            } else {
                self.inner
                    .statements
                    .lock()
                    .register(Arc::clone(statement.inner()));
                true
            }
        };
        if registered {
            return Ok(statement);
        }

        if let Err(e) = statement.close().await {
            tracing::debug!(
                connection = %self.inner.entry_id,
                error = %e,
                "failed to close statement prepared during close"
            );
        }
        Err(PoolsideError::ConnectionClosed)
    }

    /// The first connection of type `T` behind this one
    pub fn unwrap<T: Any>(&self) -> Result<&T> {
        unwrap_connection::<T>(self.inner.delegate.as_ref())
            .ok_or(PoolsideError::NotWrapperFor(std::any::type_name::<T>()))
    }

    /// Whether a connection of type `T` sits behind this one
    pub fn is_wrapper_for<T: Any>(&self) -> bool {
        unwrap_connection::<T>(self.inner.delegate.as_ref()).is_some()
    }

    /// Forward a call to the physical connection once the connection is
    /// known to be open, classifying any error it raises.
    async fn forward<T>(&self, call: impl Future<Output = Result<T>> + Send) -> Result<T> {
        self.inner.check_closed()?;
        call.await.map_err(|e| self.inner.check_error(e))
    }

    async fn rollback_pending(&self) -> Result<()> {
        let pending = self.inner.state.lock().is_commit_pending();
        if !pending {
            return Ok(());
        }

        let delegate = &self.inner.delegate;
        let auto_commit = delegate
            .auto_commit()
            .await
            .map_err(|e| self.inner.check_error(e))?;
        if !auto_commit {
            tracing::debug!(connection = %self.inner.entry_id, "rolling back pending transaction");
            delegate
                .rollback()
                .await
                .map_err(|e| self.inner.check_error(e))?;
        }
        self.inner.state.lock().clear_commit_pending();
        Ok(())
    }

    /// Put every dirty setting back to the pool default. All restores are
    /// attempted; the first failure is returned.
    async fn restore_session(&self) -> Result<()> {
        let plan = {
            let state = self.inner.state.lock();
            state.dirty().restore_plan(self.inner.defaults())
        };

        let delegate = &self.inner.delegate;
        let mut first_error = None;
        for restore in plan {
            let result = match &restore {
                SessionRestore::ReadOnly(value) => delegate.set_read_only(*value).await,
                SessionRestore::AutoCommit(value) => delegate.set_auto_commit(*value).await,
                SessionRestore::TransactionIsolation(level) => {
                    delegate.set_transaction_isolation(*level).await
                }
                SessionRestore::Catalog(catalog) => delegate.set_catalog(Some(catalog.as_str())).await,
            };
            if let Err(e) = result {
                tracing::debug!(
                    connection = %self.inner.entry_id,
                    ?restore,
                    error = %e,
                    "failed to restore session setting"
                );
                keep_first(&mut first_error, self.inner.check_error(e));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn keep_first(slot: &mut Option<PoolsideError>, error: PoolsideError) {
    if slot.is_none() {
        *slot = Some(error);
    }
}

#[async_trait]
impl Connection for ProxyConnection {
    fn driver_name(&self) -> &str {
        self.inner.delegate.driver_name()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.inner.check_closed()?;
        self.inner.mark_commit_pending();
        self.inner
            .delegate
            .execute(sql, params)
            .await
            .map_err(|e| self.inner.check_error(e))
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.inner.check_closed()?;
        self.inner.mark_commit_pending();
        self.inner
            .delegate
            .query(sql, params)
            .await
            .map_err(|e| self.inner.check_error(e))
    }

    async fn prepare_statement(&self, sql: &str) -> Result<Box<dyn Statement>> {
        let statement = ProxyConnection::prepare_statement(self, sql).await?;
        Ok(Box::new(statement))
    }

    async fn prepare_call(&self, sql: &str) -> Result<Box<dyn Statement>> {
        let statement = ProxyConnection::prepare_call(self, sql).await?;
        Ok(Box::new(statement))
    }

    async fn auto_commit(&self) -> Result<bool> {
        self.forward(self.inner.delegate.auto_commit()).await
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.forward(self.inner.delegate.set_auto_commit(auto_commit))
            .await?;
        self.inner
            .state
            .lock()
            .record_auto_commit(auto_commit, self.inner.defaults());
        Ok(())
    }

    async fn read_only(&self) -> Result<bool> {
        self.forward(self.inner.delegate.read_only()).await
    }

    async fn set_read_only(&self, read_only: bool) -> Result<()> {
        self.forward(self.inner.delegate.set_read_only(read_only))
            .await?;
        self.inner
            .state
            .lock()
            .record_read_only(read_only, self.inner.defaults());
        Ok(())
    }

    async fn transaction_isolation(&self) -> Result<IsolationLevel> {
        self.forward(self.inner.delegate.transaction_isolation())
            .await
    }

    async fn set_transaction_isolation(&self, level: IsolationLevel) -> Result<()> {
        self.forward(self.inner.delegate.set_transaction_isolation(level))
            .await?;
        self.inner
            .state
            .lock()
            .record_transaction_isolation(level, self.inner.defaults());
        Ok(())
    }

    async fn catalog(&self) -> Result<Option<String>> {
        self.forward(self.inner.delegate.catalog()).await
    }

    async fn set_catalog(&self, catalog: Option<&str>) -> Result<()> {
        self.forward(self.inner.delegate.set_catalog(catalog))
            .await?;
        self.inner
            .state
            .lock()
            .record_catalog(catalog, self.inner.defaults());
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.forward(self.inner.delegate.commit()).await?;
        self.inner.state.lock().clear_commit_pending();
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.forward(self.inner.delegate.rollback()).await?;
        self.inner.state.lock().clear_commit_pending();
        Ok(())
    }

    async fn set_savepoint(&self, name: &str) -> Result<Savepoint> {
        self.inner.check_closed()?;
        self.inner.mark_commit_pending();
        self.inner
            .delegate
            .set_savepoint(name)
            .await
            .map_err(|e| self.inner.check_error(e))
    }

    async fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        self.forward(self.inner.delegate.rollback_to_savepoint(savepoint))
            .await?;
        self.inner.state.lock().clear_commit_pending();
        Ok(())
    }

    async fn release_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        self.forward(self.inner.delegate.release_savepoint(savepoint))
            .await
    }

    /// Always false once closed, without asking the physical connection
    async fn is_valid(&self, timeout: Duration) -> Result<bool> {
        if self.inner.state.lock().is_closed() {
            return Ok(false);
        }
        self.inner
            .delegate
            .is_valid(timeout)
            .await
            .map_err(|e| self.inner.check_error(e))
    }

    async fn clear_warnings(&self) -> Result<()> {
        self.forward(self.inner.delegate.clear_warnings()).await
    }

    /// Close the logical connection and hand the physical one back.
    ///
    /// Open statements are closed, a pending transaction is rolled back,
    /// dirty session settings are restored and warnings are cleared. A
    /// failing step does not stop the ones after it. The pool always gets
    /// the physical connection back before this returns; the first error
    /// encountered, if any, is returned afterwards. Calling it again is a
    /// no-op.
    async fn close(&self) -> Result<()> {
        let inner = &*self.inner;
        if !inner.state.lock().mark_closed() {
            return Ok(());
        }
        let Some(entry) = inner.entry.lock().take() else {
            return Ok(());
        };
        let release = ReleaseGuard::new(entry, inner.pool.as_ref(), &inner.state);

        let leak = inner.leak.lock().take();
        if let Some(leak) = leak {
            leak.cancel();
        }

        let mut first_error = None;

        let statements = inner.statements.lock().drain();
        if !statements.is_empty() {
            tracing::debug!(
                connection = %inner.entry_id,
                count = statements.len(),
                "closing statements left open"
            );
        }
        for statement in statements {
            // Already classified by the statement
            if let Err(e) = ProxyStatement::from_inner(statement).close().await {
                keep_first(&mut first_error, e);
            }
        }

        if let Err(e) = self.rollback_pending().await {
            keep_first(&mut first_error, e);
        }

        if let Err(e) = self.restore_session().await {
            keep_first(&mut first_error, e);
        }

        if let Err(e) = inner.delegate.clear_warnings().await {
            keep_first(&mut first_error, inner.check_error(e));
        }

        drop(release);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.inner.state.lock().is_closed()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn inner_connection(&self) -> Option<&dyn Connection> {
        Some(self.inner.delegate.as_ref())
    }
}

impl fmt::Display for ProxyConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProxyConnection({}) wrapping {}",
            self.inner.id,
            self.inner.delegate.driver_name()
        )
    }
}

impl fmt::Debug for ProxyConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ProxyConnection")
            .field("id", &self.inner.id)
            .field("entry", &self.inner.entry_id)
            .field("lifecycle", &state.lifecycle())
            .field("force_evict", &state.force_evict())
            .finish()
    }
}
