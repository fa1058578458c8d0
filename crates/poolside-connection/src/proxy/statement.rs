//! Statement handles created through a logical connection

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use poolside_core::{PoolsideError, QueryResult, Result, Statement, StatementResult, Value};

use super::connection::ProxyInner;

/// How a statement was created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Prepared,
    Callable,
}

pub(crate) struct StatementInner {
    kind: StatementKind,
    delegate: Box<dyn Statement>,
    owner: Weak<ProxyInner>,
    closed: AtomicBool,
}

/// A statement borrowed through a [`ProxyConnection`](super::ProxyConnection).
///
/// Cloning yields another handle to the same statement. The owning
/// connection keeps its own handle so it can close the statement when the
/// connection closes; the back-reference to the connection is weak and never
/// keeps it alive.
#[derive(Clone)]
pub struct ProxyStatement {
    inner: Arc<StatementInner>,
}

impl ProxyStatement {
    pub(crate) fn new(
        kind: StatementKind,
        delegate: Box<dyn Statement>,
        owner: Weak<ProxyInner>,
    ) -> Self {
        Self {
            inner: Arc::new(StatementInner {
                kind,
                delegate,
                owner,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<StatementInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<StatementInner> {
        &self.inner
    }

    pub fn kind(&self) -> StatementKind {
        self.inner.kind
    }

    /// Whether two handles refer to the same statement
    pub fn same_statement(&self, other: &ProxyStatement) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn owner(&self) -> Result<Arc<ProxyInner>> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(PoolsideError::StatementClosed);
        }
        self.inner
            .owner
            .upgrade()
            .ok_or(PoolsideError::ConnectionClosed)
    }
}

#[async_trait]
impl Statement for ProxyStatement {
    fn sql(&self) -> &str {
        self.inner.delegate.sql()
    }

    async fn execute(&self, params: &[Value]) -> Result<StatementResult> {
        let owner = self.owner()?;
        owner.mark_commit_pending();
        self.inner
            .delegate
            .execute(params)
            .await
            .map_err(|e| owner.check_error(e))
    }

    async fn query(&self, params: &[Value]) -> Result<QueryResult> {
        let owner = self.owner()?;
        owner.mark_commit_pending();
        self.inner
            .delegate
            .query(params)
            .await
            .map_err(|e| owner.check_error(e))
    }

    async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let result = self.inner.delegate.close().await;
        match self.inner.owner.upgrade() {
            Some(owner) => {
                owner.untrack_statement(&self.inner);
                result.map_err(|e| owner.check_error(e))
            }
            None => result,
        }
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ProxyStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyStatement")
            .field("kind", &self.inner.kind)
            .field("sql", &self.inner.delegate.sql())
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish()
    }
}
