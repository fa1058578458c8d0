//! Registry of child handles opened through a logical connection

use std::sync::Arc;

/// Open child handles, in creation order.
///
/// Membership is by identity (`Arc::ptr_eq`), never by value.
#[derive(Debug)]
pub struct HandleRegistry<T> {
    open: Vec<Arc<T>>,
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            open: Vec::with_capacity(16),
        }
    }

    /// Track `handle` and hand it straight back to the caller
    pub fn register(&mut self, handle: Arc<T>) -> Arc<T> {
        self.open.push(Arc::clone(&handle));
        handle
    }

    /// Stop tracking `handle`; returns whether it was tracked
    pub fn deregister(&mut self, handle: &Arc<T>) -> bool {
        match self.open.iter().position(|h| Arc::ptr_eq(h, handle)) {
            Some(index) => {
                self.open.remove(index);
                true
            }
            None => false,
        }
    }

    /// Take every tracked handle, leaving the registry empty
    pub fn drain(&mut self) -> Vec<Arc<T>> {
        std::mem::take(&mut self.open)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
