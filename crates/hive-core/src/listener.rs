//! Message listeners and the copy-on-write registry that holds them.
//!
//! Registration and removal swap in a new listener list; dispatch iterates a
//! snapshot without holding any lock, so a slow or re-entrant listener never
//! blocks other threads from subscribing or unsubscribing.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

/// Callback invoked once per delivered message.
///
/// Returning an error (or panicking) only affects this listener's invocation;
/// the remaining listeners still see the message.
pub type MessageListener = Arc<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure as a [`MessageListener`].
pub fn listener<F>(f: F) -> MessageListener
where
    F: Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Handle returned by registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Entries = Arc<Vec<(ListenerId, MessageListener)>>;

/// Ordered, copy-on-write collection of message listeners.
pub struct ListenerRegistry {
    next_id: AtomicU64,
    entries: RwLock<Entries>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Append a listener; it is invoked after all previously registered ones.
    pub fn add(&self, listener: MessageListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Vec::with_capacity(entries.len() + 1);
        next.extend(entries.iter().cloned());
        next.push((id, listener));
        *entries = Arc::new(next);
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if !entries.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        let next: Vec<_> = entries
            .iter()
            .filter(|(existing, _)| *existing != id)
            .cloned()
            .collect();
        *entries = Arc::new(next);
        true
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        *entries = Arc::new(Vec::new());
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    fn snapshot(&self) -> Entries {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&entries)
    }

    /// Invoke every registered listener in registration order.
    ///
    /// Returns the number of listeners the message was handed to.
    pub fn dispatch(&self, message: &str) -> usize {
        let entries = self.snapshot();
        for (id, listener) in entries.iter() {
            invoke_isolated(*id, listener, message);
        }
        entries.len()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

fn invoke_isolated(id: ListenerId, listener: &MessageListener, message: &str) {
    match panic::catch_unwind(AssertUnwindSafe(|| listener(message))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(listener = id.0, error = %err, "message listener failed"),
        Err(_) => warn!(listener = id.0, "message listener panicked"),
    }
}
