use std::sync::Arc;

use parking_lot::Mutex;

use crate::session::Session;

/// Bounded supplier of session objects.
///
/// The pool caps how many sessions can exist at once independently of the
/// server's `max_sessions` routing limit: when `acquire` returns `None`,
/// the datagram that would have created a session is dropped.
pub trait SessionPool: Send + Sync {
    /// Take a session, or `None` when the pool is exhausted.
    fn acquire(&self) -> Option<Arc<Session>>;

    /// Return a session for reuse.
    fn release(&self, session: Arc<Session>);
}

/// Free-list pool over `capacity` pre-allocated sessions.
///
/// Sessions come back dirty from `release`; the manager re-activates each
/// acquired session for its new stream, so no cleanup happens here.
pub struct FixedSessionPool {
    free: Mutex<Vec<Arc<Session>>>,
}

impl FixedSessionPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new((0..capacity).map(|_| Arc::new(Session::new())).collect()),
        }
    }
}

impl SessionPool for FixedSessionPool {
    fn acquire(&self) -> Option<Arc<Session>> {
        self.free.lock().pop()
    }

    fn release(&self, session: Arc<Session>) {
        self.free.lock().push(session);
    }
}
