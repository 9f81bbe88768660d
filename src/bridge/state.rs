use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::transport::BackendObject;

/// Lifecycle of the channel to the backend. Only moves forward within a
/// session, except that a failed handshake returns to `Uninitialized` so the
/// page can try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
}

/// A procedure run that arrived before the procedure was registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredRun {
    pub procedure: String,
}

/// Process-wide bridge state, shared by the transport adapter and the
/// readiness gate. All mutation happens within one turn of the event loop.
pub struct BridgeState {
    connection: Cell<ConnectionState>,
    backend: RefCell<Option<Rc<dyn BackendObject>>>,
    startup_queue: RefCell<Option<VecDeque<DeferredRun>>>,
}

impl Default for BridgeState {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeState {
    pub fn new() -> Self {
        Self {
            connection: Cell::new(ConnectionState::Uninitialized),
            backend: RefCell::new(None),
            startup_queue: RefCell::new(None),
        }
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection.get()
    }

    /// Claims the connection attempt. Returns `false` when one is already in
    /// progress or done.
    pub(crate) fn begin_connect(&self) -> bool {
        if self.connection.get() != ConnectionState::Uninitialized {
            return false;
        }
        self.connection.set(ConnectionState::Initializing);
        true
    }

    pub(crate) fn abort_connect(&self) {
        if self.connection.get() == ConnectionState::Initializing {
            self.connection.set(ConnectionState::Uninitialized);
        }
    }

    pub(crate) fn finish_connect(&self, backend: Rc<dyn BackendObject>) {
        *self.backend.borrow_mut() = Some(backend);
        self.connection.set(ConnectionState::Ready);
    }

    pub fn backend(&self) -> Option<Rc<dyn BackendObject>> {
        if self.connection.get() != ConnectionState::Ready {
            return None;
        }
        self.backend.borrow().clone()
    }

    /// Appends to the startup queue, creating it on first use.
    pub(crate) fn enqueue(&self, run: DeferredRun) {
        self.startup_queue
            .borrow_mut()
            .get_or_insert_with(VecDeque::new)
            .push_back(run);
    }

    pub(crate) fn pop_deferred(&self) -> Option<DeferredRun> {
        self.startup_queue.borrow_mut().as_mut()?.pop_front()
    }

    /// Drops the queue once it has been drained.
    pub(crate) fn release_queue(&self) {
        let mut queue = self.startup_queue.borrow_mut();
        if queue.as_ref().is_some_and(VecDeque::is_empty) {
            *queue = None;
        }
    }

    pub fn queued(&self) -> usize {
        self.startup_queue
            .borrow()
            .as_ref()
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn has_queue(&self) -> bool {
        self.startup_queue.borrow().is_some()
    }
}
