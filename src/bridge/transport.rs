use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::message::OutboundPayload;
use super::state::{BridgeState, ConnectionState};
use super::BridgeError;

/// Called once per inbound message, in arrival order.
pub type InboundHandler = Rc<dyn Fn(&str)>;

/// The single reply to one backend call.
pub type ReplyCallback = Box<dyn FnOnce(Value)>;

/// Backend slots the front end may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendMethod {
    /// Fire-and-acknowledge messages such as click events.
    ReceiveFromFrontEnd,
    /// Requests whose reply carries a processed result.
    ProcessData,
}

impl BackendMethod {
    pub fn wire_name(self) -> &'static str {
        match self {
            BackendMethod::ReceiveFromFrontEnd => "receive_from_js",
            BackendMethod::ProcessData => "process_data",
        }
    }
}

/// The backend endpoint handed out by a successful handshake.
pub trait BackendObject {
    fn subscribe(&self, handler: InboundHandler);
    fn notify_ready(&self) -> Result<(), BridgeError>;
    fn invoke(
        &self,
        method: BackendMethod,
        payload: String,
        reply: ReplyCallback,
    ) -> Result<(), BridgeError>;
}

/// The native inter-process channel.
pub trait NativeChannel {
    /// Whether the channel can be opened right now.
    fn is_available(&self) -> bool;
    fn open(&self) -> Result<Rc<dyn BackendObject>, BridgeError>;
}

/// Reply callbacks waiting on the backend, keyed by call id.
#[derive(Default)]
pub struct PendingReplies {
    next_id: Cell<u64>,
    waiting: RefCell<HashMap<u64, ReplyCallback>>,
}

impl PendingReplies {
    pub fn register(&self, reply: ReplyCallback) -> u64 {
        let id = self.next_id.get().wrapping_add(1);
        self.next_id.set(id);
        self.waiting.borrow_mut().insert(id, reply);
        id
    }

    /// Runs the callback for `id`. A second reply for the same id finds
    /// nothing and returns `false`.
    pub fn resolve(&self, id: u64, value: Value) -> bool {
        let reply = self.waiting.borrow_mut().remove(&id);
        match reply {
            Some(reply) => {
                reply(value);
                true
            }
            None => false,
        }
    }

    /// Forgets `id` without replying.
    pub fn abandon(&self, id: u64) -> bool {
        self.waiting.borrow_mut().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.waiting.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Wraps a [`NativeChannel`] with the connection discipline of the bridge.
pub struct TransportAdapter {
    state: Rc<BridgeState>,
    channel: Rc<dyn NativeChannel>,
    handler: Rc<RefCell<Option<InboundHandler>>>,
}

impl TransportAdapter {
    pub fn new(state: Rc<BridgeState>, channel: Rc<dyn NativeChannel>) -> Self {
        Self {
            state,
            channel,
            handler: Rc::new(RefCell::new(None)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.connection()
    }

    /// Registers the inbound handler. Only the first registration is kept.
    pub fn on_receive(&self, handler: impl Fn(&str) + 'static) -> bool {
        let mut slot = self.handler.borrow_mut();
        if slot.is_some() {
            warn!(target = "bridge", "inbound handler already registered");
            return false;
        }
        let handler: InboundHandler = Rc::new(handler);
        *slot = Some(handler);
        true
    }

    /// Drops the inbound handler. Later messages are logged and discarded.
    pub fn detach_handler(&self) {
        self.handler.borrow_mut().take();
    }

    /// Opens the channel once per session and signals readiness to the
    /// backend. Calls while connecting or connected are no-ops.
    pub fn connect(&self) -> Result<(), BridgeError> {
        match self.state.connection() {
            ConnectionState::Ready => {
                debug!(target = "bridge", "channel already initialized");
                return Ok(());
            }
            ConnectionState::Initializing => {
                debug!(target = "bridge", "channel initialization already in progress");
                return Ok(());
            }
            ConnectionState::Uninitialized => {}
        }

        info!(target = "bridge", "initializing channel");
        if !self.channel.is_available() {
            error!(target = "bridge", "native transport not available");
            return Err(BridgeError::TransportUnavailable);
        }
        if !self.state.begin_connect() {
            return Ok(());
        }

        let backend = match self.channel.open() {
            Ok(backend) => backend,
            Err(err) => {
                self.state.abort_connect();
                error!(target = "bridge", error = %err, "channel initialization failed");
                return Err(err);
            }
        };

        let handler = Rc::clone(&self.handler);
        backend.subscribe(Rc::new(move |raw: &str| {
            let current = handler.borrow().clone();
            match current {
                Some(handler) => handler(raw),
                None => warn!(target = "bridge", "inbound message dropped: no handler registered"),
            }
        }));

        self.state.finish_connect(Rc::clone(&backend));
        if let Err(err) = backend.notify_ready() {
            error!(target = "bridge", error = %err, "failed to signal readiness to backend");
            return Err(err);
        }

        info!(target = "bridge", "bridge fully initialized");
        Ok(())
    }

    /// Sends one message and returns the slot its single reply will land in.
    /// Fails straight away when the channel is not connected.
    pub fn send(
        &self,
        method: BackendMethod,
        payload: OutboundPayload,
    ) -> Result<oneshot::Receiver<Value>, BridgeError> {
        let Some(backend) = self.state.backend() else {
            error!(target = "bridge", "backend not initialized");
            return Err(BridgeError::NotConnected);
        };

        let (tx, rx) = oneshot::channel();
        let wire = payload.into_wire();
        debug!(target = "bridge", method = method.wire_name(), "sending message to backend");
        backend.invoke(
            method,
            wire,
            Box::new(move |value| {
                let _ = tx.send(value);
            }),
        )?;
        Ok(rx)
    }
}

/// One call recorded by [`MemoryChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: u64,
    pub method: BackendMethod,
    pub payload: String,
}

#[derive(Default)]
struct MemoryInner {
    unavailable: Cell<bool>,
    opened: Cell<usize>,
    ready_signals: Cell<usize>,
    subscriber: RefCell<Option<InboundHandler>>,
    sent: RefCell<Vec<SentMessage>>,
    pending: PendingReplies,
}

/// An in-process native channel. The test suite plays the backend through it.
#[derive(Clone, Default)]
pub struct MemoryChannel {
    inner: Rc<MemoryInner>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.set(!available);
    }

    /// Pushes one backend message to the subscriber. Returns `false` when
    /// nobody is subscribed yet.
    pub fn deliver(&self, raw: &str) -> bool {
        let subscriber = self.inner.subscriber.borrow().clone();
        match subscriber {
            Some(handler) => {
                handler(raw);
                true
            }
            None => false,
        }
    }

    pub fn reply(&self, id: u64, value: Value) -> bool {
        self.inner.pending.resolve(id, value)
    }

    pub fn abandon(&self, id: u64) -> bool {
        self.inner.pending.abandon(id)
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.inner.sent.borrow().clone()
    }

    pub fn last_sent(&self) -> Option<SentMessage> {
        self.inner.sent.borrow().last().cloned()
    }

    pub fn opened(&self) -> usize {
        self.inner.opened.get()
    }

    pub fn ready_signals(&self) -> usize {
        self.inner.ready_signals.get()
    }

    pub fn awaiting_reply(&self) -> usize {
        self.inner.pending.len()
    }
}

impl NativeChannel for MemoryChannel {
    fn is_available(&self) -> bool {
        !self.inner.unavailable.get()
    }

    fn open(&self) -> Result<Rc<dyn BackendObject>, BridgeError> {
        self.inner.opened.set(self.inner.opened.get() + 1);
        Ok(Rc::new(self.clone()))
    }
}

impl BackendObject for MemoryChannel {
    fn subscribe(&self, handler: InboundHandler) {
        *self.inner.subscriber.borrow_mut() = Some(handler);
    }

    fn notify_ready(&self) -> Result<(), BridgeError> {
        self.inner
            .ready_signals
            .set(self.inner.ready_signals.get() + 1);
        Ok(())
    }

    fn invoke(
        &self,
        method: BackendMethod,
        payload: String,
        reply: ReplyCallback,
    ) -> Result<(), BridgeError> {
        if !self.is_available() {
            return Err(BridgeError::ChannelClosed);
        }
        let id = self.inner.pending.register(reply);
        self.inner.sent.borrow_mut().push(SentMessage {
            id,
            method,
            payload,
        });
        Ok(())
    }
}
