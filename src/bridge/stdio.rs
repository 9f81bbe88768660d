use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use super::transport::{
    BackendMethod, BackendObject, InboundHandler, NativeChannel, PendingReplies, ReplyCallback,
};
use super::BridgeError;

const READY_METHOD: &str = "notify_js_ready";

/// One line written to the backend.
#[derive(Debug, Serialize)]
struct OutboundEnvelope<'a> {
    session: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a str>,
}

struct StdioInner {
    session_id: String,
    outbound: RefCell<Option<UnboundedSender<String>>>,
    subscriber: RefCell<Option<InboundHandler>>,
    pending: PendingReplies,
}

/// Native channel over newline-delimited JSON. Outbound lines go to the
/// receiver returned by [`StdioChannel::new`]; inbound lines are pushed in
/// with [`StdioChannel::handle_line`].
#[derive(Clone)]
pub struct StdioChannel {
    inner: Rc<StdioInner>,
}

impl StdioChannel {
    pub fn new(session_id: impl Into<String>) -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Self {
            inner: Rc::new(StdioInner {
                session_id: session_id.into(),
                outbound: RefCell::new(Some(tx)),
                subscriber: RefCell::new(None),
                pending: PendingReplies::default(),
            }),
        };
        (channel, rx)
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn awaiting_reply(&self) -> usize {
        self.inner.pending.len()
    }

    /// Handles one line read from the backend. Reply envelopes resolve their
    /// pending call; every other non-empty line goes to the subscriber.
    pub fn handle_line(&self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return;
        }

        if let Some((id, result)) = parse_reply(line) {
            if !self.inner.pending.resolve(id, result) {
                warn!(target = "bridge", id, "reply for unknown or settled call");
            }
            return;
        }

        let subscriber = self.inner.subscriber.borrow().clone();
        match subscriber {
            Some(handler) => handler(line),
            None => warn!(target = "bridge", "inbound line dropped: not subscribed"),
        }
    }

    /// Closes the outbound side and drops the subscriber, letting the writer
    /// finish once queued lines are flushed.
    pub fn shutdown(&self) {
        self.inner.outbound.borrow_mut().take();
        self.inner.subscriber.borrow_mut().take();
    }

    fn write(&self, envelope: &OutboundEnvelope<'_>) -> Result<(), BridgeError> {
        let line = serde_json::to_string(envelope)?;
        let outbound = self.inner.outbound.borrow();
        let tx = outbound.as_ref().ok_or(BridgeError::ChannelClosed)?;
        tx.send(line).map_err(|_| BridgeError::ChannelClosed)
    }
}

fn parse_reply(line: &str) -> Option<(u64, Value)> {
    let mut value: Value = serde_json::from_str(line).ok()?;
    let object = value.as_object_mut()?;
    if object.contains_key("type") {
        return None;
    }
    let id = object.get("reply")?.as_u64()?;
    let result = object.remove("result").unwrap_or(Value::Null);
    Some((id, result))
}

impl NativeChannel for StdioChannel {
    fn is_available(&self) -> bool {
        self.inner
            .outbound
            .borrow()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    fn open(&self) -> Result<Rc<dyn BackendObject>, BridgeError> {
        if !self.is_available() {
            return Err(BridgeError::Handshake("stdout is closed".into()));
        }
        debug!(target = "bridge", session = %self.inner.session_id, "stdio channel opened");
        Ok(Rc::new(self.clone()))
    }
}

impl BackendObject for StdioChannel {
    fn subscribe(&self, handler: InboundHandler) {
        *self.inner.subscriber.borrow_mut() = Some(handler);
    }

    fn notify_ready(&self) -> Result<(), BridgeError> {
        self.write(&OutboundEnvelope {
            session: &self.inner.session_id,
            id: None,
            method: READY_METHOD,
            payload: None,
        })
    }

    fn invoke(
        &self,
        method: BackendMethod,
        payload: String,
        reply: ReplyCallback,
    ) -> Result<(), BridgeError> {
        let id = self.inner.pending.register(reply);
        let written = self.write(&OutboundEnvelope {
            session: &self.inner.session_id,
            id: Some(id),
            method: method.wire_name(),
            payload: Some(&payload),
        });
        if written.is_err() {
            self.inner.pending.abandon(id);
        }
        written
    }
}

/// Writes queued lines until every sender is gone.
pub async fn writer_loop<W>(mut rx: UnboundedReceiver<String>, mut writer: W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
