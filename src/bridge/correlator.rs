use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, error};

use super::message::{OutboundPayload, DEFAULT_LEVEL};
use super::transport::{BackendMethod, TransportAdapter};
use super::BridgeError;
use crate::dom::Appliers;

enum RequestState {
    Waiting(oneshot::Receiver<Value>),
    Failed(Option<BridgeError>),
}

/// The eventual reply to one outbound call. The message has already been
/// sent by the time this exists; awaiting it only observes the reply.
pub struct PendingRequest {
    state: RequestState,
}

impl PendingRequest {
    fn waiting(rx: oneshot::Receiver<Value>) -> Self {
        Self {
            state: RequestState::Waiting(rx),
        }
    }

    fn failed(err: BridgeError) -> Self {
        Self {
            state: RequestState::Failed(Some(err)),
        }
    }
}

impl Future for PendingRequest {
    type Output = Result<Value, BridgeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            RequestState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|reply| reply.map_err(|_| BridgeError::ReplyDropped)),
            RequestState::Failed(err) => {
                Poll::Ready(Err(err.take().unwrap_or(BridgeError::NotConnected)))
            }
        }
    }
}

/// Pairs each outbound message with its single reply.
#[derive(Clone)]
pub struct Correlator {
    transport: Rc<TransportAdapter>,
    appliers: Rc<Appliers>,
}

impl Correlator {
    pub fn new(transport: Rc<TransportAdapter>, appliers: Rc<Appliers>) -> Self {
        Self {
            transport,
            appliers,
        }
    }

    /// Sends `payload` to the processing slot.
    pub fn call(&self, payload: impl Into<OutboundPayload>) -> PendingRequest {
        self.send(BackendMethod::ProcessData, payload.into())
    }

    /// Sends `payload` to the message slot; the reply is an acknowledgement.
    pub fn send_message(&self, payload: impl Into<OutboundPayload>) -> PendingRequest {
        self.send(BackendMethod::ReceiveFromFrontEnd, payload.into())
    }

    /// Like [`Correlator::call`], and records the result in the status log.
    pub fn send_data(
        &self,
        data: impl Into<OutboundPayload>,
    ) -> impl Future<Output = Result<Value, BridgeError>> + 'static {
        let request = self.call(data);
        let appliers = Rc::clone(&self.appliers);
        async move {
            let result = request.await?;
            let shown = match &result {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            if let Err(err) = appliers.append_status(&format!("Processed result: {shown}"), DEFAULT_LEVEL) {
                error!(target = "bridge", error = %err, "failed to record processed result");
            }
            Ok(result)
        }
    }

    /// Sends to the message slot without waiting for the acknowledgement.
    pub fn post(&self, payload: impl Into<OutboundPayload>) -> Result<(), BridgeError> {
        self.transport
            .send(BackendMethod::ReceiveFromFrontEnd, payload.into())
            .map(drop)
    }

    fn send(&self, method: BackendMethod, payload: OutboundPayload) -> PendingRequest {
        match self.transport.send(method, payload) {
            Ok(rx) => PendingRequest::waiting(rx),
            Err(err) => {
                debug!(target = "bridge", method = method.wire_name(), error = %err, "send failed");
                PendingRequest::failed(err)
            }
        }
    }
}
