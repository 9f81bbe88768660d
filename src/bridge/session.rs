use std::future::Future;
use std::rc::Rc;

use kuchiki::NodeRef;
use serde_json::Value;
use tracing::{debug, error};

use super::correlator::{Correlator, PendingRequest};
use super::dispatcher::{DispatchOptions, DispatchOutcome, Dispatcher};
use super::events::{button_click, ClickEvent};
use super::gate::{DrainSummary, ReadinessGate};
use super::message::OutboundPayload;
use super::state::{BridgeState, ConnectionState};
use super::transport::{NativeChannel, TransportAdapter};
use super::BridgeError;
use crate::config::BridgeConfig;
use crate::dom::{Appliers, Document, Notifier, TimerRegistry};

/// One page wired to one backend.
///
/// Must be created inside a tokio runtime; notification timers run on it.
pub struct BridgeSession {
    state: Rc<BridgeState>,
    timers: Rc<TimerRegistry>,
    appliers: Rc<Appliers>,
    gate: Rc<ReadinessGate>,
    dispatcher: Rc<Dispatcher>,
    transport: Rc<TransportAdapter>,
    correlator: Correlator,
}

impl BridgeSession {
    pub fn new(
        html: &str,
        channel: Rc<dyn NativeChannel>,
        config: &BridgeConfig,
    ) -> Result<Self, BridgeError> {
        let timers = Rc::new(TimerRegistry::new()?);
        let document = Document::parse(html);
        let appliers = Rc::new(Appliers::new(
            document,
            config.elements.clone(),
            Rc::clone(&timers),
        ));

        let state = Rc::new(BridgeState::new());
        let gate = Rc::new(ReadinessGate::new(Rc::clone(&state)));
        let dispatcher = Rc::new(Dispatcher::new(
            Rc::clone(&appliers),
            Rc::clone(&gate),
            DispatchOptions::from(config),
        ));

        let transport = Rc::new(TransportAdapter::new(Rc::clone(&state), channel));
        let inbound = Rc::clone(&dispatcher);
        transport.on_receive(move |raw| {
            inbound.dispatch(raw);
        });

        let correlator = Correlator::new(Rc::clone(&transport), Rc::clone(&appliers));

        Ok(Self {
            state,
            timers,
            appliers,
            gate,
            dispatcher,
            transport,
            correlator,
        })
    }

    pub fn connect(&self) -> Result<(), BridgeError> {
        self.transport.connect()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.connection()
    }

    /// Processes one inbound message directly, bypassing the transport.
    pub fn dispatch(&self, raw: &str) -> DispatchOutcome {
        self.dispatcher.dispatch(raw)
    }

    pub fn register_procedure(
        &self,
        name: impl Into<String>,
        procedure: impl Fn() -> anyhow::Result<()> + 'static,
    ) {
        self.gate.register(name, procedure);
    }

    pub fn drain_queue(&self) -> DrainSummary {
        self.gate.drain_queue()
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub fn call(&self, payload: impl Into<OutboundPayload>) -> PendingRequest {
        self.correlator.call(payload)
    }

    pub fn send_message(&self, payload: impl Into<OutboundPayload>) -> PendingRequest {
        self.correlator.send_message(payload)
    }

    pub fn send_data(
        &self,
        data: impl Into<OutboundPayload>,
    ) -> impl Future<Output = Result<Value, BridgeError>> + 'static {
        self.correlator.send_data(data)
    }

    /// Handles a click on `target`: the notification's close button closes
    /// it, and every click is reported to the backend. Returns whether the
    /// report was sent.
    pub fn click(&self, target: &NodeRef) -> bool {
        if Notifier::is_close_button(target) {
            if let Some(snackbar) = target.parent() {
                self.appliers.notifier().close(&snackbar);
            }
        }

        let Some(event) = ClickEvent::from_node(target) else {
            return false;
        };
        debug!(target = "bridge", tag = %event.tag_name, id = ?event.id, "click");
        self.post(event.into())
    }

    /// Sends the legacy `"{name} clicked"` message.
    pub fn button_click(&self, name: &str) -> bool {
        self.post(button_click(name))
    }

    fn post(&self, payload: OutboundPayload) -> bool {
        match self.correlator.post(payload) {
            Ok(()) => true,
            Err(err) => {
                error!(target = "bridge", error = %err, "failed to send event to backend");
                false
            }
        }
    }

    /// Runs notification timers that have fired.
    pub fn poll_timers(&self) -> usize {
        self.timers.poll()
    }

    /// One step of a host loop whose procedures are all registered up front:
    /// runs fired timers, then replays the startup queue. Runs whose
    /// procedure is still missing are logged and dropped.
    pub fn settle(&self) -> usize {
        let fired = self.timers.poll();
        if self.gate.queued() > 0 {
            self.gate.drain_queue();
        }
        fired
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    pub fn appliers(&self) -> &Appliers {
        &self.appliers
    }

    pub fn document(&self) -> &Document {
        self.appliers.document()
    }

    pub fn document_html(&self) -> String {
        self.document().to_html()
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        self.transport.detach_handler();
    }
}
