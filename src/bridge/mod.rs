//! The message bridge between the rendered document and the backend process.
//!
//! Inbound messages flow `transport -> dispatcher -> dom::appliers`; outbound
//! calls flow `correlator -> transport` and resolve with the backend's reply.

pub mod correlator;
pub mod dispatcher;
pub mod events;
pub mod gate;
pub mod message;
pub mod outbox;
pub mod session;
pub mod state;
pub mod stdio;
pub mod transport;

use thiserror::Error;

use crate::dom::TimerError;

pub use correlator::{Correlator, PendingRequest};
pub use dispatcher::{DispatchOptions, DispatchOutcome, Dispatcher};
pub use events::{button_click, ClickEvent};
pub use gate::{DrainSummary, GateError, ReadinessGate, RunOutcome};
pub use message::{Command, CommandKind, EncodedPayload, Inbound, OutboundPayload, SectionFlags};
pub use outbox::CommandOutbox;
pub use session::BridgeSession;
pub use state::{BridgeState, ConnectionState};
pub use stdio::StdioChannel;
pub use transport::{BackendMethod, BackendObject, MemoryChannel, NativeChannel, TransportAdapter};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("native transport is not available")]
    TransportUnavailable,
    #[error("backend is not connected")]
    NotConnected,
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("backend dropped the reply")]
    ReplyDropped,
    #[error("channel closed")]
    ChannelClosed,
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Timer(#[from] TimerError),
}
