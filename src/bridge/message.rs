use std::string::FromUtf8Error;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::dom::LayoutFlags;

pub const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

/// HTML or CSS text carried as base64 on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    pub fn encode(text: &str) -> Self {
        Self(STANDARD.encode(text.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the payload; it is decoded exactly once, where it is applied.
    pub fn decode(self) -> Result<String, PayloadError> {
        let bytes = STANDARD.decode(self.0.trim())?;
        Ok(String::from_utf8(bytes)?)
    }
}

/// The `type` tags the dispatcher recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Snackbar,
    Status,
    SpinningStart,
    SpinningStop,
    Content,
    Styling,
    Theme,
    Error,
    Sections,
    Received,
    StartAnimation,
}

impl CommandKind {
    pub const ALL: [CommandKind; 11] = [
        CommandKind::Snackbar,
        CommandKind::Status,
        CommandKind::SpinningStart,
        CommandKind::SpinningStop,
        CommandKind::Content,
        CommandKind::Styling,
        CommandKind::Theme,
        CommandKind::Error,
        CommandKind::Sections,
        CommandKind::Received,
        CommandKind::StartAnimation,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            CommandKind::Snackbar => "snackbar",
            CommandKind::Status => "status",
            CommandKind::SpinningStart => "spinning-start",
            CommandKind::SpinningStop => "spinning-stop",
            CommandKind::Content => "content",
            CommandKind::Styling => "styling",
            CommandKind::Theme => "theme",
            CommandKind::Error => "error",
            CommandKind::Sections => "sections",
            CommandKind::Received => "received",
            CommandKind::StartAnimation => "startAnimation",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

/// Region visibility as sent by the backend. Absent flags are omitted on the
/// wire and leave the region untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aside: Option<bool>,
    #[serde(rename = "asideOpen", default, skip_serializing_if = "Option::is_none")]
    pub aside_open: Option<bool>,
    #[serde(rename = "statusOpen", default, skip_serializing_if = "Option::is_none")]
    pub status_open: Option<bool>,
}

impl From<SectionFlags> for LayoutFlags {
    fn from(flags: SectionFlags) -> Self {
        LayoutFlags {
            header: flags.header,
            footer: flags.footer,
            status: flags.status,
            aside: flags.aside,
            aside_open: flags.aside_open,
            status_open: flags.status_open,
        }
    }
}

/// A backend-originated command. Unrecognised attributes are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "snackbar")]
    Snackbar {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        duration: Option<f64>,
        #[serde(default)]
        level: Option<String>,
    },
    #[serde(rename = "status")]
    Status {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        level: Option<String>,
    },
    #[serde(rename = "spinning-start")]
    SpinningStart,
    #[serde(rename = "spinning-stop")]
    SpinningStop,
    #[serde(rename = "content")]
    Content {
        #[serde(rename = "targetId", default)]
        target_id: Option<String>,
        #[serde(default)]
        html: Option<EncodedPayload>,
        #[serde(default)]
        styling: Option<EncodedPayload>,
    },
    #[serde(rename = "styling")]
    Styling {
        #[serde(default)]
        styling: Option<EncodedPayload>,
    },
    #[serde(rename = "theme")]
    Theme {
        #[serde(default)]
        styling: Option<EncodedPayload>,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        content: Option<String>,
    },
    #[serde(rename = "sections")]
    Sections(SectionFlags),
    #[serde(rename = "received")]
    Received,
    #[serde(rename = "startAnimation")]
    StartAnimation,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Snackbar { .. } => CommandKind::Snackbar,
            Command::Status { .. } => CommandKind::Status,
            Command::SpinningStart => CommandKind::SpinningStart,
            Command::SpinningStop => CommandKind::SpinningStop,
            Command::Content { .. } => CommandKind::Content,
            Command::Styling { .. } => CommandKind::Styling,
            Command::Theme { .. } => CommandKind::Theme,
            Command::Error { .. } => CommandKind::Error,
            Command::Sections(_) => CommandKind::Sections,
            Command::Received => CommandKind::Received,
            Command::StartAnimation => CommandKind::StartAnimation,
        }
    }

    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Result of reading one raw inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Command(Command),
    /// Valid JSON whose `type` is absent or not recognised.
    Unknown(Option<String>),
    /// A recognised `type` whose attributes do not fit the schema.
    Invalid { kind: CommandKind, reason: String },
    /// Not JSON at all.
    PlainText(String),
}

impl Inbound {
    pub fn parse(raw: &str) -> Self {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(_) => return Inbound::PlainText(raw.to_string()),
        };

        let tag = value.get("type").and_then(Value::as_str).map(str::to_string);
        let Some(kind) = tag.as_deref().and_then(CommandKind::from_tag) else {
            return Inbound::Unknown(tag);
        };

        match serde_json::from_value::<Command>(value) {
            Ok(command) => Inbound::Command(command),
            Err(err) => Inbound::Invalid {
                kind,
                reason: err.to_string(),
            },
        }
    }
}

/// A front-end to backend payload. Plain text is kept for legacy callers.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundPayload {
    Text(String),
    Json(Value),
}

impl OutboundPayload {
    pub fn into_wire(self) -> String {
        match self {
            OutboundPayload::Text(text) => text,
            OutboundPayload::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for OutboundPayload {
    fn from(text: String) -> Self {
        OutboundPayload::Text(text)
    }
}

impl From<&str> for OutboundPayload {
    fn from(text: &str) -> Self {
        OutboundPayload::Text(text.to_string())
    }
}

impl From<Value> for OutboundPayload {
    fn from(value: Value) -> Self {
        OutboundPayload::Json(value)
    }
}
