use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::gate::{ReadinessGate, RunOutcome};
use super::message::{Command, CommandKind, EncodedPayload, Inbound, PayloadError, DEFAULT_LEVEL};
use crate::config::{BridgeConfig, PlainTextFallback};
use crate::dom::{ApplyError, Appliers, LayoutFlags};

#[derive(Debug, Error)]
enum CommandError {
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("message is missing `{0}`")]
    Missing(&'static str),
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Applied(CommandKind),
    /// `received`: logged, nothing else.
    Acknowledged,
    /// `startAnimation` arrived before its procedure; it sits in the startup queue.
    Deferred(CommandKind),
    /// A recognised command that could not be applied.
    Skipped { kind: CommandKind, reason: String },
    Unknown(Option<String>),
    PlainText,
}

/// Options the dispatcher takes from [`BridgeConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    pub plain_text_fallback: PlainTextFallback,
    pub snackbar_mirrors_status: bool,
    pub start_animation_procedure: String,
}

impl From<&BridgeConfig> for DispatchOptions {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            plain_text_fallback: config.plain_text_fallback,
            snackbar_mirrors_status: config.snackbar_mirrors_status,
            start_animation_procedure: config.start_animation_procedure.clone(),
        }
    }
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::from(&BridgeConfig::default())
    }
}

/// Routes each backend message to exactly one applier. Messages are handled
/// one at a time in delivery order and no failure escapes [`Dispatcher::dispatch`].
pub struct Dispatcher {
    appliers: Rc<Appliers>,
    gate: Rc<ReadinessGate>,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(appliers: Rc<Appliers>, gate: Rc<ReadinessGate>, options: DispatchOptions) -> Self {
        Self {
            appliers,
            gate,
            options,
        }
    }

    pub fn dispatch(&self, raw: &str) -> DispatchOutcome {
        match Inbound::parse(raw) {
            Inbound::Command(command) => self.dispatch_command(command),
            Inbound::Unknown(tag) => {
                warn!(target = "bridge", message_type = ?tag, "unknown message type");
                DispatchOutcome::Unknown(tag)
            }
            Inbound::Invalid { kind, reason } => {
                error!(target = "bridge", kind = kind.tag(), %reason, "invalid message format");
                DispatchOutcome::Skipped { kind, reason }
            }
            Inbound::PlainText(text) => {
                info!(target = "bridge", %text, "treating message as plain text");
                self.plain_text(&text);
                DispatchOutcome::PlainText
            }
        }
    }

    fn plain_text(&self, text: &str) {
        if self.options.plain_text_fallback != PlainTextFallback::Status {
            return;
        }
        if let Err(err) = self.appliers.append_status(text, DEFAULT_LEVEL) {
            error!(target = "bridge", error = %err, "failed to record plain text message");
        }
    }

    fn dispatch_command(&self, command: Command) -> DispatchOutcome {
        let kind = command.kind();
        debug!(target = "bridge", kind = kind.tag(), "received message");

        let result = match command {
            Command::Received => {
                info!(target = "bridge", "backend acknowledged receipt");
                return DispatchOutcome::Acknowledged;
            }
            Command::StartAnimation => {
                return match self.gate.request_run(&self.options.start_animation_procedure) {
                    RunOutcome::Ran => DispatchOutcome::Applied(kind),
                    RunOutcome::Deferred => DispatchOutcome::Deferred(kind),
                    RunOutcome::Failed => DispatchOutcome::Skipped {
                        kind,
                        reason: "procedure failed".into(),
                    },
                };
            }
            Command::Snackbar {
                content,
                duration,
                level,
            } => self.snackbar(
                content.unwrap_or_default(),
                duration.unwrap_or(0.0),
                level.unwrap_or_else(|| DEFAULT_LEVEL.into()),
            ),
            Command::Status { content, level } => self
                .appliers
                .append_status(
                    &content.unwrap_or_default(),
                    level.as_deref().unwrap_or(DEFAULT_LEVEL),
                )
                .map_err(CommandError::from),
            Command::SpinningStart => self.appliers.toggle_busy(Some(true)).map(drop).map_err(Into::into),
            Command::SpinningStop => self.appliers.toggle_busy(Some(false)).map(drop).map_err(Into::into),
            Command::Content {
                target_id,
                html,
                styling,
            } => self.content(target_id, html, styling),
            Command::Styling { styling } => decode_required(styling, "styling")
                .and_then(|css| Ok(self.appliers.inject_stylesheet(&css)?)),
            Command::Theme { styling } => decode_required(styling, "styling")
                .and_then(|css| Ok(self.appliers.patch_theme(&css)?)),
            Command::Error { content } => {
                let content = content.unwrap_or_default();
                error!(target = "bridge", %content, "error from backend");
                self.appliers
                    .append_status(&format!("Error: {content}"), "error")
                    .map_err(CommandError::from)
            }
            Command::Sections(flags) => self
                .appliers
                .toggle_layout(&LayoutFlags::from(flags))
                .map_err(CommandError::from),
        };

        match result {
            Ok(()) => DispatchOutcome::Applied(kind),
            Err(err) => {
                error!(target = "bridge", kind = kind.tag(), error = %err, "failed to apply message");
                DispatchOutcome::Skipped {
                    kind,
                    reason: err.to_string(),
                }
            }
        }
    }

    fn snackbar(&self, content: String, duration: f64, level: String) -> Result<(), CommandError> {
        self.appliers.notifier().show(&content, duration, &level)?;
        if self.options.snackbar_mirrors_status {
            self.appliers.append_status(&content, &level)?;
        }
        Ok(())
    }

    fn content(
        &self,
        target_id: Option<String>,
        html: Option<EncodedPayload>,
        styling: Option<EncodedPayload>,
    ) -> Result<(), CommandError> {
        let target_id = target_id.ok_or(CommandError::Missing("targetId"))?;
        if self.appliers.document().element_by_id(&target_id).is_none() {
            return Err(ApplyError::MissingTarget(target_id).into());
        }
        // empty payloads leave the target as it is
        let html = html.map(EncodedPayload::decode).transpose()?.filter(|html| !html.is_empty());
        let styling = styling.map(EncodedPayload::decode).transpose()?.filter(|css| !css.is_empty());

        if let Some(html) = html {
            self.appliers.replace_content(&target_id, &html)?;
        }
        if let Some(css) = styling {
            self.appliers.patch_inline_style(&target_id, &css)?;
        }
        Ok(())
    }
}

fn decode_required(payload: Option<EncodedPayload>, field: &'static str) -> Result<String, CommandError> {
    Ok(payload.ok_or(CommandError::Missing(field))?.decode()?)
}
