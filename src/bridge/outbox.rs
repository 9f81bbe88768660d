use std::collections::VecDeque;

use tracing::{debug, warn};

use super::message::{Command, EncodedPayload, SectionFlags};

/// Backend-side builder for the commands the front end understands.
///
/// Commands queued before the front end reports ready are held and released,
/// oldest first, by [`CommandOutbox::mark_ready`].
#[derive(Debug, Default)]
pub struct CommandOutbox {
    ready: bool,
    held: VecDeque<String>,
}

fn encode_optional(text: &str) -> Option<EncodedPayload> {
    (!text.is_empty()).then(|| EncodedPayload::encode(text))
}

impl CommandOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn held(&self) -> usize {
        self.held.len()
    }

    /// Serialises `command`. Returns the wire line when it can go out now,
    /// `None` when it is held for later.
    pub fn queue(&mut self, command: &Command) -> Option<String> {
        let line = match command.to_wire() {
            Ok(line) => line,
            Err(err) => {
                warn!(target = "bridge", kind = command.kind().tag(), error = %err, "dropping unencodable command");
                return None;
            }
        };
        if self.ready {
            return Some(line);
        }
        debug!(target = "bridge", kind = command.kind().tag(), "front end not ready, holding command");
        self.held.push_back(line);
        None
    }

    /// Records the front end's ready signal and returns the held lines.
    pub fn mark_ready(&mut self) -> Vec<String> {
        self.ready = true;
        self.held.drain(..).collect()
    }

    pub fn content(target_id: &str, html: &str, styling: &str) -> Command {
        Command::Content {
            target_id: Some(target_id.to_string()),
            html: encode_optional(html),
            styling: encode_optional(styling),
        }
    }

    pub fn page_styling(css: &str) -> Command {
        Command::Styling {
            styling: encode_optional(css),
        }
    }

    pub fn theme(css: &str) -> Command {
        Command::Theme {
            styling: encode_optional(css),
        }
    }

    pub fn status(text: &str, level: &str) -> Command {
        Command::Status {
            content: Some(text.to_string()),
            level: Some(level.to_string()),
        }
    }

    pub fn snackbar(text: &str, duration_secs: f64, level: &str) -> Command {
        Command::Snackbar {
            content: Some(text.to_string()),
            duration: Some(duration_secs),
            level: Some(level.to_string()),
        }
    }

    pub fn spinner(on: bool) -> Command {
        if on {
            Command::SpinningStart
        } else {
            Command::SpinningStop
        }
    }

    pub fn sections(flags: SectionFlags) -> Command {
        Command::Sections(flags)
    }

    pub fn error(text: &str) -> Command {
        Command::Error {
            content: Some(text.to_string()),
        }
    }

    pub fn start_animation() -> Command {
        Command::StartAnimation
    }
}
