use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use kuchiki::NodeRef;
use thiserror::Error;
use tokio::time::Duration;
use tracing::{debug, error, warn};

use super::document::{self, Document};
use super::timers::TimerRegistry;
use crate::config::ElementIds;

const SHOW_DELAY: Duration = Duration::from_millis(100);
const HIDE_TRANSITION: Duration = Duration::from_millis(300);

const SNACKBAR_CLASS: &str = "snackbar";
const SNACKBAR_CLOSE_CLASS: &str = "snackbar-close";
const VISIBLE_CLASS: &str = "show";
const BUSY_CLASS: &str = "spinning";
const HIDDEN_CLASS: &str = "hidden";
const OPEN_CLASS: &str = "open";

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("target element not found: {0}")]
    MissingTarget(String),
    #[error("document error: {0}")]
    Document(#[from] anyhow::Error),
}

/// Visibility flags for the page's layout regions. `None` leaves a region as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutFlags {
    pub header: Option<bool>,
    pub footer: Option<bool>,
    pub status: Option<bool>,
    pub aside: Option<bool>,
    pub aside_open: Option<bool>,
    pub status_open: Option<bool>,
}

/// Applies one kind of document mutation per method. A missing target is
/// reported as [`ApplyError::MissingTarget`] and leaves the document untouched.
pub struct Appliers {
    document: Document,
    elements: ElementIds,
    notifier: Notifier,
}

impl Appliers {
    pub fn new(document: Document, elements: ElementIds, timers: Rc<TimerRegistry>) -> Self {
        let notifier = Notifier::new(document.clone(), elements.notification_host.clone(), timers);
        Self {
            document,
            elements,
            notifier,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    fn target(&self, id: &str) -> Result<NodeRef, ApplyError> {
        self.document
            .element_by_id(id)
            .ok_or_else(|| ApplyError::MissingTarget(id.to_string()))
    }

    pub fn replace_content(&self, target_id: &str, html: &str) -> Result<(), ApplyError> {
        let element = self.target(target_id)?;
        self.document.set_inner_html(&element, html)?;
        debug!(target = "dom", %target_id, "replaced element content");
        Ok(())
    }

    pub fn patch_inline_style(&self, target_id: &str, css: &str) -> Result<(), ApplyError> {
        let element = self.target(target_id)?;
        document::append_style(&element, css)?;
        debug!(target = "dom", %target_id, "patched inline style");
        Ok(())
    }

    pub fn inject_stylesheet(&self, css: &str) -> Result<(), ApplyError> {
        let head = self
            .document
            .head()
            .ok_or_else(|| ApplyError::MissingTarget("head".into()))?;
        // inserted as text so a `</style` in the CSS cannot end the element
        let style = self.document.append_html(&head, "<style></style>")?;
        style.append(NodeRef::new_text(css));
        Ok(())
    }

    pub fn patch_theme(&self, css: &str) -> Result<(), ApplyError> {
        self.patch_inline_style(&self.elements.theme, css)
    }

    /// Applies every flag that names an existing region; the first missing
    /// region is reported after the others have been applied.
    pub fn toggle_layout(&self, flags: &LayoutFlags) -> Result<(), ApplyError> {
        let changes = [
            (&self.elements.header, HIDDEN_CLASS, flags.header.map(|shown| !shown)),
            (&self.elements.footer, HIDDEN_CLASS, flags.footer.map(|shown| !shown)),
            (&self.elements.status, HIDDEN_CLASS, flags.status.map(|shown| !shown)),
            (&self.elements.aside, HIDDEN_CLASS, flags.aside.map(|shown| !shown)),
            (&self.elements.aside, OPEN_CLASS, flags.aside_open),
            (&self.elements.status, OPEN_CLASS, flags.status_open),
        ];

        let mut first_missing = None;
        for (region, class, enabled) in changes {
            let Some(enabled) = enabled else {
                continue;
            };
            match self.document.element_by_id(region) {
                Some(element) => document::set_class(&element, class, enabled)?,
                None => {
                    error!(target = "dom", %region, "layout region not found");
                    first_missing.get_or_insert_with(|| region.clone());
                }
            }
        }

        match first_missing {
            Some(region) => Err(ApplyError::MissingTarget(region)),
            None => Ok(()),
        }
    }

    /// Appends a timestamped line to the status log. `text` is inserted as
    /// markup.
    pub fn append_status(&self, text: &str, level: &str) -> Result<(), ApplyError> {
        let log = self.target(&self.elements.status_log)?;
        let markup = format!(
            "<p class=\"{} status-message\">[{}] {}</p>",
            html_escape::encode_double_quoted_attribute(level),
            timestamp(),
            text
        );
        self.document.append_html(&log, &markup)?;
        Ok(())
    }

    /// Sets the busy indicator, or flips it when `busy` is `None`. Returns the
    /// new state.
    pub fn toggle_busy(&self, busy: Option<bool>) -> Result<bool, ApplyError> {
        let spinner = self.target(&self.elements.spinner)?;
        let next = busy.unwrap_or_else(|| !document::has_class(&spinner, BUSY_CLASS));
        document::set_class(&spinner, BUSY_CLASS, next)?;
        Ok(next)
    }
}

/// The transient notification. At most one is attached at any time.
pub struct Notifier {
    document: Document,
    host_id: String,
    timers: Rc<TimerRegistry>,
}

impl Notifier {
    pub fn new(document: Document, host_id: String, timers: Rc<TimerRegistry>) -> Self {
        Self {
            document,
            host_id,
            timers,
        }
    }

    pub fn current(&self) -> Option<NodeRef> {
        self.document.select_first(&format!(".{SNACKBAR_CLASS}"))
    }

    /// Replaces any visible notification with a new one. A positive
    /// `duration_secs` dismisses it automatically.
    pub fn show(&self, content: &str, duration_secs: f64, level: &str) -> Result<NodeRef, ApplyError> {
        let host = self
            .document
            .element_by_id(&self.host_id)
            .ok_or_else(|| ApplyError::MissingTarget(self.host_id.clone()))?;

        while let Some(existing) = self.current() {
            existing.detach();
        }

        let markup = format!(
            "<div class=\"{SNACKBAR_CLASS} {}\"><span>{}</span>\
             <button class=\"{SNACKBAR_CLOSE_CLASS}\" aria-label=\"Close notification\">\u{00d7}</button></div>",
            html_escape::encode_double_quoted_attribute(level),
            document::escape_text(content),
        );
        let snackbar = self.document.append_html(&host, &markup)?;

        let shown = snackbar.clone();
        self.timers.schedule(SHOW_DELAY, move |_| {
            let _ = document::add_class(&shown, VISIBLE_CLASS);
        });

        if duration_secs > 0.0 {
            match Duration::try_from_secs_f64(duration_secs) {
                Ok(delay) => {
                    let dismissed = snackbar.clone();
                    self.timers.schedule(delay, move |timers| {
                        if document::is_attached(&dismissed) {
                            hide(timers, dismissed);
                        }
                    });
                }
                Err(err) => {
                    warn!(target = "dom", duration_secs, error = %err, "ignoring snackbar duration");
                }
            }
        }

        Ok(snackbar)
    }

    /// The manual close affordance.
    pub fn close(&self, snackbar: &NodeRef) {
        hide(&self.timers, snackbar.clone());
    }

    pub fn is_close_button(node: &NodeRef) -> bool {
        document::has_class(node, SNACKBAR_CLOSE_CLASS)
    }
}

fn hide(timers: &TimerRegistry, snackbar: NodeRef) {
    let _ = document::remove_class(&snackbar, VISIBLE_CLASS);
    timers.schedule(HIDE_TRANSITION, move |_| {
        if document::is_attached(&snackbar) {
            snackbar.detach();
        }
    });
}

fn timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let seconds = now.as_secs() % 86_400;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        seconds / 3_600,
        (seconds / 60) % 60,
        seconds % 60,
        now.subsec_millis()
    )
}
