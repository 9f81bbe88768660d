use kuchiki::NodeRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::OutboundPayload;
use crate::dom::document::attribute;

/// A click on a document element, as reported to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "click")]
pub struct ClickEvent {
    #[serde(rename = "tagName")]
    pub tag_name: String,
    pub id: Option<String>,
    #[serde(rename = "className")]
    pub class_name: Option<String>,
}

impl ClickEvent {
    /// Describes `node`; empty `id` and `class` attributes become `None`.
    /// Returns `None` for non-element nodes.
    pub fn from_node(node: &NodeRef) -> Option<Self> {
        let element = node.as_element()?;
        let non_empty = |name: &str| attribute(node, name).filter(|value| !value.is_empty());
        Some(Self {
            tag_name: element.name.local.to_lowercase(),
            id: non_empty("id"),
            class_name: non_empty("class"),
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<ClickEvent> for OutboundPayload {
    fn from(event: ClickEvent) -> Self {
        OutboundPayload::Json(event.to_value())
    }
}

/// The plain-text payload older pages send for a named button.
pub fn button_click(name: &str) -> OutboundPayload {
    OutboundPayload::Text(format!("{name} clicked"))
}
