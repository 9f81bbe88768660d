use anyhow::{anyhow, Result};
use html_escape::encode_text;
use kuchiki::traits::*;
use kuchiki::NodeRef;

/// The rendered page, held as a parsed HTML tree.
///
/// Cloning is cheap: clones share the same underlying tree.
#[derive(Clone)]
pub struct Document {
    root: NodeRef,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self {
            root: kuchiki::parse_html().one(html),
        }
    }

    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    /// Walks the tree instead of building a `#id` selector so that ids with
    /// selector metacharacters still resolve.
    pub fn element_by_id(&self, id: &str) -> Option<NodeRef> {
        self.root.inclusive_descendants().find(|node| {
            node.as_element()
                .map(|element| element.attributes.borrow().get("id") == Some(id))
                .unwrap_or(false)
        })
    }

    pub fn select_first(&self, selector: &str) -> Option<NodeRef> {
        self.root
            .select_first(selector)
            .ok()
            .map(|found| found.as_node().clone())
    }

    pub fn head(&self) -> Option<NodeRef> {
        self.select_first("head")
    }

    pub fn inner_html(&self, node: &NodeRef) -> String {
        node.children().map(|child| child.to_string()).collect()
    }

    pub fn set_inner_html(&self, node: &NodeRef, html: &str) -> Result<()> {
        let element = ensure_element(node)?;
        let children = parse_fragment(element, html)?;
        for child in node.children().collect::<Vec<_>>() {
            child.detach();
        }
        for child in children {
            node.append(child);
        }
        Ok(())
    }

    /// Parses `html` and appends the resulting nodes to `parent`, returning the
    /// first inserted element.
    pub fn append_html(&self, parent: &NodeRef, html: &str) -> Result<NodeRef> {
        let element = ensure_element(parent)?;
        let mut first_element = None;
        for child in parse_fragment(element, html)? {
            if first_element.is_none() && child.as_element().is_some() {
                first_element = Some(child.clone());
            }
            parent.append(child);
        }
        first_element.ok_or_else(|| anyhow!("fragment contains no element"))
    }

    pub fn to_html(&self) -> String {
        self.root.to_string()
    }
}

pub fn attribute(node: &NodeRef, name: &str) -> Option<String> {
    node.as_element()
        .and_then(|element| element.attributes.borrow().get(name).map(str::to_string))
}

pub fn set_attribute(node: &NodeRef, name: &str, value: &str) -> Result<()> {
    let element = ensure_element(node)?;
    element
        .attributes
        .borrow_mut()
        .insert(name, value.to_string());
    Ok(())
}

pub fn style(node: &NodeRef) -> String {
    attribute(node, "style").unwrap_or_default()
}

/// Concatenates `css` onto the inline style, exactly like `style.cssText +=`.
/// Repeated calls accumulate.
pub fn append_style(node: &NodeRef, css: &str) -> Result<()> {
    let mut combined = style(node);
    combined.push_str(css);
    set_attribute(node, "style", &combined)
}

pub fn has_class(node: &NodeRef, class: &str) -> bool {
    attribute(node, "class")
        .map(|classes| classes.split_whitespace().any(|name| name == class))
        .unwrap_or(false)
}

pub fn add_class(node: &NodeRef, class: &str) -> Result<()> {
    if has_class(node, class) {
        return Ok(());
    }
    let mut classes = attribute(node, "class").unwrap_or_default();
    if !classes.trim().is_empty() {
        classes.push(' ');
    }
    classes.push_str(class);
    set_attribute(node, "class", classes.trim())
}

pub fn remove_class(node: &NodeRef, class: &str) -> Result<()> {
    let Some(classes) = attribute(node, "class") else {
        return Ok(());
    };
    let remaining = classes
        .split_whitespace()
        .filter(|name| *name != class)
        .collect::<Vec<_>>()
        .join(" ");
    set_attribute(node, "class", &remaining)
}

pub fn set_class(node: &NodeRef, class: &str, enabled: bool) -> Result<()> {
    if enabled {
        add_class(node, class)
    } else {
        remove_class(node, class)
    }
}

pub fn is_attached(node: &NodeRef) -> bool {
    node.parent().is_some()
}

/// Escapes `text` for insertion as markup.
pub fn escape_text(text: &str) -> String {
    encode_text(text).into_owned()
}

fn ensure_element(node: &NodeRef) -> Result<&kuchiki::ElementData> {
    node.as_element()
        .ok_or_else(|| anyhow!("node is not an element"))
}

// Parsed with `context` as the fragment context, like `innerHTML`, so table
// rows, options and friends keep their tags.
fn parse_fragment(context: &kuchiki::ElementData, html: &str) -> Result<Vec<NodeRef>> {
    let fragment = kuchiki::parse_fragment(context.name.clone(), Vec::new()).one(html);
    let root = fragment
        .first_child()
        .ok_or_else(|| anyhow!("fragment parser produced no root"))?;
    Ok(root.children().collect())
}
