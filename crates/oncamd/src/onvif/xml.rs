//! Small helpers over `roxmltree` for SOAP payloads.
//!
//! Element lookups match on local names so vendor namespace prefixes do not
//! matter.

use std::borrow::Cow;

use roxmltree::{Document, Node};

use crate::device_service::ServiceError;

pub(super) fn parse(text: &str) -> Result<Document<'_>, ServiceError> {
    Document::parse(text).map_err(|error| ServiceError::parse(format!("invalid XML: {error}")))
}

/// First direct child named `name`.
pub(super) fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|candidate| candidate.has_tag_name(name))
}

/// First descendant (including `node`) named `name`.
pub(super) fn descendant<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.descendants().find(|candidate| candidate.has_tag_name(name))
}

/// Trimmed text content.
pub(super) fn text(node: Node<'_, '_>) -> String {
    node.text().unwrap_or_default().trim().to_owned()
}

pub(super) fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name).map(text)
}

pub(super) fn descendant_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    descendant(node, name).map(text)
}

/// Walks `path` through direct children.
pub(super) fn path<'a, 'input>(node: Node<'a, 'input>, path: &[&str]) -> Option<Node<'a, 'input>> {
    path.iter()
        .try_fold(node, |current, name| child(current, name))
}

/// Escapes text for element content and attribute values.
pub(super) fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 8);
    for character in value.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}
