//! Readable-sequence producer.

use crate::dom::{Document, NodeId, NodeKind};

/// One span of visible text eligible to be spoken.
///
/// Identity is the text node: positions shift as the page changes, the node
/// id does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadableUnit {
    /// The text node.
    pub node: NodeId,
    /// Element owning the text node; this is what gets highlighted.
    pub element: NodeId,
    /// Trimmed text to speak.
    pub text: String,
    /// Index within the sequence it was computed in.
    pub position: usize,
}

/// Compute the readable units of `document` in document order.
///
/// Skips text whose owning element is not laid out and text that is empty
/// after trimming. Pure: the same document always yields the same sequence.
pub fn compute_sequence(document: &Document) -> Vec<ReadableUnit> {
    let mut units = Vec::new();
    for node in document.descendants() {
        let Some(NodeKind::Text(text)) = document.kind(node) else {
            continue;
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let Some(element) = document.parent(node) else {
            continue;
        };
        if !document.is_rendered(element) {
            continue;
        }
        units.push(ReadableUnit {
            node,
            element,
            text: text.to_string(),
            position: units.len(),
        });
    }
    units
}

/// Position of the unit for `node`, if it is still readable.
pub fn locate(units: &[ReadableUnit], node: NodeId) -> Option<usize> {
    units.iter().position(|u| u.node == node)
}
