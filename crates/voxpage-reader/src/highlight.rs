//! Visual highlight of the element being read.

use crate::dom::{NodeId, SharedDocument};

/// Keeps at most one element carrying the highlight class.
#[derive(Debug, Clone)]
pub struct Highlighter {
    document: SharedDocument,
    class: String,
}

impl Highlighter {
    pub fn new(document: SharedDocument, class: impl Into<String>) -> Self {
        Self {
            document,
            class: class.into(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Move the highlight to `element`.
    pub fn highlight(&self, element: NodeId) {
        let mut doc = self.document.write().expect("document lock poisoned");
        for stale in doc.elements_with_class(&self.class) {
            let _ = doc.remove_class(stale, &self.class);
        }
        if let Err(e) = doc.add_class(element, &self.class) {
            tracing::warn!(element = %element, error = %e, "Cannot highlight element");
        }
    }

    /// Remove the highlight from every element.
    pub fn clear(&self) {
        let mut doc = self.document.write().expect("document lock poisoned");
        for stale in doc.elements_with_class(&self.class) {
            let _ = doc.remove_class(stale, &self.class);
        }
    }

    /// Elements currently highlighted.
    pub fn highlighted(&self) -> Vec<NodeId> {
        self.document
            .read()
            .expect("document lock poisoned")
            .elements_with_class(&self.class)
    }
}
