//! Image description.
//!
//! The describer is an injected capability. [`HeuristicDescriber`] is the
//! built-in one: it only restates what the page already says about an image.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::dom::{Document, NodeId, NodeKind, SharedDocument};
use crate::error::ReaderError;

/// Spoken when a describer fails.
pub const FALLBACK_DESCRIPTION: &str = "Unable to analyze image";

/// What a describer gets to see of one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSnapshot {
    pub node: NodeId,
    pub alt: String,
    pub natural_width: u32,
    pub natural_height: u32,
    /// Text of the image's siblings.
    pub context: String,
}

impl ImageSnapshot {
    pub fn capture(document: &Document, node: NodeId) -> Result<Self, ReaderError> {
        let image = document.image(node).ok_or(ReaderError::NotAnImage(node))?;
        Ok(Self {
            node,
            alt: image.alt.clone(),
            natural_width: image.natural_width,
            natural_height: image.natural_height,
            context: sibling_context(document, node),
        })
    }
}

/// Text of every sibling of `node` that is not itself an image.
fn sibling_context(document: &Document, node: NodeId) -> String {
    let Some(parent) = document.parent(node) else {
        return String::new();
    };
    document
        .children(parent)
        .iter()
        .filter(|sibling| **sibling != node)
        .filter(|sibling| match document.kind(**sibling) {
            Some(NodeKind::Text(_)) => true,
            Some(NodeKind::Element(_)) => document.tag(**sibling) != Some("img"),
            None => false,
        })
        .map(|sibling| document.text_content(*sibling))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Produces a spoken description of an image.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    async fn describe(&self, image: &ImageSnapshot) -> Result<String, ReaderError>;
}

/// Describes an image from its alt text, size and surrounding text.
#[derive(Debug, Clone, Default)]
pub struct HeuristicDescriber;

impl HeuristicDescriber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageDescriber for HeuristicDescriber {
    async fn describe(&self, image: &ImageSnapshot) -> Result<String, ReaderError> {
        let mut parts = Vec::with_capacity(3);
        if !image.alt.is_empty() {
            parts.push(format!("Image alt text: {}", image.alt));
        }
        parts.push(format!(
            "Image dimensions: {} by {} pixels",
            image.natural_width, image.natural_height
        ));
        if !image.context.is_empty() {
            parts.push(format!("Context: {}", image.context));
        }
        Ok(parts.join(". "))
    }
}

/// Descriptions keyed by image node. Entries are never evicted.
#[derive(Debug, Default)]
pub struct ImageDescriptionCache {
    entries: Mutex<HashMap<NodeId, String>>,
}

impl ImageDescriptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: NodeId) -> Option<String> {
        self.entries
            .lock()
            .expect("image cache mutex poisoned")
            .get(&node)
            .cloned()
    }

    pub fn insert(&self, node: NodeId, description: String) {
        self.entries
            .lock()
            .expect("image cache mutex poisoned")
            .insert(node, description);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("image cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Describes images of one page, caching results and labelling the image
/// elements with their descriptions.
pub struct ImageNarrator {
    document: SharedDocument,
    describer: Arc<dyn ImageDescriber>,
    cache: ImageDescriptionCache,
}

impl ImageNarrator {
    pub fn new(document: SharedDocument, describer: Arc<dyn ImageDescriber>) -> Self {
        Self {
            document,
            describer,
            cache: ImageDescriptionCache::new(),
        }
    }

    /// Images on the page, in document order.
    pub fn images(&self) -> Vec<NodeId> {
        self.document.read().expect("document lock poisoned").images()
    }

    pub fn cache(&self) -> &ImageDescriptionCache {
        &self.cache
    }

    /// Description for `node`, from cache or freshly produced.
    ///
    /// A describer failure yields [`FALLBACK_DESCRIPTION`] and is not cached.
    pub async fn describe(&self, node: NodeId) -> Result<String, ReaderError> {
        if let Some(cached) = self.cache.get(node) {
            return Ok(cached);
        }

        let snapshot = {
            let doc = self.document.read().expect("document lock poisoned");
            ImageSnapshot::capture(&doc, node)?
        };

        let description = match self.describer.describe(&snapshot).await {
            Ok(description) => description,
            Err(e) => {
                tracing::warn!(image = %node, error = %e, "Image description failed");
                return Ok(FALLBACK_DESCRIPTION.to_string());
            }
        };

        {
            let mut doc = self.document.write().expect("document lock poisoned");
            if let Err(e) = doc.set_attribute(node, "aria-label", &description) {
                tracing::debug!(image = %node, error = %e, "Cannot label image");
            }
        }
        self.cache.insert(node, description.clone());
        Ok(description)
    }
}
