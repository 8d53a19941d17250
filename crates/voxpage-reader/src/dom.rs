//! Arena-backed document tree.
//!
//! Stands in for the browser DOM of one tab: element and text nodes in
//! document order, CSS classes, attributes, a display-suppression flag and
//! image metadata. Node ids are never reused, so a removed node keeps its
//! identity and simply stops being reachable from the root.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use regex::Regex;

use crate::error::ReaderError;

/// Document shared between the reading engine and whatever mutates the page.
pub type SharedDocument = Arc<RwLock<Document>>;

/// Wrap a document for sharing.
pub fn shared(document: Document) -> SharedDocument {
    Arc::new(RwLock::new(document))
}

/// Stable node identifier within one [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Intrinsic image metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub alt: String,
    pub natural_width: u32,
    pub natural_height: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ElementData {
    pub tag: String,
    pub classes: BTreeSet<String>,
    pub attributes: BTreeMap<String, String>,
    pub display_none: bool,
    pub image: Option<ImageData>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document with a `body` root element.
    pub fn new() -> Self {
        let body = Node {
            kind: NodeKind::Element(ElementData {
                tag: "body".to_string(),
                ..ElementData::default()
            }),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![body],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Result<&Node, ReaderError> {
        self.nodes.get(id.0).ok_or(ReaderError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, ReaderError> {
        self.nodes.get_mut(id.0).ok_or(ReaderError::NodeNotFound(id))
    }

    fn element(&self, id: NodeId) -> Result<&ElementData, ReaderError> {
        match &self.node(id)?.kind {
            NodeKind::Element(data) => Ok(data),
            NodeKind::Text(_) => Err(ReaderError::NotAnElement(id)),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, ReaderError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element(data) => Ok(data),
            NodeKind::Text(_) => Err(ReaderError::NotAnElement(id)),
        }
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId, ReaderError> {
        self.element(parent)?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> Result<NodeId, ReaderError> {
        self.append(
            parent,
            NodeKind::Element(ElementData {
                tag: tag.to_ascii_lowercase(),
                ..ElementData::default()
            }),
        )
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId, ReaderError> {
        self.append(parent, NodeKind::Text(text.to_string()))
    }

    pub fn append_image(
        &mut self,
        parent: NodeId,
        alt: &str,
        natural_width: u32,
        natural_height: u32,
    ) -> Result<NodeId, ReaderError> {
        let mut attributes = BTreeMap::new();
        if !alt.is_empty() {
            attributes.insert("alt".to_string(), alt.to_string());
        }
        self.append(
            parent,
            NodeKind::Element(ElementData {
                tag: "img".to_string(),
                attributes,
                image: Some(ImageData {
                    alt: alt.to_string(),
                    natural_width,
                    natural_height,
                }),
                ..ElementData::default()
            }),
        )
    }

    /// Detach `id` and its subtree from the tree.
    pub fn remove(&mut self, id: NodeId) -> Result<(), ReaderError> {
        if id == self.root {
            return Err(ReaderError::PageLoad("cannot remove the document root".into()));
        }
        let parent = self.node_mut(id)?.parent.take();
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|c| *c != id);
        }
        Ok(())
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), ReaderError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Text(existing) => {
                *existing = text.to_string();
                Ok(())
            }
            NodeKind::Element(_) => Err(ReaderError::PageLoad(format!(
                "{} is an element, not a text node",
                id
            ))),
        }
    }

    /// Toggle display suppression on an element.
    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) -> Result<(), ReaderError> {
        self.element_mut(id)?.display_none = hidden;
        Ok(())
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<(), ReaderError> {
        self.element_mut(id)?.classes.insert(class.to_string());
        Ok(())
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<(), ReaderError> {
        self.element_mut(id)?.classes.remove(class);
        Ok(())
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id)
            .map(|e| e.classes.contains(class))
            .unwrap_or(false)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .ok()
            .and_then(|e| e.attributes.get(name))
            .map(String::as_str)
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), ReaderError> {
        self.element_mut(id)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).ok().map(|e| e.tag.as_str())
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn image(&self, id: NodeId) -> Option<&ImageData> {
        self.element(id).ok().and_then(|e| e.image.as_ref())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `id` is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Whether `id` is laid out: attached, and neither it nor any ancestor
    /// has display suppressed.
    pub fn is_rendered(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if let Ok(element) = self.element(node) {
                if element.display_none {
                    return false;
                }
            }
            if node == self.root {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Attached nodes in document (pre-)order, starting at the root.
    pub fn descendants(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Concatenated text of `id` and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match self.kind(current) {
                Some(NodeKind::Text(text)) => out.push_str(text),
                Some(NodeKind::Element(_)) => {
                    stack.extend(self.children(current).iter().rev().copied())
                }
                None => {}
            }
        }
        out
    }

    /// Attached elements carrying `class`, in document order.
    pub fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants()
            .into_iter()
            .filter(|id| self.has_class(*id, class))
            .collect()
    }

    /// Attached image elements, in document order.
    pub fn images(&self) -> Vec<NodeId> {
        self.descendants()
            .into_iter()
            .filter(|id| self.image(*id).is_some())
            .collect()
    }
}

/// Build a document from the lightweight page format.
///
/// Blocks are separated by blank lines. A block starting with `# ` becomes a
/// heading, a block whose first line is `![alt](WIDTHxHEIGHT)` becomes a
/// figure (remaining lines form its caption), anything else is a paragraph
/// whose lines are joined with spaces.
pub fn load_page_text(source: &str) -> Result<Document, ReaderError> {
    let image_line = Regex::new(r"^!\[(?P<alt>[^\]]*)\]\((?P<w>\d+)x(?P<h>\d+)\)$")
        .map_err(|e| ReaderError::PageLoad(e.to_string()))?;

    let mut document = Document::new();
    let root = document.root();

    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    for block in blocks {
        let first = block[0];
        if let Some(heading) = first.strip_prefix("# ") {
            let h1 = document.append_element(root, "h1")?;
            document.append_text(h1, heading.trim())?;
            if block.len() > 1 {
                let p = document.append_element(root, "p")?;
                document.append_text(p, &block[1..].join(" "))?;
            }
        } else if let Some(caps) = image_line.captures(first) {
            let parse = |name: &str| {
                caps[name]
                    .parse::<u32>()
                    .map_err(|e| ReaderError::PageLoad(format!("bad image size in '{}': {}", first, e)))
            };
            let (width, height) = (parse("w")?, parse("h")?);
            let figure = document.append_element(root, "figure")?;
            document.append_image(figure, &caps["alt"], width, height)?;
            if block.len() > 1 {
                let caption = document.append_element(figure, "figcaption")?;
                document.append_text(caption, &block[1..].join(" "))?;
            }
        } else {
            let p = document.append_element(root, "p")?;
            document.append_text(p, &block.join(" "))?;
        }
    }

    tracing::debug!(nodes = document.nodes.len(), "Page document loaded");
    Ok(document)
}
