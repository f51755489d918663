//! Arena-based XML document tree — the node sink the parser builds into.
//!
//! All nodes live in a contiguous `Vec<NodeData>` owned by the [`Document`]
//! and are referenced by [`NodeId`], a newtype over `NonZeroU32` (so
//! `Option<NodeId>` costs nothing extra). Navigation links (parent,
//! first/last child, next/previous sibling) are arena indices, which avoids
//! per-node heap allocation and reference cycles.
//!
//! The tree offers only the constructor/append operations the parser and
//! the namespace pass need; it carries no parsing logic of its own.

use std::num::NonZeroU32;

use crate::error::XmlError;

/// A typed index into the document's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// # Panics
    ///
    /// Panics if `index` is 0.
    #[allow(clippy::expect_used, clippy::cast_possible_truncation)]
    fn from_index(index: usize) -> Self {
        Self(NonZeroU32::new(index as u32).expect("NodeId index must be non-zero"))
    }

    fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// An attribute of an element.
///
/// Before the namespace pass, `name` holds the raw qualified name exactly
/// as written (`p:href`) and `prefix`/`namespace` are unset. The pass
/// splits the name and fills in the resolved namespace URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Local name after namespace resolution; raw qualified name before.
    pub name: String,
    /// The attribute value, with all references expanded.
    pub value: String,
    /// Namespace prefix, once resolved.
    pub prefix: Option<String>,
    /// Namespace URI, once resolved.
    pub namespace: Option<String>,
}

impl Attribute {
    /// Creates an attribute with an unresolved raw name.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            prefix: None,
            namespace: None,
        }
    }
}

/// What kind of node this is, and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document root. Exactly one per tree; never a child.
    Document,
    /// An element. `name` holds the raw qualified name until the namespace
    /// pass rewrites it into prefix + local name + namespace URI.
    Element {
        /// Local name after namespace resolution; raw qualified name before.
        name: String,
        /// Namespace prefix, once resolved.
        prefix: Option<String>,
        /// Namespace URI, once resolved.
        namespace: Option<String>,
        /// The element's attributes, in document order.
        attributes: Vec<Attribute>,
    },
    /// A run of character data. Consecutive literal text and expanded
    /// references are coalesced into one node before it is materialized.
    Text {
        /// The character data.
        content: String,
    },
    /// A CDATA section; content is verbatim, no references expanded.
    CData {
        /// The section content.
        content: String,
    },
    /// A comment.
    Comment {
        /// The comment text between `<!--` and `-->`.
        content: String,
    },
    /// A processing instruction.
    ProcessingInstruction {
        /// The PI target name.
        target: String,
        /// Everything between the target and `?>`, if non-empty.
        data: Option<String>,
    },
    /// A document type declaration.
    DocumentType {
        /// The declared root element name.
        name: String,
        /// The PUBLIC identifier, if any.
        public_id: Option<String>,
        /// The SYSTEM identifier, if any.
        system_id: Option<String>,
    },
}

/// Storage for a single node in the arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// The node kind and payload.
    pub kind: NodeKind,
    /// Parent node. The document root has none.
    pub parent: Option<NodeId>,
    /// First child.
    pub first_child: Option<NodeId>,
    /// Last child (for O(1) append).
    pub last_child: Option<NodeId>,
    /// Next sibling.
    pub next_sibling: Option<NodeId>,
    /// Previous sibling.
    pub prev_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        }
    }
}

/// An XML document: the node arena plus the XML-declaration fields.
#[derive(Debug)]
pub struct Document {
    /// The node arena. Index 0 is a placeholder (`NodeId` is non-zero).
    nodes: Vec<NodeData>,
    /// The document root node.
    root: NodeId,
    /// XML version from the declaration, e.g. "1.0".
    pub version: Option<String>,
    /// Encoding name from the declaration.
    pub encoding: Option<String>,
    /// Standalone flag from the declaration.
    pub standalone: Option<bool>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates a new empty document containing only the root node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(16);
        nodes.push(NodeData::new(NodeKind::Document)); // index 0: unused
        nodes.push(NodeData::new(NodeKind::Document));
        Self {
            nodes,
            root: NodeId::from_index(1),
            version: None,
            encoding: None,
            standalone: None,
        }
    }

    /// Parses an XML string with default options.
    ///
    /// # Errors
    ///
    /// Returns `XmlError` if the input is not well-formed XML.
    pub fn parse_str(input: &str) -> Result<Self, XmlError> {
        crate::parser::parse_str(input)
    }

    /// Parses XML from raw bytes, detecting the encoding automatically.
    ///
    /// # Errors
    ///
    /// Returns `XmlError` if the decoded input is not well-formed XML.
    pub fn parse_bytes(input: &[u8]) -> Result<Self, XmlError> {
        crate::parser::parse_bytes(input)
    }

    // -- Construction (the node-sink operations) --

    /// Creates a detached node and returns its id.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(NodeData::new(kind));
        id
    }

    /// Appends `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let prev_last = self.node(parent).last_child;
        {
            let child_data = self.node_mut(child);
            child_data.parent = Some(parent);
            child_data.prev_sibling = prev_last;
            child_data.next_sibling = None;
        }
        if let Some(prev) = prev_last {
            self.node_mut(prev).next_sibling = Some(child);
        } else {
            self.node_mut(parent).first_child = Some(child);
        }
        self.node_mut(parent).last_child = Some(child);
    }

    /// Appends character data to `parent`, coalescing with a trailing text
    /// node if one is already the last child.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.node(parent).last_child {
            if let NodeKind::Text { content } = &mut self.node_mut(last).kind {
                content.push_str(text);
                return;
            }
        }
        let id = self.create_node(NodeKind::Text {
            content: text.to_string(),
        });
        self.append_child(parent, id);
    }

    // -- Access --

    /// Returns the document root node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the single top-level element, if the document has one.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| matches!(self.node(id).kind, NodeKind::Element { .. }))
    }

    /// Returns the document type node, if the document has one.
    #[must_use]
    pub fn doctype(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| matches!(self.node(id).kind, NodeKind::DocumentType { .. }))
    }

    /// Returns the `NodeData` for the given node.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a node in this document.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Returns the name of an element, PI target, or document type name.
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { name, .. }
            | NodeKind::ProcessingInstruction { target: name, .. }
            | NodeKind::DocumentType { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the namespace URI of an element, if resolved.
    #[must_use]
    pub fn node_namespace(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { namespace, .. } => namespace.as_deref(),
            _ => None,
        }
    }

    /// Returns the text of a text, CDATA, comment, or PI node.
    #[must_use]
    pub fn node_text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text { content }
            | NodeKind::CData { content }
            | NodeKind::Comment { content } => Some(content),
            NodeKind::ProcessingInstruction { data, .. } => data.as_deref(),
            _ => None,
        }
    }

    /// Returns the concatenated text of a node and all its descendants.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, buf: &mut String) {
        match &self.node(id).kind {
            NodeKind::Text { content } | NodeKind::CData { content } => buf.push_str(content),
            _ => {
                for child in self.children(id) {
                    self.collect_text(child, buf);
                }
            }
        }
    }

    /// Returns the attributes of an element (empty for other node kinds).
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match &self.node(id).kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Looks up an attribute value by (local) name on an element.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    // -- Navigation --

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Returns the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    /// Returns the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    /// Iterates over the children of a node in document order.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).first_child,
        }
    }
}

/// Iterator over a node's children.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.doc.node(id).next_sibling;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_append_child_links() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_node(NodeKind::Element {
            name: "a".to_string(),
            prefix: None,
            namespace: None,
            attributes: vec![],
        });
        let b = doc.create_node(NodeKind::Element {
            name: "b".to_string(),
            prefix: None,
            namespace: None,
            attributes: vec![],
        });
        doc.append_child(root, a);
        doc.append_child(root, b);

        assert_eq!(doc.first_child(root), Some(a));
        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.parent(b), Some(root));
        assert_eq!(doc.children(root).collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn test_append_text_coalesces() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_text(root, "hello ");
        doc.append_text(root, "world");
        let children: Vec<_> = doc.children(root).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(doc.node_text(children[0]), Some("hello world"));
    }

    #[test]
    fn test_append_text_does_not_cross_markup() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_text(root, "before");
        let c = doc.create_node(NodeKind::Comment {
            content: "x".to_string(),
        });
        doc.append_child(root, c);
        doc.append_text(root, "after");
        assert_eq!(doc.children(root).count(), 3);
    }

    #[test]
    fn test_text_content_concatenates_descendants() {
        let mut doc = Document::new();
        let root = doc.root();
        let el = doc.create_node(NodeKind::Element {
            name: "p".to_string(),
            prefix: None,
            namespace: None,
            attributes: vec![],
        });
        doc.append_child(root, el);
        doc.append_text(el, "one ");
        let cd = doc.create_node(NodeKind::CData {
            content: "two".to_string(),
        });
        doc.append_child(el, cd);
        assert_eq!(doc.text_content(el), "one two");
    }

    #[test]
    fn test_attribute_lookup() {
        let mut doc = Document::new();
        let root = doc.root();
        let el = doc.create_node(NodeKind::Element {
            name: "e".to_string(),
            prefix: None,
            namespace: None,
            attributes: vec![Attribute::new("id", "7")],
        });
        doc.append_child(root, el);
        assert_eq!(doc.attribute(el, "id"), Some("7"));
        assert_eq!(doc.attribute(el, "missing"), None);
    }
}
