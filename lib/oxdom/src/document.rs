use crate::error::XmlSyntaxError;
use crate::name::{Name, XML_NAMESPACE};
use crate::parser::parse;
use std::fmt;

/// Identifier of a node inside a [`Document`].
///
/// Identifiers are allocated in document order: comparing two identifiers of the same document
/// compares the positions of their nodes. Attributes come after their owner element and before
/// its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The document node.
    pub const ROOT: Self = Self(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A position in the parsed text. Lines and columns start at 1, columns count characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextPosition {
    pub line: u64,
    pub column: u64,
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The content of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Root {
        children: Vec<NodeId>,
    },
    Element {
        name: Name,
        attributes: Vec<NodeId>,
        children: Vec<NodeId>,
        /// Namespace declarations made on this element, `None` is the default namespace.
        namespaces: Vec<(Option<String>, String)>,
    },
    Attribute {
        name: Name,
        value: String,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    position: TextPosition,
}

/// A parsed XML document.
///
/// Comments, processing instructions and the document type declaration are not kept.
/// Adjacent character data and CDATA sections are merged into a single text node.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    document_element: NodeId,
}

impl Document {
    /// Parses a complete XML document. It must have exactly one root element.
    pub fn parse(text: &str) -> Result<Self, XmlSyntaxError> {
        parse(text)
    }

    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root {
                    children: Vec::new(),
                },
                parent: None,
                position: TextPosition { line: 1, column: 1 },
            }],
            document_element: NodeId::ROOT,
        }
    }

    /// Appends a node as the last child (or attribute) of `parent`.
    pub(crate) fn push(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        position: TextPosition,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let is_attribute = matches!(kind, NodeKind::Attribute { .. });
        let is_element = matches!(kind, NodeKind::Element { .. });
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            position,
        });
        match &mut self.nodes[parent.0].kind {
            NodeKind::Root { children } => {
                if is_element {
                    self.document_element = id;
                }
                children.push(id)
            }
            NodeKind::Element {
                attributes,
                children,
                ..
            } => {
                if is_attribute {
                    attributes.push(id)
                } else {
                    children.push(id)
                }
            }
            NodeKind::Attribute { .. } | NodeKind::Text(_) => (),
        }
        id
    }

    /// Appends text to `parent`, merging it with the previous child if it is a text node.
    pub(crate) fn push_text(&mut self, parent: NodeId, text: &str, position: TextPosition) {
        let last = match &self.nodes[parent.0].kind {
            NodeKind::Root { children } | NodeKind::Element { children, .. } => {
                children.last().copied()
            }
            NodeKind::Attribute { .. } | NodeKind::Text(_) => None,
        };
        if let Some(last) = last {
            if let NodeKind::Text(previous) = &mut self.nodes[last.0].kind {
                previous.push_str(text);
                return;
            }
        }
        self.push(parent, NodeKind::Text(text.to_owned()), position);
    }

    pub(crate) fn has_document_element(&self) -> bool {
        self.document_element != NodeId::ROOT
    }

    /// The document node.
    #[inline]
    pub fn root(&self) -> NodeRef<'_> {
        self.node(NodeId::ROOT)
    }

    /// The root element.
    #[inline]
    pub fn document_element(&self) -> NodeRef<'_> {
        self.node(self.document_element)
    }

    /// Returns the node with the given identifier.
    ///
    /// Panics if the identifier does not come from this document.
    #[inline]
    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        assert!(id.0 < self.nodes.len(), "unknown node {id:?}");
        NodeRef { document: self, id }
    }

    /// Number of nodes, attributes and text nodes included.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates on all nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef<'_>> {
        (0..self.nodes.len()).map(move |i| NodeRef {
            document: self,
            id: NodeId(i),
        })
    }
}

/// A borrowed reference to a node of a [`Document`].
#[derive(Clone, Copy)]
pub struct NodeRef<'d> {
    document: &'d Document,
    id: NodeId,
}

impl<'d> NodeRef<'d> {
    #[inline]
    pub fn id(self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn document(self) -> &'d Document {
        self.document
    }

    #[inline]
    pub fn kind(self) -> &'d NodeKind {
        &self.document.nodes[self.id.0].kind
    }

    #[inline]
    pub fn position(self) -> TextPosition {
        self.document.nodes[self.id.0].position
    }

    #[inline]
    pub fn parent(self) -> Option<Self> {
        self.document.nodes[self.id.0]
            .parent
            .map(|id| self.document.node(id))
    }

    #[inline]
    pub fn is_root(self) -> bool {
        matches!(self.kind(), NodeKind::Root { .. })
    }

    #[inline]
    pub fn is_element(self) -> bool {
        matches!(self.kind(), NodeKind::Element { .. })
    }

    #[inline]
    pub fn is_attribute(self) -> bool {
        matches!(self.kind(), NodeKind::Attribute { .. })
    }

    #[inline]
    pub fn is_text(self) -> bool {
        matches!(self.kind(), NodeKind::Text(_))
    }

    /// The name of an element or an attribute.
    pub fn name(self) -> Option<&'d Name> {
        match self.kind() {
            NodeKind::Element { name, .. } | NodeKind::Attribute { name, .. } => Some(name),
            NodeKind::Root { .. } | NodeKind::Text(_) => None,
        }
    }

    /// The child nodes (elements and text) of the document node or of an element.
    pub fn children(self) -> impl Iterator<Item = NodeRef<'d>> + 'd {
        let document = self.document;
        let children: &'d [NodeId] = match self.kind() {
            NodeKind::Root { children } | NodeKind::Element { children, .. } => children,
            NodeKind::Attribute { .. } | NodeKind::Text(_) => &[],
        };
        children.iter().map(move |id| document.node(*id))
    }

    pub fn child_elements(self) -> impl Iterator<Item = NodeRef<'d>> + 'd {
        self.children().filter(|n| n.is_element())
    }

    pub fn attributes(self) -> impl Iterator<Item = NodeRef<'d>> + 'd {
        let document = self.document;
        let attributes: &'d [NodeId] = match self.kind() {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        };
        attributes.iter().map(move |id| document.node(*id))
    }

    pub fn attribute(self, namespace: &str, local: &str) -> Option<NodeRef<'d>> {
        self.attributes()
            .find(|a| a.name().is_some_and(|n| n.is(namespace, local)))
    }

    pub fn attribute_value(self, namespace: &str, local: &str) -> Option<&'d str> {
        match self.attribute(namespace, local)?.kind() {
            NodeKind::Attribute { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The content of a text node or the value of an attribute.
    pub fn text(self) -> Option<&'d str> {
        match self.kind() {
            NodeKind::Text(text) => Some(text),
            NodeKind::Attribute { value, .. } => Some(value),
            NodeKind::Root { .. } | NodeKind::Element { .. } => None,
        }
    }

    /// The XPath string value: concatenation of all descendant text for elements and documents.
    pub fn string_value(self) -> String {
        match self.kind() {
            NodeKind::Text(text) => text.clone(),
            NodeKind::Attribute { value, .. } => value.clone(),
            NodeKind::Root { .. } | NodeKind::Element { .. } => {
                let mut value = String::new();
                for node in self.descendants() {
                    if let NodeKind::Text(text) = node.kind() {
                        value.push_str(text);
                    }
                }
                value
            }
        }
    }

    /// Descendants in document order, attributes excluded, self excluded.
    pub fn descendants(self) -> Descendants<'d> {
        let mut stack: Vec<NodeRef<'d>> = self.children().collect();
        stack.reverse();
        Descendants { stack }
    }

    /// Ancestors from the parent to the document node.
    pub fn ancestors(self) -> impl Iterator<Item = NodeRef<'d>> + 'd {
        std::iter::successors(self.parent(), |n| n.parent())
    }

    /// Resolves a namespace prefix (`None` for the default namespace) in the scope of this node.
    pub fn lookup_namespace(self, prefix: Option<&str>) -> Option<&'d str> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE);
        }
        let mut current = Some(self);
        while let Some(node) = current {
            if let NodeKind::Element { namespaces, .. } = node.kind() {
                if let Some((_, namespace)) = namespaces.iter().find(|(p, _)| p.as_deref() == prefix)
                {
                    return if namespace.is_empty() {
                        None
                    } else {
                        Some(namespace)
                    };
                }
            }
            current = node.parent();
        }
        None
    }

    /// A path that identifies this node, like `/body[1]/p[2]`, `/body[1]/@n` or `/body[1]/text()[1]`.
    ///
    /// Element steps are written with the name as it appears in the source and indexed among the
    /// siblings sharing the same expanded name.
    pub fn path(self) -> String {
        let mut steps = Vec::new();
        let mut current = self;
        while let Some(parent) = current.parent() {
            steps.push(current.step(parent));
            current = parent;
        }
        if steps.is_empty() {
            return "/".into();
        }
        steps.reverse();
        let mut path = String::new();
        for step in steps {
            path.push('/');
            path.push_str(&step);
        }
        path
    }

    fn step(self, parent: NodeRef<'d>) -> String {
        match self.kind() {
            NodeKind::Element { name, .. } => {
                let index = parent
                    .children()
                    .take_while(|n| n.id != self.id)
                    .filter(|n| n.name() == Some(name) && n.is_element())
                    .count()
                    + 1;
                format!("{name}[{index}]")
            }
            NodeKind::Attribute { name, .. } => format!("@{name}"),
            NodeKind::Text(_) => {
                let index = parent
                    .children()
                    .take_while(|n| n.id != self.id)
                    .filter(|n| n.is_text())
                    .count()
                    + 1;
                format!("text()[{index}]")
            }
            NodeKind::Root { .. } => String::new(),
        }
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.document, other.document)
    }
}

impl Eq for NodeRef<'_> {}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("path", &self.path())
            .finish()
    }
}

/// Iterator returned by [`NodeRef::descendants`].
pub struct Descendants<'d> {
    stack: Vec<NodeRef<'d>>,
}

impl<'d> Iterator for Descendants<'d> {
    type Item = NodeRef<'d>;

    fn next(&mut self) -> Option<NodeRef<'d>> {
        let node = self.stack.pop()?;
        let before = self.stack.len();
        self.stack.extend(node.children());
        self.stack[before..].reverse();
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths() -> Result<(), XmlSyntaxError> {
        let doc = Document::parse("<a><b/>t<c x='1'/><b>u</b></a>")?;
        let a = doc.document_element();
        let paths: Vec<_> = a.descendants().map(|n| n.path()).collect();
        assert_eq!(
            paths,
            [
                "/a[1]/b[1]",
                "/a[1]/text()[1]",
                "/a[1]/c[1]",
                "/a[1]/b[2]",
                "/a[1]/b[2]/text()[1]"
            ]
        );
        let x = a.child_elements().nth(1).and_then(|c| c.attribute("", "x"));
        assert_eq!(x.map(|x| x.path()).as_deref(), Some("/a[1]/c[1]/@x"));
        assert_eq!(doc.root().path(), "/");
        Ok(())
    }

    #[test]
    fn document_order() -> Result<(), XmlSyntaxError> {
        let doc = Document::parse("<a x='1'><b y='2'/></a>")?;
        let ids: Vec<_> = doc.nodes().map(|n| n.id().index()).collect();
        assert_eq!(ids, [0, 1, 2, 3, 4]);
        assert!(doc.node(NodeId(2)).is_attribute());
        assert!(doc.node(NodeId(3)).is_element());
        Ok(())
    }

    #[test]
    fn string_value() -> Result<(), XmlSyntaxError> {
        let doc = Document::parse("<a>x<b>y</b>z</a>")?;
        assert_eq!(doc.document_element().string_value(), "xyz");
        Ok(())
    }
}
