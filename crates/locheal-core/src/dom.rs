//! Index-arena view of a parsed HTML document.
//!
//! Nodes are stored in pre-order, so comparing indices compares document
//! order and every subtree occupies a contiguous index range. Element and
//! attribute names are lower-cased at build time.

use scraper::{ElementRef, Html};

/// Index of a node inside a [`Dom`].
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Last index inside this node's subtree (itself when it has no children).
    pub subtree_end: NodeId,
}

#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<Node>,
}

impl Dom {
    /// The document node.
    pub const ROOT: NodeId = 0;

    /// Parse `markup` as an HTML5 document. Parsing never fails; malformed
    /// markup is repaired by the HTML parser.
    pub fn parse(markup: &str) -> Self {
        let html = Html::parse_document(markup);
        Self::from_html(&html)
    }

    /// Build the arena from an already parsed document.
    pub fn from_html(html: &Html) -> Self {
        let mut nodes = vec![Node {
            kind: NodeKind::Document,
            parent: None,
            children: Vec::new(),
            subtree_end: 0,
        }];

        let root = html.root_element();
        let mut stack = vec![(*root, Self::ROOT)];
        while let Some((node_ref, parent)) = stack.pop() {
            let kind = match node_ref.value() {
                scraper::Node::Element(element) => NodeKind::Element {
                    name: element.name().to_ascii_lowercase(),
                    attributes: element
                        .attrs()
                        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                        .collect(),
                },
                scraper::Node::Text(text) => {
                    let content: &str = text;
                    NodeKind::Text(content.to_string())
                }
                _ => continue,
            };
            let is_element = matches!(kind, NodeKind::Element { .. });

            let index = nodes.len();
            nodes.push(Node {
                kind,
                parent: Some(parent),
                children: Vec::new(),
                subtree_end: index,
            });
            nodes[parent].children.push(index);

            if is_element {
                // Reversed so the first child is popped, and numbered, first.
                let children: Vec<_> = node_ref.children().collect();
                for child in children.into_iter().rev() {
                    stack.push((child, index));
                }
            }
        }

        for index in (0..nodes.len()).rev() {
            if let Some(&last) = nodes[index].children.last() {
                nodes[index].subtree_end = nodes[last].subtree_end;
            }
        }

        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn subtree_end(&self, id: NodeId) -> NodeId {
        self.nodes[id].subtree_end
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id].kind, NodeKind::Element { .. })
    }

    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        match &self.nodes[id].kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated text of every text node in the subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        match &self.nodes[id].kind {
            NodeKind::Text(text) => text.clone(),
            _ => (id..=self.subtree_end(id))
                .filter_map(|i| match &self.nodes[i].kind {
                    NodeKind::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Element ids whose tag equals `tag` (ASCII case-insensitive), in
    /// document order.
    pub fn elements_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        (0..self.nodes.len()).filter(move |&i| {
            self.element_name(i)
                .is_some_and(|name| name.eq_ignore_ascii_case(tag))
        })
    }
}

/// Outer markup of every element whose tag equals `tag`, in document order.
///
/// Works directly on the parsed document so the serialization matches the
/// parser's own output.
pub fn outer_html_of(html: &Html, tag: &str) -> Vec<String> {
    html.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name().eq_ignore_ascii_case(tag))
        .map(|el| el.html())
        .collect()
}
