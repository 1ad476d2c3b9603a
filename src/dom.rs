//! roxmltree-backed input document tree.
//!
//! roxmltree keeps attributes as element data rather than as navigable
//! nodes, so the XPath-facing node type wraps either a real tree node or a
//! (parent element, attribute index) pair.

use crate::xpath::{DataSourceNode, NodeType, QName};
use roxmltree::Node;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

pub struct XmlDocument<'input> {
    doc: roxmltree::Document<'input>,
}

impl<'input> XmlDocument<'input> {
    pub fn parse(text: &'input str) -> Result<Self, roxmltree::Error> {
        Ok(Self {
            doc: roxmltree::Document::parse(text)?,
        })
    }

    pub fn root(&self) -> XmlNode<'_, 'input> {
        XmlNode::Tree(self.doc.root())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum XmlNode<'a, 'input> {
    Tree(Node<'a, 'input>),
    Attribute {
        parent: Node<'a, 'input>,
        index: usize,
    },
}

impl<'a, 'input> XmlNode<'a, 'input> {
    fn attr(&self) -> Option<roxmltree::Attribute<'a, 'input>> {
        match self {
            XmlNode::Attribute { parent, index } => parent.attributes().nth(*index),
            XmlNode::Tree(_) => None,
        }
    }
}

impl<'a, 'input> PartialEq for XmlNode<'a, 'input> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (XmlNode::Tree(a), XmlNode::Tree(b)) => a.id() == b.id(),
            (
                XmlNode::Attribute { parent: p1, index: i1 },
                XmlNode::Attribute { parent: p2, index: i2 },
            ) => p1.id() == p2.id() && i1 == i2,
            _ => false,
        }
    }
}

impl<'a, 'input> Eq for XmlNode<'a, 'input> {}

impl<'a, 'input> PartialOrd for XmlNode<'a, 'input> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Document order, with an element's attributes sorting directly after the
// element itself and before its children (whose ids are strictly greater).
impl<'a, 'input> Ord for XmlNode<'a, 'input> {
    fn cmp(&self, other: &Self) -> Ordering {
        fn key(node: &XmlNode) -> (usize, usize) {
            match node {
                XmlNode::Tree(n) => (n.id().get() as usize, 0),
                XmlNode::Attribute { parent, index } => (parent.id().get() as usize, index + 1),
            }
        }
        key(self).cmp(&key(other))
    }
}

impl<'a, 'input> Hash for XmlNode<'a, 'input> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            XmlNode::Tree(n) => {
                0u8.hash(state);
                n.id().hash(state);
            }
            XmlNode::Attribute { parent, index } => {
                1u8.hash(state);
                parent.id().hash(state);
                index.hash(state);
            }
        }
    }
}

impl<'a> DataSourceNode<'a> for XmlNode<'a, 'a> {
    fn node_type(&self) -> NodeType {
        match self {
            XmlNode::Attribute { .. } => NodeType::Attribute,
            XmlNode::Tree(n) => {
                if n.is_root() {
                    NodeType::Root
                } else if n.is_text() {
                    NodeType::Text
                } else if n.is_comment() {
                    NodeType::Comment
                } else if n.is_pi() {
                    NodeType::ProcessingInstruction
                } else {
                    NodeType::Element
                }
            }
        }
    }

    fn name(&self) -> Option<QName<'a>> {
        match self {
            XmlNode::Tree(n) => {
                if n.is_element() {
                    Some(QName {
                        prefix: None,
                        local_part: n.tag_name().name(),
                    })
                } else if n.is_pi() {
                    n.pi().map(|pi| QName {
                        prefix: None,
                        local_part: pi.target,
                    })
                } else {
                    None
                }
            }
            XmlNode::Attribute { .. } => self.attr().map(|a| QName {
                prefix: None,
                local_part: a.name(),
            }),
        }
    }

    fn string_value(&self) -> String {
        match self {
            XmlNode::Tree(n) => {
                if n.is_element() || n.is_root() {
                    n.descendants()
                        .filter_map(|d| if d.is_text() { d.text() } else { None })
                        .collect()
                } else if n.is_pi() {
                    n.pi().and_then(|pi| pi.value).unwrap_or("").to_string()
                } else {
                    n.text().unwrap_or("").to_string()
                }
            }
            XmlNode::Attribute { .. } => self
                .attr()
                .map(|a| a.value().to_string())
                .unwrap_or_default(),
        }
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            XmlNode::Tree(n) if n.is_element() => {
                let parent = *n;
                let count = n.attributes().len();
                Box::new((0..count).map(move |index| XmlNode::Attribute { parent, index }))
            }
            _ => Box::new(std::iter::empty()),
        }
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            XmlNode::Tree(n) => Box::new(n.children().map(XmlNode::Tree)),
            XmlNode::Attribute { .. } => Box::new(std::iter::empty()),
        }
    }

    fn parent(&self) -> Option<Self> {
        match self {
            XmlNode::Tree(n) => n.parent().map(XmlNode::Tree),
            XmlNode::Attribute { parent, .. } => Some(XmlNode::Tree(*parent)),
        }
    }
}
