//! The read-only tree abstraction the XPath and template engines are written against.
use std::hash::Hash;

/// A qualified name: optional prefix plus local part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QName<'a> {
    pub prefix: Option<&'a str>,
    pub local_part: &'a str,
}

/// Node kinds of the XPath 1.0 data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// A node in a navigable, read-only document tree.
///
/// Everything above the concrete DOM (XPath evaluation, match patterns, the
/// template executor) sees input documents only through this trait, so the
/// backing representation stays swappable and the engines stay unit-testable
/// against a mock tree.
///
/// `'a` is the lifetime of the underlying document.
pub trait DataSourceNode<'a>:
    std::fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + PartialOrd + Ord
{
    fn node_type(&self) -> NodeType;

    /// The node's qualified name; `None` for unnamed kinds (root, text, comment).
    fn name(&self) -> Option<QName<'a>>;

    /// The XPath 1.0 string-value: text content for text nodes, concatenated
    /// descendant text for elements and the root, the value for attributes.
    fn string_value(&self) -> String;

    /// Attribute pseudo-nodes of this node; empty for non-elements.
    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// Child nodes in document order; empty for leaves.
    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// The parent node, `None` for the root.
    fn parent(&self) -> Option<Self>;
}

#[cfg(test)]
pub mod mock {
    //! A tiny arena-backed tree for exercising the engines without XML.
    use super::*;
    use std::cmp::Ordering;
    use std::hash::Hasher;

    #[derive(Debug)]
    pub struct MockData {
        pub node_type: NodeType,
        pub name: Option<&'static str>,
        pub value: &'static str,
        pub parent: Option<usize>,
        pub children: Vec<usize>,
        pub attributes: Vec<usize>,
    }

    #[derive(Debug)]
    pub struct MockTree {
        pub nodes: Vec<MockData>,
    }

    #[derive(Debug, Clone, Copy)]
    pub struct MockNode<'a> {
        pub id: usize,
        pub tree: &'a MockTree,
    }

    impl<'a> PartialEq for MockNode<'a> {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }
    impl<'a> Eq for MockNode<'a> {}
    impl<'a> PartialOrd for MockNode<'a> {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }
    impl<'a> Ord for MockNode<'a> {
        fn cmp(&self, other: &Self) -> Ordering {
            self.id.cmp(&other.id)
        }
    }
    impl<'a> Hash for MockNode<'a> {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }

    impl<'a> DataSourceNode<'a> for MockNode<'a> {
        fn node_type(&self) -> NodeType {
            self.tree.nodes[self.id].node_type
        }

        fn name(&self) -> Option<QName<'a>> {
            self.tree.nodes[self.id].name.map(|n| QName {
                prefix: None,
                local_part: n,
            })
        }

        fn string_value(&self) -> String {
            let data = &self.tree.nodes[self.id];
            match data.node_type {
                NodeType::Element | NodeType::Root => {
                    let mut out = String::new();
                    for &child in &data.children {
                        out.push_str(&MockNode { id: child, tree: self.tree }.string_value());
                    }
                    out
                }
                _ => data.value.to_string(),
            }
        }

        fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
            let tree = self.tree;
            let ids = self.tree.nodes[self.id].attributes.clone();
            Box::new(ids.into_iter().map(move |id| MockNode { id, tree }))
        }

        fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
            let tree = self.tree;
            let ids = self.tree.nodes[self.id].children.clone();
            Box::new(ids.into_iter().map(move |id| MockNode { id, tree }))
        }

        fn parent(&self) -> Option<Self> {
            self.tree.nodes[self.id].parent.map(|id| MockNode { id, tree: self.tree })
        }
    }

    /// Builds:
    ///
    /// ```text
    /// 0 root
    /// └─ 1 <para id="p1" lang="en">     (attrs: 2=id, 3=lang)
    ///    └─ 4 "Hello"
    /// └─ 5 <div>
    ///    └─ 6 <para>
    ///       └─ 7 "World"
    /// ```
    pub fn sample_tree() -> MockTree {
        MockTree {
            nodes: vec![
                MockData {
                    node_type: NodeType::Root,
                    name: None,
                    value: "",
                    parent: None,
                    children: vec![1, 5],
                    attributes: vec![],
                },
                MockData {
                    node_type: NodeType::Element,
                    name: Some("para"),
                    value: "",
                    parent: Some(0),
                    children: vec![4],
                    attributes: vec![2, 3],
                },
                MockData {
                    node_type: NodeType::Attribute,
                    name: Some("id"),
                    value: "p1",
                    parent: Some(1),
                    children: vec![],
                    attributes: vec![],
                },
                MockData {
                    node_type: NodeType::Attribute,
                    name: Some("lang"),
                    value: "en",
                    parent: Some(1),
                    children: vec![],
                    attributes: vec![],
                },
                MockData {
                    node_type: NodeType::Text,
                    name: None,
                    value: "Hello",
                    parent: Some(1),
                    children: vec![],
                    attributes: vec![],
                },
                MockData {
                    node_type: NodeType::Element,
                    name: Some("div"),
                    value: "",
                    parent: Some(0),
                    children: vec![6],
                    attributes: vec![],
                },
                MockData {
                    node_type: NodeType::Element,
                    name: Some("para"),
                    value: "",
                    parent: Some(5),
                    children: vec![7],
                    attributes: vec![],
                },
                MockData {
                    node_type: NodeType::Text,
                    name: None,
                    value: "World",
                    parent: Some(6),
                    children: vec![],
                    attributes: vec![],
                },
            ],
        }
    }

    pub fn node(tree: &MockTree, id: usize) -> MockNode<'_> {
        MockNode { id, tree }
    }
}
