//! The result tree and the builder seam between the executor and the
//! output format.

use crate::error::ExecutionError;

/// Semantic actions for building transformation output, independent of
/// the concrete tree representation. The executor only talks to this
/// trait, so bodies that feed an element, an attribute value, or the
/// document all run through the same code.
pub trait OutputBuilder {
    fn start_element(&mut self, name: &str) -> Result<(), ExecutionError>;
    fn end_element(&mut self) -> Result<(), ExecutionError>;

    /// Sets an attribute on the currently open element. Fails once child
    /// content has been written to it.
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), ExecutionError>;

    fn add_text(&mut self, text: &str) -> Result<(), ExecutionError>;
    fn add_comment(&mut self, text: &str) -> Result<(), ExecutionError>;
}

/// A node of the in-memory result tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultNode {
    Element {
        name: String,
        attributes: Vec<(String, String)>,
        children: Vec<ResultNode>,
    },
    Text(String),
    Comment(String),
}

/// The finished result: a root holding top-level nodes.
#[derive(Debug, Default)]
pub struct ResultTree {
    pub children: Vec<ResultNode>,
}

/// Builds a [`ResultTree`] from executor events.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    roots: Vec<ResultNode>,
    /// Open elements, innermost last.
    open: Vec<ResultNode>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder::default()
    }

    pub fn finish(mut self) -> ResultTree {
        // Unbalanced opens cannot happen: the executor closes every
        // element it opens. Fold any stragglers in anyway.
        while !self.open.is_empty() {
            let _ = self.end_element();
        }
        ResultTree { children: self.roots }
    }

    fn append(&mut self, node: ResultNode) {
        match self.open.last_mut() {
            Some(ResultNode::Element { children, .. }) => children.push(node),
            _ => self.roots.push(node),
        }
    }
}

impl OutputBuilder for TreeBuilder {
    fn start_element(&mut self, name: &str) -> Result<(), ExecutionError> {
        self.open.push(ResultNode::Element {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        });
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), ExecutionError> {
        if let Some(node) = self.open.pop() {
            self.append(node);
        }
        Ok(())
    }

    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), ExecutionError> {
        match self.open.last_mut() {
            Some(ResultNode::Element { attributes, children, .. }) => {
                if !children.is_empty() {
                    return Err(ExecutionError::AttributeAfterContent(name.to_string()));
                }
                // A later binding for the same name replaces the earlier one.
                if let Some(slot) = attributes.iter_mut().find(|(k, _)| k == name) {
                    slot.1 = value.to_string();
                } else {
                    attributes.push((name.to_string(), value.to_string()));
                }
                Ok(())
            }
            _ => Err(ExecutionError::AttributeAfterContent(name.to_string())),
        }
    }

    fn add_text(&mut self, text: &str) -> Result<(), ExecutionError> {
        if text.is_empty() {
            return Ok(());
        }
        // Merge adjacent text so serialization sees one node.
        let target = match self.open.last_mut() {
            Some(ResultNode::Element { children, .. }) => children,
            _ => &mut self.roots,
        };
        if let Some(ResultNode::Text(prev)) = target.last_mut() {
            prev.push_str(text);
        } else {
            target.push(ResultNode::Text(text.to_string()));
        }
        Ok(())
    }

    fn add_comment(&mut self, text: &str) -> Result<(), ExecutionError> {
        self.append(ResultNode::Comment(text.to_string()));
        Ok(())
    }
}

/// Captures only text, discarding markup. Used for `xsl:attribute`
/// bodies and for bodies evaluated purely for their string value.
#[derive(Debug, Default)]
pub struct TextCapture {
    text: String,
}

impl TextCapture {
    pub fn new() -> Self {
        TextCapture::default()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl OutputBuilder for TextCapture {
    fn start_element(&mut self, _name: &str) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn set_attribute(&mut self, _name: &str, _value: &str) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn add_text(&mut self, text: &str) -> Result<(), ExecutionError> {
        self.text.push_str(text);
        Ok(())
    }

    fn add_comment(&mut self, _text: &str) -> Result<(), ExecutionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_elements() {
        let mut b = TreeBuilder::new();
        b.start_element("doc").unwrap();
        b.set_attribute("id", "d1").unwrap();
        b.start_element("item").unwrap();
        b.add_text("hi").unwrap();
        b.end_element().unwrap();
        b.end_element().unwrap();

        let tree = b.finish();
        assert_eq!(tree.children.len(), 1);
        match &tree.children[0] {
            ResultNode::Element { name, attributes, children } => {
                assert_eq!(name, "doc");
                assert_eq!(attributes, &[("id".to_string(), "d1".to_string())]);
                assert_eq!(children.len(), 1);
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn attribute_after_content_is_an_error() {
        let mut b = TreeBuilder::new();
        b.start_element("doc").unwrap();
        b.add_text("x").unwrap();
        assert!(matches!(
            b.set_attribute("id", "d1"),
            Err(ExecutionError::AttributeAfterContent(_))
        ));
    }

    #[test]
    fn repeated_attribute_overwrites() {
        let mut b = TreeBuilder::new();
        b.start_element("doc").unwrap();
        b.set_attribute("id", "a").unwrap();
        b.set_attribute("id", "b").unwrap();
        let tree = b.finish();
        match &tree.children[0] {
            ResultNode::Element { attributes, .. } => {
                assert_eq!(attributes, &[("id".to_string(), "b".to_string())]);
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn adjacent_text_merges() {
        let mut b = TreeBuilder::new();
        b.start_element("p").unwrap();
        b.add_text("a").unwrap();
        b.add_text("b").unwrap();
        b.end_element().unwrap();
        let tree = b.finish();
        match &tree.children[0] {
            ResultNode::Element { children, .. } => {
                assert_eq!(children, &[ResultNode::Text("ab".to_string())]);
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn text_capture_flattens_markup() {
        let mut c = TextCapture::new();
        c.start_element("b").unwrap();
        c.add_text("bold").unwrap();
        c.end_element().unwrap();
        c.add_text(" plain").unwrap();
        assert_eq!(c.into_string(), "bold plain");
    }
}
