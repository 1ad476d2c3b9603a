//! Parsing and evaluation of `xsl:template` match patterns.
//!
//! Patterns are a restricted path grammar: unions of absolute or relative
//! child/attribute paths, matched right-to-left against a node's ancestor
//! chain.

use crate::error::CompileError;
use crate::xpath::ast::{KindTest, NodeTest};
use crate::xpath::datasource::{DataSourceNode, NodeType};
use crate::xpath::parser as xpath_parser;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    combinator::{map, opt},
    multi::{separated_list0, separated_list1},
    sequence::preceded,
};
use std::fmt;

/// A compiled match pattern; may be a union of several paths (`para|note`).
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    alternatives: Vec<PathPattern>,
    source: String,
}

#[derive(Debug, Clone, PartialEq)]
struct PathPattern {
    is_absolute: bool,
    steps: Vec<PatternStep>,
}

#[derive(Debug, Clone, PartialEq)]
struct PatternStep {
    axis: PatternAxis,
    node_test: NodeTest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternAxis {
    Child,
    Attribute,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl Pattern {
    pub fn parse(text: &str) -> Result<Pattern, CompileError> {
        match pattern(text.trim()) {
            Ok(("", alternatives)) => Ok(Pattern {
                alternatives,
                source: text.to_string(),
            }),
            Ok((rem, _)) => Err(CompileError::Pattern {
                pattern: text.to_string(),
                message: format!("unconsumed input: '{}'", rem),
            }),
            Err(e) => Err(CompileError::Pattern {
                pattern: text.to_string(),
                message: e.to_string(),
            }),
        }
    }

    pub fn matches<'a, N: DataSourceNode<'a>>(&self, node: N, root: N) -> bool {
        self.alternatives.iter().any(|alt| alt.matches(node, root))
    }

    /// Default priority per XSLT 1.0 §5.5: a bare name test is 0.0, a bare
    /// wildcard or kind test is -0.5, anything more specific is 0.5. A union
    /// takes the maximum of its alternatives.
    pub fn default_priority(&self) -> f64 {
        self.alternatives
            .iter()
            .map(PathPattern::default_priority)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

impl PathPattern {
    fn matches<'a, N: DataSourceNode<'a>>(&self, node: N, root: N) -> bool {
        if self.is_absolute && self.steps.is_empty() {
            // The "/" pattern matches only the root.
            return node == root;
        }

        let mut current = Some(node);
        for step in self.steps.iter().rev() {
            match current {
                Some(n) if step.matches(n) => current = n.parent(),
                _ => return false,
            }
        }

        if self.is_absolute {
            current == Some(root)
        } else {
            true
        }
    }

    fn default_priority(&self) -> f64 {
        if self.steps.len() != 1 {
            return 0.5;
        }
        match &self.steps[0].node_test {
            NodeTest::Name(_) => 0.0,
            _ => -0.5,
        }
    }
}

impl PatternStep {
    fn matches<'a, N: DataSourceNode<'a>>(&self, node: N) -> bool {
        let node_type = node.node_type();
        match self.axis {
            PatternAxis::Attribute => {
                if node_type != NodeType::Attribute {
                    return false;
                }
            }
            PatternAxis::Child => {
                // Patterns on the child axis can match elements, text,
                // comments, and the root.
                if node_type == NodeType::Attribute {
                    return false;
                }
            }
        }

        match &self.node_test {
            NodeTest::Wildcard => match self.axis {
                PatternAxis::Child => node_type == NodeType::Element,
                PatternAxis::Attribute => true,
            },
            NodeTest::Name(name) => node.name().is_some_and(|q| q.local_part == name),
            NodeTest::Kind(kind) => match kind {
                KindTest::Text => node_type == NodeType::Text,
                KindTest::Comment => node_type == NodeType::Comment,
                KindTest::ProcessingInstruction => {
                    node_type == NodeType::ProcessingInstruction
                }
                KindTest::Node => node_type != NodeType::Root,
            },
            NodeTest::ContextNode => false,
        }
    }
}

// --- Grammar ---

fn pattern_step(input: &str) -> IResult<&str, PatternStep> {
    alt((
        map(preceded(tag("@"), xpath_parser::node_test), |nt| PatternStep {
            axis: PatternAxis::Attribute,
            node_test: nt,
        }),
        map(xpath_parser::node_test, |nt| PatternStep {
            axis: PatternAxis::Child,
            node_test: nt,
        }),
    ))
    .parse(input)
}

fn path(input: &str) -> IResult<&str, PathPattern> {
    let (rest, lead) = opt(tag("/")).parse(input)?;
    let is_absolute = lead.is_some();

    let (rest, steps) = if is_absolute {
        // "/" alone is valid; so are "/*" and "/doc/item".
        separated_list0(tag("/"), pattern_step).parse(rest)?
    } else {
        separated_list1(tag("/"), pattern_step).parse(rest)?
    };

    Ok((rest, PathPattern { is_absolute, steps }))
}

fn pattern(input: &str) -> IResult<&str, Vec<PathPattern>> {
    separated_list1(tag("|"), path).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xpath::datasource::mock::{node, sample_tree};

    #[test]
    fn grammar_accepts_supported_patterns() {
        for text in ["/", "/*", "para", "doc/para", "text()", "@id", "@*", "para|div", "@*|node()"] {
            assert!(Pattern::parse(text).is_ok(), "should parse: {}", text);
        }
    }

    #[test]
    fn grammar_rejects_garbage() {
        assert!(Pattern::parse("para[").is_err());
        assert!(Pattern::parse("..").is_err());
    }

    #[test]
    fn root_pattern_matches_only_root() {
        let tree = sample_tree();
        let p = Pattern::parse("/").unwrap();
        assert!(p.matches(node(&tree, 0), node(&tree, 0)));
        assert!(!p.matches(node(&tree, 1), node(&tree, 0)));
    }

    #[test]
    fn name_pattern() {
        let tree = sample_tree();
        let p = Pattern::parse("para").unwrap();
        assert!(p.matches(node(&tree, 1), node(&tree, 0)));
        assert!(p.matches(node(&tree, 6), node(&tree, 0)));
        assert!(!p.matches(node(&tree, 5), node(&tree, 0)));
    }

    #[test]
    fn multi_step_pattern_checks_ancestry() {
        let tree = sample_tree();
        let p = Pattern::parse("div/para").unwrap();
        assert!(p.matches(node(&tree, 6), node(&tree, 0)));
        assert!(!p.matches(node(&tree, 1), node(&tree, 0)));
    }

    #[test]
    fn absolute_pattern_anchors_at_root() {
        let tree = sample_tree();
        let p = Pattern::parse("/para").unwrap();
        assert!(p.matches(node(&tree, 1), node(&tree, 0)));
        assert!(!p.matches(node(&tree, 6), node(&tree, 0)));
    }

    #[test]
    fn attribute_and_union_patterns() {
        let tree = sample_tree();
        let p = Pattern::parse("@id").unwrap();
        assert!(p.matches(node(&tree, 2), node(&tree, 0)));
        assert!(!p.matches(node(&tree, 1), node(&tree, 0)));

        let u = Pattern::parse("@*|node()").unwrap();
        assert!(u.matches(node(&tree, 2), node(&tree, 0))); // attribute
        assert!(u.matches(node(&tree, 1), node(&tree, 0))); // element
        assert!(u.matches(node(&tree, 4), node(&tree, 0))); // text
        assert!(!u.matches(node(&tree, 0), node(&tree, 0))); // not the root
    }

    #[test]
    fn text_pattern() {
        let tree = sample_tree();
        let p = Pattern::parse("text()").unwrap();
        assert!(p.matches(node(&tree, 4), node(&tree, 0)));
        assert!(!p.matches(node(&tree, 1), node(&tree, 0)));
    }

    #[test]
    fn default_priorities() {
        assert_eq!(Pattern::parse("para").unwrap().default_priority(), 0.0);
        assert_eq!(Pattern::parse("*").unwrap().default_priority(), -0.5);
        assert_eq!(Pattern::parse("node()").unwrap().default_priority(), -0.5);
        assert_eq!(Pattern::parse("doc/para").unwrap().default_priority(), 0.5);
        assert_eq!(Pattern::parse("/").unwrap().default_priority(), 0.5);
        // A union is as specific as its most specific alternative.
        assert_eq!(Pattern::parse("*|doc/para").unwrap().default_priority(), 0.5);
    }
}
