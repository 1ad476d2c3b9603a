//! Pure collectors for each supported XPath axis.
//!
//! Each collector appends to `results` in axis order, using `seen` to keep
//! the set duplicate-free when several context nodes share descendants.

use super::datasource::DataSourceNode;
use std::collections::HashSet;

fn add<'a, N: DataSourceNode<'a>>(node: N, seen: &mut HashSet<N>, results: &mut Vec<N>) {
    if seen.insert(node) {
        results.push(node);
    }
}

pub fn self_node<'a, N: DataSourceNode<'a>>(node: N, seen: &mut HashSet<N>, results: &mut Vec<N>) {
    add(node, seen, results);
}

pub fn children<'a, N: DataSourceNode<'a>>(node: N, seen: &mut HashSet<N>, results: &mut Vec<N>) {
    for child in node.children() {
        add(child, seen, results);
    }
}

pub fn attributes<'a, N: DataSourceNode<'a>>(node: N, seen: &mut HashSet<N>, results: &mut Vec<N>) {
    for attr in node.attributes() {
        add(attr, seen, results);
    }
}

pub fn descendants<'a, N: DataSourceNode<'a>>(node: N, seen: &mut HashSet<N>, results: &mut Vec<N>) {
    for child in node.children() {
        add(child, seen, results);
        descendants(child, seen, results);
    }
}

pub fn descendants_or_self<'a, N: DataSourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    results: &mut Vec<N>,
) {
    add(node, seen, results);
    descendants(node, seen, results);
}

pub fn parent<'a, N: DataSourceNode<'a>>(node: N, seen: &mut HashSet<N>, results: &mut Vec<N>) {
    if let Some(p) = node.parent() {
        add(p, seen, results);
    }
}

pub fn ancestors<'a, N: DataSourceNode<'a>>(node: N, seen: &mut HashSet<N>, results: &mut Vec<N>) {
    let mut current = node.parent();
    while let Some(p) = current {
        add(p, seen, results);
        current = p.parent();
    }
}

pub fn following_siblings<'a, N: DataSourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    results: &mut Vec<N>,
) {
    if let Some(p) = node.parent() {
        let mut past_self = false;
        for sibling in p.children() {
            if past_self {
                add(sibling, seen, results);
            }
            if sibling == node {
                past_self = true;
            }
        }
    }
}

pub fn preceding_siblings<'a, N: DataSourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    results: &mut Vec<N>,
) {
    if let Some(p) = node.parent() {
        for sibling in p.children() {
            if sibling == node {
                break;
            }
            add(sibling, seen, results);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xpath::datasource::mock::{node, sample_tree};

    #[test]
    fn child_axis_in_document_order() {
        let tree = sample_tree();
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        children(node(&tree, 0), &mut seen, &mut results);
        assert_eq!(results, vec![node(&tree, 1), node(&tree, 5)]);
    }

    #[test]
    fn descendant_axis_covers_nested_text() {
        let tree = sample_tree();
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        descendants(node(&tree, 0), &mut seen, &mut results);
        assert_eq!(
            results,
            vec![
                node(&tree, 1),
                node(&tree, 4),
                node(&tree, 5),
                node(&tree, 6),
                node(&tree, 7)
            ]
        );
    }

    #[test]
    fn attribute_axis() {
        let tree = sample_tree();
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        attributes(node(&tree, 1), &mut seen, &mut results);
        assert_eq!(results, vec![node(&tree, 2), node(&tree, 3)]);
    }

    #[test]
    fn ancestor_axis_walks_to_root() {
        let tree = sample_tree();
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        ancestors(node(&tree, 7), &mut seen, &mut results);
        assert_eq!(results, vec![node(&tree, 6), node(&tree, 5), node(&tree, 0)]);
    }

    #[test]
    fn sibling_axes() {
        let tree = sample_tree();
        let mut seen = HashSet::new();
        let mut following = Vec::new();
        following_siblings(node(&tree, 1), &mut seen, &mut following);
        assert_eq!(following, vec![node(&tree, 5)]);

        seen.clear();
        let mut preceding = Vec::new();
        preceding_siblings(node(&tree, 5), &mut seen, &mut preceding);
        assert_eq!(preceding, vec![node(&tree, 1)]);
    }
}
