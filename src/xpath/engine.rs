//! Evaluation of parsed XPath expressions against a `DataSourceNode` tree.

use super::ast::{Axis, BinaryOperator, Expression, KindTest, LocationPath, NodeTest, Step};
use super::datasource::{DataSourceNode, NodeType};
use super::error::XPathError;
use super::{axes, functions};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;

/// The four XPath 1.0 value types.
#[derive(Debug, Clone)]
pub enum XPathValue<N> {
    NodeSet(Vec<N>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl<'a, N: DataSourceNode<'a>> XPathValue<N> {
    /// Boolean coercion per XPath 1.0.
    pub fn to_bool(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::Boolean(b) => *b,
        }
    }

    /// Number coercion per XPath 1.0; non-numeric strings become NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            XPathValue::Number(n) => *n,
            XPathValue::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XPathValue::NodeSet(nodes) => {
                let s = nodes.first().map(|n| n.string_value()).unwrap_or_default();
                s.trim().parse().unwrap_or(f64::NAN)
            }
        }
    }
}

impl<'a, N: DataSourceNode<'a>> fmt::Display for XPathValue<N> {
    /// String coercion per XPath 1.0: a node-set converts to the string-value
    /// of its first node.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XPathValue::NodeSet(nodes) => write!(
                f,
                "{}",
                nodes.first().map(|n| n.string_value()).unwrap_or_default()
            ),
            XPathValue::String(s) => write!(f, "{}", s),
            XPathValue::Number(n) => write!(f, "{}", n),
            XPathValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Per-evaluation state. `'a` is the document lifetime, `'d` the lifetime of
/// the surrounding call.
pub struct EvaluationContext<'a, 'd, N: DataSourceNode<'a>> {
    pub context_node: N,
    pub root_node: N,
    /// 1-based position within the current node list.
    pub context_position: usize,
    pub context_size: usize,
    pub variables: &'d HashMap<String, XPathValue<N>>,
    _marker: PhantomData<&'a ()>,
}

impl<'a, 'd, N: DataSourceNode<'a>> EvaluationContext<'a, 'd, N> {
    pub fn new(
        context_node: N,
        root_node: N,
        context_position: usize,
        context_size: usize,
        variables: &'d HashMap<String, XPathValue<N>>,
    ) -> Self {
        Self {
            context_node,
            root_node,
            context_position,
            context_size,
            variables,
            _marker: PhantomData,
        }
    }
}

/// Evaluates an expression to a concrete value.
pub fn evaluate<'a, N>(
    expr: &Expression,
    ctx: &EvaluationContext<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    match expr {
        Expression::Literal(s) => Ok(XPathValue::String(s.clone())),
        Expression::Number(n) => Ok(XPathValue::Number(*n)),
        Expression::LocationPath(path) => {
            Ok(XPathValue::NodeSet(evaluate_location_path(path, ctx)?))
        }
        // An unbound variable evaluates to the empty string rather than
        // failing, matching the engine's lax parameter-fallback behavior.
        Expression::Variable(name) => Ok(ctx
            .variables
            .get(name)
            .cloned()
            .unwrap_or(XPathValue::String(String::new()))),
        Expression::FunctionCall { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(evaluate(arg, ctx)?);
            }
            functions::call(name, evaluated, ctx)
        }
        Expression::BinaryOp { left, op, right } => {
            // Short-circuit the logical operators before evaluating the rhs.
            match op {
                BinaryOperator::Or => {
                    if evaluate(left, ctx)?.to_bool() {
                        return Ok(XPathValue::Boolean(true));
                    }
                    return Ok(XPathValue::Boolean(evaluate(right, ctx)?.to_bool()));
                }
                BinaryOperator::And => {
                    if !evaluate(left, ctx)?.to_bool() {
                        return Ok(XPathValue::Boolean(false));
                    }
                    return Ok(XPathValue::Boolean(evaluate(right, ctx)?.to_bool()));
                }
                _ => {}
            }
            let lhs = evaluate(left, ctx)?;
            let rhs = evaluate(right, ctx)?;
            apply_operator(*op, lhs, rhs)
        }
        Expression::Negate(inner) => {
            let val = evaluate(inner, ctx)?;
            Ok(XPathValue::Number(-val.to_number()))
        }
    }
}

fn apply_operator<'a, N>(
    op: BinaryOperator,
    lhs: XPathValue<N>,
    rhs: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    match op {
        BinaryOperator::Union => match (lhs, rhs) {
            (XPathValue::NodeSet(mut left), XPathValue::NodeSet(right)) => {
                let mut seen: HashSet<N> = left.iter().copied().collect();
                for node in right {
                    if seen.insert(node) {
                        left.push(node);
                    }
                }
                // Union results are in document order.
                left.sort();
                Ok(XPathValue::NodeSet(left))
            }
            _ => Err(XPathError::Type(
                "operands of '|' must be node-sets".to_string(),
            )),
        },
        BinaryOperator::Equals => Ok(XPathValue::Boolean(values_equal(&lhs, &rhs))),
        BinaryOperator::NotEquals => Ok(XPathValue::Boolean(!values_equal(&lhs, &rhs))),
        BinaryOperator::LessThan => Ok(XPathValue::Boolean(lhs.to_number() < rhs.to_number())),
        BinaryOperator::LessThanOrEqual => {
            Ok(XPathValue::Boolean(lhs.to_number() <= rhs.to_number()))
        }
        BinaryOperator::GreaterThan => Ok(XPathValue::Boolean(lhs.to_number() > rhs.to_number())),
        BinaryOperator::GreaterThanOrEqual => {
            Ok(XPathValue::Boolean(lhs.to_number() >= rhs.to_number()))
        }
        BinaryOperator::Plus => Ok(XPathValue::Number(lhs.to_number() + rhs.to_number())),
        BinaryOperator::Minus => Ok(XPathValue::Number(lhs.to_number() - rhs.to_number())),
        BinaryOperator::Multiply => Ok(XPathValue::Number(lhs.to_number() * rhs.to_number())),
        BinaryOperator::Divide => Ok(XPathValue::Number(lhs.to_number() / rhs.to_number())),
        BinaryOperator::Modulo => Ok(XPathValue::Number(lhs.to_number() % rhs.to_number())),
        BinaryOperator::Or | BinaryOperator::And => {
            // Handled by the caller for short-circuiting.
            Ok(XPathValue::Boolean(lhs.to_bool() || rhs.to_bool()))
        }
    }
}

/// Equality per XPath 1.0: node-sets compare existentially against the other
/// operand; booleans win over numbers, numbers over strings.
fn values_equal<'a, N>(lhs: &XPathValue<N>, rhs: &XPathValue<N>) -> bool
where
    N: DataSourceNode<'a> + 'a,
{
    use XPathValue::*;
    match (lhs, rhs) {
        (NodeSet(a), NodeSet(b)) => {
            let values: HashSet<std::string::String> =
                a.iter().map(|n| n.string_value()).collect();
            b.iter().any(|n| values.contains(&n.string_value()))
        }
        (NodeSet(nodes), String(s)) | (String(s), NodeSet(nodes)) => {
            nodes.iter().any(|n| n.string_value() == *s)
        }
        (NodeSet(nodes), Number(x)) | (Number(x), NodeSet(nodes)) => nodes
            .iter()
            .any(|n| n.string_value().trim().parse::<f64>().ok() == Some(*x)),
        (Boolean(_), _) | (_, Boolean(_)) => lhs.to_bool() == rhs.to_bool(),
        (Number(_), _) | (_, Number(_)) => lhs.to_number() == rhs.to_number(),
        (String(a), String(b)) => a == b,
    }
}

fn evaluate_location_path<'a, N>(
    path: &LocationPath,
    ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let initial = if let Some(start) = &path.start_point {
        match evaluate(start, ctx)? {
            XPathValue::NodeSet(nodes) => nodes,
            _ => return Ok(vec![]),
        }
    } else if path.is_absolute {
        vec![ctx.root_node]
    } else {
        vec![ctx.context_node]
    };

    let mut current = initial;
    for step in &path.steps {
        current = evaluate_step(step, &current, ctx)?;
    }
    Ok(current)
}

/// Axis collection, then node test, then predicates.
fn evaluate_step<'a, N>(
    step: &Step,
    context_nodes: &[N],
    ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    if step.is_context_self() {
        return apply_predicates(context_nodes, &step.predicates, ctx);
    }

    let mut seen = HashSet::new();
    let mut collected = Vec::new();
    for &node in context_nodes {
        match step.axis {
            Axis::Child => axes::children(node, &mut seen, &mut collected),
            Axis::Attribute => axes::attributes(node, &mut seen, &mut collected),
            Axis::Descendant => axes::descendants(node, &mut seen, &mut collected),
            Axis::DescendantOrSelf => axes::descendants_or_self(node, &mut seen, &mut collected),
            Axis::Parent => axes::parent(node, &mut seen, &mut collected),
            Axis::Ancestor => axes::ancestors(node, &mut seen, &mut collected),
            Axis::SelfAxis => axes::self_node(node, &mut seen, &mut collected),
            Axis::FollowingSibling => axes::following_siblings(node, &mut seen, &mut collected),
            Axis::PrecedingSibling => axes::preceding_siblings(node, &mut seen, &mut collected),
        }
    }

    let tested: Vec<N> = collected
        .into_iter()
        .filter(|node| node_test_matches(&step.node_test, step.axis, *node))
        .collect();
    apply_predicates(&tested, &step.predicates, ctx)
}

pub(crate) fn node_test_matches<'a, N>(test: &NodeTest, axis: Axis, node: N) -> bool
where
    N: DataSourceNode<'a> + 'a,
{
    match test {
        NodeTest::Wildcard => match axis {
            Axis::Attribute => node.node_type() == NodeType::Attribute,
            _ => node.node_type() == NodeType::Element,
        },
        NodeTest::Name(name) => node.name().is_some_and(|q| q.local_part == name),
        NodeTest::Kind(kind) => match kind {
            KindTest::Text => node.node_type() == NodeType::Text,
            KindTest::Comment => node.node_type() == NodeType::Comment,
            KindTest::ProcessingInstruction => {
                node.node_type() == NodeType::ProcessingInstruction
            }
            KindTest::Node => true,
        },
        NodeTest::ContextNode => true,
    }
}

fn apply_predicates<'a, N>(
    nodes: &[N],
    predicates: &[Expression],
    ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut remaining = nodes.to_vec();
    for predicate in predicates {
        let size = remaining.len();
        let mut kept = Vec::new();
        for (i, node) in remaining.iter().enumerate() {
            let inner = EvaluationContext::new(*node, ctx.root_node, i + 1, size, ctx.variables);
            let result = evaluate(predicate, &inner)?;
            // A bare number predicate is a position test.
            let keep = match result {
                XPathValue::Number(n) => (n as usize) == (i + 1),
                other => other.to_bool(),
            };
            if keep {
                kept.push(*node);
            }
        }
        remaining = kept;
    }
    Ok(remaining)
}
