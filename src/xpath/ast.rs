//! The abstract syntax tree for the supported XPath 1.0 expression subset.

/// Any evaluatable expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(String),
    Number(f64),
    LocationPath(LocationPath),
    Variable(String),
    FunctionCall {
        name: String,
        args: Vec<Expression>,
    },
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    Negate(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Union,
}

/// A location path such as `/doc/item[1]`, `@id`, or `$set/name`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// Filter-expression start, for paths like `$var/foo`. When set,
    /// `is_absolute` is meaningless.
    pub start_point: Option<Box<Expression>>,
    pub is_absolute: bool,
    pub steps: Vec<Step>,
}

/// One location step: axis, node test, and zero or more predicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Expression>,
}

impl Step {
    /// The abbreviated `.` step, which selects the context node itself.
    pub fn is_context_self(&self) -> bool {
        self.axis == Axis::SelfAxis && self.node_test == NodeTest::ContextNode
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Attribute,
    Parent,
    Ancestor,
    SelfAxis,
    FollowingSibling,
    PrecedingSibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// A name test such as `item` or `xsl:when`.
    Name(String),
    /// The `*` wildcard.
    Wildcard,
    /// A kind test such as `text()` or `node()`.
    Kind(KindTest),
    /// The `.` abbreviation; only valid on the self axis.
    ContextNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindTest {
    Text,
    Node,
    Comment,
    ProcessingInstruction,
}
