//! Intermediate representation produced by the stylesheet compiler and
//! consumed by the executor.

use crate::pattern::Pattern;
use crate::xpath::ast::Expression;

/// A fully compiled stylesheet, ready to be applied to any number of
/// input documents.
#[derive(Debug, Clone)]
pub struct CompiledStylesheet {
    pub rules: Vec<TemplateRule>,
    pub globals: Vec<GlobalBinding>,
    pub output: OutputSettings,
}

/// One `xsl:template` with a match pattern.
#[derive(Debug, Clone)]
pub struct TemplateRule {
    pub pattern: Pattern,
    /// Explicit `priority` attribute, else the pattern's default priority.
    pub priority: f64,
    /// Declaration order, used to break priority ties (last wins).
    pub order: usize,
    pub body: Body,
}

/// A top-level `xsl:param` or `xsl:variable`.
#[derive(Debug, Clone)]
pub struct GlobalBinding {
    pub name: String,
    pub default: Option<Expression>,
    /// Params may be overridden by the caller; variables may not.
    pub is_param: bool,
}

pub type Body = Vec<Instruction>;

/// One executable node of a template body.
#[derive(Debug, Clone)]
pub enum Instruction {
    /// Literal text, already whitespace-stripped by the compiler.
    Text(String),
    ValueOf { select: Expression },
    ApplyTemplates { select: Option<Expression> },
    ForEach { select: Expression, body: Body },
    If { test: Expression, body: Body },
    Choose { whens: Vec<(Expression, Body)>, otherwise: Option<Body> },
    /// Shallow copy of the context node, body populates the copy.
    Copy { body: Body },
    /// Deep copy of every node the expression selects.
    CopyOf { select: Expression },
    Element { name: Avt, body: Body },
    Attribute { name: Avt, body: Body },
    /// Local `xsl:variable`, scoped to the rest of the enclosing body.
    Variable { name: String, select: Expression },
    /// A literal result element, attributes carried as value templates.
    LiteralElement { name: String, attrs: Vec<(String, Avt)>, body: Body },
}

/// An attribute value template: literal text interleaved with `{expr}`
/// segments.
#[derive(Debug, Clone)]
pub enum Avt {
    Literal(String),
    Segments(Vec<AvtSegment>),
}

#[derive(Debug, Clone)]
pub enum AvtSegment {
    Literal(String),
    Expression(Expression),
}

/// Serialization knobs from `xsl:output`.
#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub method: OutputMethod,
    pub omit_xml_declaration: bool,
    pub indent: bool,
    pub encoding: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMethod {
    Xml,
    Text,
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            method: OutputMethod::Xml,
            omit_xml_declaration: false,
            indent: false,
            encoding: "UTF-8".to_string(),
        }
    }
}
