//! Error types for compilation and execution.

use crate::xpath::error::XPathError;
use std::fmt;
use thiserror::Error;

/// Position of a construct inside the stylesheet source, byte-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub offset: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "byte {}", self.offset)
    }
}

/// Errors raised while turning stylesheet text into a [`crate::ast::CompiledStylesheet`].
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("malformed stylesheet XML at {location}: {source}")]
    Xml {
        location: Location,
        source: quick_xml::Error,
    },

    #[error("invalid match pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("invalid XPath expression '{expression}': {source}")]
    Expression {
        expression: String,
        source: XPathError,
    },

    #[error("<{element}> at {location}: missing required attribute '{attribute}'")]
    MissingAttribute {
        element: String,
        attribute: String,
        location: Location,
    },

    #[error("unsupported instruction <xsl:{name}> at {location}")]
    UnsupportedInstruction { name: String, location: Location },

    #[error("unexpected element <{name}> at {location}: {message}")]
    UnexpectedElement {
        name: String,
        message: String,
        location: Location,
    },

    #[error("document is not a stylesheet: {0}")]
    NotAStylesheet(String),

    #[error("stylesheet ended with {0} element(s) still open")]
    UnclosedElements(usize),

    #[error("unsupported stylesheet version '{0}', expected 1.0")]
    UnsupportedVersion(String),

    #[error("invalid attribute value template '{avt}': {message}")]
    ValueTemplate { avt: String, message: String },

    #[error("invalid priority '{0}', expected a number")]
    InvalidPriority(String),
}

/// Errors raised while applying a compiled stylesheet to a document.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("XPath evaluation failed: {0}")]
    XPath(#[from] XPathError),

    #[error("xsl:attribute '{0}' written after child content")]
    AttributeAfterContent(String),

    #[error("cannot copy node: {0}")]
    Copy(String),
}

/// Top-level error for the transformation entry points.
#[derive(Debug, Error)]
pub enum Error {
    /// The input document exceeds the engine's addressable size.
    #[error("input of {len} bytes exceeds the {max} byte limit", max = i32::MAX)]
    InputTooLarge { len: usize },

    #[error("malformed input document: {0}")]
    Parse(#[from] roxmltree::Error),

    #[error("stylesheet compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("transformation failed: {0}")]
    Apply(#[from] ExecutionError),

    #[error("serialization failed: {0}")]
    Serialize(#[from] std::io::Error),

    /// A parameter slot index outside the table's capacity.
    #[error("parameter index {index} out of bounds for table of {len}")]
    ParameterIndex { index: usize, len: usize },
}
