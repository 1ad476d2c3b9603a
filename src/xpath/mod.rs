//! An XPath 1.0 evaluation engine, written against the `DataSourceNode`
//! abstraction so it stays independent of the concrete document type.

pub mod ast;
pub mod axes;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod functions;
pub mod parser;

pub use ast::Expression;
pub use datasource::{DataSourceNode, NodeType, QName};
pub use engine::{EvaluationContext, XPathValue, evaluate};
pub use error::XPathError;
pub use parser::parse_expression;
