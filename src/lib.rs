//! XSLT 1.0 transformation engine with a compile-once, apply-many API.
//!
//! A [`Stylesheet`] is compiled from source text and then applied to any
//! number of XML documents, each application producing an owned output
//! buffer. [`transform`] covers the one-shot case. Parameters are passed
//! by name through a [`Parameters`] table; values are XPath expressions,
//! so a numeric value is written bare and a string value quoted.
//!
//! ```
//! use restyle::{Parameters, Stylesheet};
//!
//! let style = Stylesheet::compile(
//!     r#"<xsl:stylesheet version="1.0"
//!           xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
//!          <xsl:template match="/"><out>hi</out></xsl:template>
//!        </xsl:stylesheet>"#,
//! )?;
//! let output = style.apply("<in/>", &Parameters::new())?;
//! assert!(String::from_utf8(output)?.contains("<out>hi</out>"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod ast;
pub mod compiler;
pub mod dom;
pub mod error;
pub mod exec;
pub mod init;
pub mod params;
pub mod pattern;
pub mod serialize;
pub mod stylesheet;
pub mod tree;
pub mod xpath;

pub use error::{CompileError, Error, ExecutionError};
pub use init::initialize;
pub use params::Parameters;
pub use stylesheet::{MAX_INPUT_LEN, Stylesheet};

/// Compile and apply in one step. Prefer [`Stylesheet::compile`] plus
/// [`Stylesheet::apply`] when the same stylesheet is used more than once.
pub fn transform(stylesheet: &str, input: &str, params: &Parameters) -> Result<Vec<u8>, Error> {
    Stylesheet::compile(stylesheet)?.apply(input, params)
}
