//! The compiled-stylesheet handle and the apply entry point.

use crate::compiler;
use crate::dom::XmlDocument;
use crate::error::Error;
use crate::exec::Executor;
use crate::params::Parameters;
use crate::serialize::serialize;
use crate::tree::TreeBuilder;
use log::info;

/// Inputs larger than this cannot be addressed by the parser's internal
/// offsets and are rejected up front.
pub const MAX_INPUT_LEN: usize = i32::MAX as usize;

/// A compiled stylesheet, reusable across any number of inputs and safe
/// to share between threads. Dropping it releases everything it owns;
/// there is no separate teardown step.
#[derive(Debug)]
pub struct Stylesheet {
    compiled: crate::ast::CompiledStylesheet,
}

impl Stylesheet {
    /// Compile stylesheet source text. The source may be dropped
    /// afterwards; the compiled form borrows nothing from it.
    pub fn compile(source: &str) -> Result<Stylesheet, Error> {
        crate::init::initialize();
        check_input_len(source.len())?;
        let compiled = compiler::compile(source)?;
        info!("stylesheet compiled ({} template rule(s))", compiled.rules.len());
        Ok(Stylesheet { compiled })
    }

    /// Apply the stylesheet to an XML document, returning the serialized
    /// result as an owned buffer. A transformation that produces nothing
    /// yields an empty buffer, which is distinct from any error.
    pub fn apply(&self, input: &str, params: &Parameters) -> Result<Vec<u8>, Error> {
        crate::init::initialize();
        check_input_len(input.len())?;

        let document = XmlDocument::parse(input)?;
        let executor = Executor::new(&self.compiled, document.root(), &params.pairs())?;
        let mut builder = TreeBuilder::new();
        executor.run(&mut builder)?;

        Ok(serialize(&builder.finish(), &self.compiled.output)?)
    }
}

fn check_input_len(len: usize) -> Result<(), Error> {
    if len > MAX_INPUT_LEN {
        return Err(Error::InputTooLarge { len });
    }
    Ok(())
}
