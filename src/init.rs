//! One-time engine bootstrap.
//!
//! Registers the extension function library the first time any entry
//! point runs. Repeated calls are free, and concurrent first calls race
//! harmlessly because the registry is write-once.

use crate::xpath::error::XPathError;
use crate::xpath::functions::{ExtensionFn, install_extensions};
use log::debug;
use std::collections::HashMap;
use std::sync::Once;

static INIT: Once = Once::new();

/// Make the engine ready: install the `str:` extension functions.
/// Every public entry point calls this, so callers never need to.
pub fn initialize() {
    INIT.call_once(|| {
        let mut registry: HashMap<String, ExtensionFn> = HashMap::new();
        registry.insert("str:replace".to_string(), str_replace);
        registry.insert("str:padding".to_string(), str_padding);
        registry.insert("str:reverse".to_string(), str_reverse);
        debug!("registered {} extension function(s)", registry.len());
        install_extensions(registry);
    });
}

/// str:replace(string, search, replacement)
fn str_replace(args: &[String]) -> Result<String, XPathError> {
    match args {
        [s, search, replacement] => {
            if search.is_empty() {
                return Ok(s.clone());
            }
            Ok(s.replace(search.as_str(), replacement))
        }
        _ => Err(arity("str:replace", 3, args.len())),
    }
}

/// str:padding(length, padding?) builds a pad string of the given length
/// by repeating the padding characters, space by default.
fn str_padding(args: &[String]) -> Result<String, XPathError> {
    let (length, fill) = match args {
        [length] => (length, " "),
        [length, fill] => (length, fill.as_str()),
        _ => return Err(arity("str:padding", 2, args.len())),
    };
    let length = length.trim().parse::<f64>().unwrap_or(f64::NAN);
    if !length.is_finite() || length < 0.0 || fill.is_empty() {
        return Ok(String::new());
    }
    let length = length as usize;
    let mut out = String::with_capacity(length);
    while out.chars().count() < length {
        out.push_str(fill);
    }
    Ok(out.chars().take(length).collect())
}

/// str:reverse(string)
fn str_reverse(args: &[String]) -> Result<String, XPathError> {
    match args {
        [s] => Ok(s.chars().rev().collect()),
        _ => Err(arity("str:reverse", 1, args.len())),
    }
}

fn arity(function: &str, expected: usize, got: usize) -> XPathError {
    XPathError::Function {
        function: function.to_string(),
        message: format!("expected {} argument(s), got {}", expected, got),
    }
}
