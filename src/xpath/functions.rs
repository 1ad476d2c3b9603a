//! Built-in XPath 1.0 function implementations plus the process-wide
//! extension-function registry that stylesheets reach through prefixed names.

use super::datasource::DataSourceNode;
use super::engine::{EvaluationContext, XPathValue};
use super::error::XPathError;
use std::collections::HashMap;
use std::sync::OnceLock;

/// An extension function. Arguments arrive string-coerced; the result is
/// wrapped back into a string value.
pub type ExtensionFn = fn(&[String]) -> Result<String, XPathError>;

static EXTENSIONS: OnceLock<HashMap<String, ExtensionFn>> = OnceLock::new();

/// Installs the extension namespace. First call wins; later calls are
/// ignored, which makes the bootstrap idempotent.
pub fn install_extensions(registry: HashMap<String, ExtensionFn>) {
    let _ = EXTENSIONS.set(registry);
}

fn extension(name: &str) -> Option<ExtensionFn> {
    EXTENSIONS.get().and_then(|reg| reg.get(name)).copied()
}

/// Dispatches a function call by name. Prefixed names go to the extension
/// registry; everything else is a built-in.
pub fn call<'a, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    ctx: &EvaluationContext<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError> {
    if name.contains(':') {
        let Some(func) = extension(name) else {
            return Err(XPathError::Function {
                function: name.to_string(),
                message: "unknown extension function (is the engine initialized?)".to_string(),
            });
        };
        let strings: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        return func(&strings).map(XPathValue::String);
    }

    match name {
        "string" => Ok(XPathValue::String(arg_or_context_string(args, ctx))),
        "concat" => Ok(XPathValue::String(
            args.iter().map(|a| a.to_string()).collect(),
        )),
        "contains" => {
            let [haystack, needle] = two_strings(name, args)?;
            Ok(XPathValue::Boolean(haystack.contains(&needle)))
        }
        "starts-with" => {
            let [haystack, prefix] = two_strings(name, args)?;
            Ok(XPathValue::Boolean(haystack.starts_with(&prefix)))
        }
        "substring-before" => {
            let [s, sep] = two_strings(name, args)?;
            Ok(XPathValue::String(
                s.split_once(&sep).map(|(a, _)| a.to_string()).unwrap_or_default(),
            ))
        }
        "substring-after" => {
            let [s, sep] = two_strings(name, args)?;
            Ok(XPathValue::String(
                s.split_once(&sep).map(|(_, b)| b.to_string()).unwrap_or_default(),
            ))
        }
        "substring" => func_substring(args),
        "string-length" => Ok(XPathValue::Number(
            arg_or_context_string(args, ctx).chars().count() as f64,
        )),
        "normalize-space" => {
            let s = arg_or_context_string(args, ctx);
            Ok(XPathValue::String(
                s.split_whitespace().collect::<Vec<_>>().join(" "),
            ))
        }
        "translate" => func_translate(name, args),
        "boolean" => Ok(XPathValue::Boolean(
            args.first().map(|a| a.to_bool()).unwrap_or(false),
        )),
        "not" => Ok(XPathValue::Boolean(
            !args.first().map(|a| a.to_bool()).unwrap_or(false),
        )),
        "true" => Ok(XPathValue::Boolean(true)),
        "false" => Ok(XPathValue::Boolean(false)),
        "number" => Ok(XPathValue::Number(
            args.first()
                .map(|a| a.to_number())
                .unwrap_or_else(|| ctx.context_node.string_value().trim().parse().unwrap_or(f64::NAN)),
        )),
        "count" => match args.into_iter().next() {
            Some(XPathValue::NodeSet(nodes)) => Ok(XPathValue::Number(nodes.len() as f64)),
            _ => Err(XPathError::Function {
                function: name.to_string(),
                message: "expected a node-set argument".to_string(),
            }),
        },
        "sum" => match args.into_iter().next() {
            Some(XPathValue::NodeSet(nodes)) => Ok(XPathValue::Number(
                nodes
                    .iter()
                    .map(|n| n.string_value().trim().parse().unwrap_or(f64::NAN))
                    .sum(),
            )),
            _ => Err(XPathError::Function {
                function: name.to_string(),
                message: "expected a node-set argument".to_string(),
            }),
        },
        "floor" => Ok(XPathValue::Number(one_number(name, args)?.floor())),
        "ceiling" => Ok(XPathValue::Number(one_number(name, args)?.ceil())),
        "round" => Ok(XPathValue::Number(one_number(name, args)?.round())),
        "position" => Ok(XPathValue::Number(ctx.context_position as f64)),
        "last" => Ok(XPathValue::Number(ctx.context_size as f64)),
        "name" | "local-name" => {
            let node = match args.into_iter().next() {
                Some(XPathValue::NodeSet(nodes)) => nodes.into_iter().next(),
                None => Some(ctx.context_node),
                _ => None,
            };
            Ok(XPathValue::String(
                node.and_then(|n| n.name())
                    .map(|q| q.local_part.to_string())
                    .unwrap_or_default(),
            ))
        }
        _ => Err(XPathError::Function {
            function: name.to_string(),
            message: "unknown XPath function".to_string(),
        }),
    }
}

fn arg_or_context_string<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    ctx: &EvaluationContext<'a, '_, N>,
) -> String {
    args.first()
        .map(|a| a.to_string())
        .unwrap_or_else(|| ctx.context_node.string_value())
}

fn two_strings<'a, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
) -> Result<[String; 2], XPathError> {
    if args.len() != 2 {
        return Err(XPathError::Function {
            function: name.to_string(),
            message: format!("expected 2 arguments, got {}", args.len()),
        });
    }
    let mut it = args.into_iter();
    let a = it.next().map(|v| v.to_string()).unwrap_or_default();
    let b = it.next().map(|v| v.to_string()).unwrap_or_default();
    Ok([a, b])
}

fn one_number<'a, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
) -> Result<f64, XPathError> {
    args.first().map(|a| a.to_number()).ok_or_else(|| XPathError::Function {
        function: name.to_string(),
        message: "expected 1 argument".to_string(),
    })
}

/// substring(s, start[, len]) with XPath's 1-based, rounding semantics.
fn func_substring<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    if args.len() < 2 || args.len() > 3 {
        return Err(XPathError::Function {
            function: "substring".to_string(),
            message: format!("expected 2 or 3 arguments, got {}", args.len()),
        });
    }
    let s = args[0].to_string();
    let start = args[1].to_number().round();
    let chars: Vec<char> = s.chars().collect();
    let end = match args.get(2) {
        Some(len) => start + len.to_number().round(),
        None => f64::INFINITY,
    };
    let out: String = chars
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            let pos = (*i + 1) as f64;
            pos >= start && pos < end
        })
        .map(|(_, c)| *c)
        .collect();
    Ok(XPathValue::String(out))
}

fn func_translate<'a, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    if args.len() != 3 {
        return Err(XPathError::Function {
            function: name.to_string(),
            message: format!("expected 3 arguments, got {}", args.len()),
        });
    }
    let s = args[0].to_string();
    let from: Vec<char> = args[1].to_string().chars().collect();
    let to: Vec<char> = args[2].to_string().chars().collect();
    let out: String = s
        .chars()
        .filter_map(|c| match from.iter().position(|&f| f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect();
    Ok(XPathValue::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xpath::datasource::mock::{MockNode, MockTree, node, sample_tree};
    use crate::xpath::engine::evaluate;
    use crate::xpath::parser::parse_expression;

    fn eval<'a>(expr: &str, tree: &'a MockTree) -> XPathValue<MockNode<'a>> {
        let vars = HashMap::new();
        let root = node(tree, 0);
        let ctx = EvaluationContext::new(root, root, 1, 1, &vars);
        evaluate(&parse_expression(expr).unwrap(), &ctx).unwrap()
    }

    #[test]
    fn string_functions() {
        let tree = sample_tree();
        assert_eq!(eval("concat('a', 'b', 'c')", &tree).to_string(), "abc");
        assert!(eval("contains('hello', 'ell')", &tree).to_bool());
        assert!(eval("starts-with('hello', 'he')", &tree).to_bool());
        assert_eq!(
            eval("substring-before('a-b', '-')", &tree).to_string(),
            "a"
        );
        assert_eq!(eval("substring-after('a-b', '-')", &tree).to_string(), "b");
        assert_eq!(eval("substring('12345', 2, 3)", &tree).to_string(), "234");
        assert_eq!(
            eval("normalize-space('  a   b ')", &tree).to_string(),
            "a b"
        );
        assert_eq!(
            eval("translate('bar', 'abc', 'ABC')", &tree).to_string(),
            "BAr"
        );
    }

    #[test]
    fn numeric_functions() {
        let tree = sample_tree();
        assert_eq!(eval("floor(1.7)", &tree).to_number(), 1.0);
        assert_eq!(eval("ceiling(1.2)", &tree).to_number(), 2.0);
        assert_eq!(eval("round(1.5)", &tree).to_number(), 2.0);
        assert_eq!(eval("count(//para)", &tree).to_number(), 2.0);
    }

    #[test]
    fn boolean_functions() {
        let tree = sample_tree();
        assert!(eval("not(false())", &tree).to_bool());
        assert!(eval("boolean('x')", &tree).to_bool());
        assert!(!eval("boolean('')", &tree).to_bool());
    }

    #[test]
    fn name_of_context_node() {
        let tree = sample_tree();
        assert_eq!(eval("name(//div)", &tree).to_string(), "div");
    }

    #[test]
    fn unknown_function_is_an_error() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let root = node(&tree, 0);
        let ctx = EvaluationContext::new(root, root, 1, 1, &vars);
        let expr = parse_expression("no-such-fn()").unwrap();
        assert!(evaluate(&expr, &ctx).is_err());
    }
}
