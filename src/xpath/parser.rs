//! A `nom`-based parser for the supported XPath 1.0 expression grammar.

use super::ast::*;
use super::error::XPathError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt, peek, recognize},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated},
};

/// Parses a complete expression, requiring all input to be consumed.
pub fn parse_expression(input: &str) -> Result<Expression, XPathError> {
    match expression(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rem, _)) => Err(XPathError::Parse(
            input.to_string(),
            format!("unconsumed input: '{}'", rem),
        )),
        Err(e) => Err(XPathError::Parse(input.to_string(), e.to_string())),
    }
}

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

/// Left-folds `sub op sub op sub ...` into a `BinaryOp` chain.
fn binary_chain<'a, F, G>(
    sub_expr: F,
    op: G,
) -> impl FnMut(&'a str) -> IResult<&'a str, Expression>
where
    F: Parser<&'a str, Output = Expression, Error = nom::error::Error<&'a str>> + Clone,
    G: Parser<&'a str, Output = BinaryOperator, Error = nom::error::Error<&'a str>> + Clone,
{
    move |input: &str| {
        let (input, mut left) = sub_expr.clone().parse(input)?;
        let (input, rest) = many0(pair(ws(op.clone()), sub_expr.clone())).parse(input)?;
        for (op, right) in rest {
            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok((input, left))
    }
}

// --- Precedence ladder, loosest first ---

fn expression(input: &str) -> IResult<&str, Expression> {
    or_expr(input)
}

fn or_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(and_expr, or_op)(input)
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(equality_expr, and_op)(input)
}

fn or_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(tag("or"), |_| BinaryOperator::Or).parse(input)
}

fn and_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(tag("and"), |_| BinaryOperator::And).parse(input)
}

fn equality_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("!="), |_| BinaryOperator::NotEquals),
        map(tag("="), |_| BinaryOperator::Equals),
    ))
    .parse(input)
}

// The entity-escaped forms appear when expressions are read out of XML
// attribute values without unescaping.
fn relational_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("<="), |_| BinaryOperator::LessThanOrEqual),
        map(tag("&lt;="), |_| BinaryOperator::LessThanOrEqual),
        map(tag(">="), |_| BinaryOperator::GreaterThanOrEqual),
        map(tag("&gt;="), |_| BinaryOperator::GreaterThanOrEqual),
        map(tag("<"), |_| BinaryOperator::LessThan),
        map(tag("&lt;"), |_| BinaryOperator::LessThan),
        map(tag(">"), |_| BinaryOperator::GreaterThan),
        map(tag("&gt;"), |_| BinaryOperator::GreaterThan),
    ))
    .parse(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('+'), |_| BinaryOperator::Plus),
        map(char('-'), |_| BinaryOperator::Minus),
    ))
    .parse(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('*'), |_| BinaryOperator::Multiply),
        map(tag("div"), |_| BinaryOperator::Divide),
        map(tag("mod"), |_| BinaryOperator::Modulo),
    ))
    .parse(input)
}

fn equality_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(relational_expr, equality_op)(input)
}

fn relational_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(additive_expr, relational_op)(input)
}

fn additive_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(multiplicative_expr, additive_op)(input)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(unary_expr, multiplicative_op)(input)
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    let (i, minus) = opt(ws(char('-'))).parse(input)?;
    let (i, expr) = union_expr(i)?;
    if minus.is_some() {
        Ok((i, Expression::Negate(Box::new(expr))))
    } else {
        Ok((i, expr))
    }
}

fn union_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(char('|'), |_| BinaryOperator::Union).parse(input)
}

fn union_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(path_expr, union_op)(input)
}

/// Handles the ambiguity between location paths and primary expressions that
/// may be followed by further steps (`$var/foo`, `(a|b)/c`).
fn path_expr(input: &str) -> IResult<&str, Expression> {
    // Primary expressions go first so that `position()` is parsed as a
    // function call rather than a step named `position`.
    let (i, start) =
        alt((primary_expr, map(location_path, Expression::LocationPath))).parse(input)?;

    let (i, trailing) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(i)?;
    if trailing.is_empty() {
        return Ok((i, start));
    }

    let (start_point, is_absolute, mut steps) = match start {
        Expression::LocationPath(lp) => (lp.start_point, lp.is_absolute, lp.steps),
        other => (Some(Box::new(other)), false, vec![]),
    };
    for (sep, next) in trailing {
        if sep == "//" {
            steps.push(descendant_or_self_step());
        }
        steps.push(next);
    }

    Ok((
        i,
        Expression::LocationPath(LocationPath {
            start_point,
            is_absolute,
            steps,
        }),
    ))
}

fn primary_expr(input: &str) -> IResult<&str, Expression> {
    ws(alt((
        map(preceded(char('$'), q_name), Expression::Variable),
        map(double, Expression::Number),
        map(string_literal, Expression::Literal),
        function_call,
        delimited(ws(char('(')), expression, ws(char(')'))),
    )))
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '-'),
    ))
    .parse(input)
}

fn q_name(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(nc_name, opt(pair(tag(":"), nc_name)))),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn kind_test(input: &str) -> IResult<&str, NodeTest> {
    map(
        terminated(
            alt((
                tag("text"),
                tag("node"),
                tag("comment"),
                tag("processing-instruction"),
            )),
            pair(ws(char('(')), ws(char(')'))),
        ),
        |kind: &str| match kind {
            "text" => NodeTest::Kind(KindTest::Text),
            "comment" => NodeTest::Kind(KindTest::Comment),
            "processing-instruction" => NodeTest::Kind(KindTest::ProcessingInstruction),
            _ => NodeTest::Kind(KindTest::Node),
        },
    )
    .parse(input)
}

/// Shared with the match-pattern parser.
pub fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(tag("*"), |_| NodeTest::Wildcard),
        kind_test,
        map(q_name, NodeTest::Name),
    ))
    .parse(input)
}

fn axis(input: &str) -> IResult<&str, Axis> {
    map(
        pair(
            alt((
                tag("child"),
                tag("descendant-or-self"),
                tag("descendant"),
                tag("attribute"),
                tag("parent"),
                tag("ancestor"),
                tag("self"),
                tag("following-sibling"),
                tag("preceding-sibling"),
            )),
            tag("::"),
        ),
        |(name, _)| match name {
            "descendant-or-self" => Axis::DescendantOrSelf,
            "descendant" => Axis::Descendant,
            "attribute" => Axis::Attribute,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "self" => Axis::SelfAxis,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            _ => Axis::Child,
        },
    )
    .parse(input)
}

fn predicate(input: &str) -> IResult<&str, Expression> {
    delimited(ws(char('[')), expression, ws(char(']'))).parse(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    let (i, (axis, node_test)) = alt((
        map(tag("."), |_| (Axis::SelfAxis, NodeTest::ContextNode)),
        map(preceded(char('@'), node_test), |nt| (Axis::Attribute, nt)),
        map(pair(opt(axis), node_test), |(ax, nt)| {
            (ax.unwrap_or(Axis::Child), nt)
        }),
    ))
    .parse(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    Ok((
        i,
        Step {
            axis,
            node_test,
            predicates,
        },
    ))
}

fn descendant_or_self_step() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        node_test: NodeTest::Kind(KindTest::Node),
        predicates: vec![],
    }
}

fn location_path(input: &str) -> IResult<&str, LocationPath> {
    let (i, lead) = opt(alt((tag("//"), tag("/")))).parse(input)?;
    let (i, (is_absolute, mut steps)) = match lead {
        Some("//") => {
            let (rem, first) = step(i)?;
            (rem, (true, vec![descendant_or_self_step(), first]))
        }
        Some(_) => {
            if let Ok((rem, first)) = step(i) {
                (rem, (true, vec![first]))
            } else {
                // A path that is just "/".
                (i, (true, vec![]))
            }
        }
        None => {
            let (rem, first) = step(i)?;
            (rem, (false, vec![first]))
        }
    };

    let (i, rest) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(i)?;
    for (sep, next) in rest {
        if sep == "//" {
            steps.push(descendant_or_self_step());
        }
        steps.push(next);
    }

    Ok((
        i,
        LocationPath {
            start_point: None,
            is_absolute,
            steps,
        },
    ))
}

fn function_call(input: &str) -> IResult<&str, Expression> {
    // A QName followed by '(' is a function call, unless the name is a kind
    // test handled by the step parser.
    let (i, name) = q_name(input)?;
    let (i, _) = peek(ws(char('('))).parse(i)?;
    if matches!(
        name.as_str(),
        "text" | "node" | "comment" | "processing-instruction"
    ) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }

    let (i, _) = multispace0(i)?;
    let (i, args) = delimited(
        char('('),
        separated_list0(ws(char(',')), expression),
        char(')'),
    )
    .parse(i)?;

    Ok((i, Expression::FunctionCall { name, args }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_relative_path() {
        let expr = parse_expression("foo/bar").unwrap();
        let Expression::LocationPath(lp) = expr else {
            panic!("expected location path");
        };
        assert!(!lp.is_absolute);
        assert_eq!(lp.steps.len(), 2);
        assert_eq!(lp.steps[0].node_test, NodeTest::Name("foo".into()));
        assert_eq!(lp.steps[1].node_test, NodeTest::Name("bar".into()));
    }

    #[test]
    fn absolute_path_with_text_test() {
        let expr = parse_expression("/a/text()").unwrap();
        let Expression::LocationPath(lp) = expr else {
            panic!("expected location path");
        };
        assert!(lp.is_absolute);
        assert_eq!(lp.steps[1].node_test, NodeTest::Kind(KindTest::Text));
    }

    #[test]
    fn attribute_abbreviation() {
        let expr = parse_expression("@id").unwrap();
        let Expression::LocationPath(lp) = expr else {
            panic!("expected location path");
        };
        assert_eq!(lp.steps[0].axis, Axis::Attribute);
        assert_eq!(lp.steps[0].node_test, NodeTest::Name("id".into()));
    }

    #[test]
    fn context_node_step() {
        let expr = parse_expression(".").unwrap();
        let Expression::LocationPath(lp) = expr else {
            panic!("expected location path");
        };
        assert!(lp.steps[0].is_context_self());
    }

    #[test]
    fn union_of_attribute_and_node() {
        let expr = parse_expression("@*|node()").unwrap();
        assert!(matches!(
            expr,
            Expression::BinaryOp {
                op: BinaryOperator::Union,
                ..
            }
        ));
    }

    #[test]
    fn variable_with_path_continuation() {
        let expr = parse_expression("$user/name").unwrap();
        let Expression::LocationPath(lp) = expr else {
            panic!("expected location path");
        };
        assert!(matches!(
            lp.start_point.as_deref(),
            Some(Expression::Variable(v)) if v == "user"
        ));
        assert_eq!(lp.steps.len(), 1);
    }

    #[test]
    fn predicates_positional_and_comparison() {
        let expr = parse_expression("item[1]").unwrap();
        let Expression::LocationPath(lp) = expr else {
            panic!("expected location path");
        };
        assert_eq!(lp.steps[0].predicates, vec![Expression::Number(1.0)]);

        let expr = parse_expression("item[@kind = 'a']").unwrap();
        let Expression::LocationPath(lp) = expr else {
            panic!("expected location path");
        };
        assert!(matches!(
            lp.steps[0].predicates[0],
            Expression::BinaryOp {
                op: BinaryOperator::Equals,
                ..
            }
        ));
    }

    #[test]
    fn function_call_with_args() {
        let expr = parse_expression("concat('a', 'b')").unwrap();
        let Expression::FunctionCall { name, args } = expr else {
            panic!("expected function call");
        };
        assert_eq!(name, "concat");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn kind_test_is_not_a_function() {
        let expr = parse_expression("text()").unwrap();
        assert!(matches!(expr, Expression::LocationPath(_)));
    }

    #[test]
    fn operator_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        let Expression::BinaryOp { op, right, .. } = expr else {
            panic!("expected binary op");
        };
        assert_eq!(op, BinaryOperator::Plus);
        assert!(matches!(
            *right,
            Expression::BinaryOp {
                op: BinaryOperator::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn logical_operators_chain_with_correct_precedence() {
        // `and` binds tighter than `or`.
        let expr = parse_expression("a or b and c").unwrap();
        let Expression::BinaryOp { op, right, .. } = expr else {
            panic!("expected binary op");
        };
        assert_eq!(op, BinaryOperator::Or);
        assert!(matches!(
            *right,
            Expression::BinaryOp {
                op: BinaryOperator::And,
                ..
            }
        ));

        let expr = parse_expression("a | b or c").unwrap();
        assert!(matches!(
            expr,
            Expression::BinaryOp {
                op: BinaryOperator::Or,
                ..
            }
        ));
    }

    #[test]
    fn escaped_relational_operators() {
        let expr = parse_expression("a &lt; b").unwrap();
        assert!(matches!(
            expr,
            Expression::BinaryOp {
                op: BinaryOperator::LessThan,
                ..
            }
        ));
    }

    #[test]
    fn double_slash_descends() {
        let expr = parse_expression("//item").unwrap();
        let Expression::LocationPath(lp) = expr else {
            panic!("expected location path");
        };
        assert!(lp.is_absolute);
        assert_eq!(lp.steps.len(), 2);
        assert_eq!(lp.steps[0].axis, Axis::DescendantOrSelf);
    }

    #[test]
    fn unary_minus() {
        let expr = parse_expression("-5").unwrap();
        assert!(matches!(expr, Expression::Negate(_)));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_expression("foo bar").is_err());
    }
}
