use crate::comparison::{cmp_values, CmpOp};
use crate::dom::NodeSet;
use crate::errors::Result;
use crate::parser::{ParseErr, Parser};
use crate::xpath::{self, EvalCtx, LocationPath, XValue};

#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Eq(Operand, Operand),
    Ne(Operand, Operand),
    Lt(Operand, Operand),
    Lte(Operand, Operand),
    Gt(Operand, Operand),
    Gte(Operand, Operand),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    Operand(Operand),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Path(LocationPath),         // //div[@id='main'], @class, text(), .
    Union(Vec<LocationPath>),   // //h2 | //h3
    Literal(String),            // 'abc' or "abc"
    Number(f64),                // 2, 1.5
    Call { name: String, args: Vec<FilterExpr> }, // contains(., 'x')
    Group(Box<FilterExpr>),     // ( ... )
}

pub fn parse_filter_or(parser: &mut Parser) -> std::result::Result<FilterExpr, ParseErr> {
    let mut left = parse_filter_and(parser)?;
    loop {
        parser.skip_ws();
        if parser.consume_keyword("or") {
            let right = parse_filter_and(parser)?;
            left = FilterExpr::Or(Box::new(left), Box::new(right));
        } else {
            break;
        }
    }
    Ok(left)
}

fn parse_filter_and(parser: &mut Parser) -> std::result::Result<FilterExpr, ParseErr> {
    let mut left = parse_filter_compare(parser)?;
    loop {
        parser.skip_ws();
        if parser.consume_keyword("and") {
            let right = parse_filter_compare(parser)?;
            left = FilterExpr::And(Box::new(left), Box::new(right));
        } else {
            break;
        }
    }
    Ok(left)
}

fn parse_filter_compare(parser: &mut Parser) -> std::result::Result<FilterExpr, ParseErr> {
    let left = parse_operand(parser)?;
    parser.skip_ws();
    type Make = fn(Operand, Operand) -> FilterExpr;
    let make: Option<Make> = if parser.consume_str("!=") {
        Some(FilterExpr::Ne)
    } else if parser.consume_str("<=") {
        Some(FilterExpr::Lte)
    } else if parser.consume_str(">=") {
        Some(FilterExpr::Gte)
    } else if parser.consume_char('=') {
        Some(FilterExpr::Eq)
    } else if parser.consume_char('<') {
        Some(FilterExpr::Lt)
    } else if parser.consume_char('>') {
        Some(FilterExpr::Gt)
    } else {
        None
    };
    if let Some(make) = make {
        let right = parse_operand(parser)?;
        return Ok(make(left, right));
    }
    Ok(FilterExpr::Operand(left))
}

fn parse_operand(parser: &mut Parser) -> std::result::Result<Operand, ParseErr> {
    parser.skip_ws();
    if parser.consume_char('(') {
        let inner = parse_filter_or(parser)?;
        parser.skip_ws();
        parser.expect(')')?;
        return Ok(Operand::Group(Box::new(inner)));
    }
    if parser.peek_char() == Some('"') || parser.peek_char() == Some('\'') {
        return Ok(Operand::Literal(parser.parse_quoted_string()?));
    }
    if parser.peek_char().is_some_and(|c| c.is_ascii_digit())
        || (parser.peek_char() == Some('.') && parser.peek_nth(1).is_some_and(|c| c.is_ascii_digit()))
    {
        return Ok(Operand::Number(parser.parse_number_literal()?));
    }

    // name( is a function call unless the name is a node-type test
    let save = parser.pos();
    if let Ok(name) = parser.parse_name() {
        let is_node_type = matches!(name.as_str(), "text" | "node" | "comment");
        if !is_node_type && !parser.peek_str("::") && parser.peek_after_ws("(") {
            parser.skip_ws();
            parser.expect('(')?;
            let args = parse_args(parser)?;
            parser.expect(')')?;
            return Ok(Operand::Call { name, args });
        }
    }
    parser.rewind(save);

    if !xpath::starts_path(parser) {
        return Err(ParseErr::InvalidSyntax("invalid operand".into()));
    }
    let first = xpath::parse_location_path(parser)?;
    let mut paths = vec![first];
    while parser.peek_after_ws("|") {
        parser.skip_ws();
        parser.consume_char('|');
        parser.skip_ws();
        paths.push(xpath::parse_location_path(parser)?);
    }
    if paths.len() == 1 {
        return Ok(Operand::Path(paths.remove(0)));
    }
    let selects_attributes = |p: &LocationPath| {
        p.steps
            .last()
            .is_some_and(|s| s.axis == xpath::Axis::Attribute)
    };
    if paths.iter().any(selects_attributes) {
        return Err(ParseErr::InvalidSyntax(
            "attribute paths cannot be part of a union".into(),
        ));
    }
    Ok(Operand::Union(paths))
}

fn parse_args(parser: &mut Parser) -> std::result::Result<Vec<FilterExpr>, ParseErr> {
    let mut out = Vec::new();
    parser.skip_ws();
    if parser.peek_char() == Some(')') {
        return Ok(out);
    }
    loop {
        out.push(parse_filter_or(parser)?);
        parser.skip_ws();
        if parser.consume_char(',') {
            continue;
        }
        break;
    }
    Ok(out)
}

pub fn eval_filter<'d>(expr: &FilterExpr, ctx: &EvalCtx<'d, '_>) -> Result<XValue<'d>> {
    let compare = |a: &Operand, b: &Operand, op: CmpOp| -> Result<XValue<'d>> {
        let (a, b) = (eval_operand(a, ctx)?, eval_operand(b, ctx)?);
        Ok(XValue::Bool(cmp_values(&a, &b, op)))
    };
    match expr {
        FilterExpr::Eq(a, b) => compare(a, b, CmpOp::Eq),
        FilterExpr::Ne(a, b) => compare(a, b, CmpOp::Ne),
        FilterExpr::Lt(a, b) => compare(a, b, CmpOp::Lt),
        FilterExpr::Lte(a, b) => compare(a, b, CmpOp::Lte),
        FilterExpr::Gt(a, b) => compare(a, b, CmpOp::Gt),
        FilterExpr::Gte(a, b) => compare(a, b, CmpOp::Gte),
        FilterExpr::And(l, r) => Ok(XValue::Bool(
            eval_filter(l, ctx)?.to_bool() && eval_filter(r, ctx)?.to_bool(),
        )),
        FilterExpr::Or(l, r) => Ok(XValue::Bool(
            eval_filter(l, ctx)?.to_bool() || eval_filter(r, ctx)?.to_bool(),
        )),
        FilterExpr::Operand(op) => eval_operand(op, ctx),
    }
}

fn eval_operand<'d>(op: &Operand, ctx: &EvalCtx<'d, '_>) -> Result<XValue<'d>> {
    match op {
        Operand::Literal(s) => Ok(XValue::Str(s.clone())),
        Operand::Number(n) => Ok(XValue::Num(*n)),
        Operand::Group(inner) => eval_filter(inner, ctx),
        Operand::Path(path) => xpath::eval_path(path, ctx),
        Operand::Union(paths) => {
            let mut nodes = Vec::new();
            for path in paths {
                if let XValue::Nodes(ns) = xpath::eval_path(path, ctx)? {
                    nodes.extend(ns);
                }
            }
            Ok(XValue::Nodes(NodeSet::from_unordered(nodes)))
        }
        Operand::Call { name, args } => {
            let function = ctx.registry.check(name, args.len())?;
            let values = args
                .iter()
                .map(|a| eval_filter(a, ctx))
                .collect::<Result<Vec<_>>>()?;
            function.call(ctx, values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(s: &str) -> FilterExpr {
        let mut p = Parser::new(s);
        let e = parse_filter_or(&mut p).unwrap();
        p.skip_ws();
        assert!(p.eof(), "trailing input in {s:?}");
        e
    }

    #[test]
    fn precedence_or_binds_loosest() {
        let e = parse("@a = 1 or @b and @c");
        let FilterExpr::Or(left, right) = e else {
            panic!("expected or");
        };
        assert!(matches!(*left, FilterExpr::Eq(_, _)));
        assert!(matches!(*right, FilterExpr::And(_, _)));
    }

    #[test]
    fn function_calls_and_node_type_tests() {
        assert!(matches!(
            parse("contains(., 'x')"),
            FilterExpr::Operand(Operand::Call { ref name, ref args }) if name == "contains" && args.len() == 2
        ));
        assert!(matches!(parse("text()"), FilterExpr::Operand(Operand::Path(_))));
        assert!(matches!(parse("last()"), FilterExpr::Operand(Operand::Call { .. })));
    }

    #[test]
    fn literals_and_numbers() {
        assert_eq!(parse("'a b'"), FilterExpr::Operand(Operand::Literal("a b".into())));
        assert_eq!(parse("3"), FilterExpr::Operand(Operand::Number(3.0)));
    }

    #[test]
    fn keywords_are_not_element_names() {
        // `order` is a child element, not `or` + `der`
        assert!(matches!(parse("order"), FilterExpr::Operand(Operand::Path(_))));
    }

    #[test]
    fn unions_of_paths() {
        let e = parse("h2 | h3|h4");
        let FilterExpr::Operand(Operand::Union(paths)) = e else {
            panic!("expected union");
        };
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn every_comparison_operator() {
        let ops: [(&str, fn(&FilterExpr) -> bool); 6] = [
            ("=", |e| matches!(e, FilterExpr::Eq(_, _))),
            ("!=", |e| matches!(e, FilterExpr::Ne(_, _))),
            ("<", |e| matches!(e, FilterExpr::Lt(_, _))),
            ("<=", |e| matches!(e, FilterExpr::Lte(_, _))),
            (">", |e| matches!(e, FilterExpr::Gt(_, _))),
            (">=", |e| matches!(e, FilterExpr::Gte(_, _))),
        ];
        for (op, is_expected) in ops {
            let e = parse(&format!("@n {op} 2"));
            assert!(is_expected(&e), "{op} parsed as {e:?}");
        }
    }
}
