//! XPath subset engine.
//!
//! Location paths (absolute and relative, all common axes and the usual
//! abbreviations), unions, predicates and a small function library. Paths are
//! parsed into [`LocationPath`]s whose steps are applied one after another to a
//! node sequence.

use crate::dom::{NodeKind, NodeRef, NodeSet};
use crate::errors::{QueryError, Result};
use crate::filter::{self, FilterExpr, Operand};
use crate::functions::Registry;
use crate::parser::{ParseErr, Parser};

#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    pub anchor: Anchor,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Root,    // /
    Context, // ., or a bare step
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<FilterExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfNode,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Attribute,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    Name(String), // div
    Any,          // *
    Text,         // text()
    Node,         // node()
    Comment,      // comment()
}

/// An attribute selected through the attribute axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attr<'d> {
    pub owner: NodeRef<'d>,
    pub name: &'d str,
    pub value: &'d str,
}

/// The four XPath value types. Attribute node-sets are kept apart from
/// node-sets because attributes are not part of the document arena.
#[derive(Debug, Clone, PartialEq)]
pub enum XValue<'d> {
    Nodes(NodeSet<'d>),
    Attrs(Vec<Attr<'d>>),
    Str(String),
    Num(f64),
    Bool(bool),
}

impl<'d> XValue<'d> {
    /// String values of every member, for node-set and attribute-set values.
    pub fn node_strings(&self) -> Option<Vec<String>> {
        match self {
            XValue::Nodes(ns) => Some(ns.iter().map(NodeRef::text).collect()),
            XValue::Attrs(attrs) => Some(attrs.iter().map(|a| a.value.to_string()).collect()),
            _ => None,
        }
    }

    pub fn to_bool(&self) -> bool {
        match self {
            XValue::Nodes(ns) => !ns.is_empty(),
            XValue::Attrs(attrs) => !attrs.is_empty(),
            XValue::Str(s) => !s.is_empty(),
            XValue::Num(n) => *n != 0.0 && !n.is_nan(),
            XValue::Bool(b) => *b,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            XValue::Num(n) => *n,
            XValue::Bool(b) => f64::from(u8::from(*b)),
            other => other.to_string_value().trim().parse().unwrap_or(f64::NAN),
        }
    }

    pub fn to_string_value(&self) -> String {
        match self {
            XValue::Nodes(ns) => ns.first().map(NodeRef::text).unwrap_or_default(),
            XValue::Attrs(attrs) => attrs.first().map(|a| a.value.to_string()).unwrap_or_default(),
            XValue::Str(s) => s.clone(),
            XValue::Num(n) => format_number(*n),
            XValue::Bool(b) => b.to_string(),
        }
    }
}

// 2^53: beyond this not every integer is representable
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n.fract() == 0.0 && n.abs() < MAX_EXACT_INT {
        format!("{}", n as i64)
    } else {
        // f64 Display never uses an exponent
        format!("{n}")
    }
}

/// Evaluation context: the context node, its proximity position and the size
/// of the sequence it was taken from, and the function library.
#[derive(Clone, Copy)]
pub struct EvalCtx<'d, 'r> {
    pub node: NodeRef<'d>,
    pub position: usize,
    pub size: usize,
    pub registry: &'r Registry,
}

impl<'d, 'r> EvalCtx<'d, 'r> {
    pub fn new(node: NodeRef<'d>, registry: &'r Registry) -> Self {
        Self {
            node,
            position: 1,
            size: 1,
            registry,
        }
    }
}

/// A parsed XPath expression, keeping its source text for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct XPath {
    source: String,
    expr: FilterExpr,
}

/// Parse an XPath expression.
pub fn parse(expression: &str) -> Result<XPath> {
    let syntax = |reason: String| QueryError::Syntax {
        expression: expression.to_string(),
        reason,
    };
    let mut p = Parser::new(expression);
    p.skip_ws();
    if p.eof() {
        return Err(syntax("empty expression".into()));
    }
    let expr = filter::parse_filter_or(&mut p).map_err(|ParseErr::InvalidSyntax(r)| {
        syntax(format!("{r} at offset {}", p.pos()))
    })?;
    p.skip_ws();
    if !p.eof() {
        return Err(syntax(format!("unexpected `{}`", p.rest())));
    }
    Ok(XPath {
        source: expression.to_string(),
        expr,
    })
}

impl XPath {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Rewrite every top-level `//...` branch into `.//...`, so that the
    /// search starts at the context node instead of the document root.
    /// Relative branches and other absolute paths are left alone.
    pub fn relativize(&self) -> XPath {
        XPath {
            source: self.source.clone(),
            expr: relativize_expr(&self.expr),
        }
    }

    /// Evaluate against `context` and require a node-set result.
    pub fn select<'d>(&self, context: NodeRef<'d>, registry: &Registry) -> Result<NodeSet<'d>> {
        check_calls(&self.expr, registry)?;
        match filter::eval_filter(&self.expr, &EvalCtx::new(context, registry))? {
            XValue::Nodes(ns) => Ok(ns),
            _ => Err(QueryError::NotANodeSet(self.source.clone())),
        }
    }
}

fn relativize_expr(expr: &FilterExpr) -> FilterExpr {
    match expr {
        FilterExpr::Operand(op) => FilterExpr::Operand(relativize_operand(op)),
        other => other.clone(),
    }
}

fn relativize_operand(op: &Operand) -> Operand {
    match op {
        Operand::Path(path) => Operand::Path(path.relativize()),
        Operand::Union(paths) => Operand::Union(paths.iter().map(LocationPath::relativize).collect()),
        Operand::Group(inner) => Operand::Group(Box::new(relativize_expr(inner))),
        other => other.clone(),
    }
}

impl LocationPath {
    fn relativize(&self) -> LocationPath {
        let searches_document = self.anchor == Anchor::Root
            && self
                .steps
                .first()
                .is_some_and(|s| s.axis == Axis::DescendantOrSelf && s.test == NodeTest::Node);
        LocationPath {
            anchor: if searches_document { Anchor::Context } else { self.anchor },
            steps: self.steps.clone(),
        }
    }
}

// Unknown functions and bad arities are reported even when the predicate
// holding them is never evaluated.
fn check_calls(expr: &FilterExpr, registry: &Registry) -> Result<()> {
    match expr {
        FilterExpr::Or(l, r) | FilterExpr::And(l, r) => {
            check_calls(l, registry)?;
            check_calls(r, registry)
        }
        FilterExpr::Eq(a, b)
        | FilterExpr::Ne(a, b)
        | FilterExpr::Lt(a, b)
        | FilterExpr::Lte(a, b)
        | FilterExpr::Gt(a, b)
        | FilterExpr::Gte(a, b) => {
            check_operand(a, registry)?;
            check_operand(b, registry)
        }
        FilterExpr::Operand(op) => check_operand(op, registry),
    }
}

fn check_operand(op: &Operand, registry: &Registry) -> Result<()> {
    match op {
        Operand::Call { name, args } => {
            registry.check(name, args.len())?;
            args.iter().try_for_each(|a| check_calls(a, registry))
        }
        Operand::Group(inner) => check_calls(inner, registry),
        Operand::Path(path) => check_path(path, registry),
        Operand::Union(paths) => paths.iter().try_for_each(|p| check_path(p, registry)),
        Operand::Literal(_) | Operand::Number(_) => Ok(()),
    }
}

fn check_path(path: &LocationPath, registry: &Registry) -> Result<()> {
    path.steps
        .iter()
        .flat_map(|s| s.predicates.iter())
        .try_for_each(|p| check_calls(p, registry))
}

/// Render `s` as an XPath string literal. XPath has no escapes, so a string
/// holding both quote kinds becomes a `concat()` call.
pub fn literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s
            .split('\'')
            .map(|part| format!("'{part}'"))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

// =========================
// Parsing
// =========================

fn descendant_or_self() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::Node,
        predicates: Vec::new(),
    }
}

/// True when the cursor sits at the start of a location path.
pub(crate) fn starts_path(p: &Parser) -> bool {
    match p.peek_char() {
        Some('/') | Some('@') | Some('*') => true,
        Some('.') => !p.peek_nth(1).is_some_and(|c| c.is_ascii_digit()),
        Some(c) => c == '_' || c.is_alphabetic(),
        None => false,
    }
}

pub(crate) fn parse_location_path(p: &mut Parser) -> std::result::Result<LocationPath, ParseErr> {
    let mut steps = Vec::new();
    let anchor = if p.consume_str("//") {
        steps.push(descendant_or_self());
        steps.push(parse_step(p)?);
        Anchor::Root
    } else if p.consume_char('/') {
        p.skip_ws();
        if starts_path(p) && !p.peek_str("/") {
            steps.push(parse_step(p)?);
        } else {
            // bare `/` selects the document node
            return Ok(LocationPath {
                anchor: Anchor::Root,
                steps,
            });
        }
        Anchor::Root
    } else {
        steps.push(parse_step(p)?);
        Anchor::Context
    };
    loop {
        if p.peek_after_ws("//") {
            p.skip_ws();
            p.consume_str("//");
            steps.push(descendant_or_self());
            steps.push(parse_step(p)?);
        } else if p.peek_after_ws("/") {
            p.skip_ws();
            p.consume_char('/');
            steps.push(parse_step(p)?);
        } else {
            break;
        }
    }
    if let Some(pos) = steps.iter().position(|s| s.axis == Axis::Attribute) {
        if pos + 1 != steps.len() {
            return Err(ParseErr::InvalidSyntax(
                "attribute step must end the path".into(),
            ));
        }
        if !steps[pos].predicates.is_empty() {
            return Err(ParseErr::InvalidSyntax(
                "predicates on attribute steps are not supported".into(),
            ));
        }
    }
    Ok(LocationPath { anchor, steps })
}

fn parse_step(p: &mut Parser) -> std::result::Result<Step, ParseErr> {
    p.skip_ws();
    if p.consume_str("..") {
        return Ok(Step {
            axis: Axis::Parent,
            test: NodeTest::Node,
            predicates: Vec::new(),
        });
    }
    if p.consume_char('.') {
        return Ok(Step {
            axis: Axis::SelfNode,
            test: NodeTest::Node,
            predicates: Vec::new(),
        });
    }

    let axis = if p.consume_char('@') {
        Axis::Attribute
    } else {
        let save = p.pos();
        match p.parse_name() {
            Ok(name) if p.consume_str("::") => axis_named(&name)?,
            _ => {
                p.rewind(save);
                Axis::Child
            }
        }
    };

    let test = if p.consume_char('*') {
        NodeTest::Any
    } else {
        let name = p.parse_name()?;
        let kind_test = match name.as_str() {
            "text" => Some(NodeTest::Text),
            "node" => Some(NodeTest::Node),
            "comment" => Some(NodeTest::Comment),
            _ => None,
        };
        match kind_test {
            Some(test) if p.peek_after_ws("(") => {
                p.skip_ws();
                p.expect('(')?;
                p.skip_ws();
                p.expect(')')?;
                test
            }
            _ => NodeTest::Name(name),
        }
    };

    let mut predicates = Vec::new();
    while p.peek_after_ws("[") {
        p.skip_ws();
        p.consume_char('[');
        predicates.push(filter::parse_filter_or(p)?);
        p.skip_ws();
        p.expect(']')?;
    }
    Ok(Step {
        axis,
        test,
        predicates,
    })
}

fn axis_named(name: &str) -> std::result::Result<Axis, ParseErr> {
    Ok(match name {
        "child" => Axis::Child,
        "descendant" => Axis::Descendant,
        "descendant-or-self" => Axis::DescendantOrSelf,
        "self" => Axis::SelfNode,
        "parent" => Axis::Parent,
        "ancestor" => Axis::Ancestor,
        "ancestor-or-self" => Axis::AncestorOrSelf,
        "following-sibling" => Axis::FollowingSibling,
        "preceding-sibling" => Axis::PrecedingSibling,
        "attribute" => Axis::Attribute,
        other => {
            return Err(ParseErr::InvalidSyntax(format!(
                "unsupported axis `{other}`"
            )))
        }
    })
}

// =========================
// Evaluation
// =========================

pub(crate) fn eval_path<'d>(path: &LocationPath, ctx: &EvalCtx<'d, '_>) -> Result<XValue<'d>> {
    let start = match path.anchor {
        Anchor::Root => ctx.node.document().root(),
        Anchor::Context => ctx.node,
    };
    let mut current: Vec<NodeRef<'d>> = vec![start];
    for step in &path.steps {
        if step.axis == Axis::Attribute {
            let attrs = current
                .iter()
                .flat_map(|owner| {
                    owner
                        .attributes()
                        .iter()
                        .filter(|(name, _)| match &step.test {
                            NodeTest::Name(n) => n == name,
                            NodeTest::Any | NodeTest::Node => true,
                            NodeTest::Text | NodeTest::Comment => false,
                        })
                        .map(|(name, value)| Attr {
                            owner: *owner,
                            name,
                            value,
                        })
                })
                .collect();
            return Ok(XValue::Attrs(attrs));
        }

        let mut next = Vec::new();
        for node in &current {
            let mut candidates: Vec<NodeRef<'d>> = axis_nodes(*node, step.axis)
                .into_iter()
                .filter(|n| node_test(n, &step.test))
                .collect();
            for pred in &step.predicates {
                candidates = apply_predicate(candidates, pred, ctx.registry)?;
            }
            next.extend(candidates);
        }
        current = NodeSet::from_unordered(next).into_vec();
    }
    Ok(XValue::Nodes(NodeSet::from_unordered(current)))
}

// Nodes along `axis`, in proximity order (reverse axes nearest first).
fn axis_nodes(node: NodeRef<'_>, axis: Axis) -> Vec<NodeRef<'_>> {
    match axis {
        Axis::Child => node.children().collect(),
        Axis::Descendant => node.descendants().collect(),
        Axis::DescendantOrSelf => std::iter::once(node).chain(node.descendants()).collect(),
        Axis::SelfNode => vec![node],
        Axis::Parent => node.parent().into_iter().collect(),
        Axis::Ancestor => node.ancestors().collect(),
        Axis::AncestorOrSelf => std::iter::once(node).chain(node.ancestors()).collect(),
        Axis::FollowingSibling => node.following_siblings().collect(),
        Axis::PrecedingSibling => node.preceding_siblings().collect(),
        Axis::Attribute => Vec::new(),
    }
}

fn node_test(node: &NodeRef<'_>, test: &NodeTest) -> bool {
    match (test, node.kind()) {
        (NodeTest::Node, _) => true,
        (NodeTest::Any, NodeKind::Element { .. }) => true,
        (NodeTest::Name(want), NodeKind::Element { name, .. }) => want.eq_ignore_ascii_case(name),
        (NodeTest::Text, NodeKind::Text(_)) => true,
        (NodeTest::Comment, NodeKind::Comment(_)) => true,
        _ => false,
    }
}

fn apply_predicate<'d>(
    candidates: Vec<NodeRef<'d>>,
    pred: &FilterExpr,
    registry: &Registry,
) -> Result<Vec<NodeRef<'d>>> {
    let size = candidates.len();
    let mut kept = Vec::with_capacity(size);
    for (i, node) in candidates.into_iter().enumerate() {
        let ctx = EvalCtx {
            node,
            position: i + 1,
            size,
            registry,
        };
        let keep = match filter::eval_filter(pred, &ctx)? {
            XValue::Num(n) => n == ctx.position as f64,
            other => other.to_bool(),
        };
        if keep {
            kept.push(node);
        }
    }
    Ok(kept)
}
