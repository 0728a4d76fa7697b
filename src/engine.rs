use tracing::{debug, trace};

use crate::constraints::Constraints;
use crate::dom::{Document, NodeRef, NodeSet};
use crate::errors::Result;
use crate::functions::Registry;
use crate::xpath;

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<'d> {
    pub verdict: bool,
    pub nodes: NodeSet<'d>,
}

impl<'d> MatchResult<'d> {
    fn from_nodes(nodes: NodeSet<'d>) -> Self {
        Self {
            verdict: !nodes.is_empty(),
            nodes,
        }
    }
}

/// The matcher core. Holds the XPath function library; everything else is
/// local to a call.
#[derive(Clone)]
pub struct Evaluator {
    registry: Registry,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Registry::with_builtins())
    }
}

impl Evaluator {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Evaluate `expression` from the document root, then narrow by `constraints`.
    pub fn evaluate<'d>(
        &self,
        document: &'d Document,
        expression: &str,
        constraints: &Constraints,
    ) -> Result<MatchResult<'d>> {
        let query = xpath::parse(expression)?;
        let mut nodes = query.select(document.root(), &self.registry)?;
        let candidates = nodes.len();
        constraints.apply(&mut nodes);
        debug!(%expression, %constraints, candidates, matched = nodes.len(), "evaluated xpath");
        Ok(MatchResult::from_nodes(nodes))
    }

    /// Evaluate `expression` rooted at `scope`. `//` searches are rewritten to
    /// start at `scope`, and anything outside `scope`'s subtree is dropped.
    pub fn evaluate_within<'d>(
        &self,
        scope: NodeRef<'d>,
        expression: &str,
        constraints: &Constraints,
    ) -> Result<MatchResult<'d>> {
        self.evaluate_in(&NodeSet::single(scope), expression, constraints)
    }

    /// Evaluate within every node of `scopes` and merge the results.
    pub fn evaluate_in<'d>(
        &self,
        scopes: &NodeSet<'d>,
        expression: &str,
        constraints: &Constraints,
    ) -> Result<MatchResult<'d>> {
        let query = xpath::parse(expression)?.relativize();
        let mut found = Vec::new();
        for scope in scopes {
            let selected = query.select(*scope, &self.registry)?;
            let total = selected.len();
            let inside: Vec<_> = selected.into_iter().filter(|n| n.is_within(scope)).collect();
            if inside.len() < total {
                trace!(%expression, ?scope, dropped = total - inside.len(), "dropped nodes outside the scope");
            }
            found.extend(inside);
        }
        let mut nodes = NodeSet::from_unordered(found);
        let candidates = nodes.len();
        constraints.apply(&mut nodes);
        debug!(
            %expression,
            %constraints,
            scopes = scopes.len(),
            candidates,
            matched = nodes.len(),
            "evaluated scoped xpath"
        );
        Ok(MatchResult::from_nodes(nodes))
    }
}

/// Convenience: evaluate with the built-in function library.
pub fn evaluate<'d>(
    document: &'d Document,
    expression: &str,
    constraints: &Constraints,
) -> Result<MatchResult<'d>> {
    Evaluator::default().evaluate(document, expression, constraints)
}

/// Convenience: scoped evaluation with the built-in function library.
pub fn evaluate_within<'d>(
    scope: NodeRef<'d>,
    expression: &str,
    constraints: &Constraints,
) -> Result<MatchResult<'d>> {
    Evaluator::default().evaluate_within(scope, expression, constraints)
}

/// Convenience: evaluation scoped to each node of a set.
pub fn evaluate_in<'d>(
    scopes: &NodeSet<'d>,
    expression: &str,
    constraints: &Constraints,
) -> Result<MatchResult<'d>> {
    Evaluator::default().evaluate_in(scopes, expression, constraints)
}
