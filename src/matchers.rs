//! Expectation-style matchers.
//!
//! ```ignore
//! body.should(have_xpath("//div").class("inner"))?;
//! body.should(have_xpath("//div[@id='main']").inspect(|nodes| {
//!     nodes.should(have_xpath("//div[@class='inner']"))
//! }))?;
//! body.should_not(have_xpath("//p"))?;
//! ```

use tracing::debug;

use crate::constraints::Constraints;
use crate::dom::{Document, NodeRef, NodeSet};
use crate::engine::{Evaluator, MatchResult};
use crate::errors::{AssertError, Mismatch};

/// What a matcher is applied to.
#[derive(Debug, Clone)]
pub enum Subject<'s> {
    /// Raw markup, parsed on every match.
    Markup(&'s str),
    Document(&'s Document),
    /// Nodes handed to an inspection block; queries are scoped to them.
    Nodes(NodeSet<'s>),
}

impl Subject<'_> {
    /// Markup used in failure messages and by call-recording doubles.
    pub fn render(&self) -> String {
        match self {
            Subject::Markup(markup) => markup.to_string(),
            Subject::Document(doc) => doc.to_html(),
            Subject::Nodes(nodes) => nodes.to_html(),
        }
    }
}

pub trait AsSubject {
    fn as_subject(&self) -> Subject<'_>;
}

impl AsSubject for str {
    fn as_subject(&self) -> Subject<'_> {
        Subject::Markup(self)
    }
}

impl AsSubject for String {
    fn as_subject(&self) -> Subject<'_> {
        Subject::Markup(self)
    }
}

impl AsSubject for Document {
    fn as_subject(&self) -> Subject<'_> {
        Subject::Document(self)
    }
}

impl AsSubject for NodeSet<'_> {
    fn as_subject(&self) -> Subject<'_> {
        Subject::Nodes(self.clone())
    }
}

impl AsSubject for NodeRef<'_> {
    fn as_subject(&self) -> Subject<'_> {
        Subject::Nodes(NodeSet::single(*self))
    }
}

impl AsSubject for Subject<'_> {
    fn as_subject(&self) -> Subject<'_> {
        self.clone()
    }
}

impl<T: AsSubject + ?Sized> AsSubject for &T {
    fn as_subject(&self) -> Subject<'_> {
        (**self).as_subject()
    }
}

/// A boolean matcher over a [`Subject`].
pub trait Matcher {
    /// Errors are broken queries or failures raised by an inspection block;
    /// a plain non-match is `Ok(false)`.
    fn matches(&self, subject: &Subject<'_>) -> Result<bool, AssertError>;
    fn expression(&self) -> &str;
    fn constraints(&self) -> &Constraints;
    fn failure_message(&self, subject: &Subject<'_>) -> String;
    fn negative_failure_message(&self, subject: &Subject<'_>) -> String;
}

/// Inspection block run against the matched nodes.
pub type Block<'b> = dyn Fn(&NodeSet<'_>) -> Result<(), AssertError> + 'b;

/// Matches when the xpath selects at least one node that passes the constraints.
pub struct HaveXpath<'b> {
    expression: String,
    constraints: Constraints,
    evaluator: Evaluator,
    block: Option<Box<Block<'b>>>,
}

pub fn have_xpath<'b>(expression: impl Into<String>) -> HaveXpath<'b> {
    HaveXpath::new(expression, Constraints::new())
}

impl<'b> HaveXpath<'b> {
    pub fn new(expression: impl Into<String>, constraints: Constraints) -> Self {
        Self {
            expression: expression.into(),
            constraints,
            evaluator: Evaluator::default(),
            block: None,
        }
    }

    pub fn with(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.constraints = self.constraints.class(class);
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.constraints = self.constraints.content(content);
        self
    }

    /// Use a custom function library.
    pub fn evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Run `block` once with every matched node after a successful match.
    /// Its error, if any, becomes the outcome of the match.
    pub fn inspect<F>(mut self, block: F) -> Self
    where
        F: Fn(&NodeSet<'_>) -> Result<(), AssertError> + 'b,
    {
        self.block = Some(Box::new(block));
        self
    }
}

impl Matcher for HaveXpath<'_> {
    fn matches(&self, subject: &Subject<'_>) -> Result<bool, AssertError> {
        match_subject(
            &self.evaluator,
            &self.expression,
            &self.constraints,
            self.block.as_deref(),
            subject,
        )
    }

    fn expression(&self) -> &str {
        &self.expression
    }

    fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    fn failure_message(&self, subject: &Subject<'_>) -> String {
        describe("match xpath", &self.expression, &self.constraints, subject)
    }

    fn negative_failure_message(&self, subject: &Subject<'_>) -> String {
        describe("not match xpath", &self.expression, &self.constraints, subject)
    }
}

pub(crate) fn match_subject(
    evaluator: &Evaluator,
    expression: &str,
    constraints: &Constraints,
    block: Option<&Block<'_>>,
    subject: &Subject<'_>,
) -> Result<bool, AssertError> {
    match subject {
        Subject::Markup(markup) => {
            let doc = Document::parse(markup);
            let result = evaluator.evaluate(&doc, expression, constraints)?;
            finish(result, block)
        }
        Subject::Document(doc) => {
            let result = evaluator.evaluate(doc, expression, constraints)?;
            finish(result, block)
        }
        Subject::Nodes(scopes) => {
            let result = evaluator.evaluate_in(scopes, expression, constraints)?;
            finish(result, block)
        }
    }
}

fn finish(result: MatchResult<'_>, block: Option<&Block<'_>>) -> Result<bool, AssertError> {
    if !result.verdict {
        return Ok(false);
    }
    if let Some(block) = block {
        debug!(nodes = result.nodes.len(), "running inspection block");
        block(&result.nodes)?;
    }
    Ok(true)
}

pub(crate) fn describe(
    verb: &str,
    expression: &str,
    constraints: &Constraints,
    subject: &Subject<'_>,
) -> String {
    let with = if constraints.is_empty() {
        String::new()
    } else {
        format!(" with {constraints}")
    };
    format!(
        "expected following text to {verb} {expression}{with}:\n{}",
        subject.render()
    )
}

/// Pass when `matcher` matches `subject`, otherwise fail with a [`Mismatch`].
pub fn expect_match(subject: &Subject<'_>, matcher: &dyn Matcher) -> Result<(), AssertError> {
    if matcher.matches(subject)? {
        Ok(())
    } else {
        Err(mismatch(matcher, matcher.failure_message(subject)))
    }
}

/// Pass when `matcher` does not match `subject`.
pub fn expect_no_match(subject: &Subject<'_>, matcher: &dyn Matcher) -> Result<(), AssertError> {
    if matcher.matches(subject)? {
        Err(mismatch(matcher, matcher.negative_failure_message(subject)))
    } else {
        Ok(())
    }
}

fn mismatch(matcher: &dyn Matcher, message: String) -> AssertError {
    AssertError::Mismatch(Mismatch {
        expression: matcher.expression().to_string(),
        constraints: matcher.constraints().clone(),
        message,
    })
}

/// `should` / `should_not` on anything that can be matched against.
pub trait Should {
    fn should<M: Matcher>(&self, matcher: M) -> Result<(), AssertError>;
    fn should_not<M: Matcher>(&self, matcher: M) -> Result<(), AssertError>;
}

impl<T: AsSubject + ?Sized> Should for T {
    fn should<M: Matcher>(&self, matcher: M) -> Result<(), AssertError> {
        expect_match(&self.as_subject(), &matcher)
    }

    fn should_not<M: Matcher>(&self, matcher: M) -> Result<(), AssertError> {
        expect_no_match(&self.as_subject(), &matcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::QueryError;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    const BODY: &str = "<div id='main'><div class='inner'>hello, world!</div><p>x</p></div>";

    #[test]
    fn failure_messages_name_the_expression_and_constraints() {
        let err = BODY.should(have_xpath("//span").class("inner")).unwrap_err();
        let AssertError::Mismatch(m) = err else {
            panic!("expected a mismatch");
        };
        assert_eq!(m.expression, "//span");
        assert_eq!(m.constraints, Constraints::new().class("inner"));
        assert!(m
            .message
            .starts_with("expected following text to match xpath //span with {\"class\":\"inner\"}:\n"));
        assert!(m.message.contains("hello, world!"));
    }

    #[test]
    fn negative_message() {
        let err = BODY.should_not(have_xpath("//p")).unwrap_err();
        assert!(err.to_string().starts_with("expected following text to not match xpath //p:"));
    }

    #[test]
    fn block_runs_once_and_only_on_success() {
        let calls = Cell::new(0);
        BODY.should(have_xpath("//div").inspect(|nodes| {
            calls.set(calls.get() + 1);
            assert_eq!(nodes.len(), 2);
            Ok(())
        }))
        .unwrap();
        assert_eq!(calls.get(), 1);

        let result = BODY.should(have_xpath("//table").inspect(|_| {
            calls.set(calls.get() + 1);
            Ok(())
        }));
        assert!(result.unwrap_err().is_mismatch());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn block_errors_are_returned_unchanged() {
        let err = BODY
            .should(have_xpath("//div").inspect(|_| Err(AssertError::failed("inner failure"))))
            .unwrap_err();
        assert_eq!(err, AssertError::Failed("inner failure".into()));
    }

    #[test]
    fn broken_queries_surface_as_query_errors() {
        let err = BODY.should_not(have_xpath("//div[")).unwrap_err();
        assert!(matches!(err, AssertError::Query(QueryError::Syntax { .. })));
    }

    #[test]
    fn parsed_documents_and_nodes_are_subjects() {
        let doc = Document::parse(BODY);
        doc.should(have_xpath("//p")).unwrap();
        let main = crate::engine::evaluate(&doc, "//div[@id='main']", &Constraints::new())
            .unwrap()
            .nodes[0];
        main.should(have_xpath("//p")).unwrap();
        main.should_not(have_xpath("//div[@id='main']/..")).unwrap();
    }
}
