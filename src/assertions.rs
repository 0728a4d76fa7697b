//! Procedural assertions over the current response body.
//!
//! ```ignore
//! let ctx = Context::with_body(html);
//! let assert = Assertions::new(&ctx);
//! assert.assert_have_xpath("//div", Constraints::new().class("inner"), None)?;
//! assert.assert_have_no_xpath("//p", Constraints::new(), Some(Subject::Markup(other)))?;
//! ```

use std::fmt::Debug;

use tracing::debug;

use crate::constraints::Constraints;
use crate::context::DocumentSource;
use crate::errors::AssertError;
use crate::matchers::{expect_match, expect_no_match, HaveXpath, Matcher, Subject};
use crate::selector::HaveSelector;

/// Builds the matchers the assertions run. Swappable so tests can record
/// what was asked of the matching layer.
pub trait MatcherFactory {
    fn xpath(&self, expression: &str, constraints: Constraints) -> Box<dyn Matcher + '_>;
    fn selector(&self, selector: &str, constraints: Constraints) -> Box<dyn Matcher + '_>;
}

/// Builds [`HaveXpath`] and [`HaveSelector`] matchers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFactory;

impl MatcherFactory for DefaultFactory {
    fn xpath(&self, expression: &str, constraints: Constraints) -> Box<dyn Matcher + '_> {
        Box::new(HaveXpath::new(expression, constraints))
    }

    fn selector(&self, selector: &str, constraints: Constraints) -> Box<dyn Matcher + '_> {
        Box::new(HaveSelector::new(selector, constraints))
    }
}

pub struct Assertions<'a> {
    source: &'a dyn DocumentSource,
    factory: Box<dyn MatcherFactory + 'a>,
}

impl<'a> Assertions<'a> {
    pub fn new(source: &'a dyn DocumentSource) -> Self {
        Self::with_factory(source, DefaultFactory)
    }

    pub fn with_factory(source: &'a dyn DocumentSource, factory: impl MatcherFactory + 'a) -> Self {
        Self {
            source,
            factory: Box::new(factory),
        }
    }

    /// Fail unless `expression` matches. Runs against `subject` when given,
    /// otherwise against the current document.
    pub fn assert_have_xpath(
        &self,
        expression: &str,
        constraints: Constraints,
        subject: Option<Subject<'_>>,
    ) -> Result<(), AssertError> {
        let matcher = self.factory.xpath(expression, constraints);
        self.run(matcher.as_ref(), subject, true)
    }

    /// Fail if `expression` matches.
    pub fn assert_have_no_xpath(
        &self,
        expression: &str,
        constraints: Constraints,
        subject: Option<Subject<'_>>,
    ) -> Result<(), AssertError> {
        let matcher = self.factory.xpath(expression, constraints);
        self.run(matcher.as_ref(), subject, false)
    }

    pub fn assert_have_selector(
        &self,
        selector: &str,
        constraints: Constraints,
        subject: Option<Subject<'_>>,
    ) -> Result<(), AssertError> {
        let matcher = self.factory.selector(selector, constraints);
        self.run(matcher.as_ref(), subject, true)
    }

    pub fn assert_have_no_selector(
        &self,
        selector: &str,
        constraints: Constraints,
        subject: Option<Subject<'_>>,
    ) -> Result<(), AssertError> {
        let matcher = self.factory.selector(selector, constraints);
        self.run(matcher.as_ref(), subject, false)
    }

    fn run(
        &self,
        matcher: &dyn Matcher,
        subject: Option<Subject<'_>>,
        positive: bool,
    ) -> Result<(), AssertError> {
        let check = |subject: &Subject<'_>| {
            if positive {
                expect_match(subject, matcher)
            } else {
                expect_no_match(subject, matcher)
            }
        };
        match subject {
            Some(subject) => check(&subject),
            None => {
                let body = self.source.current_document()?;
                debug!(expression = matcher.expression(), bytes = body.len(), "asserting against current document");
                check(&Subject::Markup(&body))
            }
        }
    }
}

/// Fail with both values when they differ. Handy inside inspection blocks.
pub fn expect_eq<T: PartialEq + Debug>(actual: T, expected: T) -> Result<(), AssertError> {
    if actual == expected {
        Ok(())
    } else {
        Err(AssertError::failed(format!(
            "expected {expected:?}, got {actual:?}"
        )))
    }
}
