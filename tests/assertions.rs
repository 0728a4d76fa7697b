use std::cell::{Cell, RefCell};

use have_xpath::{
    AssertError, Assertions, Constraints, Context, Matcher, MatcherFactory, Subject,
};
use pretty_assertions::assert_eq;

const BODY: &str = "<div id='main'><div class='inner'>hello, world!</div>\
                    <ul><li>First</li><li>Second</li></ul></div>";

#[derive(Debug, Clone, PartialEq)]
struct Call {
    kind: &'static str,
    expression: String,
    constraints: Constraints,
    subject: Option<String>,
}

// Records how matchers are built and what they are applied to.
#[derive(Default)]
struct Recorder {
    calls: RefCell<Vec<Call>>,
}

struct Recorded<'r> {
    recorder: &'r Recorder,
    index: usize,
    expression: String,
    constraints: Constraints,
}

impl Matcher for Recorded<'_> {
    fn matches(&self, subject: &Subject<'_>) -> Result<bool, AssertError> {
        self.recorder.calls.borrow_mut()[self.index].subject = Some(subject.render());
        Ok(true)
    }

    fn expression(&self) -> &str {
        &self.expression
    }

    fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    fn failure_message(&self, _: &Subject<'_>) -> String {
        String::new()
    }

    fn negative_failure_message(&self, _: &Subject<'_>) -> String {
        String::new()
    }
}

impl Recorder {
    fn build(&self, kind: &'static str, expression: &str, constraints: Constraints) -> Box<dyn Matcher + '_> {
        let mut calls = self.calls.borrow_mut();
        calls.push(Call {
            kind,
            expression: expression.into(),
            constraints: constraints.clone(),
            subject: None,
        });
        Box::new(Recorded {
            recorder: self,
            index: calls.len() - 1,
            expression: expression.into(),
            constraints,
        })
    }
}

impl MatcherFactory for &Recorder {
    fn xpath(&self, expression: &str, constraints: Constraints) -> Box<dyn Matcher + '_> {
        self.build("xpath", expression, constraints)
    }

    fn selector(&self, selector: &str, constraints: Constraints) -> Box<dyn Matcher + '_> {
        self.build("selector", selector, constraints)
    }
}

fn call(kind: &'static str, expression: &str, constraints: Constraints) -> Call {
    Call {
        kind,
        expression: expression.into(),
        constraints,
        subject: Some(BODY.into()),
    }
}

#[test]
fn default_body_assertions() {
    let ctx = Context::with_body(BODY);
    let assert = Assertions::new(&ctx);
    assert.assert_have_xpath("//div", Constraints::new(), None).unwrap();
    assert
        .assert_have_selector("li", Constraints::new().content("First"), None)
        .unwrap();
    assert.assert_have_no_xpath("//p", Constraints::new(), None).unwrap();

    let err = assert.assert_have_xpath("//p", Constraints::new(), None).unwrap_err();
    assert!(err.is_mismatch());
    let err = assert.assert_have_no_xpath("//div", Constraints::new(), None).unwrap_err();
    assert!(err.is_mismatch());
}

#[test]
fn default_body_builds_matchers_with_the_given_constraints() {
    let recorder = Recorder::default();
    let ctx = Context::with_body(BODY);
    let assert = Assertions::with_factory(&ctx, &recorder);

    assert.assert_have_xpath("//div", Constraints::new(), None).unwrap();
    assert
        .assert_have_xpath("//li", Constraints::new().content("First"), None)
        .unwrap();
    // the recorded matcher always matches, so the negated form fails
    assert!(assert.assert_have_no_xpath("//li", Constraints::new(), None).is_err());
    assert!(assert
        .assert_have_no_xpath("//li", Constraints::new().content("First"), None)
        .is_err());

    assert_eq!(
        *recorder.calls.borrow(),
        vec![
            call("xpath", "//div", Constraints::new()),
            call("xpath", "//li", Constraints::new().content("First")),
            call("xpath", "//li", Constraints::new()),
            call("xpath", "//li", Constraints::new().content("First")),
        ]
    );
}

#[test]
fn explicit_subject_skips_the_document_source() {
    let reads = Cell::new(0);
    let source = || -> Result<String, AssertError> {
        reads.set(reads.get() + 1);
        Ok(String::new())
    };
    let assert = Assertions::new(&source);

    assert
        .assert_have_xpath("//div", Constraints::new(), Some(Subject::Markup(BODY)))
        .unwrap();
    assert
        .assert_have_no_xpath("//p", Constraints::new(), Some(Subject::Markup(BODY)))
        .unwrap();
    assert_eq!(reads.get(), 0);

    let recorder = Recorder::default();
    let assert = Assertions::with_factory(&source, &recorder);
    assert
        .assert_have_xpath("//li", Constraints::new().content("First"), Some(Subject::Markup(BODY)))
        .unwrap();
    assert
        .assert_have_selector("li", Constraints::new(), Some(Subject::Markup(BODY)))
        .unwrap();
    assert_eq!(reads.get(), 0);
    assert_eq!(
        *recorder.calls.borrow(),
        vec![
            call("xpath", "//li", Constraints::new().content("First")),
            call("selector", "li", Constraints::new()),
        ]
    );
}

#[test]
fn no_document_and_no_subject() {
    let assert_ctx = Context::empty();
    let err = Assertions::new(&assert_ctx)
        .assert_have_no_xpath("//p", Constraints::new(), None)
        .unwrap_err();
    assert_eq!(err, AssertError::NoCurrentDocument);
}
