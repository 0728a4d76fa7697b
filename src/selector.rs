//! CSS selectors, matched by translating them to XPath.
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[a]`, `[a=v]`, `[a~=v]`, `[a^=v]`, `[a*=v]`), the descendant,
//! `>`, `+` and `~` combinators, and comma-separated groups.

use crate::constraints::Constraints;
use crate::engine::Evaluator;
use crate::errors::{AssertError, QueryError, Result};
use crate::matchers::{describe, match_subject, Block, Matcher, Subject};
use crate::dom::NodeSet;
use crate::parser::{ParseErr, Parser};
use crate::xpath::literal;

/// Translate a CSS selector group to an equivalent XPath expression.
pub fn to_xpath(css: &str) -> Result<String> {
    let syntax = |reason: String| QueryError::Syntax {
        expression: css.to_string(),
        reason,
    };
    let mut p = Parser::new(css);
    let mut branches = Vec::new();
    loop {
        p.skip_ws();
        let branch = parse_selector(&mut p).map_err(|ParseErr::InvalidSyntax(r)| syntax(r))?;
        branches.push(branch);
        p.skip_ws();
        if p.consume_char(',') {
            continue;
        }
        if p.eof() {
            break;
        }
        return Err(syntax(format!("unexpected `{}`", p.rest())));
    }
    Ok(branches.join(" | "))
}

fn parse_selector(p: &mut Parser) -> std::result::Result<String, ParseErr> {
    let mut out = String::from("//");
    out.push_str(&parse_compound(p)?);
    loop {
        let had_ws = p.peek_char().is_some_and(char::is_whitespace);
        p.skip_ws();
        let axis = if p.consume_char('>') {
            "/"
        } else if p.consume_char('+') {
            "/following-sibling::*[1]/self::"
        } else if p.consume_char('~') {
            "/following-sibling::"
        } else if had_ws && starts_compound(p) {
            "//"
        } else {
            break;
        };
        p.skip_ws();
        out.push_str(axis);
        out.push_str(&parse_compound(p)?);
    }
    Ok(out)
}

fn starts_compound(p: &Parser) -> bool {
    matches!(p.peek_char(), Some(c) if c == '*' || c == '#' || c == '.' || c == '[' || c == '_' || c.is_alphabetic())
}

fn ident<'a>(p: &mut Parser<'a>) -> std::result::Result<&'a str, ParseErr> {
    let name = p.take_until(|c| !(c.is_alphanumeric() || c == '-' || c == '_'));
    if name.is_empty() {
        return Err(ParseErr::InvalidSyntax("identifier expected".into()));
    }
    Ok(name)
}

fn parse_compound(p: &mut Parser) -> std::result::Result<String, ParseErr> {
    if !starts_compound(p) {
        return Err(ParseErr::InvalidSyntax("selector expected".into()));
    }
    let mut out = if p.consume_char('*') {
        "*".to_string()
    } else if p.peek_char().is_some_and(|c| c == '_' || c.is_alphabetic()) {
        ident(p)?.to_ascii_lowercase()
    } else {
        "*".to_string()
    };
    loop {
        if p.consume_char('#') {
            let id = ident(p)?;
            out.push_str(&format!("[@id={}]", literal(id)));
        } else if p.consume_char('.') {
            let class = ident(p)?;
            out.push_str(&format!("[{}]", token_test("class", class)));
        } else if p.consume_char('[') {
            p.skip_ws();
            let attr = ident(p)?;
            p.skip_ws();
            let op = ["~=", "^=", "*=", "="]
                .into_iter()
                .find(|op| p.consume_str(op));
            let test = match op {
                None => format!("@{attr}"),
                Some(op) => {
                    p.skip_ws();
                    let value = if matches!(p.peek_char(), Some('"') | Some('\'')) {
                        p.parse_quoted_string()?
                    } else {
                        ident(p)?.to_string()
                    };
                    match op {
                        "~=" => token_test(attr, &value),
                        "^=" => format!("starts-with(@{attr}, {})", literal(&value)),
                        "*=" => format!("contains(@{attr}, {})", literal(&value)),
                        _ => format!("@{attr}={}", literal(&value)),
                    }
                }
            };
            p.skip_ws();
            p.expect(']')?;
            out.push_str(&format!("[{test}]"));
        } else {
            break;
        }
    }
    Ok(out)
}

fn token_test(attr: &str, token: &str) -> String {
    format!(
        "contains(concat(' ', normalize-space(@{attr}), ' '), {})",
        literal(&format!(" {token} "))
    )
}

/// Matches when the CSS selector selects at least one node passing the constraints.
pub struct HaveSelector<'b> {
    selector: String,
    constraints: Constraints,
    evaluator: Evaluator,
    block: Option<Box<Block<'b>>>,
}

pub fn have_selector<'b>(selector: impl Into<String>) -> HaveSelector<'b> {
    HaveSelector::new(selector, Constraints::new())
}

impl<'b> HaveSelector<'b> {
    pub fn new(selector: impl Into<String>, constraints: Constraints) -> Self {
        Self {
            selector: selector.into(),
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

    pub fn inspect<F>(mut self, block: F) -> Self
    where
        F: Fn(&NodeSet<'_>) -> std::result::Result<(), AssertError> + 'b,
    {
        self.block = Some(Box::new(block));
        self
    }
}

impl Matcher for HaveSelector<'_> {
    fn matches(&self, subject: &Subject<'_>) -> std::result::Result<bool, AssertError> {
        let xpath = to_xpath(&self.selector)?;
        match_subject(
            &self.evaluator,
            &xpath,
            &self.constraints,
            self.block.as_deref(),
            subject,
        )
    }

    fn expression(&self) -> &str {
        &self.selector
    }

    fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    fn failure_message(&self, subject: &Subject<'_>) -> String {
        describe("match selector", &self.selector, &self.constraints, subject)
    }

    fn negative_failure_message(&self, subject: &Subject<'_>) -> String {
        describe("not match selector", &self.selector, &self.constraints, subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::Should;
    use pretty_assertions::assert_eq;

    #[test]
    fn type_selectors() {
        assert_eq!(to_xpath("li").unwrap(), "//li");
        assert_eq!(to_xpath("*").unwrap(), "//*");
        assert_eq!(to_xpath("UL > LI").unwrap(), "//ul/li");
    }

    #[test]
    fn ids_classes_and_attributes() {
        assert_eq!(to_xpath("div#main").unwrap(), "//div[@id='main']");
        assert_eq!(
            to_xpath(".inner").unwrap(),
            "//*[contains(concat(' ', normalize-space(@class), ' '), ' inner ')]"
        );
        assert_eq!(to_xpath("a[href]").unwrap(), "//a[@href]");
        assert_eq!(to_xpath("a[rel=\"next\"]").unwrap(), "//a[@rel='next']");
        assert_eq!(to_xpath("a[href^='/x']").unwrap(), "//a[starts-with(@href, '/x')]");
    }

    #[test]
    fn combinators_and_groups() {
        assert_eq!(to_xpath("div#main li").unwrap(), "//div[@id='main']//li");
        assert_eq!(to_xpath("h2 + h3").unwrap(), "//h2/following-sibling::*[1]/self::h3");
        assert_eq!(to_xpath("h2 ~ h4").unwrap(), "//h2/following-sibling::h4");
        assert_eq!(to_xpath("h2, h3").unwrap(), "//h2 | //h3");
    }

    #[test]
    fn bad_selectors() {
        assert!(matches!(to_xpath(""), Err(QueryError::Syntax { .. })));
        assert!(matches!(to_xpath("div >"), Err(QueryError::Syntax { .. })));
        assert!(matches!(to_xpath("a[href"), Err(QueryError::Syntax { .. })));
    }

    #[test]
    fn translated_selectors_match() {
        let body = "<div id='main'><div class='inner x'>hi</div>\
                    <h2>a</h2><h3>b</h3><ul><li>First</li><li>Second</li></ul></div>";
        body.should(have_selector("li").content("First")).unwrap();
        body.should(have_selector("#main > .inner")).unwrap();
        body.should(have_selector("h2 + h3")).unwrap();
        body.should_not(have_selector("h2 + ul")).unwrap();
        body.should_not(have_selector("li").content("Third")).unwrap();
    }
}
