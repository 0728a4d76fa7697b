use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dom::{NodeRef, NodeSet};

pub const CLASS: &str = "class";
pub const CONTENT: &str = "content";

/// Optional narrowing applied to the nodes an expression selects.
///
/// Only `class` and `content` take part in filtering. Other keys are kept so
/// they can be reported back, but have no effect on the verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Constraints(BTreeMap<String, String>);

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.0.insert(CLASS.to_string(), class.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.0.insert(CONTENT.to_string(), content.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `node` satisfies every recognised constraint.
    pub fn accepts(&self, node: &NodeRef<'_>) -> bool {
        let class_ok = self.get(CLASS).map_or(true, |want| has_class(node, want));
        let content_ok = self
            .get(CONTENT)
            .map_or(true, |want| node.text().contains(want));
        class_ok && content_ok
    }

    pub fn apply<'d>(&self, nodes: &mut NodeSet<'d>) {
        if self.get(CLASS).is_some() || self.get(CONTENT).is_some() {
            nodes.retain(|n| self.accepts(n));
        }
    }
}

/// Token-set membership on the `class` attribute, the way CSS reads it.
pub fn has_class(node: &NodeRef<'_>, class: &str) -> bool {
    node.attribute(CLASS)
        .is_some_and(|value| value.split_ascii_whitespace().any(|token| token == class))
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Constraints {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Constraints(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Constraints {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Renders as a JSON object, e.g. `{"class":"inner"}`.
impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use pretty_assertions::assert_eq;

    fn nodes(doc: &Document) -> NodeSet<'_> {
        NodeSet::from_unordered(doc.root().descendants().filter(|n| n.name() == Some("div")))
    }

    #[test]
    fn class_is_a_token_match() {
        let doc = Document::parse("<div class='a inner  b'>x</div><div class='inner-x'>y</div>");
        let mut set = nodes(&doc);
        Constraints::new().class("inner").apply(&mut set);
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].text(), "x");
    }

    #[test]
    fn content_is_a_substring_of_nested_text() {
        let doc = Document::parse("<div><span>hello,</span> world!</div><div>bye</div>");
        let mut set = nodes(&doc);
        Constraints::new().content("hello, world").apply(&mut set);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn unknown_keys_do_not_filter() {
        let doc = Document::parse("<div>x</div><div>y</div>");
        let mut set = nodes(&doc);
        Constraints::from([("count", "7")]).apply(&mut set);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn renders_as_json() {
        let c = Constraints::new().content("First").class("x");
        assert_eq!(c.to_string(), r#"{"class":"x","content":"First"}"#);
        let back: Constraints = serde_json::from_str(r#"{"content":"First"}"#).unwrap();
        assert_eq!(back, Constraints::new().content("First"));
    }
}
