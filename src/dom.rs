//! Immutable document tree.
//!
//! Markup is parsed with html5ever into an `RcDom`, which is then frozen into
//! an arena. Node ids are assigned in document order, so ordering and
//! subtree membership are plain integer comparisons.

use std::fmt;
use std::ops::Deref;

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use itertools::Itertools;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom, SerializableHandle};

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    // id of the last node inside this node's subtree
    last_descendant: NodeId,
}

enum Walk {
    Enter(Handle, Option<NodeId>),
    Leave(NodeId),
}

/// A parsed, read-only document.
///
/// The html5ever handles are kept next to the arena, one per node, and are
/// only used for serialisation.
#[derive(Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    handles: Vec<Handle>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document").field("nodes", &self.nodes).finish()
    }
}

impl Document {
    /// Parse markup as an HTML document. html5ever recovers from any input,
    /// so this never fails; missing `html`/`head`/`body` elements are implied.
    pub fn parse(markup: &str) -> Self {
        let dom = html5ever::parse_document(RcDom::default(), Default::default()).one(markup);
        let mut doc = Document {
            nodes: Vec::new(),
            handles: Vec::new(),
        };
        doc.freeze(dom.document);
        doc
    }

    // Preorder walk with an explicit stack; nesting depth is unbounded.
    fn freeze(&mut self, root: Handle) {
        let mut stack = vec![Walk::Enter(root, None)];
        while let Some(step) = stack.pop() {
            let (handle, parent) = match step {
                Walk::Leave(id) => {
                    self.nodes[id].last_descendant = self.nodes.len() - 1;
                    continue;
                }
                Walk::Enter(handle, parent) => (handle, parent),
            };
            let Some(kind) = node_kind(&handle) else {
                continue;
            };
            let id = self.nodes.len();
            self.nodes.push(NodeData {
                kind,
                parent,
                children: Vec::new(),
                last_descendant: id,
            });
            if let Some(p) = parent {
                self.nodes[p].children.push(id);
            }
            stack.push(Walk::Leave(id));
            stack.extend(
                child_handles(&handle)
                    .into_iter()
                    .rev()
                    .map(|child| Walk::Enter(child, Some(id))),
            );
            self.handles.push(handle);
        }
    }

    /// The document node itself (parent of the `html` element).
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef { doc: self, id: 0 }
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id < self.nodes.len()).then_some(NodeRef { doc: self, id })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serialise the whole document back to markup.
    pub fn to_html(&self) -> String {
        self.root().to_html()
    }
}

fn node_kind(handle: &Handle) -> Option<NodeKind> {
    let kind = match &handle.data {
        RcNodeData::Document => NodeKind::Document,
        RcNodeData::Element { name, attrs, .. } => NodeKind::Element {
            name: name.local.to_string(),
            attributes: attrs
                .borrow()
                .iter()
                .map(|a| (a.name.local.to_string(), a.value.to_string()))
                .collect(),
        },
        RcNodeData::Text { contents } => NodeKind::Text(contents.borrow().to_string()),
        RcNodeData::Comment { contents } => NodeKind::Comment(contents.to_string()),
        RcNodeData::Doctype { .. } | RcNodeData::ProcessingInstruction { .. } => return None,
    };
    Some(kind)
}

// A `<template>`'s parsed content lives in a separate fragment; it is
// treated as the element's children so queries and text see it.
fn child_handles(handle: &Handle) -> Vec<Handle> {
    if let RcNodeData::Element { template_contents, .. } = &handle.data {
        if let Some(contents) = template_contents.borrow().as_ref() {
            return contents.children.borrow().clone();
        }
    }
    handle.children.borrow().clone()
}

/// A borrowed handle to one node of a [`Document`].
#[derive(Clone, Copy)]
pub struct NodeRef<'d> {
    doc: &'d Document,
    id: NodeId,
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            NodeKind::Document => write!(f, "#document"),
            NodeKind::Element { name, .. } => write!(f, "<{name}>#{}", self.id),
            NodeKind::Text(t) => write!(f, "#text({t:?})"),
            NodeKind::Comment(_) => write!(f, "#comment#{}", self.id),
        }
    }
}

impl<'d> NodeRef<'d> {
    fn data(&self) -> &'d NodeData {
        &self.doc.nodes[self.id]
    }

    fn at(&self, id: NodeId) -> NodeRef<'d> {
        NodeRef { doc: self.doc, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'d Document {
        self.doc
    }

    pub fn kind(&self) -> &'d NodeKind {
        &self.data().kind
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind(), NodeKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind(), NodeKind::Text(_))
    }

    /// Tag name for elements, `None` for everything else.
    pub fn name(&self) -> Option<&'d str> {
        match self.kind() {
            NodeKind::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn attributes(&self) -> &'d [(String, String)] {
        match self.kind() {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&'d str> {
        self.attributes()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn parent(&self) -> Option<NodeRef<'d>> {
        self.data().parent.map(|p| self.at(p))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'d>> + 'd {
        let doc = self.doc;
        self.data()
            .children
            .iter()
            .map(move |&id| NodeRef { doc, id })
    }

    /// Ancestors from the parent up to the document node.
    pub fn ancestors(&self) -> impl Iterator<Item = NodeRef<'d>> + 'd {
        std::iter::successors(self.parent(), |n| n.parent())
    }

    /// Descendants in document order, excluding `self`.
    pub fn descendants(&self) -> impl Iterator<Item = NodeRef<'d>> + 'd {
        let doc = self.doc;
        (self.id + 1..=self.data().last_descendant).map(move |id| NodeRef { doc, id })
    }

    pub fn following_siblings(&self) -> impl Iterator<Item = NodeRef<'d>> + 'd {
        let doc = self.doc;
        let (_, after) = self.split_siblings();
        after.iter().map(move |&id| NodeRef { doc, id })
    }

    /// Preceding siblings, nearest first.
    pub fn preceding_siblings(&self) -> impl Iterator<Item = NodeRef<'d>> + 'd {
        let doc = self.doc;
        let (before, _) = self.split_siblings();
        before.iter().rev().map(move |&id| NodeRef { doc, id })
    }

    fn split_siblings(&self) -> (&'d [NodeId], &'d [NodeId]) {
        let siblings = self.sibling_ids();
        match siblings.iter().position(|&s| s == self.id) {
            Some(pos) => (&siblings[..pos], &siblings[pos + 1..]),
            None => (&[], &[]),
        }
    }

    fn sibling_ids(&self) -> &'d [NodeId] {
        match self.data().parent {
            Some(p) => &self.doc.nodes[p].children,
            None => &[],
        }
    }

    /// True when `self` is `other` or lies inside `other`'s subtree.
    pub fn is_within(&self, other: &NodeRef<'_>) -> bool {
        std::ptr::eq(self.doc, other.doc)
            && other.id <= self.id
            && self.id <= other.data().last_descendant
    }

    /// Concatenated text of every descendant text node, in document order.
    pub fn text(&self) -> String {
        match self.kind() {
            NodeKind::Text(t) => t.clone(),
            NodeKind::Comment(c) => c.clone(),
            _ => self
                .descendants()
                .filter_map(|n| match n.kind() {
                    NodeKind::Text(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Serialise this node and its subtree with html5ever. The document
    /// node renders as its children.
    pub fn to_html(&self) -> String {
        let scope = match self.kind() {
            NodeKind::Document => TraversalScope::ChildrenOnly(None),
            _ => TraversalScope::IncludeNode,
        };
        let opts = SerializeOpts {
            traversal_scope: scope,
            ..Default::default()
        };
        let handle = SerializableHandle::from(self.doc.handles[self.id].clone());
        let mut out = Vec::new();
        // writing into a Vec cannot fail
        let _ = serialize(&mut out, &handle, opts);
        String::from_utf8_lossy(&out).into_owned()
    }
}

/// Ordered, duplicate-free sequence of nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeSet<'d>(Vec<NodeRef<'d>>);

impl<'d> NodeSet<'d> {
    pub fn new() -> Self {
        NodeSet(Vec::new())
    }

    /// Build a set from nodes in any order, restoring document order and
    /// dropping duplicates.
    pub fn from_unordered(nodes: impl IntoIterator<Item = NodeRef<'d>>) -> Self {
        NodeSet(
            nodes
                .into_iter()
                .sorted_by_key(|n| n.id)
                .dedup()
                .collect(),
        )
    }

    pub fn single(node: NodeRef<'d>) -> Self {
        NodeSet(vec![node])
    }

    pub fn retain(&mut self, f: impl FnMut(&NodeRef<'d>) -> bool) {
        self.0.retain(f);
    }

    pub fn into_vec(self) -> Vec<NodeRef<'d>> {
        self.0
    }

    pub fn to_html(&self) -> String {
        self.0.iter().map(NodeRef::to_html).join("\n")
    }
}

impl<'d> Deref for NodeSet<'d> {
    type Target = [NodeRef<'d>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'d> IntoIterator for NodeSet<'d> {
    type Item = NodeRef<'d>;
    type IntoIter = std::vec::IntoIter<NodeRef<'d>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, 'd> IntoIterator for &'a NodeSet<'d> {
    type Item = &'a NodeRef<'d>;
    type IntoIter = std::slice::Iter<'a, NodeRef<'d>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Document {
        Document::parse("<div id='main'><p class='a'>one <b>two</b></p><p>three</p></div>")
    }

    fn find<'d>(doc: &'d Document, tag: &str) -> Vec<NodeRef<'d>> {
        doc.root()
            .descendants()
            .filter(|n| n.name() == Some(tag))
            .collect()
    }

    #[test]
    fn implied_structure_is_created() {
        let doc = sample();
        let names: Vec<_> = doc.root().descendants().filter_map(|n| n.name()).collect();
        assert_eq!(names, vec!["html", "head", "body", "div", "p", "b", "p"]);
    }

    #[test]
    fn text_includes_nested_elements() {
        let doc = sample();
        assert_eq!(find(&doc, "p")[0].text(), "one two");
        assert_eq!(find(&doc, "div")[0].text(), "one twothree");
    }

    #[test]
    fn text_keeps_both_quote_kinds() {
        let doc = Document::parse(r#"<h4>Welcome 'Bryan"</h4>"#);
        assert_eq!(find(&doc, "h4")[0].text(), r#"Welcome 'Bryan""#);
    }

    #[test]
    fn subtree_membership() {
        let doc = sample();
        let div = find(&doc, "div")[0];
        let b = find(&doc, "b")[0];
        assert!(b.is_within(&div));
        assert!(div.is_within(&div));
        assert!(!div.is_within(&b));
    }

    #[test]
    fn siblings_and_attributes() {
        let doc = sample();
        let ps = find(&doc, "p");
        assert_eq!(ps[0].attribute("class"), Some("a"));
        assert_eq!(ps[1].attribute("class"), None);
        assert_eq!(ps[0].following_siblings().collect::<Vec<_>>(), vec![ps[1]]);
        assert_eq!(ps[1].preceding_siblings().collect::<Vec<_>>(), vec![ps[0]]);
    }

    #[test]
    fn node_set_restores_document_order() {
        let doc = sample();
        let ps = find(&doc, "p");
        let set = NodeSet::from_unordered(vec![ps[1], ps[0], ps[1]]);
        assert_eq!(set.len(), 2);
        assert_eq!(set[0], ps[0]);
    }

    #[test]
    fn serialises_elements() {
        let doc = Document::parse("<ul><li class=\"x\">a &amp; b</li></ul>");
        let ul = find(&doc, "ul")[0];
        assert_eq!(ul.to_html(), "<ul><li class=\"x\">a &amp; b</li></ul>");
    }

    #[test]
    fn raw_text_elements_serialise_verbatim() {
        let doc = Document::parse("<script>if (a < b && c) {}</script><p>x &lt; y</p>");
        let html = doc.to_html();
        assert!(html.contains("<script>if (a < b && c) {}</script>"), "{html}");
        assert!(html.contains("<p>x &lt; y</p>"), "{html}");
        assert_eq!(find(&doc, "script")[0].to_html(), "<script>if (a < b && c) {}</script>");
    }

    #[test]
    fn deeply_nested_markup() {
        let depth = 20_000;
        let markup = format!("{}x{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let doc = Document::parse(&markup);
        let divs = find(&doc, "div");
        assert_eq!(divs.len(), depth);
        let innermost = divs[depth - 1];
        assert!(innermost.is_within(&divs[0]));
        assert_eq!(innermost.ancestors().count(), depth + 2);
        assert_eq!(divs[0].text(), "x");
        assert!(doc.to_html().contains("<div>x</div>"));
    }

    #[test]
    fn template_content_is_part_of_the_tree() {
        let doc = Document::parse("<template><p>inside</p></template>");
        let template = find(&doc, "template")[0];
        let p = find(&doc, "p")[0];
        assert_eq!(p.parent(), Some(template));
        assert_eq!(template.text(), "inside");
    }
}
