use std::collections::HashMap;

use anyhow::{anyhow, Context};
use ego_tree::{NodeId, NodeRef as TreeNode};
use scraper::{ElementRef, Html, Node};
use sha2::{Digest, Sha256};

/// Opaque handle to one node of a [`TemplateDocument`].
///
/// Handles are arena indices: they stay valid for the document they came from (and for any
/// document parsed from the same input string) until that node is detached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef(NodeId);

const SKIP_TEXT_TAGS: [&str; 5] = ["script", "style", "head", "title", "template"];
const LANDMARK_TAGS: [&str; 7] = ["img", "hr", "title", "style", "script", "meta", "link"];
const INLINE_TAGS: [&str; 14] = [
    "strong", "b", "em", "i", "u", "span", "font", "a", "small", "big", "sub", "sup", "mark", "label",
];

/// Parsed template with the node it serializes from.
///
/// Inputs containing `<html` or a doctype are parsed as full documents; everything else is
/// parsed as a body fragment and serialized back without the synthetic wrapper.
pub struct TemplateDocument {
    html: Html,
    content_root: NodeId,
    full_document: bool,
}

impl TemplateDocument {
    pub fn parse(source: &str) -> Self {
        let lower = source.to_ascii_lowercase();
        let full_document = lower.contains("<html") || lower.contains("<!doctype");
        let html = if full_document {
            Html::parse_document(source)
        } else {
            Html::parse_fragment(source)
        };
        let content_root = if full_document {
            html.tree.root().id()
        } else {
            html.root_element().id()
        };
        Self {
            html,
            content_root,
            full_document,
        }
    }

    pub fn is_full_document(&self) -> bool {
        self.full_document
    }

    pub fn root(&self) -> NodeRef {
        NodeRef(self.content_root)
    }

    fn node(&self, n: NodeRef) -> Option<TreeNode<'_, Node>> {
        self.html.tree.get(n.0)
    }

    pub fn serialize(&self) -> String {
        if self.full_document {
            return self.html.html();
        }
        self.node(self.root())
            .and_then(ElementRef::wrap)
            .map(|e| e.inner_html())
            .unwrap_or_default()
    }

    /// Outer HTML of one element; empty for non-elements.
    pub fn outer_html(&self, n: NodeRef) -> String {
        self.node(n)
            .and_then(ElementRef::wrap)
            .map(|e| e.html())
            .unwrap_or_default()
    }

    /// Every node under the content root, pre-order.
    pub fn descendants(&self) -> Vec<NodeRef> {
        match self.node(self.root()) {
            Some(root) => root.descendants().map(|n| NodeRef(n.id())).collect(),
            None => Vec::new(),
        }
    }

    pub fn elements_named(&self, names: &[&str]) -> Vec<NodeRef> {
        self.descendants()
            .into_iter()
            .filter(|n| self.tag(*n).is_some_and(|t| names.contains(&t)))
            .collect()
    }

    pub fn text_nodes(&self) -> Vec<NodeRef> {
        self.descendants()
            .into_iter()
            .filter(|n| self.is_text(*n))
            .collect()
    }

    /// Pre-order index of every node, used to restore document order after tiered detection.
    pub fn document_order(&self) -> HashMap<NodeRef, usize> {
        self.descendants()
            .into_iter()
            .enumerate()
            .map(|(i, n)| (n, i))
            .collect()
    }

    pub fn tag(&self, n: NodeRef) -> Option<&str> {
        match self.node(n)?.value() {
            Node::Element(e) => Some(e.name()),
            _ => None,
        }
    }

    pub fn is_element(&self, n: NodeRef) -> bool {
        self.tag(n).is_some()
    }

    pub fn is_inline(&self, n: NodeRef) -> bool {
        self.tag(n).is_some_and(|t| INLINE_TAGS.contains(&t))
    }

    pub fn attr(&self, n: NodeRef, name: &str) -> Option<&str> {
        match self.node(n)?.value() {
            Node::Element(e) => e.attr(name),
            _ => None,
        }
    }

    pub fn has_class(&self, n: NodeRef, class: &str) -> bool {
        self.attr(n, "class")
            .is_some_and(|c| c.split_whitespace().any(|x| x == class))
    }

    pub fn is_text(&self, n: NodeRef) -> bool {
        self.node(n)
            .is_some_and(|node| matches!(node.value(), Node::Text(_)))
    }

    pub fn is_comment(&self, n: NodeRef) -> bool {
        self.node(n)
            .is_some_and(|node| matches!(node.value(), Node::Comment(_)))
    }

    pub fn text_value(&self, n: NodeRef) -> Option<&str> {
        match self.node(n)?.value() {
            Node::Text(t) => Some(&*t.text),
            _ => None,
        }
    }

    /// Concatenated descendant text, skipping script/style content.
    pub fn text(&self, n: NodeRef) -> String {
        let mut out = String::new();
        if let Some(node) = self.node(n) {
            collect_text(node, &mut out);
        }
        out
    }

    pub fn parent(&self, n: NodeRef) -> Option<NodeRef> {
        self.node(n)?.parent().map(|p| NodeRef(p.id()))
    }

    pub fn next_sibling(&self, n: NodeRef) -> Option<NodeRef> {
        self.node(n)?.next_sibling().map(|p| NodeRef(p.id()))
    }

    pub fn children(&self, n: NodeRef) -> Vec<NodeRef> {
        match self.node(n) {
            Some(node) => node.children().map(|c| NodeRef(c.id())).collect(),
            None => Vec::new(),
        }
    }

    /// Next element sibling, skipping text and comments.
    pub fn next_element_sibling(&self, n: NodeRef) -> Option<NodeRef> {
        let mut cur = self.next_sibling(n);
        while let Some(c) = cur {
            if self.is_element(c) {
                return Some(c);
            }
            cur = self.next_sibling(c);
        }
        None
    }

    /// Nearest ancestor-or-self with one of `names`.
    pub fn closest(&self, n: NodeRef, names: &[&str]) -> Option<NodeRef> {
        let mut cur = Some(n);
        while let Some(c) = cur {
            if self.tag(c).is_some_and(|t| names.contains(&t)) {
                return Some(c);
            }
            cur = self.parent(c);
        }
        None
    }

    /// Proper ancestors, nearest first.
    pub fn ancestors(&self, n: NodeRef) -> Vec<NodeRef> {
        let mut out = Vec::new();
        let mut cur = self.parent(n);
        while let Some(c) = cur {
            out.push(c);
            cur = self.parent(c);
        }
        out
    }

    pub fn is_ancestor_or_self(&self, ancestor: NodeRef, n: NodeRef) -> bool {
        n == ancestor || self.ancestors(n).contains(&ancestor)
    }

    /// Still reachable from the tree root (not detached, directly or via an ancestor).
    pub fn is_attached(&self, n: NodeRef) -> bool {
        let root = self.html.tree.root().id();
        n.0 == root || self.ancestors(n).last().is_some_and(|top| top.0 == root)
    }

    pub fn has_descendant_tag(&self, n: NodeRef, names: &[&str]) -> bool {
        match self.node(n) {
            Some(node) => node.descendants().skip(1).any(|d| {
                matches!(d.value(), Node::Element(e) if names.contains(&e.name()))
            }),
            None => false,
        }
    }

    pub fn set_text(&mut self, n: NodeRef, text: &str) -> anyhow::Result<()> {
        let mut node = self
            .html
            .tree
            .get_mut(n.0)
            .context("text node missing")?;
        match node.value() {
            Node::Text(t) => {
                t.text = text.into();
                Ok(())
            }
            _ => Err(anyhow!("expected text node")),
        }
    }

    pub fn detach(&mut self, n: NodeRef) {
        if n.0 == self.content_root {
            return;
        }
        if let Some(mut node) = self.html.tree.get_mut(n.0) {
            node.detach();
        }
    }

    pub fn clear_children(&mut self, n: NodeRef) {
        for c in self.children(n) {
            self.detach(c);
        }
    }

    /// Parses `fragment` and inserts its top-level nodes right after `anchor`, in order.
    /// Returns the first inserted node.
    pub fn insert_fragment_after(&mut self, anchor: NodeRef, fragment: &str) -> anyhow::Result<NodeRef> {
        if !self.is_attached(anchor) {
            return Err(anyhow!("insertion anchor is detached"));
        }
        if self.parent(anchor).is_none() || anchor.0 == self.content_root {
            return Err(anyhow!("insertion anchor has no parent"));
        }
        let frag = Html::parse_fragment(fragment);
        let mut first: Option<NodeRef> = None;
        let mut prev = anchor.0;
        for src in frag.root_element().children() {
            let id = self
                .html
                .tree
                .get_mut(prev)
                .context("insertion anchor missing")?
                .insert_after(src.value().clone())
                .id();
            self.graft_children(id, src)?;
            first.get_or_insert(NodeRef(id));
            prev = id;
        }
        first.context("fragment produced no nodes")
    }

    /// Parses `fragment` and appends its top-level nodes as the last children of `parent`.
    pub fn append_fragment(&mut self, parent: NodeRef, fragment: &str) -> anyhow::Result<NodeRef> {
        if !self.is_attached(parent) {
            return Err(anyhow!("append target is detached"));
        }
        if !self.is_element(parent) {
            return Err(anyhow!("append target is not an element"));
        }
        let frag = Html::parse_fragment(fragment);
        let mut first: Option<NodeRef> = None;
        for src in frag.root_element().children() {
            let id = self
                .html
                .tree
                .get_mut(parent.0)
                .context("append target missing")?
                .append(src.value().clone())
                .id();
            self.graft_children(id, src)?;
            first.get_or_insert(NodeRef(id));
        }
        first.context("fragment produced no nodes")
    }

    fn graft_children(&mut self, dst: NodeId, src: TreeNode<'_, Node>) -> anyhow::Result<()> {
        for child in src.children() {
            let id = self
                .html
                .tree
                .get_mut(dst)
                .context("graft target missing")?
                .append(child.value().clone())
                .id();
            self.graft_children(id, child)?;
        }
        Ok(())
    }

    /// SHA-256 over the serialized landmark elements (images, rules, head metadata) in order.
    pub fn landmark_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for n in self.elements_named(&LANDMARK_TAGS) {
            hasher.update(self.outer_html(n).as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

fn collect_text(node: TreeNode<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(t) => out.push_str(&t.text),
        Node::Element(e) if SKIP_TEXT_TAGS.contains(&e.name()) => {}
        _ => {
            for c in node.children() {
                collect_text(c, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TemplateDocument;

    #[test]
    fn fragment_round_trip_drops_synthetic_wrapper() {
        let doc = TemplateDocument::parse("<p><strong>Hälsa</strong></p><img src=\"logo.png\">");
        let out = doc.serialize();
        assert!(out.starts_with("<p><strong>Hälsa</strong></p>"));
        assert!(out.contains("<img src=\"logo.png\">"));
        assert!(!out.contains("<html>"));
    }

    #[test]
    fn full_document_keeps_body() {
        let doc = TemplateDocument::parse("<!DOCTYPE html><html><body><h1>Titel</h1></body></html>");
        assert!(doc.is_full_document());
        assert!(doc.serialize().contains("<body><h1>Titel</h1></body>"));
    }

    #[test]
    fn insert_and_detach_keep_siblings() {
        let mut doc = TemplateDocument::parse("<div><p>a</p><p>b</p></div>");
        let ps = doc.elements_named(&["p"]);
        let inserted = doc
            .insert_fragment_after(ps[0], "<ul><li>x</li></ul>")
            .expect("insert");
        assert_eq!(doc.tag(inserted), Some("ul"));
        doc.detach(ps[1]);
        assert!(!doc.is_attached(ps[1]));
        assert_eq!(doc.serialize(), "<div><p>a</p><ul><li>x</li></ul></div>");
    }

    #[test]
    fn text_skips_style_content() {
        let doc = TemplateDocument::parse("<div><style>p{}</style>Hej <b>du</b></div>");
        let div = doc.elements_named(&["div"])[0];
        assert_eq!(doc.text(div), "Hej du");
    }

    #[test]
    fn landmark_hash_ignores_text_edits() {
        let mut doc = TemplateDocument::parse("<img src=\"a.png\"><p>text</p>");
        let before = doc.landmark_hash();
        let t = doc.text_nodes()[0];
        doc.set_text(t, "changed").expect("set text");
        assert_eq!(before, doc.landmark_hash());
    }
}
