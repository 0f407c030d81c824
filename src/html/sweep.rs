use regex::Regex;
use tracing::debug;

use crate::html::dom::{NodeRef, TemplateDocument};
use crate::sentinels::{BRACKET_TOKEN_RE, MAPPED_CLASS};
use crate::textutil::{collapse_ws, is_placeholder_text, truncate_for_log};

/// Text inside these is never template prose.
const RAW_TEXT_TAGS: [&str; 5] = ["script", "style", "title", "textarea", "template"];

/// Elements that always end a sweep: they carry content the sweep must never drop.
const STRUCTURAL_TAGS: [&str; 12] = [
    "img", "table", "ul", "ol", "iframe", "hr", "input", "object", "svg", "video", "canvas", "embed",
];

pub struct SweepRules<'a> {
    pub instructions: &'a [Regex],
    /// Header anchors of every detected section; reaching one ends the sweep.
    pub headers: &'a [NodeRef],
    pub limit: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Remove,
    Keep,
    Stop,
}

/// Bracket/paren wrapped text, or text matching one of the instruction phrases.
pub fn is_instruction_text(text: &str, instructions: &[Regex]) -> bool {
    let t = collapse_ws(text);
    if t.is_empty() {
        return false;
    }
    is_placeholder_text(&t) || instructions.iter().any(|re| re.is_match(&t))
}

/// Deletes the empty, line-break and placeholder siblings following `start`, stopping at the
/// first section header or substantial content. Returns the number of nodes removed.
pub fn sweep_after(doc: &mut TemplateDocument, start: NodeRef, rules: &SweepRules<'_>) -> usize {
    let mut removed = 0usize;
    let mut cur = doc.next_sibling(start);
    let mut inspected = 0usize;
    while let Some(n) = cur {
        if inspected >= rules.limit {
            break;
        }
        inspected += 1;
        let next = doc.next_sibling(n);
        match classify(doc, n, rules) {
            Step::Remove => {
                debug!("sweep removes: {}", truncate_for_log(&collapse_ws(&doc.text(n)), 60));
                doc.detach(n);
                removed += 1;
            }
            Step::Keep => {}
            Step::Stop => break,
        }
        cur = next;
    }
    removed
}

fn classify(doc: &TemplateDocument, n: NodeRef, rules: &SweepRules<'_>) -> Step {
    if doc.is_comment(n) {
        return Step::Keep;
    }
    if let Some(text) = doc.text_value(n) {
        if text.trim().is_empty() || is_instruction_text(text, rules.instructions) {
            return Step::Remove;
        }
        return Step::Stop;
    }
    let Some(tag) = doc.tag(n) else {
        return Step::Keep;
    };
    if rules.headers.iter().any(|h| doc.is_ancestor_or_self(n, *h)) {
        return Step::Stop;
    }
    if tag == "br" {
        return Step::Remove;
    }
    if doc.has_class(n, MAPPED_CLASS)
        || STRUCTURAL_TAGS.contains(&tag)
        || doc.has_descendant_tag(n, &STRUCTURAL_TAGS)
    {
        return Step::Stop;
    }
    let text = doc.text(n);
    if collapse_ws(&text).is_empty() || is_instruction_text(&text, rules.instructions) {
        return Step::Remove;
    }
    Step::Stop
}

/// Final pass over the whole tree: drops text nodes that are nothing but a placeholder and
/// cuts `[...]` tokens out of the remaining prose. Inserted lists are left alone.
pub fn strip_stray_placeholders(doc: &mut TemplateDocument) -> usize {
    let mut stripped = 0usize;
    for t in doc.text_nodes() {
        let Some(text) = doc.text_value(t) else {
            continue;
        };
        if !(is_placeholder_text(text) || BRACKET_TOKEN_RE.is_match(text)) {
            continue;
        }
        let protected = doc.ancestors(t).into_iter().any(|a| {
            doc.has_class(a, MAPPED_CLASS)
                || doc.tag(a).is_some_and(|tag| RAW_TEXT_TAGS.contains(&tag))
        });
        if protected || !doc.is_attached(t) {
            continue;
        }
        if is_placeholder_text(text) {
            debug!("stray placeholder: {}", truncate_for_log(&collapse_ws(text), 60));
            doc.detach(t);
            stripped += 1;
            continue;
        }
        let cut = BRACKET_TOKEN_RE.replace_all(text, "").into_owned();
        if doc.set_text(t, &cut).is_ok() {
            stripped += 1;
        }
    }
    stripped
}
