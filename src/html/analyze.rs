use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::MapperConfig;
use crate::html::dom::{NodeRef, TemplateDocument};
use crate::ir::{Analysis, Confidence, SectionCandidate, SectionKind, TemplateType};
use crate::sentinels::ISO_DATE_RE;
use crate::textutil::{
    char_len, collapse_ws, is_placeholder_text, looks_like_label, normalize_name, word_count,
};

const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];
const CELL_TAGS: [&str; 2] = ["td", "th"];
const NON_CONTENT_PARENTS: [&str; 7] = ["script", "style", "meta", "link", "title", "head", "template"];

/// Parses `html` and detects its fillable sections.
///
/// Anchors in the result refer to a tree parsed from exactly this string.
pub fn analyze(html: &str, cfg: &MapperConfig) -> Analysis {
    let doc = TemplateDocument::parse(html);
    analyze_document(&doc, cfg)
}

pub fn analyze_document(doc: &TemplateDocument, cfg: &MapperConfig) -> Analysis {
    let mut det = Detector::new(doc, cfg);
    det.detect_table_headers();
    det.detect_bold();
    det.detect_headings();
    det.detect_styled();
    if det.accepted.is_empty() {
        debug!("no styled sections found, falling back to text patterns");
        det.detect_text_patterns();
    }

    let mut sections = det.accepted;
    sections.sort_by_key(|s| (s.confidence, s.doc_order));
    let template_type = template_type_of(&sections);
    debug!(
        "template type {:?}, {} sections: {:?}",
        template_type,
        sections.len(),
        sections.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
    );
    Analysis {
        sections,
        template_type,
    }
}

pub fn template_type_of(sections: &[SectionCandidate]) -> TemplateType {
    let table = sections.iter().any(|s| s.kind.is_table_shaped());
    let text = sections.iter().any(|s| !s.kind.is_table_shaped());
    match (table, text) {
        (true, false) => TemplateType::Table,
        (false, true) => TemplateType::Text,
        (true, true) => TemplateType::Mixed,
        (false, false) => TemplateType::Unknown,
    }
}

struct Detector<'a> {
    doc: &'a TemplateDocument,
    cfg: &'a MapperConfig,
    order: HashMap<NodeRef, usize>,
    seen: HashSet<String>,
    accepted: Vec<SectionCandidate>,
}

struct Proposal {
    node: NodeRef,
    kind: SectionKind,
    confidence: Confidence,
    len_bounds: (usize, usize),
    content_anchor: Option<NodeRef>,
}

impl<'a> Detector<'a> {
    fn new(doc: &'a TemplateDocument, cfg: &'a MapperConfig) -> Self {
        Self {
            doc,
            cfg,
            order: doc.document_order(),
            seen: HashSet::new(),
            accepted: Vec::new(),
        }
    }

    /// Runs the shared filters; returns whether the proposal became a candidate.
    fn propose(&mut self, p: Proposal) -> bool {
        let name = collapse_ws(&self.doc.text(p.node));
        if name.is_empty() {
            return false;
        }
        if is_placeholder_text(&name) {
            debug!("skip placeholder: {name}");
            return false;
        }
        if self.is_metadata_keyword(&name) {
            debug!("skip metadata header: {name}");
            return false;
        }
        let key = normalize_name(&name);
        if self.seen.contains(&key) {
            return false;
        }
        let len = char_len(&name);
        if len < p.len_bounds.0 || len > p.len_bounds.1 {
            return false;
        }
        if self.overlaps_accepted(p.node) {
            return false;
        }
        debug!("[{:?}/{:?}] section: {name}", p.kind, p.confidence);
        self.seen.insert(key);
        self.accepted.push(SectionCandidate {
            name,
            kind: p.kind,
            confidence: p.confidence,
            header_anchor: p.node,
            content_anchor: p.content_anchor,
            doc_order: self.order.get(&p.node).copied().unwrap_or(usize::MAX),
        });
        true
    }

    fn is_metadata_keyword(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        let bare = lower.trim_end_matches(':').trim();
        self.cfg.vocabulary.metadata_keywords.iter().any(|kw| {
            let kw = kw.to_lowercase();
            bare == kw || lower.starts_with(&format!("{kw}:"))
        })
    }

    /// A node nested inside (or wrapping) an accepted header is the same header seen twice.
    fn overlaps_accepted(&self, n: NodeRef) -> bool {
        self.accepted.iter().any(|s| {
            self.doc.is_ancestor_or_self(s.header_anchor, n)
                || self.doc.is_ancestor_or_self(n, s.header_anchor)
        })
    }

    fn is_header_cell(&self, cell: NodeRef) -> bool {
        let palette = &self.cfg.detection.header_backgrounds;
        if let Some(bg) = self.doc.attr(cell, "bgcolor") {
            let bg = bg.trim().to_lowercase();
            if palette.iter().any(|p| *p == bg) {
                return true;
            }
        }
        let Some(style) = self.doc.attr(cell, "style") else {
            return false;
        };
        css_declarations(style)
            .into_iter()
            .filter(|(k, _)| k == "background-color" || k == "background")
            .flat_map(|(_, v)| css_value_tokens(&v))
            .any(|tok| palette.iter().any(|p| *p == tok))
    }

    fn detect_table_headers(&mut self) {
        let bounds = self.cfg.detection.table_len;
        for cell in self.doc.elements_named(&CELL_TAGS) {
            if !self.is_header_cell(cell) {
                continue;
            }
            let content = self
                .doc
                .next_element_sibling(cell)
                .filter(|s| self.doc.tag(*s).is_some_and(|t| CELL_TAGS.contains(&t)));
            self.propose(Proposal {
                node: cell,
                kind: SectionKind::TableHeader,
                confidence: Confidence::High,
                len_bounds: bounds,
                content_anchor: content,
            });
        }
    }

    /// Content cells of table headers are overwritten on fill; nothing inside them is a header.
    fn is_table_content_cell(&self, cell: NodeRef) -> bool {
        self.accepted
            .iter()
            .any(|s| s.kind == SectionKind::TableHeader && s.content_anchor == Some(cell))
    }

    fn is_bold_span(&self, n: NodeRef) -> bool {
        let Some(style) = self.doc.attr(n, "style") else {
            return false;
        };
        css_declarations(style).into_iter().any(|(k, v)| {
            k == "font-weight"
                && (v.contains("bold") || v.parse::<u32>().is_ok_and(|w| w >= 600))
        })
    }

    fn detect_bold(&mut self) {
        let bounds = self.cfg.detection.bold_len;
        for n in self.doc.elements_named(&["strong", "b", "span"]) {
            if self.doc.tag(n) == Some("span") && !self.is_bold_span(n) {
                continue;
            }
            let text = collapse_ws(&self.doc.text(n));
            if ISO_DATE_RE.is_match(&text) {
                debug!("skip date: {text}");
                continue;
            }
            let cell = self.doc.closest(n, &CELL_TAGS);
            if cell.is_some_and(|c| self.is_table_content_cell(c)) {
                continue;
            }
            let (kind, content_anchor) = match cell {
                Some(c) => (SectionKind::InlineTable, Some(c)),
                None => (SectionKind::Bold, None),
            };
            self.propose(Proposal {
                node: n,
                kind,
                confidence: Confidence::High,
                len_bounds: bounds,
                content_anchor,
            });
        }
    }

    fn detect_headings(&mut self) {
        let bounds = self.cfg.detection.heading_len;
        for n in self.doc.elements_named(&HEADING_TAGS) {
            self.propose(Proposal {
                node: n,
                kind: SectionKind::Heading,
                confidence: Confidence::High,
                len_bounds: bounds,
                content_anchor: None,
            });
        }
    }

    fn declares_serif(&self, n: NodeRef) -> bool {
        let faces = &self.cfg.detection.serif_faces;
        let mut chain = vec![n];
        chain.extend(self.doc.ancestors(n).into_iter().take(2));
        chain.into_iter().any(|c| {
            let style = self.doc.attr(c, "style").unwrap_or("").to_lowercase();
            let face = self.doc.attr(c, "face").unwrap_or("").to_lowercase();
            faces
                .iter()
                .any(|f| style.contains(f.as_str()) || face.contains(f.as_str()))
        })
    }

    fn declares_point_size(&self, n: NodeRef) -> bool {
        let det = &self.cfg.detection;
        if self.doc.tag(n) == Some("font") {
            if let Some(size) = self.doc.attr(n, "size") {
                if det.font_sizes.iter().any(|s| s == size.trim()) {
                    return true;
                }
            }
        }
        let Some(style) = self.doc.attr(n, "style") else {
            return false;
        };
        css_declarations(style)
            .into_iter()
            .any(|(k, v)| k == "font-size" && det.point_sizes.iter().any(|p| *p == v))
    }

    fn detect_styled(&mut self) {
        let bounds = self.cfg.detection.styled_len;
        let max_words = self.cfg.detection.styled_max_words;
        for n in self.doc.elements_named(&["span", "font"]) {
            if !self.declares_serif(n) && !self.declares_point_size(n) {
                continue;
            }
            let text = collapse_ws(&self.doc.text(n));
            if word_count(&text) >= max_words || !looks_like_label(&text) {
                continue;
            }
            self.propose(Proposal {
                node: n,
                kind: SectionKind::StyledText,
                confidence: Confidence::Medium,
                len_bounds: bounds,
                content_anchor: None,
            });
        }
    }

    /// Skips whitespace text, comments and line breaks.
    fn next_meaningful_sibling(&self, n: NodeRef) -> Option<NodeRef> {
        let mut cur = self.doc.next_sibling(n);
        while let Some(c) = cur {
            let blank_text = self
                .doc
                .text_value(c)
                .is_some_and(|t| t.trim().is_empty());
            if !(blank_text || self.doc.is_comment(c) || self.doc.tag(c) == Some("br")) {
                return Some(c);
            }
            cur = self.doc.next_sibling(c);
        }
        None
    }

    fn detect_text_patterns(&mut self) {
        let det = &self.cfg.detection;
        let bounds = det.pattern_len;
        let max_words = det.pattern_max_words;
        let long_sibling = det.pattern_long_sibling;
        for t in self.doc.text_nodes() {
            let Some(parent) = self.doc.parent(t) else {
                continue;
            };
            if self
                .doc
                .tag(parent)
                .is_some_and(|p| NON_CONTENT_PARENTS.contains(&p))
            {
                continue;
            }
            let text = collapse_ws(self.doc.text_value(t).unwrap_or(""));
            if text.is_empty() || word_count(&text) >= max_words {
                continue;
            }
            let sole_content = parent != self.doc.root()
                && self.doc.is_element(parent)
                && collapse_ws(&self.doc.text(parent)) == text;
            let anchor = if sole_content { parent } else { t };
            let Some(next) = self.next_meaningful_sibling(anchor) else {
                continue;
            };
            let next_text = collapse_ws(&self.doc.text(next));
            let looks_like_header = next_text.starts_with('(')
                || next_text.starts_with('[')
                || char_len(&next_text) > long_sibling;
            if !looks_like_header {
                continue;
            }
            // A label cell fills the cell beside it, never the row itself.
            let content_anchor = if matches!(self.doc.tag(anchor), Some("td" | "th")) {
                Some(next).filter(|c| matches!(self.doc.tag(*c), Some("td" | "th")))
            } else {
                None
            };
            self.propose(Proposal {
                node: anchor,
                kind: SectionKind::TextPattern,
                confidence: Confidence::Low,
                len_bounds: bounds,
                content_anchor,
            });
        }
    }
}

/// `key: value` pairs of an inline style, lower-cased and trimmed.
fn css_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            Some((k.trim().to_lowercase(), v.trim().to_lowercase()))
        })
        .collect()
}

/// Splits a CSS value on top-level whitespace; whitespace inside parentheses is dropped so
/// `rgb(204, 204, 204)` becomes one token.
fn css_value_tokens(value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut depth = 0usize;
    for ch in value.trim_end_matches("!important").chars() {
        match ch {
            '(' => {
                depth += 1;
                cur.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                cur.push(ch);
            }
            c if c.is_whitespace() => {
                if depth == 0 && !cur.is_empty() {
                    out.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(html: &str) -> Analysis {
        analyze(html, &MapperConfig::default())
    }

    #[test]
    fn gray_cells_become_table_headers() {
        let a = run(concat!(
            "<table><tr>",
            "<td style=\"background-color: rgb(204, 204, 204)\">Hälsa</td>",
            "<td>(Beskriv hälsa)</td>",
            "</tr><tr>",
            "<td bgcolor=\"#CCCCCC\">Skola</td><td>[text]</td>",
            "</tr></table>"
        ));
        assert_eq!(a.template_type, TemplateType::Table);
        assert_eq!(a.section_names(), vec!["Hälsa", "Skola"]);
        assert!(a.sections.iter().all(|s| s.kind == SectionKind::TableHeader));
        assert!(a.sections.iter().all(|s| s.content_anchor.is_some()));
    }

    #[test]
    fn bold_inside_header_cell_is_not_counted_twice() {
        let a = run(
            "<table><tr><td style=\"background-color:#cccccc\"><strong>Hälsa</strong></td><td></td></tr></table>",
        );
        assert_eq!(a.sections.len(), 1);
        assert_eq!(a.sections[0].kind, SectionKind::TableHeader);
    }

    #[test]
    fn bold_in_plain_cell_is_inline_table() {
        let a = run("<table><tr><td><b>Mål</b><br>(Beskriv mål)</td></tr></table>");
        assert_eq!(a.sections[0].kind, SectionKind::InlineTable);
        assert_eq!(a.template_type, TemplateType::Table);
    }

    #[test]
    fn filters_placeholders_metadata_dates_and_duplicates() {
        let a = run(concat!(
            "<p><strong>[Förnamn]</strong></p>",
            "<p><strong>Slutrapport</strong></p>",
            "<p><strong>Datum:</strong> 2024-01-01</p>",
            "<p><strong>2024-05-01</strong></p>",
            "<p><strong>Utbildning</strong></p>",
            "<p><b>Utbildning</b></p>",
            "<p><strong>X</strong></p>",
        ));
        assert_eq!(a.section_names(), vec!["Utbildning"]);
        assert_eq!(a.template_type, TemplateType::Text);
    }

    #[test]
    fn tiers_sort_high_before_medium_in_document_order() {
        let a = run(concat!(
            "<p><span style=\"font-family: 'Times New Roman'\">Fritid och intressen</span></p>",
            "<h2>Bakgrund</h2>",
            "<p><strong>Hälsa</strong></p>",
        ));
        assert_eq!(
            a.section_names(),
            vec!["Bakgrund", "Hälsa", "Fritid och intressen"]
        );
        assert_eq!(a.sections[2].confidence, Confidence::Medium);
        assert_eq!(a.sections[2].kind, SectionKind::StyledText);
    }

    #[test]
    fn styled_sentences_are_not_headers() {
        let a = run(
            "<p><span style=\"font-family:Times New Roman\">Barnet trivs. Skolan fungerar bra.</span></p>",
        );
        assert!(a.sections.is_empty());
        assert_eq!(a.template_type, TemplateType::Unknown);
    }

    #[test]
    fn falls_back_to_text_patterns() {
        let a = run("<div><p>Familjesituation idag</p><p>(Beskriv familjen)</p></div>");
        assert_eq!(a.section_names(), vec!["Familjesituation idag"]);
        assert_eq!(a.sections[0].kind, SectionKind::TextPattern);
        assert_eq!(a.sections[0].confidence, Confidence::Low);
    }

    #[test]
    fn text_pattern_label_cell_points_at_its_neighbour() {
        let html = "<table><tbody><tr><td>Familjesituation</td><td>(Beskriv familjen)</td></tr></tbody></table>";
        let doc = TemplateDocument::parse(html);
        let a = analyze_document(&doc, &MapperConfig::default());
        assert_eq!(a.section_names(), vec!["Familjesituation"]);
        let s = &a.sections[0];
        assert_eq!(s.kind, SectionKind::TextPattern);
        assert_eq!(doc.tag(s.header_anchor), Some("td"));
        let cell = s.content_anchor.expect("content cell");
        assert_eq!(doc.text(cell), "(Beskriv familjen)");
    }

    #[test]
    fn malformed_markup_still_analyzes() {
        let a = run("<p><strong>Hälsa</p><td style=\"background:#ccc\">x");
        assert_eq!(a.section_names(), vec!["Hälsa"]);
        assert!(run("").sections.is_empty());
    }

    #[test]
    fn css_tokens_keep_function_arguments_together() {
        assert_eq!(
            css_value_tokens("rgb(204, 204, 204) url(a.png) no-repeat"),
            vec!["rgb(204,204,204)", "url(a.png)", "no-repeat"]
        );
    }
}
