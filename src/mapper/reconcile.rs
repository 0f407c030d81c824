use anyhow::{anyhow, Context};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::MapperConfig;
use crate::html::analyze::analyze_document;
use crate::html::cleanup::tidy_html;
use crate::html::dom::{NodeRef, TemplateDocument};
use crate::html::metadata::{substitute_metadata, MetadataValues};
use crate::html::render::{render_appended_section, render_block, render_list};
use crate::html::sweep::{is_instruction_text, strip_stray_placeholders, sweep_after, SweepRules};
use crate::ir::{
    ContentBlock, ReconcileReport, RemovalReason, SectionCandidate, SectionKind,
    SectionOutcome, SectionReport,
};
use crate::mapper::matching::{match_sections, valid_bullets};
use crate::sentinels::MAPPED_CLASS;
use crate::textutil::collapse_ws;

/// Containers the header walk never climbs past.
const BOUNDARY_TAGS: [&str; 10] = [
    "td", "th", "tr", "li", "ul", "ol", "table", "body", "html", "form",
];
const KEEP_TAGS: [&str; 8] = ["img", "table", "ul", "ol", "iframe", "hr", "svg", "input"];

/// Fills `html` with `blocks` and returns the finished document.
pub fn reconcile(
    html: &str,
    blocks: &[ContentBlock],
    metadata: &MetadataValues,
    cfg: &MapperConfig,
) -> String {
    reconcile_with_report(html, blocks, metadata, cfg).0
}

/// Like [`reconcile`], plus a per-section account of what happened.
pub fn reconcile_with_report(
    html: &str,
    blocks: &[ContentBlock],
    metadata: &MetadataValues,
    cfg: &MapperConfig,
) -> (String, ReconcileReport) {
    let mut doc = TemplateDocument::parse(html);
    substitute_metadata(&mut doc, metadata);

    // Anchors from any earlier analysis are stale once substitution has touched the tree.
    let analysis = analyze_document(&doc, cfg);
    let baseline = doc.landmark_hash();
    let matches = match_sections(&analysis.sections, blocks, cfg);

    let mut rec = Reconciler {
        headers: analysis.sections.iter().map(|s| s.header_anchor).collect(),
        instructions: cfg.instruction_regexes(),
        doc: &mut doc,
        cfg,
    };

    let mut sections = Vec::with_capacity(matches.len());
    let mut list_items = 0usize;
    for m in &matches {
        let section = m.section;
        let outcome = match m.block {
            Some(block) => {
                let bullets = valid_bullets(block, &cfg.vocabulary);
                if bullets.is_empty() {
                    debug!("'{}': block '{}' has no real content", section.name, block.name);
                    rec.remove_or_warn(section, RemovalReason::NoRealContent)
                } else {
                    match rec.fill(section, &bullets) {
                        Ok(()) => {
                            list_items += bullets.len();
                            info!(
                                "filled '{}' from '{}' ({:?}, {}), {} items",
                                section.name,
                                block.name,
                                m.strategy,
                                m.score,
                                bullets.len()
                            );
                            SectionOutcome::Filled {
                                block: block.name.clone(),
                                strategy: m.strategy,
                                score: m.score,
                                items: bullets.len(),
                            }
                        }
                        Err(err) => {
                            warn!("fill '{}' failed, removing instead: {err:#}", section.name);
                            rec.remove_or_warn(section, RemovalReason::InsertFailed)
                        }
                    }
                }
            }
            None => rec.remove_or_warn(section, RemovalReason::Unmatched),
        };
        sections.push(SectionReport {
            name: section.name.clone(),
            kind: section.kind,
            confidence: section.confidence,
            outcome,
        });
    }

    let mut appended = Vec::new();
    if cfg.output.append_unmatched && analysis.sections.len() < cfg.output.append_min_sections {
        for block in blocks {
            let used = matches
                .iter()
                .any(|m| m.block.is_some_and(|b| std::ptr::eq(b, block)));
            if used {
                continue;
            }
            let bullets = valid_bullets(block, &cfg.vocabulary);
            if bullets.is_empty() {
                continue;
            }
            match rec.append_section(&block.name, &bullets) {
                Ok(()) => {
                    list_items += bullets.len();
                    appended.push(block.name.clone());
                }
                Err(err) => warn!("append '{}' failed: {err:#}", block.name),
            }
        }
    }

    let stray = strip_stray_placeholders(&mut doc);
    let landmarks_intact = doc.landmark_hash() == baseline;
    if !landmarks_intact {
        warn!("landmark elements changed during reconciliation");
    }

    let (out, stats) = tidy_html(&doc.serialize());
    let report = ReconcileReport {
        template_type: analysis.template_type,
        sections,
        appended,
        list_items,
        landmarks_intact,
    };
    info!(
        "reconciled: {} filled, {} removed, {} appended, {} list items",
        report.filled().count(),
        report.removed().count(),
        report.appended.len(),
        report.list_items
    );
    debug!(
        "cleanup: {} stray placeholders, {} br runs, {} empty wrappers, {} leftover tokens",
        stray, stats.br_runs, stats.empty_wrappers, stats.leftover_tokens
    );
    (out, report)
}

struct Reconciler<'d> {
    doc: &'d mut TemplateDocument,
    cfg: &'d MapperConfig,
    headers: Vec<NodeRef>,
    instructions: Vec<Regex>,
}

impl Reconciler<'_> {
    fn sweep(&mut self, start: NodeRef) -> usize {
        let rules = SweepRules {
            instructions: &self.instructions,
            headers: &self.headers,
            limit: self.cfg.render.sweep_limit,
        };
        sweep_after(self.doc, start, &rules)
    }

    fn fill(&mut self, section: &SectionCandidate, bullets: &[&str]) -> anyhow::Result<()> {
        let header = section.header_anchor;
        if !self.doc.is_attached(header) {
            return Err(anyhow!("header no longer in the document"));
        }
        if self.is_cell_header(section) {
            self.fill_cell(section, bullets)
        } else {
            self.fill_after(header, bullets)
        }
    }

    /// Gray header cells and plain label cells both pair with the cell beside them.
    fn is_cell_header(&self, section: &SectionCandidate) -> bool {
        section.kind == SectionKind::TableHeader
            || matches!(self.doc.tag(section.header_anchor), Some("td" | "th"))
    }

    /// Replaces the paired content cell's children with the list.
    fn fill_cell(&mut self, section: &SectionCandidate, bullets: &[&str]) -> anyhow::Result<()> {
        let cell = section
            .content_anchor
            .context("header cell has no content cell")?;
        if !self.doc.is_attached(cell) {
            return Err(anyhow!("content cell no longer in the document"));
        }
        self.doc.clear_children(cell);
        self.doc
            .append_fragment(cell, &render_list(bullets, &self.cfg.render))
            .context("append list to content cell")?;
        Ok(())
    }

    /// Inserts the list as a block right after the header (or its inline-only container), then
    /// sweeps the placeholders that followed it.
    fn fill_after(&mut self, header: NodeRef, bullets: &[&str]) -> anyhow::Result<()> {
        let anchor = self.block_anchor(header);
        if anchor != header {
            self.sweep(header);
        }
        let inserted = self
            .doc
            .insert_fragment_after(anchor, &render_block(bullets, &self.cfg.render))
            .context("insert list after header")?;
        let swept = self.sweep(inserted);
        debug!("swept {swept} placeholder nodes after inserted list");
        Ok(())
    }

    /// Climbs from an inline header to the nearest non-inline container.
    fn block_anchor(&self, header: NodeRef) -> NodeRef {
        let mut cur = header;
        while self.doc.is_inline(cur) {
            let Some(parent) = self.doc.parent(cur) else {
                break;
            };
            if parent == self.doc.root() || self.is_boundary(parent) {
                break;
            }
            cur = parent;
        }
        cur
    }

    fn is_boundary(&self, n: NodeRef) -> bool {
        match self.doc.tag(n) {
            Some(tag) => BOUNDARY_TAGS.contains(&tag) || self.doc.has_class(n, MAPPED_CLASS),
            None => true,
        }
    }

    fn remove_or_warn(&mut self, section: &SectionCandidate, reason: RemovalReason) -> SectionOutcome {
        match self.remove(section) {
            Ok(()) => info!("removed '{}' ({:?})", section.name, reason),
            Err(err) => warn!("remove '{}': {err:#}", section.name),
        }
        SectionOutcome::Removed { reason }
    }

    fn remove(&mut self, section: &SectionCandidate) -> anyhow::Result<()> {
        let header = section.header_anchor;
        if !self.doc.is_attached(header) {
            debug!("'{}' already gone", section.name);
            return Ok(());
        }
        if self.is_cell_header(section) {
            self.remove_cells(section);
            return Ok(());
        }
        self.sweep(header);
        let target = self.removal_target(header);
        if target != header {
            self.sweep(target);
        }
        if target == self.doc.root() {
            return Err(anyhow!("header has no removable container"));
        }
        self.doc.detach(target);
        Ok(())
    }

    /// Drops the header's row, or only its header and content cells when another section
    /// still lives in the same row.
    fn remove_cells(&mut self, section: &SectionCandidate) {
        let header = section.header_anchor;
        let row = self.doc.closest(header, &["tr"]);
        if let Some(row) = row.filter(|r| !self.row_has_other_section(*r, header)) {
            self.doc.detach(row);
            return;
        }
        if let Some(cell) = section
            .content_anchor
            .filter(|c| *c != header && self.doc.is_attached(*c))
        {
            self.doc.detach(cell);
        }
        self.doc.detach(header);
    }

    fn row_has_other_section(&self, row: NodeRef, header: NodeRef) -> bool {
        self.headers.iter().any(|h| {
            *h != header && self.doc.is_attached(*h) && self.doc.is_ancestor_or_self(row, *h)
        })
    }

    /// The header, or the outermost container around it that holds nothing else of value.
    fn removal_target(&self, header: NodeRef) -> NodeRef {
        let mut cur = header;
        while let Some(parent) = self.doc.parent(cur) {
            if parent == self.doc.root() || self.is_boundary(parent) {
                break;
            }
            let only_header = self
                .doc
                .children(parent)
                .into_iter()
                .all(|c| c == cur || self.is_filler(c));
            if !only_header {
                break;
            }
            cur = parent;
        }
        cur
    }

    /// Whitespace, line breaks, comments, placeholders and empty wrappers.
    fn is_filler(&self, n: NodeRef) -> bool {
        if self.doc.is_comment(n) {
            return true;
        }
        if let Some(text) = self.doc.text_value(n) {
            return text.trim().is_empty() || is_instruction_text(text, &self.instructions);
        }
        let Some(tag) = self.doc.tag(n) else {
            return true;
        };
        if tag == "br" {
            return true;
        }
        if KEEP_TAGS.contains(&tag)
            || self.doc.has_descendant_tag(n, &KEEP_TAGS)
            || self.doc.has_class(n, MAPPED_CLASS)
            || self.headers.iter().any(|h| self.doc.is_ancestor_or_self(n, *h))
        {
            return false;
        }
        let text = self.doc.text(n);
        collapse_ws(&text).is_empty() || is_instruction_text(&text, &self.instructions)
    }

    fn append_section(&mut self, name: &str, bullets: &[&str]) -> anyhow::Result<()> {
        let target = self.main_container();
        self.doc
            .append_fragment(target, &render_appended_section(name, bullets, &self.cfg.render))
            .with_context(|| format!("append unmatched block '{name}'"))?;
        info!("appended unmatched block '{name}' ({} items)", bullets.len());
        Ok(())
    }

    /// First top-level `div` of the body, else the body itself.
    fn main_container(&self) -> NodeRef {
        let body = self
            .doc
            .elements_named(&["body"])
            .into_iter()
            .next()
            .unwrap_or_else(|| self.doc.root());
        self.doc
            .children(body)
            .into_iter()
            .find(|c| self.doc.tag(*c) == Some("div") && !self.doc.has_class(*c, MAPPED_CLASS))
            .unwrap_or(body)
    }
}
