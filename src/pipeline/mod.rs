mod config;
mod content;
mod input;
mod trace;

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

use crate::html::analyze::analyze_document;
use crate::html::dom::TemplateDocument;
use crate::html::metadata::{substitute_metadata, MetadataValues};
use crate::ir::{Analysis, ReconcileReport};
use crate::mapper::reconcile_with_report;

pub use crate::config::init_default_config;
pub use config::PipelineConfig;
pub use content::{load_generated_content, parse_generated_content, GeneratedContent};
pub use input::{decode_template, read_template};
pub use trace::TraceWriter;

/// `<stem>_filled.html` next to the template.
pub fn default_output_for(template: &Path) -> PathBuf {
    let stem = template
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("template");
    template.with_file_name(format!("{stem}_filled.html"))
}

/// File-level driver around the analyzer and reconciler.
pub struct MapperPipeline {
    cfg: PipelineConfig,
    trace: TraceWriter,
}

impl MapperPipeline {
    pub fn new(cfg: PipelineConfig) -> anyhow::Result<Self> {
        let trace = TraceWriter::new(cfg.trace_dir.clone())?;
        Ok(Self { cfg, trace })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// Detects the sections of `template` and writes them to `out_json`.
    pub fn analyze_file(&self, template: &Path, out_json: &Path) -> anyhow::Result<Analysis> {
        let html = read_template(template)?;
        let doc = TemplateDocument::parse(&html);
        let analysis = analyze_document(&doc, &self.cfg.mapper);
        let text = serde_json::to_string_pretty(&analysis).context("serialize analysis")?;
        write_output(out_json, &text)?;
        info!(
            "{}: {} sections ({:?}) -> {}",
            template.display(),
            analysis.sections.len(),
            analysis.template_type,
            out_json.display()
        );
        Ok(analysis)
    }

    /// Reconciles `template` with the generated content file and writes the finished HTML.
    pub fn run(
        &self,
        template: &Path,
        content: &Path,
        metadata: &MetadataValues,
        output: &Path,
    ) -> anyhow::Result<ReconcileReport> {
        let html = read_template(template)?;
        let generated = load_generated_content(content)?;
        info!(
            "{}: {} content blocks from {}",
            template.display(),
            generated.blocks.len(),
            content.display()
        );
        self.trace_inputs(&html, metadata)?;

        let (out, report) =
            reconcile_with_report(&html, &generated.blocks, metadata, &self.cfg.mapper);
        write_output(output, &out)?;
        self.trace.write_json("report.json", &report)?;
        info!("wrote {}", output.display());
        Ok(report)
    }

    fn trace_inputs(&self, html: &str, metadata: &MetadataValues) -> anyhow::Result<()> {
        if self.trace.dir().is_none() {
            return Ok(());
        }
        let mut doc = TemplateDocument::parse(html);
        substitute_metadata(&mut doc, metadata);
        let analysis = analyze_document(&doc, &self.cfg.mapper);
        self.trace.write_json("analysis.json", &analysis)?;
        self.trace.write_named_text("substituted.html", &doc.serialize())
    }
}

fn write_output(path: &Path, text: &str) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create output dir: {}", dir.display()))?;
    }
    std::fs::write(path, text).with_context(|| format!("write output: {}", path.display()))
}
