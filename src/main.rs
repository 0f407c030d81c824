use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use template_mapper::html::MetadataValues;
use template_mapper::pipeline::{
    default_output_for, init_default_config, MapperPipeline, PipelineConfig,
};

#[derive(Parser, Debug)]
#[command(name = "template-mapper")]
#[command(about = "Fill HTML report templates with generated section content", long_about = None)]
struct Args {
    /// Write a default template-mapper.toml, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file to (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Template HTML
    #[arg(value_name = "TEMPLATE")]
    template: Option<PathBuf>,

    /// Generated content JSON: {"sections": {name: [bullets]}, "usage": {...}} or a bare map
    #[arg(long, value_name = "JSON")]
    content: Option<PathBuf>,

    /// Only detect sections and write them as JSON (no content needed)
    #[arg(long, value_name = "JSON")]
    analyze_json: Option<PathBuf>,

    /// Output HTML (default: <template_stem>_filled.html)
    #[arg(short, long, value_name = "HTML")]
    output: Option<PathBuf>,

    /// Value for [Dagens datum] (default: today, YYYY-MM-DD)
    #[arg(long)]
    date: Option<String>,

    #[arg(long)]
    first_name: Option<String>,

    #[arg(long)]
    last_name: Option<String>,

    #[arg(long)]
    personal_id: Option<String>,

    #[arg(long)]
    document_name: Option<String>,

    /// Config file path (default: $TEMPLATE_MAPPER_CONFIG, then template-mapper.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("template_mapper=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging();

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let template = match args.template {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  template-mapper <template.html> --content <content.json>\n  template-mapper <template.html> --analyze-json <sections.json>\n"
            );
            return Ok(());
        }
    };

    let cfg = PipelineConfig::from_paths(args.config.as_deref(), &template)?;
    if let Some(p) = &cfg.config_path {
        tracing::info!("config: {}", p.display());
    }
    let pipeline = MapperPipeline::new(cfg)?;

    if let Some(out_json) = &args.analyze_json {
        pipeline.analyze_file(&template, out_json)?;
        return Ok(());
    }

    let content = args
        .content
        .clone()
        .context("missing --content (or use --analyze-json)")?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_for(&template));
    let metadata = MetadataValues {
        today: args
            .date
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string()),
        first_name: args.first_name.clone().unwrap_or_default(),
        last_name: args.last_name.clone().unwrap_or_default(),
        personal_id: args.personal_id.clone().unwrap_or_default(),
        document_name: args.document_name.clone().unwrap_or_default(),
    };

    let report = pipeline.run(&template, &content, &metadata, &output)?;
    eprintln!(
        "{} -> {} ({} filled, {} removed)",
        template.display(),
        output.display(),
        report.filled().count(),
        report.removed().count()
    );
    Ok(())
}
