use std::path::{Path, PathBuf};

use crate::config::{resolve_config, MapperConfig};

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub workdir: PathBuf,
    pub config_path: Option<PathBuf>,
    pub mapper: MapperConfig,
    /// `output.trace_dir`, resolved against the config file's directory.
    pub trace_dir: Option<PathBuf>,
}

impl PipelineConfig {
    /// Resolves the config for one template: explicit path, env var, then an upward search from
    /// the working directory and the template's directory.
    pub fn from_paths(config: Option<&Path>, template: &Path) -> anyhow::Result<Self> {
        let workdir = template
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let (mapper, config_path) = resolve_config(config, &workdir)?;
        let base = config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let trace_dir = mapper.output.trace_dir.as_ref().map(|d| {
            if d.is_absolute() {
                d.clone()
            } else {
                base.join(d)
            }
        });
        Ok(Self {
            workdir,
            config_path,
            mapper,
            trace_dir,
        })
    }
}
