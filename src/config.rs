use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use regex::Regex;
use serde::Deserialize;

pub const CONFIG_FILENAME: &str = "template-mapper.toml";
pub const CONFIG_ENV: &str = "TEMPLATE_MAPPER_CONFIG";

#[derive(Clone, Debug, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct MapperConfig {
    pub matching: MatchingSection,
    pub vocabulary: VocabularySection,
    pub detection: DetectionSection,
    pub render: RenderSection,
    pub output: OutputSection,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchingSection {
    /// Minimum score (0..=100) a fuzzy match needs to be accepted.
    pub threshold: u8,
    /// Dropped before token overlap is computed.
    pub stopwords: Vec<String>,
}

impl Default for MatchingSection {
    fn default() -> Self {
        Self {
            threshold: 50,
            stopwords: to_strings(&[
                "och", "eller", "i", "på", "för", "till", "av", "med", "om", "från", "den",
                "det", "en", "ett", "and", "or", "of", "in", "on", "for", "to", "with", "the",
            ]),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct VocabularySection {
    /// Bullets that carry no information once trimmed and lower-cased.
    pub empty_bullets: Vec<String>,
    /// Caller-filled header fields and report titles; never content sections.
    pub metadata_keywords: Vec<String>,
    /// Regexes (case-insensitive) recognising authoring instructions left in templates.
    pub instruction_patterns: Vec<String>,
}

impl Default for VocabularySection {
    fn default() -> Self {
        Self {
            empty_bullets: to_strings(&[
                "information missing",
                "information saknas",
                "information saknas i dokumenten",
                "ingen information",
                "saknas",
                "n/a",
                "none",
                "nej",
                "no",
            ]),
            metadata_keywords: to_strings(&[
                "slutrapport",
                "månadsrapport",
                "rapport",
                "vårdplan",
                "genomförandeplan",
                "document",
                "report",
                "dagens datum",
                "today's date",
                "datum",
                "date",
                "förnamn",
                "efternamn",
                "first name",
                "last name",
                "personnummer",
                "personal id",
                "namn",
                "name",
                "socialsekreterare",
                "konsulent",
                "närvarande",
                "handläggare",
                "medhandläggare",
                "ansvarig handläggare",
                "handling upprättad",
                "barnet",
                "vårdnadshavare",
                "telefon",
                "mobil",
                "e-post",
                "folkbokföringsadress",
                "fullständig adress",
                "underskrift",
                "namnförtydligande",
            ]),
            instruction_patterns: to_strings(&[
                r"^beskriv",
                r"^kan även",
                r"^hur har det",
                r"^planering",
                r"^uppp?följning kommer",
                r"\(var,?\s*när\)",
                r"^\.{6}",
                r"^-\s*att x\s",
            ]),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionSection {
    /// Background colours (lower-case, spaces removed) that mark a table header cell.
    pub header_backgrounds: Vec<String>,
    pub serif_faces: Vec<String>,
    /// CSS `font-size` values accepted for styled headers.
    pub point_sizes: Vec<String>,
    /// Legacy `<font size="...">` values accepted for styled headers.
    pub font_sizes: Vec<String>,
    pub bold_len: (usize, usize),
    pub heading_len: (usize, usize),
    pub table_len: (usize, usize),
    pub styled_len: (usize, usize),
    pub styled_max_words: usize,
    pub pattern_len: (usize, usize),
    pub pattern_max_words: usize,
    /// A following sibling at least this long marks the text before it as a header.
    pub pattern_long_sibling: usize,
}

impl Default for DetectionSection {
    fn default() -> Self {
        Self {
            header_backgrounds: to_strings(&[
                "#cccccc",
                "#ccc",
                "rgb(204,204,204)",
                "#d9d9d9",
                "#bfbfbf",
                "#c0c0c0",
                "gray",
                "grey",
                "lightgray",
                "lightgrey",
                "silver",
            ]),
            serif_faces: to_strings(&["times new roman"]),
            point_sizes: to_strings(&["12pt", "13pt", "14pt"]),
            font_sizes: to_strings(&["2", "3", "4"]),
            bold_len: (2, 200),
            heading_len: (2, 200),
            table_len: (2, 150),
            styled_len: (5, 200),
            styled_max_words: 20,
            pattern_len: (10, 150),
            pattern_max_words: 15,
            pattern_long_sibling: 100,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderSection {
    pub wrapper_style: String,
    pub list_style: String,
    pub item_style: String,
    pub highlight_style: String,
    pub appended_heading_style: String,
    /// Maximum siblings one placeholder sweep may inspect.
    pub sweep_limit: usize,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            wrapper_style: "margin:10px 0 20px 0;".to_string(),
            list_style: "list-style:disc;padding-left:25px;line-height:1.8;margin:10px 0;"
                .to_string(),
            item_style: "margin-bottom:8px;".to_string(),
            highlight_style: "background:#fbbf24;padding:2px 6px;border-radius:3px;".to_string(),
            appended_heading_style: "font-family: Times New Roman; margin-top: 20px;".to_string(),
            sweep_limit: 30,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSection {
    /// Append blocks that matched no section when the template is nearly empty.
    pub append_unmatched: bool,
    pub append_min_sections: usize,
    pub trace_dir: Option<PathBuf>,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            append_unmatched: false,
            append_min_sections: 3,
            trace_dir: None,
        }
    }
}

impl MapperConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let cfg: MapperConfig = toml::from_str(text).context("parse config toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.matching.threshold > 100 {
            return Err(anyhow!(
                "matching.threshold must be within 0..=100 (got {})",
                self.matching.threshold
            ));
        }
        for pat in &self.vocabulary.instruction_patterns {
            Regex::new(pat).with_context(|| format!("invalid instruction pattern: {pat}"))?;
        }
        let d = &self.detection;
        for (label, (lo, hi)) in [
            ("bold_len", d.bold_len),
            ("heading_len", d.heading_len),
            ("table_len", d.table_len),
            ("styled_len", d.styled_len),
            ("pattern_len", d.pattern_len),
        ] {
            if lo > hi {
                return Err(anyhow!("detection.{label}: lower bound {lo} exceeds upper bound {hi}"));
            }
        }
        Ok(())
    }

    /// Compiles the instruction patterns, skipping any that fail to compile.
    pub fn instruction_regexes(&self) -> Vec<Regex> {
        self.vocabulary
            .instruction_patterns
            .iter()
            .filter_map(|p| match Regex::new(&format!("(?i){p}")) {
                Ok(re) => Some(re),
                Err(err) => {
                    tracing::warn!("ignoring instruction pattern {p:?}: {err}");
                    None
                }
            })
            .collect()
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<MapperConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    MapperConfig::from_toml_str(&text).with_context(|| format!("config: {}", path.display()))
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, CONFIG_FILENAME, 8) {
            return Some(p);
        }
    }
    find_file_upwards(workdir, CONFIG_FILENAME, 8)
}

/// Explicit path, then `TEMPLATE_MAPPER_CONFIG`, then an upward search. Defaults when none exists.
pub fn resolve_config(
    explicit: Option<&Path>,
    workdir: &Path,
) -> anyhow::Result<(MapperConfig, Option<PathBuf>)> {
    if let Some(p) = explicit {
        return Ok((load_config(p)?, Some(p.to_path_buf())));
    }
    let found = std::env::var(CONFIG_ENV)
        .ok()
        .map(PathBuf::from)
        .filter(|p| p.exists())
        .or_else(|| find_default_config(workdir));
    match found {
        Some(p) => Ok((load_config(&p)?, Some(p))),
        None => Ok((MapperConfig::default(), None)),
    }
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        return Err(anyhow!(
            "config already exists: {} (use --force to overwrite)",
            cfg_path.display()
        ));
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub const DEFAULT_CONFIG_TOML: &str = r##"# template-mapper configuration.
# Every key is optional; omitted keys fall back to the built-in defaults shown here.

[matching]
# Fuzzy matches scoring below this are treated as unmatched (0..=100).
threshold = 50
stopwords = ["och", "eller", "i", "på", "för", "till", "av", "med", "om", "från", "den",
             "det", "en", "ett", "and", "or", "of", "in", "on", "for", "to", "with", "the"]

[vocabulary]
empty_bullets = ["information missing", "information saknas", "information saknas i dokumenten",
                 "ingen information", "saknas", "n/a", "none", "nej", "no"]
metadata_keywords = ["slutrapport", "månadsrapport", "rapport", "vårdplan", "genomförandeplan",
                     "document", "report", "dagens datum", "today's date", "datum", "date",
                     "förnamn", "efternamn", "first name", "last name", "personnummer",
                     "personal id", "namn", "name", "socialsekreterare", "konsulent",
                     "närvarande", "handläggare", "medhandläggare", "ansvarig handläggare",
                     "handling upprättad", "barnet", "vårdnadshavare", "telefon", "mobil",
                     "e-post", "folkbokföringsadress", "fullständig adress", "underskrift",
                     "namnförtydligande"]
# Case-insensitive regexes for authoring instructions left in templates.
instruction_patterns = ['^beskriv', '^kan även', '^hur har det', '^planering',
                        '^uppp?följning kommer', '\(var,?\s*när\)', '^\.{6}', '^-\s*att x\s']

[detection]
header_backgrounds = ["#cccccc", "#ccc", "rgb(204,204,204)", "#d9d9d9", "#bfbfbf", "#c0c0c0",
                      "gray", "grey", "lightgray", "lightgrey", "silver"]
serif_faces = ["times new roman"]
point_sizes = ["12pt", "13pt", "14pt"]
font_sizes = ["2", "3", "4"]
bold_len = [2, 200]
heading_len = [2, 200]
table_len = [2, 150]
styled_len = [5, 200]
styled_max_words = 20
pattern_len = [10, 150]
pattern_max_words = 15
pattern_long_sibling = 100

[render]
wrapper_style = "margin:10px 0 20px 0;"
list_style = "list-style:disc;padding-left:25px;line-height:1.8;margin:10px 0;"
item_style = "margin-bottom:8px;"
highlight_style = "background:#fbbf24;padding:2px 6px;border-radius:3px;"
appended_heading_style = "font-family: Times New Roman; margin-top: 20px;"
sweep_limit = 30

[output]
append_unmatched = false
append_min_sections = 3
# trace_dir = "trace"
"##;
