use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

/// Optional debug dumps of intermediate stages; a no-op when no directory is configured.
pub struct TraceWriter {
    dir: Option<PathBuf>,
}

impl TraceWriter {
    pub fn new(dir: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(dir) = &dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create trace dir: {}", dir.display()))?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn write_named_text(&self, name: &str, text: &str) -> anyhow::Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let path = dir.join(trace_file_name(name));
        std::fs::write(&path, text).with_context(|| format!("write trace: {}", path.display()))?;
        Ok(())
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> anyhow::Result<()> {
        if self.dir.is_none() {
            return Ok(());
        }
        let text = serde_json::to_string_pretty(value).context("serialize trace json")?;
        self.write_named_text(name, &text)
    }
}

/// Portable trace file name: path separators, reserved and control characters become `_`.
fn trace_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_control() || "/\\:*?\"<>|".contains(c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim_end_matches(&['.', ' '][..]);
    if cleaned.is_empty() {
        "trace".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_writer_touches_nothing() {
        let tw = TraceWriter::new(None).expect("writer");
        assert!(tw.dir().is_none());
        tw.write_named_text("a.txt", "x").expect("noop");
    }

    #[test]
    fn names_are_sanitized() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let tw = TraceWriter::new(Some(tmp.path().join("trace"))).expect("writer");
        tw.write_json("report:1.json", &vec![1, 2]).expect("write");
        let text = std::fs::read_to_string(tmp.path().join("trace").join("report_1.json"))
            .expect("read back");
        assert!(text.contains('1'));
    }

    #[test]
    fn file_names_are_portable() {
        assert_eq!(trace_file_name("a/b\\c.json"), "a_b_c.json");
        assert_eq!(trace_file_name("tab\there.html"), "tab_here.html");
        assert_eq!(trace_file_name("report. "), "report");
        assert_eq!(trace_file_name(".."), "trace");
    }
}
