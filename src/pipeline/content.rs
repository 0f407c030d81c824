use std::path::Path;

use anyhow::{anyhow, Context};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::ir::ContentBlock;

/// Output of the content-generation step: named bullet lists plus its usage record.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GeneratedContent {
    pub blocks: Vec<ContentBlock>,
    pub usage: Option<Value>,
}

/// Accepts `{"sections": {...}, "usage": {...}}` or a bare `{name: [bullets]}` map.
/// Key order is kept; a bullet given as a nested list is joined with single spaces.
pub fn parse_generated_content(text: &str) -> anyhow::Result<GeneratedContent> {
    let value: Value = serde_json::from_str(text).context("parse content json")?;
    let Value::Object(mut root) = value else {
        return Err(anyhow!("content json must be an object"));
    };
    let wrapped = matches!(root.get("sections"), Some(Value::Object(_)));
    let (sections, usage) = if wrapped {
        let usage = root.remove("usage");
        match root.remove("sections") {
            Some(Value::Object(sections)) => (sections, usage),
            _ => (Map::new(), usage),
        }
    } else {
        (root, None)
    };
    Ok(GeneratedContent {
        blocks: blocks_from_map(sections),
        usage,
    })
}

pub fn load_generated_content(path: &Path) -> anyhow::Result<GeneratedContent> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read content: {}", path.display()))?;
    parse_generated_content(&text).with_context(|| format!("content: {}", path.display()))
}

fn blocks_from_map(map: Map<String, Value>) -> Vec<ContentBlock> {
    map.into_iter()
        .map(|(name, value)| {
            let bullets = match value {
                Value::Array(items) => items.iter().filter_map(bullet_text).collect(),
                Value::Null => Vec::new(),
                other => bullet_text(&other).into_iter().collect(),
            };
            ContentBlock::new(name, bullets)
        })
        .collect()
}

fn bullet_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(bullet_text).collect();
            Some(parts.join(" "))
        }
        Value::Null => None,
        Value::Object(_) => {
            warn!("ignoring object-valued bullet");
            None
        }
    }
}
