use serde::{Deserialize, Serialize};

use crate::html::dom::NodeRef;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    TableHeader,
    Bold,
    Heading,
    StyledText,
    InlineTable,
    TextPattern,
}

impl SectionKind {
    /// Table-shaped sections live inside a `td`/`th` and are filled in place.
    pub fn is_table_shaped(self) -> bool {
        matches!(self, Self::TableHeader | Self::InlineTable)
    }
}

/// Ordered High < Medium < Low so a plain sort puts the strongest tier first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    Table,
    Text,
    Mixed,
    Unknown,
}

#[derive(Clone, Debug, Serialize)]
pub struct SectionCandidate {
    pub name: String,
    pub kind: SectionKind,
    pub confidence: Confidence,
    #[serde(skip)]
    pub header_anchor: NodeRef,
    #[serde(skip)]
    pub content_anchor: Option<NodeRef>,
    /// Pre-order position of the header in the tree it was detected in.
    pub doc_order: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct Analysis {
    pub sections: Vec<SectionCandidate>,
    pub template_type: TemplateType,
}

impl Analysis {
    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub name: String,
    pub bullets: Vec<String>,
}

impl ContentBlock {
    pub fn new(name: impl Into<String>, bullets: Vec<String>) -> Self {
        Self {
            name: name.into(),
            bullets,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    DirectKey,
    Substring,
    TokenOverlap,
    None,
}

#[derive(Clone, Debug)]
pub struct MatchResult<'a> {
    pub section: &'a SectionCandidate,
    pub block: Option<&'a ContentBlock>,
    pub score: u8,
    pub strategy: MatchStrategy,
}

impl<'a> MatchResult<'a> {
    pub fn unmatched(section: &'a SectionCandidate) -> Self {
        Self {
            section,
            block: None,
            score: 0,
            strategy: MatchStrategy::None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SectionOutcome {
    Filled {
        block: String,
        strategy: MatchStrategy,
        score: u8,
        items: usize,
    },
    Removed {
        reason: RemovalReason,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    Unmatched,
    NoRealContent,
    InsertFailed,
}

#[derive(Clone, Debug, Serialize)]
pub struct SectionReport {
    pub name: String,
    pub kind: SectionKind,
    pub confidence: Confidence,
    #[serde(flatten)]
    pub outcome: SectionOutcome,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReconcileReport {
    pub template_type: TemplateType,
    pub sections: Vec<SectionReport>,
    pub appended: Vec<String>,
    pub list_items: usize,
    pub landmarks_intact: bool,
}

impl ReconcileReport {
    pub fn filled(&self) -> impl Iterator<Item = &SectionReport> {
        self.sections
            .iter()
            .filter(|s| matches!(s.outcome, SectionOutcome::Filled { .. }))
    }

    pub fn removed(&self) -> impl Iterator<Item = &SectionReport> {
        self.sections
            .iter()
            .filter(|s| matches!(s.outcome, SectionOutcome::Removed { .. }))
    }

    pub fn outcome_of(&self, name: &str) -> Option<&SectionOutcome> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.outcome)
    }
}
