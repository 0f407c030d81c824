use once_cell::sync::Lazy;
use regex::Regex;

/// Class stamped on every list wrapper the reconciler inserts.
pub const MAPPED_CLASS: &str = "mapped-bullets";

pub static HIGHLIGHT_PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{HIGHLIGHT\}\}(.*?)\{\{/HIGHLIGHT\}\}").expect("highlight regex"));

pub static STRAY_HIGHLIGHT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{/?HIGHLIGHT\}\}").expect("stray highlight regex"));

/// Whole-string `( ... )` or `[ ... ]`.
pub static WRAPPED_PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*(?:\(.*\)|\[.*\])\s*$").expect("wrapped placeholder regex"));

/// Any bracketed or parenthesized token embedded in running text.
pub static EMBEDDED_PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\[\]\r\n]{1,120}\]|\([^()\r\n]{1,300}\)").expect("embedded placeholder regex"));

/// Square-bracket token inside running text, e.g. `Handläggare: [Handläggare]`.
pub static BRACKET_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\[[^\[\]\r\n]{1,120}\]").expect("bracket token regex"));

pub static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("iso date regex"));

/// Caller-filled header fields that appear as `[Label]` tokens in templates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetadataField {
    Today,
    FirstName,
    LastName,
    PersonalId,
    DocumentName,
    FullName,
}

impl MetadataField {
    pub const ALL: [MetadataField; 6] = [
        Self::Today,
        Self::FirstName,
        Self::LastName,
        Self::PersonalId,
        Self::DocumentName,
        Self::FullName,
    ];

    /// Token labels, matched case-insensitively between square brackets.
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            Self::Today => &["dagens datum", "today's date", "todays date"],
            Self::FirstName => &["förnamn", "first name"],
            Self::LastName => &["efternamn", "last name"],
            Self::PersonalId => &["personnummer", "personal id", "id-nummer"],
            Self::DocumentName => &["dokumentnamn", "document name"],
            Self::FullName => &["namn", "name"],
        }
    }
}

pub static METADATA_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    let labels = MetadataField::ALL
        .iter()
        .flat_map(|f| f.labels().iter())
        .map(|l| regex::escape(l))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\[\s*({labels})\s*\]")).expect("metadata token regex")
});

pub fn metadata_field_for_label(label: &str) -> Option<MetadataField> {
    let label = label.trim().to_lowercase();
    MetadataField::ALL
        .iter()
        .copied()
        .find(|f| f.labels().iter().any(|l| *l == label))
}

pub fn strip_highlight_markers(text: &str) -> String {
    STRAY_HIGHLIGHT_RE.replace_all(text, "").into_owned()
}
