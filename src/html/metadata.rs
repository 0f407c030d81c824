use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::html::dom::TemplateDocument;
use crate::sentinels::{metadata_field_for_label, MetadataField, METADATA_TOKEN_RE};

/// Caller-supplied values for the `[Label]` header fields of a template.
/// Unset fields substitute to an empty string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataValues {
    pub today: String,
    pub first_name: String,
    pub last_name: String,
    pub personal_id: String,
    pub document_name: String,
}

impl MetadataValues {
    pub fn with_today(today: impl Into<String>) -> Self {
        Self {
            today: today.into(),
            ..Self::default()
        }
    }

    pub fn value_for(&self, field: MetadataField) -> String {
        match field {
            MetadataField::Today => self.today.clone(),
            MetadataField::FirstName => self.first_name.clone(),
            MetadataField::LastName => self.last_name.clone(),
            MetadataField::PersonalId => self.personal_id.clone(),
            MetadataField::DocumentName => self.document_name.clone(),
            MetadataField::FullName => [self.first_name.trim(), self.last_name.trim()]
                .iter()
                .filter(|s| !s.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Replaces every metadata token in `text`.
    pub fn substitute(&self, text: &str) -> String {
        METADATA_TOKEN_RE
            .replace_all(text, |caps: &regex::Captures<'_>| {
                metadata_field_for_label(&caps[1])
                    .map(|f| self.value_for(f))
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

/// Substitutes metadata tokens in every text node of `doc`; returns the number of nodes changed.
pub fn substitute_metadata(doc: &mut TemplateDocument, values: &MetadataValues) -> usize {
    let mut changed = 0usize;
    for t in doc.text_nodes() {
        let Some(original) = doc.text_value(t) else {
            continue;
        };
        if !METADATA_TOKEN_RE.is_match(original) {
            continue;
        }
        let replaced = values.substitute(original);
        if doc.set_text(t, &replaced).is_ok() {
            changed += 1;
        }
    }
    debug!("metadata substituted in {changed} text nodes");
    changed
}
