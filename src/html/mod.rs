pub mod analyze;
pub mod cleanup;
pub mod dom;
pub mod metadata;
pub mod render;
pub mod sweep;

pub use analyze::{analyze, analyze_document};
pub use dom::{NodeRef, TemplateDocument};
pub use metadata::MetadataValues;
