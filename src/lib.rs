pub mod config;
pub mod html;
pub mod ir;
pub mod mapper;
pub mod pipeline;
pub mod sentinels;
pub mod textutil;

pub use config::MapperConfig;
pub use html::{analyze, MetadataValues};
pub use ir::{Analysis, ContentBlock, ReconcileReport, SectionCandidate, TemplateType};
pub use mapper::{reconcile, reconcile_with_report};
