pub mod matching;
pub mod reconcile;

pub use matching::{has_real_content, match_sections, valid_bullets};
pub use reconcile::{reconcile, reconcile_with_report};
