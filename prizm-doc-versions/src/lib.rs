pub mod diff;
pub mod store;
pub mod types;

pub use diff::{
    DEFAULT_SECTION_LIMIT, NO_SIGNIFICANT_CHANGE, compute_diff, compute_diff_with_limit,
};
pub use store::{DocumentVersionStore, content_hash};
pub use types::{DocumentVersion, DocumentVersionHistory, VersionProvenance, VersionSource};
