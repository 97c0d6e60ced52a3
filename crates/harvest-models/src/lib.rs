//! Shared data models for the media harvesting pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Work items and their optional time ranges
//! - Clip intervals produced by segmentation
//! - Classifier output records
//! - Staged artifact kinds and ledger kinds
//! - Source identifier parsing

pub mod artifact;
pub mod catalog;
pub mod clip;
pub mod error;
pub mod ledger;
pub mod source;
pub mod work_item;

// Re-export common types
pub use artifact::{ArtifactKind, ArtifactPaths, REQUIRED_EXTENSIONS};
pub use catalog::CatalogKind;
pub use clip::{ClipInterval, MusicFrame};
pub use error::{ModelError, ModelResult};
pub use ledger::LedgerKind;
pub use source::{parse_source_id, watch_url, SourceIdError};
pub use work_item::{derived_clip_id, TimeRange, WorkItem};
