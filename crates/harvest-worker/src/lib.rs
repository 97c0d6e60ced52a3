//! Resumable media harvesting worker.
//!
//! This crate provides:
//! - The resumption ledger (append-only completed / failed / upload-failed logs)
//! - The shared cookie credential pool with failure-driven eviction
//! - Catalog strategies turning catalog files into work items
//! - The per-item harvest pipeline and the parallel executor driving it

pub mod catalog;
pub mod config;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod logging;
pub mod pipeline;
pub mod segment_cache;

pub use catalog::{exclude, load_id_list, load_work_items, prepare, ExecutionPlan};
pub use config::HarvestConfig;
pub use credentials::{Credential, CredentialPool};
pub use error::{classify_download_error, FailureClass, WorkerError, WorkerResult};
pub use executor::{HarvestExecutor, RunSummary};
pub use ledger::{Ledger, LedgerSnapshot};
pub use logging::{attach_progress, detach_progress, init_tracing, ItemLogger, LogWriter};
pub use pipeline::{Harvester, ItemOutcome, ItemState, RetrySummary};
pub use segment_cache::{SegmentCache, SegmentLookup, SegmentRecord};
