//! Object storage for harvested clips.
//!
//! This crate provides:
//! - The [`ObjectStore`] abstraction (list, upload, download by key)
//! - An S3 implementation built on `aws-sdk-s3`
//! - [`RemoteStore`], the folder-level gateway that treats "one object of
//!   every required extension under `{prefix}/{clip_id}/`" as the completion
//!   predicate and skips transfers for folders that already satisfy it

pub mod client;
pub mod error;
pub mod gateway;
pub mod store;

pub use client::{S3Client, StoreConfig};
pub use error::{StorageError, StorageResult};
pub use gateway::{ArtifactFilter, DownloadSummary, RemoteStore, UploadOutcome};
pub use store::{ObjectInfo, ObjectStore};
