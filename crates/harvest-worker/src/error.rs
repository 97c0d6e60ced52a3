//! Worker error types and the failure taxonomy.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Error signatures that mean the credential was refused by the source.
const AUTHENTICATION_SIGNATURES: &[&str] = &[
    "not a bot",
    "sign in to confirm",
    "rate-limited",
    "rate limit",
    "too many requests",
    "http error 429",
    "http error 403",
    "forbidden",
];

/// Error signatures that mean the item itself cannot be fetched.
const CONTENT_SIGNATURES: &[&str] = &[
    "video unavailable",
    "private video",
    "requested format is not available",
    "no video formats",
    "has been removed",
];

/// Where a failure belongs, which decides what happens next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Bot detection, rate limiting, forbidden: evict the credential.
    Authentication,
    /// Item unavailable or no matching format: permanent for the item.
    Content,
    /// Expected local artifact missing after a nominal success.
    Incomplete,
    /// Per-file remote transfer failure.
    Transfer,
    /// No credential left: fatal for the run.
    Exhausted,
    /// Anything else; item-level failure with no credential action.
    Other,
}

/// Classify download tool error text.
///
/// Matching is on lowercase substrings. Authentication signatures win over
/// content signatures when both appear.
pub fn classify_download_error(text: &str) -> FailureClass {
    let text = text.to_lowercase();

    if AUTHENTICATION_SIGNATURES.iter().any(|sig| text.contains(sig)) {
        return FailureClass::Authentication;
    }
    if CONTENT_SIGNATURES.iter().any(|sig| text.contains(sig)) {
        return FailureClass::Content;
    }
    FailureClass::Other
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("No credentials available")]
    CredentialsExhausted,

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Incomplete artifacts for {clip_id}: missing {missing}")]
    IncompleteArtifacts { clip_id: String, missing: String },

    #[error("Upload failed for {clip_id}: {files}")]
    UploadFailed { clip_id: String, files: String },

    #[error("Segmentation failed: {0}")]
    SegmentationFailed(String),

    #[error("Catalog error: {0}")]
    CatalogError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Model error: {0}")]
    Model(#[from] harvest_models::ModelError),

    #[error("Media error: {0}")]
    Media(#[from] harvest_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] harvest_storage::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn segmentation_failed(msg: impl Into<String>) -> Self {
        Self::SegmentationFailed(msg.into())
    }

    pub fn catalog_error(msg: impl Into<String>) -> Self {
        Self::CatalogError(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Map this error into the failure taxonomy.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            WorkerError::CredentialsExhausted => FailureClass::Exhausted,
            WorkerError::DownloadFailed(msg) => classify_download_error(msg),
            WorkerError::Media(harvest_media::MediaError::DownloadFailed { message }) => {
                classify_download_error(message)
            }
            WorkerError::IncompleteArtifacts { .. } => FailureClass::Incomplete,
            WorkerError::UploadFailed { .. } | WorkerError::Storage(_) => FailureClass::Transfer,
            _ => FailureClass::Other,
        }
    }

    /// True for errors that must stop the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkerError::CredentialsExhausted)
    }
}
