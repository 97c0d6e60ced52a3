//! Ledger kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The append-only logs that make up the resumption ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// Items fully relocated to the object store
    Completed,
    /// Items that reached a terminal failure
    Failed,
    /// Items whose relocation step failed (local data retained)
    UploadFailed,
}

impl LedgerKind {
    /// Default log file name for this kind.
    pub fn file_name(&self) -> &'static str {
        match self {
            LedgerKind::Completed => "complete_clip_ids.txt",
            LedgerKind::Failed => "failed_ids_clip.txt",
            LedgerKind::UploadFailed => "upload_failed_ids.txt",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Completed => "completed",
            LedgerKind::Failed => "failed",
            LedgerKind::UploadFailed => "upload_failed",
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
