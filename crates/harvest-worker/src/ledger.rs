//! Resumption ledger.
//!
//! Three flat, append-only text files (one clip id per line) record the
//! outcome of every dispatched item. They are the only source of truth for
//! resumption. Each line is written with a single `write` call on a file
//! opened in append mode, so concurrent writers (other tasks or other
//! processes) interleave whole lines and never tear one.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use harvest_models::{LedgerKind, WorkItem};
use tracing::debug;

use crate::error::WorkerResult;

/// Handle to the ledger files under one directory.
#[derive(Debug, Clone)]
pub struct Ledger {
    dir: PathBuf,
}

/// One-time view of the completed and failed ids, taken before dispatch.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub completed: HashSet<String>,
    pub failed: HashSet<String>,
}

impl LedgerSnapshot {
    pub fn is_settled(&self, clip_id: &str) -> bool {
        self.completed.contains(clip_id) || self.failed.contains(clip_id)
    }

    /// `catalog - completed - failed`, keeping catalog order.
    pub fn pending(&self, catalog: &[WorkItem]) -> Vec<WorkItem> {
        catalog
            .iter()
            .filter(|item| !self.is_settled(&item.clip_id))
            .cloned()
            .collect()
    }
}

impl Ledger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: LedgerKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Read every id in one log. A missing file is an empty set.
    pub fn load(&self, kind: LedgerKind) -> WorkerResult<HashSet<String>> {
        let path = self.path(kind);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Append one id to a log, creating the directory if needed.
    pub fn record(&self, clip_id: &str, kind: LedgerKind) -> WorkerResult<()> {
        std::fs::create_dir_all(&self.dir)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(kind))?;

        let line = format!("{}\n", clip_id);
        file.write_all(line.as_bytes())?;

        debug!(clip_id = %clip_id, ledger = %kind, "Ledger entry appended");
        Ok(())
    }

    pub fn snapshot(&self) -> WorkerResult<LedgerSnapshot> {
        Ok(LedgerSnapshot {
            completed: self.load(LedgerKind::Completed)?,
            failed: self.load(LedgerKind::Failed)?,
        })
    }

    /// Items still to be dispatched.
    pub fn pending(&self, catalog: &[WorkItem]) -> WorkerResult<Vec<WorkItem>> {
        Ok(self.snapshot()?.pending(catalog))
    }
}
