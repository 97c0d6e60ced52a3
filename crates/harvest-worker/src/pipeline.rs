//! Per-item harvesting pipeline.
//!
//! One [`WorkItem`] moves through
//! `Pending -> Downloading -> {Failed | Staged} -> (Segmenting ->) Relocating -> {Failed | Completed}`.
//! Both terminal states are written once to the ledger. A direct item whose
//! only problem is relocation lands in `upload_failed` instead and stays
//! pending with its staged folder intact. Every error short of credential
//! exhaustion is caught here, so one bad item never takes down the pool.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use harvest_media::{non_empty_file, DownloadRequest, MediaDownloader, Transcoder};
use harvest_models::{
    derived_clip_id, watch_url, ArtifactKind, ArtifactPaths, CatalogKind, ClipInterval, LedgerKind, WorkItem,
};
use harvest_storage::{RemoteStore, UploadOutcome};
use rand::Rng;
use tracing::{error, warn, Instrument};

use crate::catalog::{prepare, ExecutionPlan};
use crate::config::HarvestConfig;
use crate::credentials::CredentialPool;
use crate::error::{FailureClass, WorkerError, WorkerResult};
use crate::ledger::Ledger;
use crate::logging::ItemLogger;
use crate::segment_cache::SegmentCache;

/// Pipeline stage of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Downloading,
    Staged,
    Segmenting,
    Relocating,
    Completed,
    Failed,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Pending => "pending",
            ItemState::Downloading => "downloading",
            ItemState::Staged => "staged",
            ItemState::Segmenting => "segmenting",
            ItemState::Relocating => "relocating",
            ItemState::Completed => "completed",
            ItemState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Completed | ItemState::Failed)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Relocated. `derived` counts sub-clips carved out of a segmented item.
    Completed { derived: usize },
    Failed(FailureClass),
}

impl ItemOutcome {
    pub fn state(&self) -> ItemState {
        match self {
            ItemOutcome::Completed { .. } => ItemState::Completed,
            ItemOutcome::Failed(_) => ItemState::Failed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ItemOutcome::Completed { .. })
    }
}

/// Counts from [`Harvester::retry_uploads`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub relocated: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// The harvest orchestrator. Shared by every worker task.
pub struct Harvester {
    work_dir: PathBuf,
    jitter: (Duration, Duration),
    catalog: CatalogKind,
    ledger: Ledger,
    credentials: Arc<CredentialPool>,
    downloader: Arc<dyn MediaDownloader>,
    transcoder: Arc<dyn Transcoder>,
    remote: RemoteStore,
    segments: Option<SegmentCache>,
    run_id: String,
}

impl Harvester {
    pub fn new(
        config: &HarvestConfig,
        catalog: CatalogKind,
        credentials: Arc<CredentialPool>,
        downloader: Arc<dyn MediaDownloader>,
        transcoder: Arc<dyn Transcoder>,
        remote: RemoteStore,
    ) -> Self {
        Self {
            work_dir: config.work_dir.clone(),
            jitter: config.jitter_bounds(),
            catalog,
            ledger: Ledger::new(&config.log_dir),
            credentials,
            downloader,
            transcoder,
            remote,
            segments: None,
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Enable segmentation of whole items.
    pub fn with_segmenter(mut self, cache: SegmentCache) -> Self {
        self.segments = Some(cache);
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn credentials(&self) -> &Arc<CredentialPool> {
        &self.credentials
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Run one item to a terminal state.
    ///
    /// Returns `Err` only for fatal errors; every other failure is recorded
    /// in the ledger and reported as [`ItemOutcome::Failed`].
    pub async fn process(&self, item: &WorkItem) -> WorkerResult<ItemOutcome> {
        let logger = ItemLogger::new(&item.clip_id, &self.run_id);
        let span = logger.create_span();
        self.run_item(item, &logger).instrument(span).await
    }

    async fn run_item(&self, item: &WorkItem, logger: &ItemLogger) -> WorkerResult<ItemOutcome> {
        logger.log_start(&item.to_string());
        let paths = ArtifactPaths::new(&self.work_dir, &item.clip_id);

        if let Err(e) = self.stage(item, &paths, logger).await {
            remove_dir(&paths.clip_dir).await;
            if e.is_fatal() {
                logger.log_error(ItemState::Downloading.as_str(), &e.to_string());
                return Err(e);
            }
            return Ok(self.fail(&item.clip_id, ItemState::Downloading, &e, logger));
        }
        logger.log_stage(ItemState::Staged.as_str(), "Artifacts staged");

        match prepare(self.catalog, item) {
            ExecutionPlan::Direct => {
                if self.relocate(&item.clip_id, &paths.clip_dir, logger).await {
                    logger.log_completion("relocated");
                    Ok(ItemOutcome::Completed { derived: 0 })
                } else {
                    Ok(ItemOutcome::Failed(FailureClass::Transfer))
                }
            }
            ExecutionPlan::Segment => self.segment_item(item, &paths, logger).await,
        }
    }

    /// Download into a cleared folder, derive audio, verify and rename.
    async fn stage(&self, item: &WorkItem, paths: &ArtifactPaths, logger: &ItemLogger) -> WorkerResult<()> {
        if paths.is_complete() {
            logger.log_stage(
                ItemState::Downloading.as_str(),
                "Complete staged set found locally, skipping download",
            );
            return Ok(());
        }

        remove_dir(&paths.clip_dir).await;
        tokio::fs::create_dir_all(&paths.clip_dir).await?;

        self.politeness_delay().await;
        let credential = self.credentials.acquire()?;

        let request = DownloadRequest {
            url: watch_url(&item.source_id),
            range: item.range,
            output_template: paths.output_template.clone(),
            cookie_file: credential.path().to_path_buf(),
        };
        logger.log_stage(ItemState::Downloading.as_str(), &request.url);

        if let Err(e) = self.downloader.download(&request).await {
            let text = e.to_string();
            let class = self.credentials.report_failure(&credential, &text);
            if class == FailureClass::Authentication {
                logger.log_warning(
                    ItemState::Downloading.as_str(),
                    &format!("Credential {} refused", credential.path().display()),
                );
            }
            return Err(WorkerError::download_failed(text));
        }

        if non_empty_file(&paths.downloaded_media) {
            self.transcoder
                .extract_audio(&paths.downloaded_media, &paths.audio)
                .await?;
        }

        let mut missing = Vec::new();
        if !non_empty_file(&paths.downloaded_media) {
            missing.push(ArtifactKind::Media);
        }
        if !non_empty_file(&paths.audio) {
            missing.push(ArtifactKind::Audio);
        }
        if !paths.downloaded_metadata.is_file() {
            missing.push(ArtifactKind::Metadata);
        }
        if !missing.is_empty() {
            return Err(incomplete(&item.clip_id, &missing));
        }

        tokio::fs::rename(&paths.downloaded_media, &paths.media).await?;
        tokio::fs::rename(&paths.downloaded_metadata, &paths.metadata).await?;
        Ok(())
    }

    async fn segment_item(&self, item: &WorkItem, paths: &ArtifactPaths, logger: &ItemLogger) -> WorkerResult<ItemOutcome> {
        let Some(cache) = &self.segments else {
            remove_dir(&paths.clip_dir).await;
            let e = WorkerError::config_error("segmentation requested but no classifier configured");
            return Ok(self.fail(&item.clip_id, ItemState::Segmenting, &e, logger));
        };

        let lookup = match cache.intervals(&item.clip_id, &paths.audio).await {
            Ok(lookup) => lookup,
            Err(e) => {
                remove_dir(&paths.clip_dir).await;
                let e = WorkerError::segmentation_failed(e.to_string());
                return Ok(self.fail(&item.clip_id, ItemState::Segmenting, &e, logger));
            }
        };
        let cached = lookup.is_cached();
        let intervals = lookup.into_intervals();
        logger.log_stage(
            ItemState::Segmenting.as_str(),
            &format!("{} clip intervals (cached: {})", intervals.len(), cached),
        );

        let mut all_ok = true;
        for (index, interval) in intervals.iter().enumerate() {
            let clip_id = derived_clip_id(&item.source_id, index);
            match self.extract_clip(paths, &clip_id, *interval).await {
                Ok(derived) => {
                    if !self.relocate(&clip_id, &derived, logger).await {
                        all_ok = false;
                    }
                }
                Err(e) => {
                    remove_dir(&self.work_dir.join(&clip_id)).await;
                    warn!(clip_id = %clip_id, error = %e, "Derived clip extraction failed");
                    self.record(&clip_id, LedgerKind::Failed);
                    all_ok = false;
                }
            }
        }

        remove_dir(&paths.clip_dir).await;

        if all_ok {
            self.record(&item.clip_id, LedgerKind::Completed);
            logger.log_completion(&format!("{} derived clips", intervals.len()));
            Ok(ItemOutcome::Completed {
                derived: intervals.len(),
            })
        } else {
            self.record(&item.clip_id, LedgerKind::Failed);
            logger.log_error(ItemState::Relocating.as_str(), "one or more derived clips failed");
            Ok(ItemOutcome::Failed(FailureClass::Transfer))
        }
    }

    /// Cut one interval out of the staged parent into its own clip folder.
    async fn extract_clip(&self, parent: &ArtifactPaths, clip_id: &str, interval: ClipInterval) -> WorkerResult<PathBuf> {
        let derived = ArtifactPaths::new(&self.work_dir, clip_id);
        remove_dir(&derived.clip_dir).await;
        tokio::fs::create_dir_all(&derived.clip_dir).await?;

        self.transcoder.cut_media(&parent.media, &derived.media, interval).await?;
        self.transcoder.cut_audio(&parent.audio, &derived.audio, interval).await?;
        tokio::fs::copy(&parent.metadata, &derived.metadata).await?;

        let missing = derived.missing();
        if !missing.is_empty() {
            return Err(incomplete(clip_id, &missing));
        }
        Ok(derived.clip_dir)
    }

    /// Upload a staged folder. Success records completion and removes the
    /// local folder; failure records an upload failure and keeps it.
    async fn relocate(&self, clip_id: &str, dir: &Path, logger: &ItemLogger) -> bool {
        logger.log_stage(ItemState::Relocating.as_str(), clip_id);

        let failure = match self.remote.upload_folder(clip_id, dir).await {
            Ok(outcome) if outcome.is_success() => {
                self.record(clip_id, LedgerKind::Completed);
                remove_dir(dir).await;
                return true;
            }
            Ok(UploadOutcome::Partial { failed, .. }) => failed.join(", "),
            Ok(_) => String::new(),
            Err(e) => e.to_string(),
        };

        logger.log_warning(
            ItemState::Relocating.as_str(),
            &format!("Upload of {} failed ({}); local data kept", clip_id, failure),
        );
        self.record(clip_id, LedgerKind::UploadFailed);
        false
    }

    /// Re-run relocation for upload failures whose local folder is intact.
    pub async fn retry_uploads(&self) -> WorkerResult<RetrySummary> {
        let snapshot = self.ledger.snapshot()?;
        let mut ids: Vec<String> = self
            .ledger
            .load(LedgerKind::UploadFailed)?
            .into_iter()
            .filter(|id| !snapshot.is_settled(id))
            .collect();
        ids.sort();

        let mut summary = RetrySummary::default();
        for clip_id in ids {
            let paths = ArtifactPaths::new(&self.work_dir, &clip_id);
            if !paths.is_complete() {
                warn!(clip_id = %clip_id, "No complete local folder, skipping upload retry");
                summary.skipped += 1;
                continue;
            }
            let logger = ItemLogger::new(&clip_id, &self.run_id);
            if self.relocate(&clip_id, &paths.clip_dir, &logger).await {
                summary.relocated += 1;
            } else {
                summary.failed += 1;
            }
        }
        Ok(summary)
    }

    fn fail(&self, clip_id: &str, state: ItemState, e: &WorkerError, logger: &ItemLogger) -> ItemOutcome {
        logger.log_error(state.as_str(), &e.to_string());
        self.record(clip_id, LedgerKind::Failed);
        ItemOutcome::Failed(e.failure_class())
    }

    fn record(&self, clip_id: &str, kind: LedgerKind) {
        if let Err(e) = self.ledger.record(clip_id, kind) {
            error!(clip_id = %clip_id, ledger = %kind, error = %e, "Failed to append ledger entry");
        }
    }

    async fn politeness_delay(&self) {
        let (min, max) = self.jitter;
        if max.is_zero() {
            return;
        }
        tokio::time::sleep(jitter_delay(min, max)).await;
    }

    /// Drop whatever an interrupted item left behind. Complete staged sets
    /// are kept so the next run can skip the download; partial folders of
    /// the item and of its derived clips are removed.
    pub async fn purge_partial(&self, item: &WorkItem) {
        let paths = ArtifactPaths::new(&self.work_dir, &item.clip_id);
        if !paths.is_complete() {
            remove_dir(&paths.clip_dir).await;
        }

        if prepare(self.catalog, item) != ExecutionPlan::Segment {
            return;
        }
        let derived_prefix = format!("{}_", item.source_id);
        let Ok(mut entries) = tokio::fs::read_dir(&self.work_dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(suffix) = name.strip_prefix(&derived_prefix) else {
                continue;
            };
            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            if !ArtifactPaths::new(&self.work_dir, &name).is_complete() {
                remove_dir(&entry.path()).await;
            }
        }
    }
}

/// Uniform delay in `[min, max)` at nanosecond resolution; `min` when the
/// range is empty.
fn jitter_delay(min: Duration, max: Duration) -> Duration {
    let (lo, hi) = (min.as_nanos() as u64, max.as_nanos() as u64);
    if hi <= lo {
        return min;
    }
    Duration::from_nanos(rand::rng().random_range(lo..hi))
}

fn incomplete(clip_id: &str, missing: &[ArtifactKind]) -> WorkerError {
    WorkerError::IncompleteArtifacts {
        clip_id: clip_id.to_string(),
        missing: missing
            .iter()
            .map(|k| k.extension())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

async fn remove_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(dir = %dir.display(), error = %e, "Failed to remove directory");
        }
    }
}
