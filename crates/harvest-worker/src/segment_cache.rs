//! Cached segmentation.
//!
//! Classifier inference is the expensive step, so it runs at most once per
//! item. The frames and the intervals derived from them are kept in a JSON
//! sidecar `{dir}/{clip_id}.segments.json`; when the sidecar exists the
//! intervals are returned without touching the classifier.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use harvest_media::{segment, MusicClassifier, SegmentationConfig};
use harvest_models::{ClipInterval, MusicFrame};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::WorkerResult;

/// Contents of one sidecar file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub frames: Vec<MusicFrame>,
    pub intervals: Vec<ClipInterval>,
}

/// Where the intervals came from.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentLookup {
    Cached(Vec<ClipInterval>),
    Computed(Vec<ClipInterval>),
}

impl SegmentLookup {
    pub fn intervals(&self) -> &[ClipInterval] {
        match self {
            SegmentLookup::Cached(v) | SegmentLookup::Computed(v) => v,
        }
    }

    pub fn into_intervals(self) -> Vec<ClipInterval> {
        match self {
            SegmentLookup::Cached(v) | SegmentLookup::Computed(v) => v,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, SegmentLookup::Cached(_))
    }
}

pub struct SegmentCache {
    dir: PathBuf,
    classifier: Arc<dyn MusicClassifier>,
    config: SegmentationConfig,
    chunk_secs: Option<f64>,
}

impl SegmentCache {
    pub fn new(dir: impl Into<PathBuf>, classifier: Arc<dyn MusicClassifier>, config: SegmentationConfig) -> Self {
        Self {
            dir: dir.into(),
            classifier,
            config,
            chunk_secs: None,
        }
    }

    /// Expected classifier chunk duration; frames of another length are
    /// reported.
    pub fn with_chunk_secs(mut self, chunk_secs: f64) -> Self {
        self.chunk_secs = Some(chunk_secs);
        self
    }

    pub fn sidecar_path(&self, clip_id: &str) -> PathBuf {
        self.dir.join(format!("{}.segments.json", clip_id))
    }

    /// Clip intervals for an item's audio track.
    pub async fn intervals(&self, clip_id: &str, audio: &Path) -> WorkerResult<SegmentLookup> {
        let sidecar = self.sidecar_path(clip_id);

        if let Some(record) = read_record(&sidecar).await {
            debug!(clip_id = %clip_id, intervals = record.intervals.len(), "Segmentation cache hit");
            return Ok(SegmentLookup::Cached(record.intervals));
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let frames = self.classifier.classify(audio, &self.dir).await?;
        if let Some(chunk) = self.chunk_secs {
            let irregular = frames
                .iter()
                .filter(|f| ((f.offset - f.onset) - chunk).abs() > 1e-6)
                .count();
            if irregular > 0 {
                warn!(clip_id = %clip_id, irregular, chunk_secs = chunk, "Classifier frames differ from chunk duration");
            }
        }
        let intervals = segment(&frames, &self.config);

        info!(
            clip_id = %clip_id,
            frames = frames.len(),
            intervals = intervals.len(),
            "Segmentation computed"
        );

        let record = SegmentRecord { frames, intervals };
        write_record(&sidecar, &record).await?;
        Ok(SegmentLookup::Computed(record.intervals))
    }
}

async fn read_record(path: &Path) -> Option<SegmentRecord> {
    let raw = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice(&raw) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable segmentation sidecar");
            None
        }
    }
}

/// Write via a temporary file and rename so readers never see a partial file.
async fn write_record(path: &Path, record: &SegmentRecord) -> WorkerResult<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, serde_json::to_vec_pretty(record)?).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
