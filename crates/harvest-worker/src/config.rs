//! Harvest configuration.

use std::path::PathBuf;
use std::time::Duration;

use harvest_media::{SegmentationConfig, CLIP_PADDING_SEC, MAX_CLIP_SEC, MUSIC_LOGIT_THRESHOLD};

/// Classifier chunk duration in seconds.
pub const DEFAULT_CHUNK_SECS: f64 = 10.0;

/// Harvest configuration.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Root of the per-clip staging folders
    pub work_dir: PathBuf,
    /// Ledger files and segmentation cache live here
    pub log_dir: PathBuf,
    /// Candidate cookie files (`*.txt`)
    pub cookies_dir: PathBuf,
    /// Number of parallel workers
    pub workers: usize,
    /// Politeness delay bounds before every download
    pub jitter_min: Duration,
    pub jitter_max: Duration,
    /// Classifier command line (program and args); segmentation is
    /// unavailable when unset
    pub classifier_cmd: Option<String>,
    pub segmentation: SegmentationConfig,
    /// Classifier chunk duration in seconds
    pub chunk_secs: f64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("./downloads"),
            log_dir: PathBuf::from("./logs"),
            cookies_dir: PathBuf::from("./cookies"),
            workers: 8,
            jitter_min: Duration::from_millis(500),
            jitter_max: Duration::from_millis(1500),
            classifier_cmd: None,
            segmentation: SegmentationConfig::default(),
            chunk_secs: DEFAULT_CHUNK_SECS,
        }
    }
}

impl HarvestConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("HARVEST_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./downloads")),
            log_dir: std::env::var("HARVEST_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./logs")),
            cookies_dir: std::env::var("HARVEST_COOKIES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./cookies")),
            workers: std::env::var("HARVEST_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(8),
            jitter_min: Duration::from_millis(
                std::env::var("HARVEST_JITTER_MIN_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
            jitter_max: Duration::from_millis(
                std::env::var("HARVEST_JITTER_MAX_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1500),
            ),
            classifier_cmd: std::env::var("HARVEST_CLASSIFIER_CMD")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            segmentation: SegmentationConfig {
                threshold: std::env::var("HARVEST_MUSIC_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(MUSIC_LOGIT_THRESHOLD),
                padding_secs: std::env::var("HARVEST_CLIP_PADDING_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(CLIP_PADDING_SEC),
                max_clip_secs: std::env::var("HARVEST_MAX_CLIP_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(MAX_CLIP_SEC),
            },
            chunk_secs: std::env::var("HARVEST_CHUNK_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CHUNK_SECS),
        }
    }

    /// Folder for cached classifier output and intervals.
    pub fn segments_dir(&self) -> PathBuf {
        self.log_dir.join("segments")
    }

    /// Jitter bounds with `max >= min`.
    pub fn jitter_bounds(&self) -> (Duration, Duration) {
        (self.jitter_min, self.jitter_max.max(self.jitter_min))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarvestConfig::default();
        assert_eq!(config.workers, 8);
        assert_eq!(config.jitter_min, Duration::from_millis(500));
        assert_eq!(config.segmentation.max_clip_secs, 30.0);
        assert_eq!(config.segments_dir(), PathBuf::from("./logs/segments"));
    }

    #[test]
    fn test_jitter_bounds_are_ordered() {
        let config = HarvestConfig {
            jitter_min: Duration::from_millis(900),
            jitter_max: Duration::from_millis(100),
            ..HarvestConfig::default()
        };
        let (min, max) = config.jitter_bounds();
        assert!(min <= max);
    }
}
