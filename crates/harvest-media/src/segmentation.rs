//! Music segmentation.
//!
//! Converts framewise classifier output into padded, length-bounded clip
//! intervals:
//!
//! 1. Threshold each frame's `music_logit` into a boolean.
//! 2. Group maximal runs of consecutive music frames. A single non-music
//!    frame always closes a run; runs are never bridged across a gap.
//! 3. Pad each run on both sides, clamping the start at zero. The end is
//!    left unclamped.
//! 4. Split any padded run longer than the maximum clip length into
//!    consecutive fixed-size pieces, truncating the last at the run's end.

use harvest_models::{ClipInterval, MusicFrame};
use serde::{Deserialize, Serialize};

/// Music score above which a chunk counts as music.
pub const MUSIC_LOGIT_THRESHOLD: f64 = 0.5;

/// Padding added before and after each music run, in seconds.
pub const CLIP_PADDING_SEC: f64 = 5.0;

/// Longest clip emitted, in seconds.
pub const MAX_CLIP_SEC: f64 = 30.0;

/// Tuning for [`segment`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    pub threshold: f64,
    pub padding_secs: f64,
    pub max_clip_secs: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            threshold: MUSIC_LOGIT_THRESHOLD,
            padding_secs: CLIP_PADDING_SEC,
            max_clip_secs: MAX_CLIP_SEC,
        }
    }
}

/// Run the full segmentation over one item's classifier output.
///
/// An all-silent signal yields an empty list.
pub fn segment(frames: &[MusicFrame], config: &SegmentationConfig) -> Vec<ClipInterval> {
    let binary = binarize(frames, config.threshold);
    let runs = music_runs(frames, &binary);

    runs.into_iter()
        .map(|(start, end)| pad(start, end, config.padding_secs))
        .flat_map(|(start, end)| split(start, end, config.max_clip_secs))
        .collect()
}

/// Threshold each frame.
pub fn binarize(frames: &[MusicFrame], threshold: f64) -> Vec<bool> {
    frames.iter().map(|f| f.music_logit > threshold).collect()
}

/// Maximal runs of `true`, as `(onset of first, offset of last)`.
pub fn music_runs(frames: &[MusicFrame], binary: &[bool]) -> Vec<(f64, f64)> {
    let mut runs = Vec::new();
    let mut current: Option<(f64, f64)> = None;

    for (frame, &is_music) in frames.iter().zip(binary) {
        current = match (current, is_music) {
            (None, true) => Some((frame.onset, frame.offset)),
            (Some((start, _)), true) => Some((start, frame.offset)),
            (Some(run), false) => {
                runs.push(run);
                None
            }
            (None, false) => None,
        };
    }

    if let Some(run) = current {
        runs.push(run);
    }
    runs
}

fn pad(start: f64, end: f64, padding: f64) -> (f64, f64) {
    ((start - padding).max(0.0), end + padding)
}

fn split(start: f64, end: f64, max_len: f64) -> Vec<ClipInterval> {
    let duration = end - start;
    if max_len <= 0.0 || duration <= max_len {
        return ClipInterval::new(start, end).into_iter().collect();
    }

    let pieces = (duration / max_len).ceil() as usize;
    (0..pieces)
        .filter_map(|j| {
            let piece_start = start + j as f64 * max_len;
            let piece_end = end.min(piece_start + max_len);
            ClipInterval::new(piece_start, piece_end).ok()
        })
        .collect()
}
