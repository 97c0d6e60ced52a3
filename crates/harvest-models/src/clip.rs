//! Classifier records and clip intervals.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// One fixed-duration chunk of classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MusicFrame {
    /// Chunk start in seconds
    pub onset: f64,
    /// Chunk end in seconds
    pub offset: f64,
    /// Music score for the chunk
    pub music_logit: f64,
}

/// A time range selected for extraction, `onset < offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(f64, f64)", into = "(f64, f64)")]
pub struct ClipInterval {
    onset: f64,
    offset: f64,
}

impl ClipInterval {
    pub fn new(onset: f64, offset: f64) -> ModelResult<Self> {
        if !(onset < offset) {
            return Err(ModelError::InvalidInterval { onset, offset });
        }
        Ok(Self { onset, offset })
    }

    pub fn onset(&self) -> f64 {
        self.onset
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn duration(&self) -> f64 {
        self.offset - self.onset
    }
}

impl TryFrom<(f64, f64)> for ClipInterval {
    type Error = ModelError;

    fn try_from((onset, offset): (f64, f64)) -> Result<Self, Self::Error> {
        Self::new(onset, offset)
    }
}

impl From<ClipInterval> for (f64, f64) {
    fn from(interval: ClipInterval) -> Self {
        (interval.onset, interval.offset)
    }
}
