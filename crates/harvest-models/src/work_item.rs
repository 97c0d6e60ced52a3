//! Work items: one unit of harvesting work.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, ModelResult};

/// A `[start, end)` range within a source item, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    /// Create a range, rejecting empty or reversed ones.
    pub fn new(start: f64, end: f64) -> ModelResult<Self> {
        if !(start < end) || start < 0.0 {
            return Err(ModelError::InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Length of the range in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// One unit of harvesting work, immutable once loaded from a catalog.
///
/// `range == None` means the whole source item is harvested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// External media identifier
    pub source_id: String,
    /// Unique key for this unit, used for ledger and storage folders
    pub clip_id: String,
    /// Optional sub-range to fetch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<TimeRange>,
}

impl WorkItem {
    /// Whole-item work where the clip id is the source id.
    pub fn whole(source_id: impl Into<String>) -> ModelResult<Self> {
        let source_id = source_id.into();
        if source_id.trim().is_empty() {
            return Err(ModelError::EmptyId);
        }
        Ok(Self {
            clip_id: source_id.clone(),
            source_id,
            range: None,
        })
    }

    /// Work restricted to a time range of the source.
    pub fn ranged(
        source_id: impl Into<String>,
        clip_id: impl Into<String>,
        range: TimeRange,
    ) -> ModelResult<Self> {
        let source_id = source_id.into();
        let clip_id = clip_id.into();
        if source_id.trim().is_empty() || clip_id.trim().is_empty() {
            return Err(ModelError::EmptyId);
        }
        Ok(Self {
            source_id,
            clip_id,
            range: Some(range),
        })
    }

    pub fn is_whole(&self) -> bool {
        self.range.is_none()
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range {
            Some(r) => write!(f, "{} ({:.2}s-{:.2}s)", self.clip_id, r.start, r.end),
            None => write!(f, "{}", self.clip_id),
        }
    }
}

/// Clip id for the `index`-th sub-clip carved out of a source item.
///
/// Format: `{source_id}_{index:07}`
pub fn derived_clip_id(source_id: &str, index: usize) -> String {
    format!("{}_{:07}", source_id, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_item_uses_source_as_clip_id() {
        let item = WorkItem::whole("dQw4w9WgXcQ").unwrap();
        assert_eq!(item.clip_id, "dQw4w9WgXcQ");
        assert!(item.is_whole());
        assert!(WorkItem::whole("  ").is_err());
    }

    #[test]
    fn test_time_range_validation() {
        assert!(TimeRange::new(1.0, 2.5).is_ok());
        assert!(TimeRange::new(2.0, 2.0).is_err());
        assert!(TimeRange::new(3.0, 1.0).is_err());
        assert!(TimeRange::new(-1.0, 1.0).is_err());
        assert!((TimeRange::new(1.0, 2.5).unwrap().duration() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_derived_clip_id_is_zero_padded() {
        assert_eq!(derived_clip_id("abc", 0), "abc_0000000");
        assert_eq!(derived_clip_id("abc", 376), "abc_0000376");
    }

    #[test]
    fn test_serde_omits_absent_range() {
        let item = WorkItem::whole("abc").unwrap();
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("range"));

        let back: WorkItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
