//! Catalog kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Shape of the catalog a batch is loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    /// JSON list of pre-cut clips with frame-indexed ranges
    #[default]
    MmTrailer,
    /// Whole videos, segmented on music after download
    YouTube,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::MmTrailer => "mmtrailer",
            CatalogKind::YouTube => "yt",
        }
    }

    /// Whether whole items from this catalog go through segmentation.
    pub fn segments_whole_items(&self) -> bool {
        matches!(self, CatalogKind::YouTube)
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CatalogKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mmtrailer" | "mm_trailer" => Ok(CatalogKind::MmTrailer),
            "yt" | "youtube" => Ok(CatalogKind::YouTube),
            other => Err(ModelError::UnknownCatalogKind(other.to_string())),
        }
    }
}
