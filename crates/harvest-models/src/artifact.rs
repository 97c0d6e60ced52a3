//! Staged artifact kinds and their on-disk naming.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extensions that must all be present for a clip folder to count as complete.
pub const REQUIRED_EXTENSIONS: [&str; 3] = [".mp4", ".mp3", ".json"];

/// The kinds of file that make up one staged clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Primary media (video + audio)
    Media,
    /// Derived audio track
    Audio,
    /// Metadata sidecar written by the download tool
    Metadata,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [ArtifactKind::Media, ArtifactKind::Audio, ArtifactKind::Metadata];

    /// Extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Media => ".mp4",
            ArtifactKind::Audio => ".mp3",
            ArtifactKind::Metadata => ".json",
        }
    }

    /// Canonical staged file name for a clip.
    pub fn file_name(&self, clip_id: &str) -> String {
        match self {
            ArtifactKind::Media => format!("{}_video.mp4", clip_id),
            ArtifactKind::Audio => format!("{}_audio.mp3", clip_id),
            ArtifactKind::Metadata => format!("{}_metadata.json", clip_id),
        }
    }

    /// Parse a short mode name (`mp4`, `mp3`, `json`).
    pub fn from_short_name(name: &str) -> Option<Self> {
        match name.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp4" | "media" | "video" => Some(ArtifactKind::Media),
            "mp3" | "audio" => Some(ArtifactKind::Audio),
            "json" | "metadata" => Some(ArtifactKind::Metadata),
            _ => None,
        }
    }
}

/// Paths of every file belonging to one clip's local staging folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub clip_dir: PathBuf,
    pub media: PathBuf,
    pub audio: PathBuf,
    pub metadata: PathBuf,
    /// Media file as produced by the download tool, before renaming
    pub downloaded_media: PathBuf,
    /// Metadata sidecar as produced by the download tool, before renaming
    pub downloaded_metadata: PathBuf,
    /// Output template handed to the download tool
    pub output_template: PathBuf,
}

impl ArtifactPaths {
    /// Layout for `clip_id` under `root`: `{root}/{clip_id}/...`
    pub fn new(root: impl AsRef<Path>, clip_id: &str) -> Self {
        let clip_dir = root.as_ref().join(clip_id);
        Self {
            media: clip_dir.join(ArtifactKind::Media.file_name(clip_id)),
            audio: clip_dir.join(ArtifactKind::Audio.file_name(clip_id)),
            metadata: clip_dir.join(ArtifactKind::Metadata.file_name(clip_id)),
            downloaded_media: clip_dir.join(format!("{}.mp4", clip_id)),
            downloaded_metadata: clip_dir.join(format!("{}.info.json", clip_id)),
            output_template: clip_dir.join(format!("{}.%(ext)s", clip_id)),
            clip_dir,
        }
    }

    pub fn path_of(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Media => &self.media,
            ArtifactKind::Audio => &self.audio,
            ArtifactKind::Metadata => &self.metadata,
        }
    }

    /// True when every canonical artifact exists on disk.
    pub fn is_complete(&self) -> bool {
        ArtifactKind::ALL.iter().all(|k| self.path_of(*k).is_file())
    }

    /// Artifact kinds missing from disk.
    pub fn missing(&self) -> Vec<ArtifactKind> {
        ArtifactKind::ALL
            .iter()
            .copied()
            .filter(|k| !self.path_of(*k).is_file())
            .collect()
    }
}
