//! Source identifier parsing.
//!
//! Catalog entries may hold a bare video id or any of the common YouTube URL
//! forms; both normalise to the 11-character id used as `source_id`.

use thiserror::Error;

/// Errors that can occur during source id extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceIdError {
    #[error("URL is not a valid YouTube URL")]
    InvalidYoutubeUrl,

    #[error("Video ID has invalid format")]
    InvalidVideoId,

    #[error("Video ID not found in URL")]
    VideoIdNotFound,
}

/// Normalise a catalog entry (bare id or URL) to a video id.
pub fn parse_source_id(entry: &str) -> Result<String, SourceIdError> {
    let entry = entry.trim();

    if !entry.contains('/') && !entry.contains('.') {
        return validate_id(entry.to_string());
    }

    if !is_youtube_domain(entry) {
        return Err(SourceIdError::InvalidYoutubeUrl);
    }

    let markers = ["?v=", "&v=", "youtu.be/", "/embed/", "/v/", "/shorts/"];
    for marker in markers {
        if let Some(pos) = entry.find(marker) {
            let start = pos + marker.len();
            if start >= entry.len() {
                continue;
            }
            return validate_id(id_segment(&entry[start..]));
        }
    }

    Err(SourceIdError::VideoIdNotFound)
}

/// Canonical watch URL handed to the download tool.
pub fn watch_url(source_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", source_id)
}

fn is_youtube_domain(url: &str) -> bool {
    let url = url.to_ascii_lowercase();
    url.contains("youtube.com") || url.contains("youtu.be")
}

fn id_segment(segment: &str) -> String {
    let end = segment
        .find(|c| matches!(c, '&' | '#' | '?' | '/'))
        .unwrap_or(segment.len());
    segment[..end].trim().to_string()
}

fn validate_id(id: String) -> Result<String, SourceIdError> {
    // YouTube video IDs are exactly 11 characters
    if id.len() != 11 {
        return Err(SourceIdError::InvalidVideoId);
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(SourceIdError::InvalidVideoId);
    }
    Ok(id)
}
