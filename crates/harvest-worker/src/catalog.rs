//! Catalog strategies.
//!
//! Each [`CatalogKind`] knows how to turn a catalog file into work items and
//! how an item is executed. Trailer catalogs list pre-cut ranges; YouTube
//! catalogs list whole videos that are segmented after download.

use std::collections::HashSet;
use std::path::Path;

use harvest_models::{parse_source_id, CatalogKind, TimeRange, WorkItem};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};

/// How the orchestrator runs one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPlan {
    /// Download, stage, relocate.
    Direct,
    /// Download, stage, segment into derived clips, relocate each.
    Segment,
}

/// Execution plan for `item` under a catalog kind.
pub fn prepare(kind: CatalogKind, item: &WorkItem) -> ExecutionPlan {
    if item.is_whole() && kind.segments_whole_items() {
        ExecutionPlan::Segment
    } else {
        ExecutionPlan::Direct
    }
}

#[derive(Debug, Deserialize)]
struct TrailerRecord {
    video_id: String,
    clip_id: String,
    clip_start_end_idx: (f64, f64),
    video_fps: f64,
}

impl TrailerRecord {
    fn into_work_item(self) -> WorkerResult<WorkItem> {
        if !(self.video_fps > 0.0) {
            return Err(WorkerError::catalog_error(format!(
                "{}: invalid fps {}",
                self.clip_id, self.video_fps
            )));
        }
        let (start_frame, end_frame) = self.clip_start_end_idx;
        let range = TimeRange::new(start_frame / self.video_fps, end_frame / self.video_fps)?;
        Ok(WorkItem::ranged(self.video_id, self.clip_id, range)?)
    }
}

/// Read every work item in a catalog file.
pub fn load_work_items(kind: CatalogKind, path: &Path) -> WorkerResult<Vec<WorkItem>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| WorkerError::catalog_error(format!("{}: {}", path.display(), e)))?;

    let items = match kind {
        CatalogKind::MmTrailer => parse_trailer_catalog(&content)?,
        CatalogKind::YouTube => parse_video_list(&content)?,
    };

    info!(catalog = %kind, path = %path.display(), items = items.len(), "Catalog loaded");
    Ok(items)
}

/// JSON array of `{video_id, clip_id, clip_start_end_idx, video_fps}`.
/// Frame indices become seconds.
pub fn parse_trailer_catalog(content: &str) -> WorkerResult<Vec<WorkItem>> {
    let records: Vec<TrailerRecord> = serde_json::from_str(content)?;
    let mut items = Vec::with_capacity(records.len());
    for record in records {
        let clip_id = record.clip_id.clone();
        match record.into_work_item() {
            Ok(item) => items.push(item),
            Err(e) => warn!(clip_id = %clip_id, error = %e, "Skipping invalid catalog record"),
        }
    }
    Ok(items)
}

/// CSV with a `video_id` column, or one id or URL per line. Ids are
/// de-duplicated in first-seen order.
///
/// Quoted fields may contain commas and `""` escapes; a quoted field
/// spanning several lines is not supported.
pub fn parse_video_list(content: &str) -> WorkerResult<Vec<WorkItem>> {
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();

    let column = match lines.peek().map(|header| split_record(header)) {
        Some(fields) if fields.iter().any(|c| c.trim() == "video_id") => {
            lines.next();
            fields.iter().position(|c| c.trim() == "video_id")
        }
        Some(fields) if fields.len() > 1 => {
            return Err(WorkerError::catalog_error("CSV catalog has no video_id column"));
        }
        _ => None,
    };

    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for line in lines {
        let entry = match column {
            Some(i) => match split_record(line).into_iter().nth(i) {
                Some(cell) => cell.trim().to_string(),
                None => continue,
            },
            None => line.to_string(),
        };
        let entry = entry.as_str();

        match parse_source_id(entry) {
            Ok(id) => {
                if seen.insert(id.clone()) {
                    items.push(WorkItem::whole(id)?);
                }
            }
            Err(e) => warn!(entry = %entry, error = %e, "Skipping catalog entry"),
        }
    }

    Ok(items)
}

/// Split one CSV record into fields.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Ids listed one per line, e.g. a saved remote listing.
pub fn load_id_list(path: &Path) -> WorkerResult<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Drop items whose clip id is in `excluded`.
pub fn exclude(items: Vec<WorkItem>, excluded: &HashSet<String>) -> Vec<WorkItem> {
    if excluded.is_empty() {
        return items;
    }
    let before = items.len();
    let kept: Vec<WorkItem> = items
        .into_iter()
        .filter(|item| !excluded.contains(&item.clip_id))
        .collect();
    info!(excluded = before - kept.len(), "Applied exclusion list");
    kept
}
