//! External media tooling and music segmentation.
//!
//! This crate provides:
//! - yt-dlp downloads driven by a rotating cookie file
//! - FFmpeg command building, audio extraction and interval cutting
//! - The external music classifier invoked as a child process
//! - The segmentation engine that turns classifier output into clip intervals
//!
//! Each external tool sits behind a trait so the pipeline can be driven by
//! in-memory fakes in tests.

pub mod classifier;
pub mod command;
pub mod download;
pub mod error;
pub mod segmentation;
pub mod transcode;

pub use classifier::{read_frames, CommandClassifier, MusicClassifier};
pub use command::{check_ffmpeg, check_ytdlp, FfmpegCommand};
pub use download::{
    is_valid_netscape_cookies, non_empty_file, DownloadRequest, MediaDownloader, YtDlpDownloader,
};
pub use error::{MediaError, MediaResult};
pub use segmentation::{
    segment, SegmentationConfig, CLIP_PADDING_SEC, MAX_CLIP_SEC, MUSIC_LOGIT_THRESHOLD,
};
pub use transcode::{FfmpegTranscoder, Transcoder};
