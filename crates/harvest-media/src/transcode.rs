//! Audio extraction and interval cutting with FFmpeg.

use std::path::Path;

use async_trait::async_trait;
use harvest_models::ClipInterval;
use tracing::debug;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};

/// Synchronous (awaited to completion) transcoding operations.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Derive an mp3 audio track from a media file.
    async fn extract_audio(&self, media: &Path, audio: &Path) -> MediaResult<()>;

    /// Cut `interval` out of a media file, re-encoding video and audio.
    async fn cut_media(&self, input: &Path, output: &Path, interval: ClipInterval) -> MediaResult<()>;

    /// Cut `interval` out of an audio file.
    async fn cut_audio(&self, input: &Path, output: &Path, interval: ClipInterval) -> MediaResult<()>;
}

/// [`Transcoder`] backed by the `ffmpeg` CLI.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    audio_bitrate: String,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self {
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract_audio_command(&self, media: &Path, audio: &Path) -> FfmpegCommand {
        FfmpegCommand::new(media, audio)
            .no_video()
            .audio_codec("libmp3lame")
            .audio_bitrate(self.audio_bitrate.clone())
    }

    pub fn cut_media_command(&self, input: &Path, output: &Path, interval: ClipInterval) -> FfmpegCommand {
        FfmpegCommand::new(input, output)
            .seek(interval.onset())
            .duration(interval.duration())
            .video_codec("libx264")
            .audio_codec("aac")
    }

    pub fn cut_audio_command(&self, input: &Path, output: &Path, interval: ClipInterval) -> FfmpegCommand {
        FfmpegCommand::new(input, output)
            .seek(interval.onset())
            .duration(interval.duration())
            .audio_codec("libmp3lame")
            .audio_bitrate(self.audio_bitrate.clone())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn extract_audio(&self, media: &Path, audio: &Path) -> MediaResult<()> {
        if !media.exists() {
            return Err(MediaError::FileNotFound(media.to_path_buf()));
        }
        debug!(input = %media.display(), output = %audio.display(), "Extracting audio");
        self.extract_audio_command(media, audio).run().await
    }

    async fn cut_media(&self, input: &Path, output: &Path, interval: ClipInterval) -> MediaResult<()> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        self.cut_media_command(input, output, interval).run().await
    }

    async fn cut_audio(&self, input: &Path, output: &Path, interval: ClipInterval) -> MediaResult<()> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        self.cut_audio_command(input, output, interval).run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_uses_interval_bounds() {
        let interval = ClipInterval::new(25.0, 55.0).unwrap();
        let args = FfmpegTranscoder::new()
            .cut_media_command(Path::new("in.mp4"), Path::new("out.mp4"), interval)
            .build_args();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[ss + 1], "25.000");
        assert_eq!(args[t + 1], "30.000");
    }

    #[tokio::test]
    async fn test_missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.mp4");
        let err = FfmpegTranscoder::new()
            .extract_audio(&missing, &dir.path().join("nope.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
