//! External music classifier.
//!
//! The classifier is a pretrained model run out of process. It is given an
//! audio path and an output directory and writes `{audio_stem}.json`: a list
//! of `{onset, offset, music_logit}` records at fixed chunk granularity.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use harvest_models::MusicFrame;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Produces framewise music scores for an audio file.
#[async_trait]
pub trait MusicClassifier: Send + Sync {
    async fn classify(&self, audio: &Path, output_dir: &Path) -> MediaResult<Vec<MusicFrame>>;
}

/// [`MusicClassifier`] that shells out to a configured command.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
}

impl CommandClassifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace separated command line, e.g.
    /// `python -m vp.annotation.music_detection --device cuda`.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    /// Where the classifier writes its output for `audio`.
    pub fn output_path(audio: &Path, output_dir: &Path) -> PathBuf {
        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "classifier".to_string());
        output_dir.join(format!("{}.json", stem))
    }
}

#[async_trait]
impl MusicClassifier for CommandClassifier {
    async fn classify(&self, audio: &Path, output_dir: &Path) -> MediaResult<Vec<MusicFrame>> {
        if !audio.exists() {
            return Err(MediaError::FileNotFound(audio.to_path_buf()));
        }
        tokio::fs::create_dir_all(output_dir).await?;

        info!(audio = %audio.display(), program = %self.program, "Running music classifier");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--audio_path")
            .arg(audio)
            .arg("--output_dir")
            .arg(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("classifier stderr: {}", stderr);
            return Err(MediaError::classifier_failed(format!(
                "{} exited with {:?}",
                self.program,
                output.status.code()
            )));
        }

        let result_path = Self::output_path(audio, output_dir);
        read_frames(&result_path).await
    }
}

/// Load classifier records from a JSON file.
pub async fn read_frames(path: &Path) -> MediaResult<Vec<MusicFrame>> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    let raw = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_parsing() {
        let c = CommandClassifier::from_command_line("python -m detect --device cpu").unwrap();
        assert_eq!(c.program, "python");
        assert_eq!(c.args, vec!["-m", "detect", "--device", "cpu"]);
        assert!(CommandClassifier::from_command_line("   ").is_none());
    }

    #[test]
    fn test_output_path_uses_audio_stem() {
        let p = CommandClassifier::output_path(Path::new("/w/abc/abc_audio.mp3"), Path::new("/w/abc"));
        assert_eq!(p, PathBuf::from("/w/abc/abc_audio.json"));
    }

    #[tokio::test]
    async fn test_read_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        tokio::fs::write(
            &path,
            r#"[{"onset":0,"offset":10,"music_logit":0.2},{"onset":10,"offset":20,"music_logit":0.8}]"#,
        )
        .await
        .unwrap();
        let frames = read_frames(&path).await.unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].music_logit, 0.8);

        assert!(read_frames(&dir.path().join("missing.json")).await.is_err());
    }
}
