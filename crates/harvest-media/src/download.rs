//! Media download using yt-dlp.
//!
//! Every call runs with an explicit cookie file chosen by the caller's
//! credential pool. Failures carry yt-dlp's error output so the caller can
//! classify authentication problems (bot checks, rate limits) apart from
//! content problems (unavailable or private videos).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use harvest_models::TimeRange;
use tokio::process::Command;
use tracing::{debug, info};

use crate::command::check_ytdlp;
use crate::error::{MediaError, MediaResult};

/// Format selector: best mp4 video plus m4a audio, falling back to any mp4.
const FORMAT_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/mp4";

/// Validate that a cookies file appears to be in Netscape format.
///
/// Netscape cookies files either start with "# Netscape HTTP Cookie File"
/// or contain tab-separated lines with domain entries.
pub fn is_valid_netscape_cookies(content: &str) -> bool {
    if content.starts_with("# Netscape HTTP Cookie File")
        || content.starts_with("# HTTP Cookie File")
    {
        return true;
    }

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.split('\t').count() >= 6 {
            return true;
        }
    }

    false
}

/// One invocation of the download tool.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Page URL of the source item
    pub url: String,
    /// Optional section of the source to fetch
    pub range: Option<TimeRange>,
    /// Output template, e.g. `/work/abc/abc.%(ext)s`
    pub output_template: PathBuf,
    /// Cookie jar used to authenticate this call
    pub cookie_file: PathBuf,
}

/// Fetches a primary media file plus metadata sidecar for one item.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download the item. On error the message holds the tool's error text.
    async fn download(&self, request: &DownloadRequest) -> MediaResult<()>;
}

/// [`MediaDownloader`] backed by the `yt-dlp` CLI.
#[derive(Debug, Clone, Default)]
pub struct YtDlpDownloader {
    extra_args: Vec<String>,
}

impl YtDlpDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw arguments to every invocation.
    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build the yt-dlp argument list for a request.
    pub fn build_args(&self, request: &DownloadRequest) -> Vec<String> {
        let mut args: Vec<String> = [
            "--quiet",
            "--no-warnings",
            "--no-playlist",
            "--no-progress",
            "-f",
            FORMAT_SELECTOR,
            "--merge-output-format",
            "mp4",
            "--write-info-json",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if let Some(range) = request.range {
            args.push("--download-sections".to_string());
            args.push(format!("*{:.3}-{:.3}", range.start, range.end));
            args.push("--force-keyframes-at-cuts".to_string());
        }

        args.push("--cookies".to_string());
        args.push(request.cookie_file.to_string_lossy().to_string());
        args.push("-o".to_string());
        args.push(request.output_template.to_string_lossy().to_string());
        args.extend(self.extra_args.iter().cloned());
        args.push(request.url.clone());
        args
    }
}

#[async_trait]
impl MediaDownloader for YtDlpDownloader {
    async fn download(&self, request: &DownloadRequest) -> MediaResult<()> {
        check_ytdlp()?;

        let args = self.build_args(request);
        info!(
            url = %request.url,
            cookie = %request.cookie_file.display(),
            "Downloading with yt-dlp"
        );

        let output = Command::new("yt-dlp")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(MediaError::download_failed(error_summary(&stderr)));
        }

        Ok(())
    }
}

/// Collapse yt-dlp stderr to its `ERROR:` lines, or the last line if none.
fn error_summary(stderr: &str) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR"))
        .collect();

    if !errors.is_empty() {
        return errors.join("; ");
    }

    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Unknown error")
        .to_string()
}

/// True when `path` exists and is a non-empty regular file.
pub fn non_empty_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(range: Option<TimeRange>) -> DownloadRequest {
        DownloadRequest {
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            range,
            output_template: PathBuf::from("/work/x/x.%(ext)s"),
            cookie_file: PathBuf::from("/cookies/a.txt"),
        }
    }

    #[test]
    fn test_whole_item_args() {
        let args = YtDlpDownloader::new().build_args(&request(None));
        assert!(!args.contains(&"--download-sections".to_string()));
        assert!(args.contains(&"--write-info-json".to_string()));
        let c = args.iter().position(|a| a == "--cookies").unwrap();
        assert_eq!(args[c + 1], "/cookies/a.txt");
        assert_eq!(args.last().unwrap(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn test_ranged_args() {
        let range = TimeRange::new(12.5, 40.0).unwrap();
        let args = YtDlpDownloader::new().build_args(&request(Some(range)));
        let s = args.iter().position(|a| a == "--download-sections").unwrap();
        assert_eq!(args[s + 1], "*12.500-40.000");
        assert!(args.contains(&"--force-keyframes-at-cuts".to_string()));
    }

    #[test]
    fn test_error_summary_prefers_error_lines() {
        let stderr = "[youtube] x: Downloading webpage\nERROR: [youtube] x: Sign in to confirm you're not a bot\n";
        assert_eq!(
            error_summary(stderr),
            "ERROR: [youtube] x: Sign in to confirm you're not a bot"
        );
        assert_eq!(error_summary("just one line\n"), "just one line");
        assert_eq!(error_summary(""), "Unknown error");
    }

    #[test]
    fn test_netscape_cookie_validation() {
        assert!(is_valid_netscape_cookies("# Netscape HTTP Cookie File\n"));
        assert!(is_valid_netscape_cookies(
            ".youtube.com\tTRUE\t/\tTRUE\t0\tPREF\tf6=40000000"
        ));
        assert!(!is_valid_netscape_cookies("{\"cookies\": []}"));
        assert!(!is_valid_netscape_cookies(""));
    }
}
