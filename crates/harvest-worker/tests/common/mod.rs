//! In-memory collaborators for pipeline tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use harvest_media::{DownloadRequest, MediaDownloader, MediaError, MediaResult, MusicClassifier, Transcoder};
use harvest_models::{CatalogKind, ClipInterval, MusicFrame};
use harvest_storage::{ObjectInfo, ObjectStore, RemoteStore, StorageError, StorageResult};
use harvest_worker::{CredentialPool, HarvestConfig, Harvester, SegmentCache};

pub const PREFIX: &str = "clips";

/// Object store backed by a map.
#[derive(Default)]
pub struct InMemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    pub uploads: AtomicUsize,
    pub fail_uploads: AtomicBool,
}

impl InMemoryStore {
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn insert(&self, key: &str, body: &[u8]) {
        self.objects.lock().unwrap().insert(key.to_string(), body.to_vec());
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| ObjectInfo::new(k.clone(), v.len() as u64))
            .collect())
    }

    async fn upload_file(&self, path: &Path, key: &str) -> StorageResult<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::upload_failed("simulated outage"));
        }
        let body = std::fs::read(path)?;
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn download_file(&self, key: &str, path: &Path) -> StorageResult<()> {
        let body = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(key))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, body)?;
        Ok(())
    }
}

/// What the fake download tool does for a source id.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    /// Write the media file but no metadata sidecar.
    SkipMetadata,
    Fail(String),
    /// Write the media file, then hang until cancelled.
    Stall,
}

/// Download tool writing small placeholder files.
#[derive(Default)]
pub struct FakeDownloader {
    behaviors: HashMap<String, Behavior>,
    pub calls: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeDownloader {
    pub fn with(mut self, source_id: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(source_id.to_string(), behavior);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn output(template: &Path, ext: &str) -> PathBuf {
    PathBuf::from(template.to_string_lossy().replace("%(ext)s", ext))
}

#[async_trait]
impl MediaDownloader for FakeDownloader {
    async fn download(&self, request: &DownloadRequest) -> MediaResult<()> {
        let source_id = request.url.rsplit("v=").next().unwrap_or_default().to_string();
        self.calls
            .lock()
            .unwrap()
            .push((source_id.clone(), request.cookie_file.clone()));

        match self.behaviors.get(&source_id).cloned().unwrap_or(Behavior::Succeed) {
            Behavior::Fail(message) => Err(MediaError::download_failed(message)),
            Behavior::Stall => {
                std::fs::write(output(&request.output_template, "mp4"), b"video")?;
                tokio::time::sleep(Duration::from_secs(600)).await;
                Err(MediaError::download_failed("stalled download gave up"))
            }
            behavior => {
                std::fs::write(output(&request.output_template, "mp4"), b"video")?;
                if !matches!(behavior, Behavior::SkipMetadata) {
                    std::fs::write(output(&request.output_template, "info.json"), b"{}")?;
                }
                Ok(())
            }
        }
    }
}

/// Transcoder that writes marker files instead of running ffmpeg.
#[derive(Default)]
pub struct FakeTranscoder {
    pub cuts: Mutex<Vec<ClipInterval>>,
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn extract_audio(&self, media: &Path, audio: &Path) -> MediaResult<()> {
        if !media.exists() {
            return Err(MediaError::FileNotFound(media.to_path_buf()));
        }
        std::fs::write(audio, b"audio")?;
        Ok(())
    }

    async fn cut_media(&self, input: &Path, output: &Path, interval: ClipInterval) -> MediaResult<()> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        self.cuts.lock().unwrap().push(interval);
        std::fs::write(output, format!("video {}-{}", interval.onset(), interval.offset()))?;
        Ok(())
    }

    async fn cut_audio(&self, input: &Path, output: &Path, interval: ClipInterval) -> MediaResult<()> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        std::fs::write(output, format!("audio {}-{}", interval.onset(), interval.offset()))?;
        Ok(())
    }
}

/// Classifier returning fixed 10 second chunks.
pub struct FixedClassifier {
    pub logits: Vec<f64>,
    pub calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(logits: Vec<f64>) -> Self {
        Self {
            logits,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MusicClassifier for FixedClassifier {
    async fn classify(&self, _audio: &Path, _output_dir: &Path) -> MediaResult<Vec<MusicFrame>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .logits
            .iter()
            .enumerate()
            .map(|(i, &music_logit)| MusicFrame {
                onset: i as f64 * 10.0,
                offset: (i + 1) as f64 * 10.0,
                music_logit,
            })
            .collect())
    }
}

pub fn test_config(root: &Path, workers: usize) -> HarvestConfig {
    HarvestConfig {
        work_dir: root.join("downloads"),
        log_dir: root.join("logs"),
        cookies_dir: root.join("cookies"),
        workers,
        jitter_min: Duration::ZERO,
        jitter_max: Duration::ZERO,
        ..HarvestConfig::default()
    }
}

pub fn credentials(names: &[&str]) -> Arc<CredentialPool> {
    Arc::new(CredentialPool::new(names.iter().map(PathBuf::from).collect()))
}

pub struct Harness {
    pub config: HarvestConfig,
    pub store: Arc<InMemoryStore>,
    pub downloader: Arc<FakeDownloader>,
    pub transcoder: Arc<FakeTranscoder>,
    pub credentials: Arc<CredentialPool>,
}

impl Harness {
    pub fn new(root: &Path, workers: usize, downloader: FakeDownloader, credentials: Arc<CredentialPool>) -> Self {
        Self {
            config: test_config(root, workers),
            store: Arc::new(InMemoryStore::default()),
            downloader: Arc::new(downloader),
            transcoder: Arc::new(FakeTranscoder::default()),
            credentials,
        }
    }

    pub fn harvester(&self, kind: CatalogKind) -> Harvester {
        Harvester::new(
            &self.config,
            kind,
            self.credentials.clone(),
            self.downloader.clone(),
            self.transcoder.clone(),
            RemoteStore::new(self.store.clone(), PREFIX),
        )
    }

    pub fn segmenting_harvester(&self, classifier: Arc<FixedClassifier>) -> Harvester {
        let cache = SegmentCache::new(self.config.segments_dir(), classifier, self.config.segmentation);
        self.harvester(CatalogKind::YouTube).with_segmenter(cache)
    }
}
