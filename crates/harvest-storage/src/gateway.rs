//! Folder-level relocation of staged clips.
//!
//! A clip lives remotely under `{prefix}/{clip_id}/`. The folder counts as
//! complete when it holds at least one object for every extension in
//! [`REQUIRED_EXTENSIONS`]; no manifest is written. Folders created by other
//! runs or other processes satisfy the same check.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use harvest_models::{ArtifactKind, REQUIRED_EXTENSIONS};
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Which remote objects a download should fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactFilter {
    #[default]
    All,
    Only(ArtifactKind),
}

impl ArtifactFilter {
    /// Parse a fetch mode: `all`, `mp4`, `mp3` or `json`.
    pub fn from_mode(mode: &str) -> Option<Self> {
        if mode.trim().eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        ArtifactKind::from_short_name(mode).map(Self::Only)
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(kind) => extension_of(key).as_deref() == Some(kind.extension()),
        }
    }
}

/// Result of [`RemoteStore::upload_folder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The remote folder was already complete; nothing was transferred.
    AlreadyComplete,
    /// Every local file was uploaded.
    Uploaded { files: usize },
    /// At least one file failed. The remaining files were still attempted.
    Partial { uploaded: usize, failed: Vec<String> },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Partial { .. })
    }
}

/// Result of [`RemoteStore::download_folder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub fetched: usize,
    pub failed: usize,
}

impl DownloadSummary {
    pub fn any_fetched(&self) -> bool {
        self.fetched > 0
    }
}

/// Remote Store Gateway over any [`ObjectStore`].
#[derive(Clone)]
pub struct RemoteStore {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl RemoteStore {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_matches('/').to_string();
        Self { store, prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `{prefix}/{clip_id}/`
    pub fn folder_prefix(&self, clip_id: &str) -> String {
        if self.prefix.is_empty() {
            format!("{}/", clip_id)
        } else {
            format!("{}/{}/", self.prefix, clip_id)
        }
    }

    /// `{prefix}/{clip_id}/{file_name}`
    pub fn object_key(&self, clip_id: &str, file_name: &str) -> String {
        format!("{}{}", self.folder_prefix(clip_id), file_name)
    }

    /// True when the remote folder holds every required extension.
    pub async fn exists_complete(&self, clip_id: &str) -> StorageResult<bool> {
        let objects = self.store.list_objects(&self.folder_prefix(clip_id)).await?;
        let present: HashSet<String> = objects.iter().filter_map(|o| extension_of(&o.key)).collect();
        Ok(REQUIRED_EXTENSIONS.iter().all(|ext| present.contains(*ext)))
    }

    /// Upload every file in `local_dir` under the clip's folder.
    ///
    /// Short-circuits without any transfer when the folder is already
    /// complete. A failing file does not stop the others.
    pub async fn upload_folder(&self, clip_id: &str, local_dir: &Path) -> StorageResult<UploadOutcome> {
        if !local_dir.is_dir() {
            return Err(StorageError::LocalFolderMissing(local_dir.to_path_buf()));
        }

        if self.exists_complete(clip_id).await? {
            info!(clip_id = %clip_id, "Remote folder already complete, skipping upload");
            return Ok(UploadOutcome::AlreadyComplete);
        }

        let files = local_files(local_dir).await?;
        let mut uploaded = 0;
        let mut failed = Vec::new();

        for path in files {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            let key = self.object_key(clip_id, &name);
            match self.store.upload_file(&path, &key).await {
                Ok(()) => uploaded += 1,
                Err(e) => {
                    warn!(clip_id = %clip_id, key = %key, error = %e, "Upload failed");
                    failed.push(name);
                }
            }
        }

        if failed.is_empty() {
            info!(clip_id = %clip_id, files = uploaded, "Uploaded clip folder");
            Ok(UploadOutcome::Uploaded { files: uploaded })
        } else {
            Ok(UploadOutcome::Partial { uploaded, failed })
        }
    }

    /// Download the clip's folder into `{local_root}/{clip_id}/`.
    pub async fn download_folder(
        &self,
        clip_id: &str,
        local_root: &Path,
        filter: ArtifactFilter,
    ) -> StorageResult<DownloadSummary> {
        let dest = local_root.join(clip_id);
        tokio::fs::create_dir_all(&dest).await?;

        let folder = self.folder_prefix(clip_id);
        let objects = self.store.list_objects(&folder).await?;
        let mut summary = DownloadSummary::default();

        for object in objects {
            if object.key.ends_with('/') || !filter.matches(&object.key) {
                continue;
            }
            let relative = object.key.strip_prefix(&folder).unwrap_or(&object.key);
            let Some(name) = relative.rsplit('/').next().filter(|n| !n.is_empty()) else {
                continue;
            };

            match self.store.download_file(&object.key, &dest.join(name)).await {
                Ok(()) => summary.fetched += 1,
                Err(e) => {
                    warn!(clip_id = %clip_id, key = %object.key, error = %e, "Download failed");
                    summary.failed += 1;
                }
            }
        }

        debug!(clip_id = %clip_id, fetched = summary.fetched, failed = summary.failed, "Folder download finished");
        Ok(summary)
    }

    /// Sorted, de-duplicated clip ids found under the prefix.
    pub async fn list_clip_ids(&self) -> StorageResult<Vec<String>> {
        let root = if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        };

        let objects = self.store.list_objects(&root).await?;
        let ids: BTreeSet<String> = objects
            .iter()
            .filter_map(|o| o.key.strip_prefix(&root))
            .filter_map(|rest| rest.split_once('/').map(|(id, _)| id))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();

        Ok(ids.into_iter().collect())
    }
}

/// Lowercased extension of a key, with its leading dot.
pub fn extension_of(key: &str) -> Option<String> {
    let name = key.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

async fn local_files(dir: &Path) -> StorageResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ObjectInfo;
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::*;

    mock! {
        pub Store {}

        #[async_trait]
        impl ObjectStore for Store {
            async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;
            async fn upload_file(&self, path: &Path, key: &str) -> StorageResult<()>;
            async fn download_file(&self, key: &str, path: &Path) -> StorageResult<()>;
        }
    }

    fn objects(keys: &[&str]) -> Vec<ObjectInfo> {
        keys.iter().map(|k| ObjectInfo::new(*k, 1)).collect()
    }

    fn staged_dir(clip_id: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for kind in ArtifactKind::ALL {
            std::fs::write(dir.path().join(kind.file_name(clip_id)), b"x").unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_exists_complete_ignores_extra_files() {
        let mut store = MockStore::new();
        store
            .expect_list_objects()
            .with(eq("clips/abc/"))
            .returning(|_| {
                Ok(objects(&[
                    "clips/abc/abc_video.mp4",
                    "clips/abc/abc_audio.MP3",
                    "clips/abc/abc_metadata.json",
                    "clips/abc/notes.txt",
                    "clips/abc/",
                ]))
            });

        let gateway = RemoteStore::new(Arc::new(store), "clips/");
        assert!(gateway.exists_complete("abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_complete_requires_every_extension() {
        let mut store = MockStore::new();
        store
            .expect_list_objects()
            .returning(|_| Ok(objects(&["clips/abc/abc_video.mp4", "clips/abc/abc_metadata.json"])));

        let gateway = RemoteStore::new(Arc::new(store), "clips");
        assert!(!gateway.exists_complete("abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_second_upload_of_complete_folder_transfers_nothing() {
        let dir = staged_dir("abc");
        let mut store = MockStore::new();
        let mut seq = mockall::Sequence::new();

        store
            .expect_list_objects()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Vec::new()));
        store.expect_upload_file().times(3).returning(|_, _| Ok(()));
        store
            .expect_list_objects()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(objects(&[
                    "clips/abc/abc_video.mp4",
                    "clips/abc/abc_audio.mp3",
                    "clips/abc/abc_metadata.json",
                ]))
            });

        let gateway = RemoteStore::new(Arc::new(store), "clips");
        let first = gateway.upload_folder("abc", dir.path()).await.unwrap();
        assert_eq!(first, UploadOutcome::Uploaded { files: 3 });

        let second = gateway.upload_folder("abc", dir.path()).await.unwrap();
        assert_eq!(second, UploadOutcome::AlreadyComplete);
        assert!(second.is_success());
    }

    #[tokio::test]
    async fn test_partial_failure_still_attempts_every_file() {
        let dir = staged_dir("abc");
        let mut store = MockStore::new();
        store.expect_list_objects().returning(|_| Ok(Vec::new()));
        store.expect_upload_file().times(3).returning(|_, key: &str| {
            if key.ends_with(".mp3") {
                Err(StorageError::upload_failed("connection reset"))
            } else {
                Ok(())
            }
        });

        let gateway = RemoteStore::new(Arc::new(store), "clips");
        let outcome = gateway.upload_folder("abc", dir.path()).await.unwrap();
        assert_eq!(
            outcome,
            UploadOutcome::Partial {
                uploaded: 2,
                failed: vec!["abc_audio.mp3".to_string()]
            }
        );
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_upload_keys_follow_folder_layout() {
        let dir = staged_dir("abc");
        let mut store = MockStore::new();
        store.expect_list_objects().returning(|_| Ok(Vec::new()));
        store
            .expect_upload_file()
            .withf(|_, key| key.starts_with("clips/abc/abc_"))
            .times(3)
            .returning(|_, _| Ok(()));

        let gateway = RemoteStore::new(Arc::new(store), "clips");
        gateway.upload_folder("abc", dir.path()).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_missing_folder_is_error() {
        let store = MockStore::new();
        let gateway = RemoteStore::new(Arc::new(store), "clips");
        let err = gateway
            .upload_folder("abc", Path::new("/definitely/not/here"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::LocalFolderMissing(_)));
    }

    #[tokio::test]
    async fn test_download_filter_and_directory_markers() {
        let dest = tempfile::tempdir().unwrap();
        let mut store = MockStore::new();
        store.expect_list_objects().returning(|_| {
            Ok(objects(&[
                "clips/abc/",
                "clips/abc/abc_video.mp4",
                "clips/abc/abc_audio.mp3",
                "clips/abc/abc_metadata.json",
            ]))
        });
        let expected = dest.path().join("abc").join("abc_audio.mp3");
        store
            .expect_download_file()
            .withf(move |key, path| key == "clips/abc/abc_audio.mp3" && path == expected)
            .times(1)
            .returning(|_, _| Ok(()));

        let gateway = RemoteStore::new(Arc::new(store), "clips");
        let summary = gateway
            .download_folder("abc", dest.path(), ArtifactFilter::from_mode("mp3").unwrap())
            .await
            .unwrap();

        assert_eq!(summary, DownloadSummary { fetched: 1, failed: 0 });
        assert!(dest.path().join("abc").is_dir());
    }

    #[tokio::test]
    async fn test_download_counts_failures() {
        let dest = tempfile::tempdir().unwrap();
        let mut store = MockStore::new();
        store
            .expect_list_objects()
            .returning(|_| Ok(objects(&["clips/abc/abc_video.mp4", "clips/abc/abc_audio.mp3"])));
        store.expect_download_file().times(2).returning(|key: &str, _| {
            if key.ends_with(".mp4") {
                Err(StorageError::download_failed("timeout"))
            } else {
                Ok(())
            }
        });

        let gateway = RemoteStore::new(Arc::new(store), "clips");
        let summary = gateway
            .download_folder("abc", dest.path(), ArtifactFilter::All)
            .await
            .unwrap();
        assert_eq!(summary, DownloadSummary { fetched: 1, failed: 1 });
        assert!(summary.any_fetched());
    }

    #[tokio::test]
    async fn test_list_clip_ids_sorted_and_unique() {
        let mut store = MockStore::new();
        store.expect_list_objects().with(eq("clips/")).returning(|_| {
            Ok(objects(&[
                "clips/b/b_video.mp4",
                "clips/a/a_video.mp4",
                "clips/b/b_audio.mp3",
                "clips/stray.txt",
            ]))
        });

        let gateway = RemoteStore::new(Arc::new(store), "clips");
        assert_eq!(gateway.list_clip_ids().await.unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("p/a/a_video.MP4").as_deref(), Some(".mp4"));
        assert_eq!(extension_of("p/a.b/README"), None);
        assert_eq!(extension_of("p/a/"), None);
        assert_eq!(ArtifactFilter::from_mode("ALL"), Some(ArtifactFilter::All));
        assert_eq!(ArtifactFilter::from_mode("wav"), None);
    }
}
