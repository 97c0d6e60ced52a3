//! Cookie credential pool.
//!
//! Credentials are cookie files discovered once at startup. Every worker
//! draws from the same pool; the current credential stays in use until a
//! download fails with an authentication signature, at which point it is
//! evicted for the rest of the run and the rotation index moves on. The
//! available set only shrinks. When it is empty, [`CredentialPool::acquire`]
//! returns [`WorkerError::CredentialsExhausted`], which stops the run.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use harvest_media::is_valid_netscape_cookies;
use tracing::{info, warn};

use crate::error::{classify_download_error, FailureClass, WorkerError, WorkerResult};

/// Handle to one credential, returned by [`CredentialPool::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    index: usize,
    path: PathBuf,
}

impl Credential {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug)]
struct PoolState {
    files: Vec<PathBuf>,
    evicted: Vec<bool>,
    cursor: usize,
}

impl PoolState {
    fn next_available(&self) -> Option<usize> {
        let len = self.files.len();
        (0..len)
            .map(|offset| (self.cursor + offset) % len)
            .find(|&i| !self.evicted[i])
    }
}

/// Shared, mutex-guarded set of credentials.
#[derive(Debug)]
pub struct CredentialPool {
    state: Mutex<PoolState>,
}

impl CredentialPool {
    pub fn new(files: Vec<PathBuf>) -> Self {
        let evicted = vec![false; files.len()];
        Self {
            state: Mutex::new(PoolState {
                files,
                evicted,
                cursor: 0,
            }),
        }
    }

    /// Load every valid `*.txt` cookie jar in `dir`, in file name order.
    pub fn discover(dir: &Path) -> WorkerResult<Self> {
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        candidates.sort();

        let mut files = Vec::with_capacity(candidates.len());
        for path in candidates {
            match std::fs::read_to_string(&path) {
                Ok(content) if is_valid_netscape_cookies(&content) => files.push(path),
                Ok(_) => warn!(path = %path.display(), "Skipping file that is not a Netscape cookie jar"),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable cookie file"),
            }
        }

        info!(dir = %dir.display(), count = files.len(), "Discovered credentials");
        Ok(Self::new(files))
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The current credential: the first available one at or after the
    /// rotation index.
    pub fn acquire(&self) -> WorkerResult<Credential> {
        let mut state = self.lock();
        let index = state.next_available().ok_or(WorkerError::CredentialsExhausted)?;
        state.cursor = index;
        Ok(Credential {
            index,
            path: state.files[index].clone(),
        })
    }

    /// Feed a download error back to the pool.
    ///
    /// Only authentication failures evict. Evicting an already evicted
    /// credential is a no-op.
    pub fn report_failure(&self, credential: &Credential, error_text: &str) -> FailureClass {
        let class = classify_download_error(error_text);
        if class != FailureClass::Authentication {
            return class;
        }

        let mut state = self.lock();
        let Some(evicted) = state.evicted.get_mut(credential.index) else {
            return class;
        };
        if *evicted {
            return class;
        }
        *evicted = true;

        if state.cursor == credential.index && !state.files.is_empty() {
            state.cursor = (credential.index + 1) % state.files.len();
        }

        let remaining = state.evicted.iter().filter(|e| !**e).count();
        warn!(
            credential = %credential.path.display(),
            remaining,
            "Evicted credential after authentication failure"
        );
        class
    }

    /// Current rotation index.
    pub fn rotation_index(&self) -> usize {
        self.lock().cursor
    }

    /// Paths of credentials still available.
    pub fn available(&self) -> Vec<PathBuf> {
        let state = self.lock();
        state
            .files
            .iter()
            .zip(&state.evicted)
            .filter(|(_, evicted)| !**evicted)
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn available_count(&self) -> usize {
        self.lock().evicted.iter().filter(|e| !**e).count()
    }

    /// Total credentials discovered, evicted ones included.
    pub fn len(&self) -> usize {
        self.lock().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(names: &[&str]) -> CredentialPool {
        CredentialPool::new(names.iter().map(PathBuf::from).collect())
    }

    #[test]
    fn test_acquire_is_sticky_until_failure() {
        let pool = pool(&["a.txt", "b.txt"]);
        assert_eq!(pool.acquire().unwrap().path(), Path::new("a.txt"));
        assert_eq!(pool.acquire().unwrap().path(), Path::new("a.txt"));
        assert_eq!(pool.rotation_index(), 0);
    }

    #[test]
    fn test_eviction_is_monotonic_and_idempotent() {
        let pool = pool(&["A", "B", "C"]);
        let b = Credential {
            index: 1,
            path: PathBuf::from("B"),
        };

        pool.report_failure(&b, "HTTP Error 429: Too Many Requests");
        assert_eq!(pool.available(), vec![PathBuf::from("A"), PathBuf::from("C")]);

        pool.report_failure(&b, "rate-limited");
        assert_eq!(pool.available(), vec![PathBuf::from("A"), PathBuf::from("C")]);
        assert_eq!(pool.available_count(), 2);
    }

    #[test]
    fn test_content_error_does_not_evict() {
        let pool = pool(&["a.txt"]);
        let cred = pool.acquire().unwrap();
        let class = pool.report_failure(&cred, "ERROR: Video unavailable");
        assert_eq!(class, FailureClass::Content);
        assert_eq!(pool.available_count(), 1);
    }

    #[test]
    fn test_eviction_advances_rotation_index() {
        let pool = pool(&["a.txt", "b.txt", "c.txt"]);
        let first = pool.acquire().unwrap();
        pool.report_failure(&first, "Sign in to confirm you're not a bot");

        assert_eq!(pool.rotation_index(), 1);
        assert_eq!(pool.acquire().unwrap().path(), Path::new("b.txt"));
    }

    #[test]
    fn test_rotation_wraps_around() {
        let pool = pool(&["a.txt", "b.txt"]);
        let a = pool.acquire().unwrap();
        pool.report_failure(&a, "forbidden");
        let b = pool.acquire().unwrap();
        assert_eq!(b.index(), 1);
        pool.report_failure(&b, "forbidden");
        assert_eq!(pool.rotation_index(), 0);
        assert!(matches!(pool.acquire(), Err(WorkerError::CredentialsExhausted)));
    }

    #[test]
    fn test_empty_pool_is_exhausted() {
        let pool = pool(&[]);
        assert!(pool.is_empty());
        assert!(matches!(pool.acquire(), Err(WorkerError::CredentialsExhausted)));
    }

    #[test]
    fn test_discover_skips_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "# Netscape HTTP Cookie File\n").unwrap();
        std::fs::write(dir.path().join("a.txt"), "# Netscape HTTP Cookie File\n").unwrap();
        std::fs::write(dir.path().join("bad.txt"), "{\"not\": \"cookies\"}").unwrap();
        std::fs::write(dir.path().join("c.json"), "# Netscape HTTP Cookie File\n").unwrap();

        let pool = CredentialPool::discover(dir.path()).unwrap();
        let names: Vec<_> = pool
            .available()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }
}
