//! The fabric's local content-addressed cache. The first attempt of every
//! request consults it (`useCache = true`); retries disable it (§4.4), so a
//! stale or corrupt cache entry can never wedge a request into permanent
//! failure.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

pub trait ContentCache: Send + Sync {
    fn get(&self, content_hash: &str) -> Option<Vec<u8>>;
    fn put(&self, content_hash: &str, bytes: &[u8]);
}

/// A plain directory of files named by content hash. Reads/writes are best
/// effort: a cache is an optimization, never a correctness requirement, so
/// I/O errors are logged and treated as a cache miss rather than propagated.
pub struct FsCache {
    dir: PathBuf,
    // Guards directory creation so concurrent tasks don't race `create_dir_all`.
    init: Mutex<bool>,
}

impl FsCache {
    pub fn new(dir: PathBuf) -> Self {
        FsCache {
            dir,
            init: Mutex::new(false),
        }
    }

    fn ensure_dir(&self) {
        let mut done = self.init.lock().unwrap();
        if !*done {
            if let Err(err) = fs::create_dir_all(&self.dir) {
                log::warn!("could not create cache dir {}: {err}", self.dir.display());
            }
            *done = true;
        }
    }

    fn path_for(&self, content_hash: &str) -> PathBuf {
        self.dir.join(content_hash)
    }
}

impl ContentCache for FsCache {
    fn get(&self, content_hash: &str) -> Option<Vec<u8>> {
        match fs::read(self.path_for(content_hash)) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                log::warn!("cache read failed for {content_hash}: {err}");
                None
            }
        }
    }

    fn put(&self, content_hash: &str, bytes: &[u8]) {
        self.ensure_dir();
        if let Err(err) = fs::write(self.path_for(content_hash), bytes) {
            log::warn!("cache write failed for {content_hash}: {err}");
        }
    }
}

/// Used when `--no-cache` (or an equivalent config) disables the cache
/// outright, and internally for the retry attempts that must bypass it.
pub struct NoCache;

impl ContentCache for NoCache {
    fn get(&self, _content_hash: &str) -> Option<Vec<u8>> {
        None
    }

    fn put(&self, _content_hash: &str, _bytes: &[u8]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_cache_round_trips() {
        let dir = std::env::temp_dir().join(format!("geocoder-cache-test-{}", std::process::id()));
        let cache = FsCache::new(dir.clone());
        cache.put("abc123", b"hello");
        assert_eq!(cache.get("abc123"), Some(b"hello".to_vec()));
        assert_eq!(cache.get("missing"), None);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn no_cache_never_hits() {
        let cache = NoCache;
        cache.put("abc123", b"hello");
        assert_eq!(cache.get("abc123"), None);
    }
}
