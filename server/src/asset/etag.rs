//! Strong validators for video assets
//!
//! The ETag is SHA-256 over the file content followed by the logical path,
//! so byte-identical files at different paths get distinct tags. Hashing
//! streams the file; results are cached per (path, logical path) and reused
//! while mtime and size are unchanged.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

/// Hash `reader` then `logical_path`, returning a quoted hex ETag
pub fn etag_from_reader<R: Read>(mut reader: R, logical_path: &str) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    hasher.update(logical_path.as_bytes());
    Ok(format!("\"{:x}\"", hasher.finalize()))
}

/// Compute the ETag of the file at `path` served as `logical_path`
pub fn compute_etag(path: &Path, logical_path: &str) -> io::Result<String> {
    let file = File::open(path)?;
    etag_from_reader(io::BufReader::new(file), logical_path)
}

#[derive(Debug, Clone)]
struct CachedValidator {
    modified: SystemTime,
    size: u64,
    etag: String,
}

/// Validators keyed by (absolute path, logical path)
#[derive(Debug, Default)]
pub struct ValidatorCache {
    entries: Mutex<HashMap<(PathBuf, String), CachedValidator>>,
}

impl ValidatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached ETag, if the file still has the recorded mtime and size
    pub fn get(&self, path: &Path, logical_path: &str, modified: SystemTime, size: u64) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries
            .get(&(path.to_path_buf(), logical_path.to_string()))
            .filter(|cached| cached.modified == modified && cached.size == size)
            .map(|cached| cached.etag.clone())
    }

    pub fn insert(&self, path: &Path, logical_path: &str, modified: SystemTime, size: u64, etag: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.insert(
            (path.to_path_buf(), logical_path.to_string()),
            CachedValidator {
                modified,
                size,
                etag: etag.to_string(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_etag_deterministic() {
        let a = etag_from_reader(&b"video bytes"[..], "clip.mp4").unwrap();
        let b = etag_from_reader(&b"video bytes"[..], "clip.mp4").unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with('"') && a.ends_with('"'));
        assert_eq!(a.len(), 64 + 2);
    }

    #[test]
    fn test_etag_depends_on_logical_path() {
        let a = etag_from_reader(&b"video bytes"[..], "a/clip.mp4").unwrap();
        let b = etag_from_reader(&b"video bytes"[..], "b/clip.mp4").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_etag_depends_on_content() {
        let a = etag_from_reader(&b"one"[..], "clip.mp4").unwrap();
        let b = etag_from_reader(&b"two"[..], "clip.mp4").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_cache_invalidated_by_mtime_or_size() {
        let cache = ValidatorCache::new();
        let path = Path::new("/public/clip.mp4");
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        cache.insert(path, "clip.mp4", mtime, 10, "\"abc\"");
        assert_eq!(cache.get(path, "clip.mp4", mtime, 10).as_deref(), Some("\"abc\""));
        assert_eq!(cache.get(path, "clip.mp4", mtime, 11), None);
        assert_eq!(cache.get(path, "clip.mp4", mtime + Duration::from_secs(1), 10), None);
        assert_eq!(cache.get(path, "other.mp4", mtime, 10), None);
        assert_eq!(cache.len(), 1);
    }
}
