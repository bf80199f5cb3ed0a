//! Local filesystem implementation of the AssetStore trait

use super::etag::{compute_etag, ValidatorCache};
use super::range::ByteRange;
use super::{conditional, AssetError, AssetReader, AssetStore, VideoAsset};
use std::fs;
use std::io::{self, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

/// Longest single path segment (bytes) that can name a file
const MAX_SEGMENT_LEN: usize = 255;

/// Serves files from a single public root directory
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
    validators: Arc<ValidatorCache>,
}

impl LocalAssetStore {
    /// Create a new local asset store
    ///
    /// The root will be created if it doesn't exist. It is canonicalized once
    /// here so containment checks compare like with like.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, AssetError> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let root = fs::canonicalize(root)?;
        info!("Initialized LocalAssetStore at {:?}", root);
        Ok(Self {
            root,
            validators: Arc::new(ValidatorCache::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of cached validators
    pub fn cached_validators(&self) -> usize {
        self.validators.len()
    }

    /// Map a logical path to a canonical file path under the root.
    ///
    /// Only plain segments are accepted; `..`, `.`, absolute paths and
    /// prefixes are rejected before touching the filesystem. After
    /// canonicalization the result must still lie under the root, which
    /// catches symlinks pointing outside it.
    fn resolve_path(&self, logical_path: &str) -> Result<(String, PathBuf), AssetError> {
        if logical_path.is_empty() || logical_path.contains('\0') || logical_path.contains('\\') {
            return Err(AssetError::BadPath(logical_path.to_string()));
        }

        let mut segments = Vec::new();
        for component in Path::new(logical_path).components() {
            match component {
                Component::Normal(segment) => match segment.to_str() {
                    Some(segment) => segments.push(segment),
                    None => return Err(AssetError::BadPath(logical_path.to_string())),
                },
                _ => return Err(AssetError::BadPath(logical_path.to_string())),
            }
        }
        if segments.is_empty() {
            return Err(AssetError::BadPath(logical_path.to_string()));
        }

        let normalized = segments.join("/");
        // No filesystem we serve from accepts longer names; such a path names no file
        if segments.iter().any(|segment| segment.len() > MAX_SEGMENT_LEN) {
            return Err(AssetError::NotFound(normalized));
        }
        let candidate = segments.iter().fold(self.root.clone(), |path, segment| path.join(segment));
        let canonical = match fs::canonicalize(&candidate) {
            Ok(path) => path,
            // A file used as a directory is just another missing path
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                return Err(AssetError::NotFound(normalized));
            }
            Err(e) => return Err(e.into()),
        };

        if !canonical.starts_with(&self.root) {
            warn!("🚫 Path {:?} resolves outside the public root", logical_path);
            return Err(AssetError::BadPath(logical_path.to_string()));
        }

        Ok((normalized, canonical))
    }

    fn stat_blocking(&self, logical_path: &str) -> Result<VideoAsset, AssetError> {
        let (logical_path, absolute_path) = self.resolve_path(logical_path)?;

        let metadata = fs::metadata(&absolute_path)?;
        if !metadata.is_file() {
            return Err(AssetError::NotFound(logical_path));
        }
        let size = metadata.len();
        let modified = metadata.modified().unwrap_or_else(|e| {
            warn!("No modification time for {:?}, using now: {}", absolute_path, e);
            SystemTime::now()
        });

        let etag = match self.validators.get(&absolute_path, &logical_path, modified, size) {
            Some(etag) => etag,
            None => {
                debug!("Hashing {:?} ({} bytes)", absolute_path, size);
                let etag = compute_etag(&absolute_path, &logical_path)?;
                self.validators
                    .insert(&absolute_path, &logical_path, modified, size, &etag);
                etag
            }
        };

        Ok(VideoAsset {
            logical_path,
            absolute_path,
            size,
            etag,
            last_modified: conditional::truncate_to_seconds(modified),
        })
    }
}

#[async_trait::async_trait]
impl AssetStore for LocalAssetStore {
    async fn stat(&self, logical_path: &str) -> Result<VideoAsset, AssetError> {
        // Canonicalization and hashing are blocking filesystem work
        let store = self.clone();
        let logical_path = logical_path.to_string();

        tokio::task::spawn_blocking(move || store.stat_blocking(&logical_path)).await?
    }

    async fn open(&self, asset: &VideoAsset, range: Option<ByteRange>) -> Result<AssetReader, AssetError> {
        let mut file = tokio::fs::File::open(&asset.absolute_path).await?;
        match range {
            Some(range) => {
                file.seek(SeekFrom::Start(range.start)).await?;
                Ok(Box::new(file.take(range.len())))
            }
            // Never send more than the advertised Content-Length
            None => Ok(Box::new(file.take(asset.size))),
        }
    }

    fn storage_type(&self) -> &str {
        "local"
    }
}
