//! Version registry and its on-disk manifest
//!
//! The registry maps logical filenames (e.g. `airplane.mp4`) to semantic
//! versions. It is an explicit instance shared by reference with the
//! resolver; a deploy that changes the manifest is how versions roll forward.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info};

/// Error type for manifest operations
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Video \"{0}\" is not registered")]
    UnknownVideo(String),

    #[error("Video \"{name}\" already registered with version {version}")]
    DuplicateVideo { name: String, version: String },
}

/// Strip a single leading `/` so `/clip.mp4` and `clip.mp4` share an entry
pub(crate) fn registry_key(filename: &str) -> &str {
    filename.strip_prefix('/').unwrap_or(filename)
}

/// In-memory mapping from logical filename to semantic version
#[derive(Debug, Default)]
pub struct VersionRegistry {
    versions: RwLock<HashMap<String, String>>,
}

impl VersionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `(filename, version)` pairs
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let versions = entries
            .into_iter()
            .map(|(k, v)| {
                let key: String = k.into();
                (registry_key(&key).to_string(), v.into())
            })
            .collect();
        Self {
            versions: RwLock::new(versions),
        }
    }

    /// Return a new registry with one entry added or replaced
    pub fn with_version(self, filename: &str, version: &str) -> Self {
        self.update_version(filename, version);
        self
    }

    /// Return a new registry with every entry of `versions` merged in
    pub fn with_versions<I, K, V>(self, versions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.update_versions(versions);
        self
    }

    /// Registered version for `filename`, if any
    pub fn version_of(&self, filename: &str) -> Option<String> {
        self.versions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(registry_key(filename))
            .cloned()
    }

    /// Set the version of a single file; affects all later resolutions
    pub fn update_version(&self, filename: &str, version: &str) {
        let key = registry_key(filename).to_string();
        debug!("Registry update: {} -> {}", key, version);
        self.versions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key, version.to_string());
    }

    /// Merge a batch of versions in one write
    pub fn update_versions<I, K, V>(&self, versions: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut guard = self
            .versions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut count = 0usize;
        for (filename, version) in versions {
            guard.insert(registry_key(filename.as_ref()).to_string(), version.into());
            count += 1;
        }
        debug!("Registry bulk update: {} entries", count);
    }

    pub fn len(&self) -> usize {
        self.versions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bump the patch component of a dotted version.
///
/// Missing or non-numeric components default to `1.0.0` shape.
pub fn increment_version(version: &str) -> String {
    let mut parts = version.split('.');
    let major = parts.next().filter(|s| !s.is_empty()).unwrap_or("1");
    let minor = parts.next().filter(|s| !s.is_empty()).unwrap_or("0");
    let patch = parts
        .next()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    format!("{}.{}.{}", major, minor, patch)
}

/// Content-addressed filename: `<stem>-<first 8 hex of sha256>.<ext>`
pub fn content_hashed_name(filename: &str, data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = format!("{:x}", hasher.finalize());
    let short = &digest[..8];

    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, short, ext),
        _ => format!("{}-{}", filename, short),
    }
}

/// JSON document holding registry versions and content-hash filenames
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionManifest {
    #[serde(default)]
    pub versions: BTreeMap<String, String>,
    #[serde(default)]
    pub hashes: BTreeMap<String, String>,
}

impl VersionManifest {
    /// The catalogue the site ships with
    pub fn builtin() -> Self {
        let versions = [
            ("airplane.mp4", "1.2.3"),
            ("globe.mp4", "1.1.0"),
            ("flower.mp4", "1.0.5"),
            ("baloon.mp4", "1.0.2"),
        ];
        let hashes = [
            ("airplane.mp4", "airplane-abc123.mp4"),
            ("globe.mp4", "globe-def456.mp4"),
            ("flower.mp4", "flower-ghi789.mp4"),
            ("baloon.mp4", "baloon-jkl012.mp4"),
        ];
        Self {
            versions: versions
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            hashes: hashes
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let raw = fs::read_to_string(path.as_ref())?;
        let manifest = serde_json::from_str(&raw)?;
        debug!("Loaded version manifest from {:?}", path.as_ref());
        Ok(manifest)
    }

    /// Write atomically via a temporary sibling file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ManifestError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, serde_json::to_string_pretty(self)?)?;
        fs::rename(&temp_path, path)?;
        info!("Saved version manifest to {:?}", path);
        Ok(())
    }

    pub fn registry(&self) -> VersionRegistry {
        VersionRegistry::from_entries(self.versions.clone())
    }

    /// Replace the version of a registered video, returning the old one
    pub fn set_version(&mut self, video: &str, version: &str) -> Result<String, ManifestError> {
        let entry = self
            .versions
            .get_mut(registry_key(video))
            .ok_or_else(|| ManifestError::UnknownVideo(video.to_string()))?;
        Ok(std::mem::replace(entry, version.to_string()))
    }

    /// Register a new video
    pub fn add_video(&mut self, video: &str, version: &str) -> Result<(), ManifestError> {
        let key = registry_key(video);
        if let Some(existing) = self.versions.get(key) {
            return Err(ManifestError::DuplicateVideo {
                name: key.to_string(),
                version: existing.clone(),
            });
        }
        self.versions.insert(key.to_string(), version.to_string());
        Ok(())
    }

    /// Patch-bump every version; returns `(video, old, new)` per entry
    pub fn increment_all(&mut self) -> Vec<(String, String, String)> {
        self.versions
            .iter_mut()
            .map(|(video, version)| {
                let bumped = increment_version(version);
                let old = std::mem::replace(version, bumped.clone());
                (video.clone(), old, bumped)
            })
            .collect()
    }

    /// Recompute content-hash filenames for every registered video found
    /// under `public_dir`; returns the videos that were hashed
    pub fn generate_hashes<P: AsRef<Path>>(&mut self, public_dir: P) -> Result<Vec<String>, ManifestError> {
        let mut hashed = Vec::new();
        for video in self.versions.keys() {
            let path = public_dir.as_ref().join(video);
            if !path.is_file() {
                debug!("Skipping hash for missing file {:?}", path);
                continue;
            }
            let data = fs::read(&path)?;
            self.hashes.insert(video.clone(), content_hashed_name(video, &data));
            hashed.push(video.clone());
        }
        Ok(hashed)
    }
}
