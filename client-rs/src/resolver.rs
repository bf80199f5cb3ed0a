//! URL Resolver
//!
//! Turns a logical filename and a strategy into a request URL carrying the
//! right cache-busting or cache-enabling signal. Resolution does no I/O and
//! never fails: a missing registry entry degrades to a fallback version,
//! unavailable session storage degrades to "no session id".

use crate::codec::VideoFormat;
use crate::params;
use crate::registry::{registry_key, VersionManifest, VersionRegistry};
use crate::session::{self, MemorySessionStorage, SessionStorage};
use crate::strategy::ResolveStrategy;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Characters escaped inside one path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Deployment environment, used by `auto` resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Hashed filenames in production, version parameters in development
    pub fn optimal_strategy(&self) -> ResolveStrategy {
        match self {
            Environment::Production => ResolveStrategy::Hash,
            Environment::Development => ResolveStrategy::Version,
        }
    }
}

/// Resolver configuration, fixed at construction
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Scheme + host prepended to every URL when set (e.g. a CDN origin)
    pub origin: Option<String>,
    /// Path under which the asset endpoint is mounted
    pub path_prefix: String,
    pub environment: Environment,
    /// Version used by `version`/`aggressive` when a file is unregistered
    pub fallback_version: String,
    /// Version used by `auto` when neither a registry entry nor a hash exists
    pub dev_version: String,
    /// Logical filename -> content-addressed filename
    pub hashes: HashMap<String, String>,
    /// Per-asset strategy applied when the caller asks for `auto`
    pub overrides: HashMap<String, ResolveStrategy>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            origin: None,
            path_prefix: "/api/videos".to_string(),
            environment: Environment::Development,
            fallback_version: "1.0.0".to_string(),
            dev_version: "dev".to_string(),
            hashes: HashMap::new(),
            overrides: HashMap::new(),
        }
    }
}

impl ResolverConfig {
    /// Config carrying the manifest's hash map
    pub fn from_manifest(manifest: &VersionManifest) -> Self {
        Self {
            hashes: manifest
                .hashes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_override(mut self, filename: &str, strategy: ResolveStrategy) -> Self {
        self.overrides.insert(registry_key(filename).to_string(), strategy);
        self
    }

    pub fn with_hash(mut self, filename: &str, hashed: &str) -> Self {
        self.hashes
            .insert(registry_key(filename).to_string(), hashed.to_string());
        self
    }
}

/// One resolved URL for one container format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedUrl {
    pub url: String,
    pub mime_type: String,
    pub format: VideoFormat,
    pub strategy: ResolveStrategy,
}

/// Builds request URLs from logical filenames
pub struct UrlResolver {
    config: ResolverConfig,
    registry: Arc<VersionRegistry>,
    session: Arc<dyn SessionStorage>,
}

impl std::fmt::Debug for UrlResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlResolver")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("session", &"<dyn SessionStorage>")
            .finish()
    }
}

impl UrlResolver {
    pub fn new(config: ResolverConfig, registry: Arc<VersionRegistry>) -> Self {
        Self::with_session_storage(config, registry, Arc::new(MemorySessionStorage::new()))
    }

    pub fn with_session_storage(
        config: ResolverConfig,
        registry: Arc<VersionRegistry>,
        session: Arc<dyn SessionStorage>,
    ) -> Self {
        Self {
            config,
            registry,
            session,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<VersionRegistry> {
        &self.registry
    }

    pub fn environment(&self) -> Environment {
        self.config.environment
    }

    /// Set one registry version; URLs already handed out keep their old `v`
    pub fn update_version(&self, filename: &str, version: &str) {
        self.registry.update_version(filename, version);
    }

    pub fn update_versions<I, K, V>(&self, versions: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.registry.update_versions(versions);
    }

    /// Resolve `filename` under `strategy` to a request URL
    pub fn resolve(&self, filename: &str, strategy: ResolveStrategy) -> String {
        let key = registry_key(filename);
        let url = match strategy {
            ResolveStrategy::Version => self.versioned(key, &self.version_or_fallback(key)),
            ResolveStrategy::Hash => match self.config.hashes.get(key) {
                Some(hashed) => self.path_for(hashed),
                None => self.versioned(key, &self.version_or_fallback(key)),
            },
            ResolveStrategy::Timestamp => self.with_query(key, &[(params::TIMESTAMP, now_millis())]),
            ResolveStrategy::Dynamic => self.with_query(
                key,
                &[
                    (params::TIMESTAMP, now_millis()),
                    (params::RANDOM, random_nonce()),
                    (params::CACHE, params::NO_STORE.to_string()),
                ],
            ),
            ResolveStrategy::Aggressive => {
                let mut query = vec![
                    (params::TIMESTAMP, now_millis()),
                    (params::RANDOM, random_nonce()),
                ];
                if let Some(sid) = session::session_id(self.session.as_ref()) {
                    query.push((params::SESSION_ID, sid));
                }
                query.push((params::CACHE, params::NO_STORE.to_string()));
                query.push((params::PRAGMA, params::NO_CACHE.to_string()));
                query.push((params::VERSION, self.version_or_fallback(key)));
                self.with_query(key, &query)
            }
            ResolveStrategy::Auto => return self.resolve_auto(key),
        };
        debug!("Resolved {} ({}) -> {}", key, strategy, url);
        url
    }

    /// Resolve each format of `base_name` in caller order
    pub fn resolve_multi_format(
        &self,
        base_name: &str,
        formats: &[VideoFormat],
        strategy: ResolveStrategy,
    ) -> Vec<ResolvedUrl> {
        formats
            .iter()
            .map(|&format| {
                let filename = format!("{}.{}", base_name, format.extension());
                ResolvedUrl {
                    url: self.resolve(&filename, strategy),
                    mime_type: format.base_mime().to_string(),
                    format,
                    strategy,
                }
            })
            .collect()
    }

    /// Version URL followed by hash URL, as alternative sources for one file
    pub fn fallback_sources(&self, filename: &str) -> Vec<ResolvedUrl> {
        let format = VideoFormat::from_filename(filename).unwrap_or(VideoFormat::Mp4);
        [ResolveStrategy::Version, ResolveStrategy::Hash]
            .into_iter()
            .map(|strategy| ResolvedUrl {
                url: self.resolve(filename, strategy),
                mime_type: format.base_mime().to_string(),
                format,
                strategy,
            })
            .collect()
    }

    fn resolve_auto(&self, key: &str) -> String {
        if let Some(strategy) = self
            .config
            .overrides
            .get(key)
            .copied()
            .filter(|s| *s != ResolveStrategy::Auto)
        {
            debug!("Using per-asset override {} for {}", strategy, key);
            return self.resolve(key, strategy);
        }
        if let Some(version) = self.registry.version_of(key) {
            return self.versioned(key, &version);
        }
        if self.config.environment == Environment::Production {
            if let Some(hashed) = self.config.hashes.get(key) {
                return self.path_for(hashed);
            }
        }
        self.versioned(key, &self.config.dev_version)
    }

    fn version_or_fallback(&self, key: &str) -> String {
        self.registry
            .version_of(key)
            .unwrap_or_else(|| self.config.fallback_version.clone())
    }

    fn versioned(&self, key: &str, version: &str) -> String {
        self.with_query(key, &[(params::VERSION, version.to_string())])
    }

    fn with_query(&self, key: &str, pairs: &[(&str, String)]) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in pairs {
            serializer.append_pair(name, value);
        }
        format!("{}?{}", self.path_for(key), serializer.finish())
    }

    fn path_for(&self, key: &str) -> String {
        let prefix = self.config.path_prefix.trim_end_matches('/');
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
            .collect();
        let path = format!("{}/{}", prefix, encoded.join("/"));
        match &self.config.origin {
            Some(origin) => format!("{}{}", origin.trim_end_matches('/'), path),
            None => path,
        }
    }
}

fn now_millis() -> String {
    Utc::now().timestamp_millis().to_string()
}

/// 72 random bits, Base64url encoded (12 characters)
fn random_nonce() -> String {
    let mut bytes = [0u8; 9];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
