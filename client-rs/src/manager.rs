//! Video Manager
//!
//! Resolves a logical video id into a browser-appropriate set of sources,
//! caches the result, and coalesces concurrent resolutions so that at most
//! one is outstanding per cache key. Every caller of a coalesced load
//! observes the same outcome.

use crate::codec::{self, CodecProbe, PlaybackSupport, VideoFormat};
use crate::element::{ElementAttributes, InMemoryElement, MediaDocument, MediaElement};
use crate::resolver::UrlResolver;
use crate::strategy::{Preload, ResolveStrategy};
use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture, FutureExt, Shared, WeakShared};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Error type for video loads
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Load cancelled")]
    Cancelled,

    #[error("Invalid video id: {0:?}")]
    InvalidVideoId(String),
}

/// One `<source>` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSource {
    pub src: String,
    /// Codec-qualified MIME type
    pub mime_type: String,
    pub format: VideoFormat,
    pub strategy: ResolveStrategy,
    pub support: PlaybackSupport,
}

/// A cached resolution, ordered by codec preference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSources {
    pub video_id: String,
    pub strategy: ResolveStrategy,
    pub sources: Vec<VideoSource>,
    pub generated_at: DateTime<Utc>,
}

/// Manager-wide defaults
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Version tag mixed into cache keys of registry-dependent strategies
    pub version: String,
    /// `None` picks the resolver environment's optimal strategy
    pub strategy: Option<ResolveStrategy>,
    /// Preferred formats, in order
    pub formats: Vec<VideoFormat>,
    pub preload: Preload,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            strategy: None,
            formats: vec![VideoFormat::Webm, VideoFormat::Mp4],
            preload: Preload::Metadata,
        }
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub strategy: Option<ResolveStrategy>,
    pub force_refresh: bool,
    pub formats: Option<Vec<VideoFormat>>,
    pub poster: Option<String>,
    pub preload: Option<Preload>,
}

impl LoadOptions {
    pub fn with_strategy(strategy: ResolveStrategy) -> Self {
        Self {
            strategy: Some(strategy),
            ..Self::default()
        }
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub cache_size: usize,
    pub in_flight: usize,
    pub current_version: String,
    pub strategy: ResolveStrategy,
}

/// Outcome of a batch preload
#[derive(Debug, Clone)]
pub struct PreloadReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<(String, Result<Arc<ResolvedSources>, LoadError>)>,
}

type LoadResult = Result<Arc<ResolvedSources>, LoadError>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    video_id: String,
    /// Only set for registry-dependent strategies
    version: Option<String>,
    strategy: ResolveStrategy,
}

struct ManagerState {
    version: String,
    /// Bumped on every invalidation; loads started earlier must not repopulate
    generation: u64,
    cache: HashMap<CacheKey, Arc<ResolvedSources>>,
    /// Weak so that a load abandoned by every caller is not pinned here
    in_flight: HashMap<CacheKey, WeakShared<BoxFuture<'static, LoadResult>>>,
}

impl ManagerState {
    fn key_for(&self, video_id: &str, strategy: ResolveStrategy) -> CacheKey {
        CacheKey {
            video_id: video_id.to_string(),
            version: strategy
                .is_registry_dependent()
                .then(|| self.version.clone()),
            strategy,
        }
    }

    fn live_in_flight(&self, key: &CacheKey) -> Option<SharedLoad> {
        self.in_flight.get(key).and_then(WeakShared::upgrade)
    }
}

/// Client-side video cache and codec negotiator
pub struct VideoManager {
    resolver: Arc<UrlResolver>,
    probe: Arc<dyn CodecProbe>,
    default_strategy: ResolveStrategy,
    formats: Vec<VideoFormat>,
    preload: Preload,
    state: Mutex<ManagerState>,
}

impl std::fmt::Debug for VideoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoManager")
            .field("resolver", &self.resolver)
            .field("probe", &"<dyn CodecProbe>")
            .field("default_strategy", &self.default_strategy)
            .field("formats", &self.formats)
            .field("preload", &self.preload)
            .finish()
    }
}

impl VideoManager {
    pub fn new(resolver: Arc<UrlResolver>, probe: Arc<dyn CodecProbe>, options: ManagerOptions) -> Self {
        let default_strategy = options
            .strategy
            .unwrap_or_else(|| resolver.environment().optimal_strategy());
        info!(
            "🎬 VideoManager initialized: version={}, strategy={}",
            options.version, default_strategy
        );
        Self {
            resolver,
            probe,
            default_strategy,
            formats: options.formats,
            preload: options.preload,
            state: Mutex::new(ManagerState {
                version: options.version,
                generation: 0,
                cache: HashMap::new(),
                in_flight: HashMap::new(),
            }),
        }
    }

    pub fn resolver(&self) -> &Arc<UrlResolver> {
        &self.resolver
    }

    pub fn default_strategy(&self) -> ResolveStrategy {
        self.default_strategy
    }

    fn lock_state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve `video_id` and attach the sources to `element`
    pub async fn load_video(
        &self,
        video_id: &str,
        element: &dyn MediaElement,
        options: LoadOptions,
    ) -> LoadResult {
        let resolved = self.resolve_sources(video_id, &options).await?;
        self.apply_video_sources(element, &resolved, options.poster.as_deref(), options.preload);
        Ok(resolved)
    }

    /// `load_video` that gives up with `LoadError::Cancelled` once `token` fires
    pub async fn load_video_cancellable(
        &self,
        video_id: &str,
        element: &dyn MediaElement,
        options: LoadOptions,
        token: &CancellationToken,
    ) -> LoadResult {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Load of {} cancelled", video_id);
                Err(LoadError::Cancelled)
            }
            result = self.load_video(video_id, element, options) => result,
        }
    }

    /// Load, retrying up to `max_retries` times with `fallback` on failure
    pub async fn load_video_with_retry(
        &self,
        video_id: &str,
        element: &dyn MediaElement,
        options: LoadOptions,
        fallback: ResolveStrategy,
        max_retries: usize,
    ) -> LoadResult {
        let mut last_error = match self.load_video(video_id, element, options.clone()).await {
            Ok(resolved) => return Ok(resolved),
            Err(e) => e,
        };
        for attempt in 1..=max_retries {
            if last_error == LoadError::Cancelled {
                break;
            }
            warn!(
                "Retrying load of {} ({}/{}) with {}",
                video_id, attempt, max_retries, fallback
            );
            let retry = LoadOptions {
                strategy: Some(fallback),
                force_refresh: true,
                ..options.clone()
            };
            match self.load_video(video_id, element, retry).await {
                Ok(resolved) => return Ok(resolved),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    /// Populate the cache without touching any element
    pub async fn preload_video(&self, video_id: &str, options: LoadOptions) -> LoadResult {
        let resolved = self.resolve_sources(video_id, &options).await?;
        debug!("📦 Video preloaded: {}", video_id);
        Ok(resolved)
    }

    /// Preload a batch; one failure does not abort the others
    pub async fn preload_videos(&self, video_ids: &[&str], options: LoadOptions) -> PreloadReport {
        let loads = video_ids.iter().map(|&id| {
            let options = options.clone();
            async move {
                let result = self.preload_video(id, options).await;
                if let Err(e) = &result {
                    warn!("⚠️ Preload failed for {}: {}", id, e);
                }
                (id.to_string(), result)
            }
        });
        let results = future::join_all(loads).await;
        let successful = results.iter().filter(|(_, r)| r.is_ok()).count();
        let report = PreloadReport {
            total: video_ids.len(),
            successful,
            failed: video_ids.len() - successful,
            results,
        };
        info!(
            "📦 Batch preload completed: total={}, successful={}, failed={}",
            report.total, report.successful, report.failed
        );
        report
    }

    /// Bump the version tag and evict every entry keyed by the old one
    pub fn update_version(&self, new_version: &str) {
        let mut state = self.lock_state();
        state.version = new_version.to_string();
        state.generation += 1;
        let before = state.cache.len();
        state.cache.retain(|key, _| key.version.is_none());
        state.in_flight.retain(|key, _| key.version.is_none());
        info!(
            "🔄 Version updated to {} ({} cached entries evicted)",
            new_version,
            before - state.cache.len()
        );
    }

    pub fn clear_cache(&self) {
        let mut state = self.lock_state();
        let previous = state.cache.len();
        state.generation += 1;
        state.cache.clear();
        state.in_flight.clear();
        info!("🗑️ Cache cleared ({} entries)", previous);
    }

    pub fn cache_stats(&self) -> CacheStats {
        let state = self.lock_state();
        CacheStats {
            cache_size: state.cache.len(),
            in_flight: state
                .in_flight
                .values()
                .filter(|weak| weak.upgrade().is_some())
                .count(),
            current_version: state.version.clone(),
            strategy: self.default_strategy,
        }
    }

    /// Re-resolve every mounted, tagged element, bypassing the cache
    pub async fn refresh_all_videos(
        &self,
        document: &dyn MediaDocument,
        strategy: Option<ResolveStrategy>,
    ) -> Vec<LoadResult> {
        let elements = document.tagged_videos();
        let strategy = strategy.unwrap_or(self.default_strategy);
        let loads = elements.iter().filter_map(|element| {
            let video_id = element.video_id()?;
            Some(async move {
                self.load_video(
                    &video_id,
                    element.as_ref(),
                    LoadOptions::with_strategy(strategy).force_refresh(),
                )
                .await
            })
        });
        let results = future::join_all(loads).await;
        info!("🔄 Refreshed {} videos", results.len());
        results
    }

    /// Build a tagged element with `attributes` and load it
    pub async fn create_video_element(
        &self,
        video_id: &str,
        attributes: ElementAttributes,
        options: LoadOptions,
    ) -> Result<Arc<InMemoryElement>, LoadError> {
        let options = LoadOptions {
            poster: options.poster.or_else(|| attributes.poster.clone()),
            preload: options.preload.or(Some(attributes.preload)),
            ..options
        };
        let element = Arc::new(InMemoryElement::with_attributes(video_id, attributes));
        self.load_video(video_id, element.as_ref(), options).await?;
        Ok(element)
    }

    /// Negotiate codecs and resolve one source per playable format
    pub async fn generate_video_sources(
        &self,
        video_id: &str,
        strategy: ResolveStrategy,
        formats: &[VideoFormat],
    ) -> LoadResult {
        generate_sources(
            self.resolver.clone(),
            self.probe.clone(),
            video_id.to_string(),
            strategy,
            formats.to_vec(),
        )
        .await
    }

    /// Set preload and poster, replace sources, and reload the element
    pub fn apply_video_sources(
        &self,
        element: &dyn MediaElement,
        resolved: &ResolvedSources,
        poster: Option<&str>,
        preload: Option<Preload>,
    ) {
        element.set_preload(preload.unwrap_or(self.preload));
        if let Some(poster) = poster {
            element.set_poster(poster);
        }
        element.replace_sources(&resolved.sources);
        element.reload();
    }

    async fn resolve_sources(&self, video_id: &str, options: &LoadOptions) -> LoadResult {
        let strategy = options.strategy.unwrap_or(self.default_strategy);
        let (key, load, generation) = {
            let mut state = self.lock_state();
            let key = state.key_for(video_id, strategy);
            let generation = state.generation;

            if let Some(load) = state.live_in_flight(&key) {
                debug!("⏳ Joining in-flight load for {}", video_id);
                (key, load, generation)
            } else {
                if !options.force_refresh {
                    if let Some(cached) = state.cache.get(&key) {
                        debug!("📁 Using cached video {} ({})", video_id, strategy);
                        return Ok(cached.clone());
                    }
                }

                let formats = options
                    .formats
                    .clone()
                    .unwrap_or_else(|| self.formats.clone());
                let load = generate_sources(
                    self.resolver.clone(),
                    self.probe.clone(),
                    video_id.to_string(),
                    strategy,
                    formats,
                )
                .boxed()
                .shared();

                state.in_flight.retain(|_, weak| weak.upgrade().is_some());
                if let Some(weak) = load.downgrade() {
                    state.in_flight.insert(key.clone(), weak);
                }
                (key, load, generation)
            }
        };

        let result = load.await;

        let mut state = self.lock_state();
        let finished = state
            .live_in_flight(&key)
            .is_none_or(|load| load.peek().is_some());
        if finished {
            state.in_flight.remove(&key);
        }
        match &result {
            Ok(resolved) => {
                if state.generation == generation {
                    state.cache.insert(key, resolved.clone());
                } else {
                    debug!("Discarding {} resolved across an invalidation", video_id);
                }
                debug!("✅ Video resolved: {} ({})", video_id, strategy);
            }
            Err(e) => warn!("❌ Video resolution failed for {}: {}", video_id, e),
        }
        result
    }
}

async fn generate_sources(
    resolver: Arc<UrlResolver>,
    probe: Arc<dyn CodecProbe>,
    video_id: String,
    strategy: ResolveStrategy,
    formats: Vec<VideoFormat>,
) -> LoadResult {
    if video_id.trim().is_empty() || video_id.contains(['?', '#']) {
        return Err(LoadError::InvalidVideoId(video_id));
    }

    let negotiated = codec::negotiate(probe.as_ref(), &formats).await;
    let playable: Vec<VideoFormat> = negotiated.iter().map(|n| n.format).collect();
    let urls = resolver.resolve_multi_format(&video_id, &playable, strategy);

    let sources = negotiated
        .into_iter()
        .zip(urls)
        .map(|(negotiated, resolved)| VideoSource {
            src: resolved.url,
            mime_type: negotiated.mime_type,
            format: negotiated.format,
            strategy,
            support: negotiated.support,
        })
        .collect();

    Ok(Arc::new(ResolvedSources {
        video_id,
        strategy,
        sources,
        generated_at: Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StaticCodecProbe;
    use crate::registry::VersionRegistry;
    use crate::resolver::ResolverConfig;

    fn manager(probe: StaticCodecProbe) -> VideoManager {
        let registry = Arc::new(VersionRegistry::from_entries([("airplane.mp4", "1.2.3")]));
        let resolver = Arc::new(UrlResolver::new(ResolverConfig::default(), registry));
        VideoManager::new(
            resolver,
            Arc::new(probe),
            ManagerOptions {
                strategy: Some(ResolveStrategy::Version),
                ..ManagerOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn test_load_applies_sources() {
        let manager = manager(StaticCodecProbe::all());
        let element = InMemoryElement::tagged("airplane");

        let resolved = manager
            .load_video("airplane", &element, LoadOptions::default())
            .await
            .unwrap();

        assert_eq!(resolved.sources.len(), 2);
        assert_eq!(resolved.sources[0].format, VideoFormat::Webm);
        assert_eq!(resolved.sources[1].src, "/api/videos/airplane.mp4?v=1.2.3");
        assert_eq!(element.sources(), resolved.sources);
        assert_eq!(element.reload_count(), 1);
        assert_eq!(element.attributes().preload, Preload::Metadata);
    }

    #[tokio::test]
    async fn test_unsupported_formats_are_filtered() {
        let probe = StaticCodecProbe::none()
            .with(VideoFormat::Mp4.codec_candidates()[0], PlaybackSupport::Maybe);
        let manager = manager(probe);

        let resolved = manager
            .preload_video("airplane", LoadOptions::default())
            .await
            .unwrap();
        assert_eq!(resolved.sources.len(), 1);
        assert_eq!(resolved.sources[0].format, VideoFormat::Mp4);
        assert!(resolved.sources[0].mime_type.contains("avc1"));
    }

    #[tokio::test]
    async fn test_cached_result_is_reused() {
        let manager = manager(StaticCodecProbe::all());
        let first = manager.preload_video("globe", LoadOptions::default()).await.unwrap();
        let second = manager.preload_video("globe", LoadOptions::default()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let refreshed = manager
            .preload_video("globe", LoadOptions::default().force_refresh())
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &refreshed));
        assert_eq!(manager.cache_stats().cache_size, 1);
    }

    #[tokio::test]
    async fn test_invalid_video_id() {
        let manager = manager(StaticCodecProbe::all());
        let element = InMemoryElement::new();
        let err = manager
            .load_video("  ", &element, LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidVideoId(_)));
        assert!(element.sources().is_empty());
        assert_eq!(manager.cache_stats().cache_size, 0);
    }

    #[tokio::test]
    async fn test_poster_and_preload_override() {
        let manager = manager(StaticCodecProbe::all());
        let element = InMemoryElement::tagged("globe");
        let options = LoadOptions {
            poster: Some("/posters/globe.jpg".to_string()),
            preload: Some(Preload::Auto),
            ..LoadOptions::default()
        };
        manager.load_video("globe", &element, options).await.unwrap();

        let attributes = element.attributes();
        assert_eq!(attributes.poster.as_deref(), Some("/posters/globe.jpg"));
        assert_eq!(attributes.preload, Preload::Auto);
    }

    #[tokio::test]
    async fn test_default_strategy_follows_environment() {
        let registry = Arc::new(VersionRegistry::new());
        let resolver = Arc::new(UrlResolver::new(
            ResolverConfig::default().with_environment(crate::resolver::Environment::Production),
            registry,
        ));
        let manager = VideoManager::new(
            resolver,
            Arc::new(StaticCodecProbe::all()),
            ManagerOptions::default(),
        );
        assert_eq!(manager.default_strategy(), ResolveStrategy::Hash);
        assert_eq!(manager.cache_stats().current_version, "1.0");
    }
}
