#![allow(dead_code)]

use reelcache_client::codec::{CodecProbe, PlaybackSupport};
use reelcache_client::{ManagerOptions, ResolveStrategy, ResolverConfig, UrlResolver, VersionRegistry, VideoManager};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Probe that supports a fixed set of container MIME prefixes, counts every
/// query, and yields once per query so concurrent loads genuinely overlap.
pub struct CountingProbe {
    supported: Vec<&'static str>,
    calls: AtomicUsize,
}

impl CountingProbe {
    pub fn supporting(supported: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            supported: supported.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CodecProbe for CountingProbe {
    async fn can_play_type(&self, mime_type: &str) -> PlaybackSupport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.supported.iter().any(|prefix| mime_type.starts_with(prefix)) {
            PlaybackSupport::Probably
        } else {
            PlaybackSupport::No
        }
    }
}

/// Probe whose first query parks until `release` is signalled, announcing
/// itself on `entered`. Supports MP4 only.
pub struct GatedProbe {
    pub entered: Notify,
    pub release: Notify,
    armed: AtomicBool,
}

impl GatedProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Notify::new(),
            armed: AtomicBool::new(true),
        })
    }
}

#[async_trait::async_trait]
impl CodecProbe for GatedProbe {
    async fn can_play_type(&self, mime_type: &str) -> PlaybackSupport {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if mime_type.starts_with("video/mp4") {
            PlaybackSupport::Probably
        } else {
            PlaybackSupport::No
        }
    }
}

pub fn sample_registry() -> Arc<VersionRegistry> {
    Arc::new(VersionRegistry::from_entries([
        ("airplane.mp4", "1.2.3"),
        ("globe.mp4", "1.1.0"),
    ]))
}

pub fn sample_manager(probe: Arc<dyn CodecProbe>, strategy: ResolveStrategy) -> VideoManager {
    let resolver = Arc::new(UrlResolver::new(ResolverConfig::default(), sample_registry()));
    VideoManager::new(
        resolver,
        probe,
        ManagerOptions {
            strategy: Some(strategy),
            ..ManagerOptions::default()
        },
    )
}

/// Query parameters of a resolved URL
pub fn query_of(url: &str) -> HashMap<String, String> {
    let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}
