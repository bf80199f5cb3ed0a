use reelcache_client::{ResolveStrategy, ResolverConfig, UrlResolver, VersionManifest, VideoFormat};
use std::sync::Arc;

mod common;
use common::{query_of, sample_registry};

#[test]
fn registering_a_version_changes_only_the_v_parameter() {
    let resolver = UrlResolver::new(ResolverConfig::default(), sample_registry());

    let before = resolver.resolve("clip.mp4", ResolveStrategy::Version);
    resolver.update_versions([("clip.mp4", "2.0.0")]);
    let after = resolver.resolve("clip.mp4", ResolveStrategy::Version);

    assert_ne!(before, after);
    let (before_path, _) = before.split_once('?').unwrap();
    let (after_path, _) = after.split_once('?').unwrap();
    assert_eq!(before_path, after_path);
    assert_eq!(query_of(&before).len(), 1);
    assert_eq!(query_of(&after)["v"], "2.0.0");
}

#[test]
fn manifest_drives_registry_and_hashes() {
    let manifest = VersionManifest::builtin();
    let config = ResolverConfig::from_manifest(&manifest);
    let resolver = UrlResolver::new(config, Arc::new(manifest.registry()));

    assert_eq!(
        resolver.resolve("baloon.mp4", ResolveStrategy::Version),
        "/api/videos/baloon.mp4?v=1.0.2"
    );
    assert_eq!(
        resolver.resolve("baloon.mp4", ResolveStrategy::Hash),
        "/api/videos/baloon-jkl012.mp4"
    );
}

#[test]
fn every_strategy_yields_a_well_formed_url() {
    let resolver = UrlResolver::new(ResolverConfig::default(), sample_registry());
    for strategy in ResolveStrategy::ALL {
        for resolved in resolver.resolve_multi_format("airplane", &[VideoFormat::Webm, VideoFormat::Mp4], strategy) {
            assert!(resolved.url.starts_with("/api/videos/airplane"), "{}", resolved.url);
            assert_eq!(resolved.strategy, strategy);
        }
    }
}
