//! Client-side video delivery core: cache-aware URL resolution, codec
//! negotiation, and a resolution cache for media elements.

pub mod codec;
pub mod element;
pub mod manager;
pub mod params;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod strategy;

pub use codec::{CodecProbe, PlaybackSupport, VideoFormat};
pub use element::{ElementAttributes, InMemoryDocument, InMemoryElement, MediaDocument, MediaElement};
pub use manager::{CacheStats, LoadError, LoadOptions, ManagerOptions, ResolvedSources, VideoManager, VideoSource};
pub use registry::{ManifestError, VersionManifest, VersionRegistry};
pub use resolver::{Environment, ResolvedUrl, ResolverConfig, UrlResolver};
pub use session::{MemorySessionStorage, SessionStorage, UnavailableSessionStorage};
pub use strategy::{Preload, ResolveStrategy};
