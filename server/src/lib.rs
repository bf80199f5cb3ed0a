pub mod asset;
pub mod config;
pub mod server;

// Re-export commonly used types
pub use asset::{AssetError, AssetStore, VideoAsset};
pub use config::ServerConfig;

use asset::local::LocalAssetStore;

pub type AppState = std::sync::Arc<ServerState>;

pub struct ServerState {
    /// Mount point of the asset endpoint, without trailing slash
    pub route_prefix: String,
    pub store: Box<dyn AssetStore>,
}

impl ServerState {
    pub fn new(route_prefix: impl Into<String>, store: Box<dyn AssetStore>) -> Self {
        Self {
            route_prefix: config::normalize_prefix(&route_prefix.into()),
            store,
        }
    }

    /// Local filesystem store rooted at the configured public directory
    pub fn from_config(config: &ServerConfig) -> Result<Self, AssetError> {
        let store = LocalAssetStore::new(&config.public_dir)?;
        Ok(Self::new(config.route_prefix.clone(), Box::new(store)))
    }
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("route_prefix", &self.route_prefix)
            .field("store", &"<dyn AssetStore>")
            .finish()
    }
}
