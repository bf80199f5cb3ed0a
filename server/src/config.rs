//! Server configuration from environment variables

use std::path::PathBuf;

pub const DEFAULT_PUBLIC_DIR: &str = "./public";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8723";
pub const DEFAULT_ROUTE_PREFIX: &str = "/api/videos";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Directory whose files are served
    pub public_dir: PathBuf,
    pub bind_addr: String,
    /// Mount point of the asset endpoint, e.g. `/api/videos`
    pub route_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            route_prefix: DEFAULT_ROUTE_PREFIX.to_string(),
        }
    }
}

impl ServerConfig {
    /// Read `REELCACHE_PUBLIC_DIR`, `REELCACHE_BIND_ADDR` and
    /// `REELCACHE_ROUTE_PREFIX`, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            public_dir: non_empty("REELCACHE_PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.public_dir),
            bind_addr: non_empty("REELCACHE_BIND_ADDR").unwrap_or(defaults.bind_addr),
            route_prefix: non_empty("REELCACHE_ROUTE_PREFIX")
                .map(|prefix| normalize_prefix(&prefix))
                .unwrap_or(defaults.route_prefix),
        }
    }
}

/// Leading slash, no trailing slash; the root prefix becomes ""
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(|_| None);
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.route_prefix, "/api/videos");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("REELCACHE_PUBLIC_DIR", "/srv/media"),
            ("REELCACHE_BIND_ADDR", "0.0.0.0:9000"),
            ("REELCACHE_ROUTE_PREFIX", "media/"),
        ]
        .into_iter()
        .collect();
        let config = ServerConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.public_dir, PathBuf::from("/srv/media"));
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.route_prefix, "/media");
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/api/videos/"), "/api/videos");
        assert_eq!(normalize_prefix("api"), "/api");
        assert_eq!(normalize_prefix("/"), "");
    }
}
