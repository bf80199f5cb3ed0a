//! Query parameter vocabulary shared by the resolver and the asset endpoint.

/// Semantic version of the asset; marks the URL as immutable.
pub const VERSION: &str = "v";
/// Millisecond timestamp cache buster.
pub const TIMESTAMP: &str = "t";
/// Random nonce cache buster.
pub const RANDOM: &str = "r";
/// Tab-scoped session id.
pub const SESSION_ID: &str = "sid";
/// Explicit cache directive carried by dynamic URLs.
pub const CACHE: &str = "cache";
pub const PRAGMA: &str = "pragma";

pub const NO_STORE: &str = "no-store";
pub const NO_CACHE: &str = "no-cache";
