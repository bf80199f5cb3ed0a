//! Resolution strategies and the preload hint.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How a logical video name is turned into a request URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveStrategy {
    /// `?v=<registered version>`; long-lived, immutable caching
    Version,
    /// Content-addressed filename when one is known, else `Version`
    Hash,
    /// `?t=<now millis>`; misses the cache on every call
    Timestamp,
    /// Timestamp + nonce + `cache=no-store`
    Dynamic,
    /// Dynamic + session id + pragma marker + registered version
    Aggressive,
    /// Version when registered, hash in production, dev version otherwise
    Auto,
}

impl ResolveStrategy {
    pub const ALL: [ResolveStrategy; 6] = [
        ResolveStrategy::Version,
        ResolveStrategy::Hash,
        ResolveStrategy::Timestamp,
        ResolveStrategy::Dynamic,
        ResolveStrategy::Aggressive,
        ResolveStrategy::Auto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveStrategy::Version => "version",
            ResolveStrategy::Hash => "hash",
            ResolveStrategy::Timestamp => "timestamp",
            ResolveStrategy::Dynamic => "dynamic",
            ResolveStrategy::Aggressive => "aggressive",
            ResolveStrategy::Auto => "auto",
        }
    }

    /// Whether URLs produced by this strategy depend on the version registry.
    ///
    /// Timestamp and dynamic URLs are rebuilt from the clock on every call,
    /// so a registry bump cannot make them stale.
    pub fn is_registry_dependent(&self) -> bool {
        !matches!(self, ResolveStrategy::Timestamp | ResolveStrategy::Dynamic)
    }
}

impl fmt::Display for ResolveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl FromStr for ResolveStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResolveStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

/// Mirrors the media element `preload` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preload {
    None,
    #[default]
    Metadata,
    Auto,
}

impl Preload {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preload::None => "none",
            Preload::Metadata => "metadata",
            Preload::Auto => "auto",
        }
    }
}

impl fmt::Display for Preload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
