//! Cache-Control policy selection
//!
//! The policy is a pure function of the query parameters the resolver
//! attached; no cookies or server state participate, so one URL always gets
//! one response class.

use super::conditional::http_date;
use axum::http::{header, HeaderName};
use chrono::{DateTime, Duration, Utc};
use reelcache_client::params;
use std::collections::HashMap;

const ONE_YEAR_SECS: i64 = 31_536_000;
const ONE_HOUR_SECS: i64 = 3_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    /// `v` present: immutable for a year
    Versioned,
    /// Short-lived; also the default
    Dynamic,
    /// `cache=no-store`
    NoCache,
}

impl CacheStrategy {
    /// Precedence: version, then no-store, then anything else is dynamic
    pub fn classify(query: &HashMap<String, String>) -> Self {
        if query.contains_key(params::VERSION) {
            return CacheStrategy::Versioned;
        }
        if query.get(params::CACHE).map(String::as_str) == Some(params::NO_STORE) {
            return CacheStrategy::NoCache;
        }
        // t / r / sid explicitly mark dynamic content; absence defaults to it too
        CacheStrategy::Dynamic
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStrategy::Versioned => "versioned",
            CacheStrategy::Dynamic => "dynamic",
            CacheStrategy::NoCache => "nocache",
        }
    }

    /// Cache-Control / Expires (/ Pragma) headers as of `now`
    pub fn headers(&self, now: DateTime<Utc>) -> Vec<(HeaderName, String)> {
        match self {
            CacheStrategy::Versioned => vec![
                (
                    header::CACHE_CONTROL,
                    format!("public, max-age={}, immutable", ONE_YEAR_SECS),
                ),
                (header::EXPIRES, http_date(now + Duration::seconds(ONE_YEAR_SECS))),
            ],
            CacheStrategy::Dynamic => vec![
                (header::CACHE_CONTROL, format!("public, max-age={}", ONE_HOUR_SECS)),
                (header::EXPIRES, http_date(now + Duration::seconds(ONE_HOUR_SECS))),
            ],
            CacheStrategy::NoCache => vec![
                (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate".to_string()),
                (header::PRAGMA, "no-cache".to_string()),
                (header::EXPIRES, "0".to_string()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_classify() {
        assert_eq!(CacheStrategy::classify(&query(&[("v", "1")])), CacheStrategy::Versioned);
        assert_eq!(CacheStrategy::classify(&query(&[("cache", "no-store")])), CacheStrategy::NoCache);
        assert_eq!(CacheStrategy::classify(&query(&[("t", "123")])), CacheStrategy::Dynamic);
        assert_eq!(CacheStrategy::classify(&query(&[("sid", "abc")])), CacheStrategy::Dynamic);
        assert_eq!(CacheStrategy::classify(&query(&[])), CacheStrategy::Dynamic);
    }

    #[test]
    fn test_classify_precedence() {
        let aggressive = query(&[("t", "1"), ("cache", "no-store"), ("v", "1.0.0")]);
        assert_eq!(CacheStrategy::classify(&aggressive), CacheStrategy::Versioned);

        let dynamic = query(&[("t", "1"), ("r", "x"), ("cache", "no-store")]);
        assert_eq!(CacheStrategy::classify(&dynamic), CacheStrategy::NoCache);

        let other_cache_value = query(&[("cache", "default")]);
        assert_eq!(CacheStrategy::classify(&other_cache_value), CacheStrategy::Dynamic);
    }

    #[test]
    fn test_header_bundles() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let versioned = CacheStrategy::Versioned.headers(now);
        assert_eq!(versioned[0].1, "public, max-age=31536000, immutable");
        assert_eq!(versioned[1].1, "Tue, 31 Dec 2024 00:00:00 GMT");

        let dynamic = CacheStrategy::Dynamic.headers(now);
        assert_eq!(dynamic[0].1, "public, max-age=3600");
        assert_eq!(dynamic[1].1, "Mon, 01 Jan 2024 01:00:00 GMT");

        let nocache = CacheStrategy::NoCache.headers(now);
        assert_eq!(nocache.len(), 3);
        assert_eq!(nocache[1], (header::PRAGMA, "no-cache".to_string()));
        assert_eq!(nocache[2], (header::EXPIRES, "0".to_string()));
    }
}
