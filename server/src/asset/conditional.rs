//! Conditional GET evaluation and HTTP dates

use axum::http::{header, HeaderMap};
use chrono::{DateTime, TimeZone, Utc};
use std::time::SystemTime;

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Drop sub-second precision; HTTP dates carry whole seconds only
pub fn truncate_to_seconds(time: SystemTime) -> DateTime<Utc> {
    let time: DateTime<Utc> = time.into();
    Utc.timestamp_opt(time.timestamp(), 0)
        .single()
        .unwrap_or(time)
}

/// `If-None-Match` list membership, weak comparison
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let etag = etag.trim_start_matches("W/");
    if_none_match
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == etag)
}

/// True when the request's validators show the client copy is current.
///
/// `If-None-Match` takes precedence; `If-Modified-Since` is only consulted
/// when it is absent, and only if it parses as an HTTP date.
pub fn is_not_modified(headers: &HeaderMap, etag: &str, last_modified: DateTime<Utc>) -> bool {
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH) {
        return if_none_match
            .to_str()
            .map(|value| etag_matches(value, etag))
            .unwrap_or(false);
    }

    headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date)
        .is_some_and(|since| since >= last_modified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn last_modified() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_http_date_round_trip() {
        let formatted = http_date(last_modified());
        assert_eq!(formatted, "Fri, 01 Mar 2024 12:00:00 GMT");
        assert_eq!(parse_http_date(&formatted), Some(last_modified()));
    }

    #[test]
    fn test_truncate_to_seconds() {
        let time = SystemTime::UNIX_EPOCH + std::time::Duration::from_millis(1_700_000_000_750);
        assert_eq!(truncate_to_seconds(time).timestamp_subsec_nanos(), 0);
        assert_eq!(truncate_to_seconds(time).timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_etag_list_matching() {
        assert!(etag_matches("\"abc\"", "\"abc\""));
        assert!(etag_matches("\"x\", W/\"abc\"", "\"abc\""));
        assert!(etag_matches("*", "\"abc\""));
        assert!(!etag_matches("\"abd\"", "\"abc\""));
    }

    #[test]
    fn test_if_modified_since_is_a_date_comparison() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_static("Sat, 02 Mar 2024 00:00:00 GMT"),
        );
        assert!(is_not_modified(&headers, "\"abc\"", last_modified()));

        headers.insert(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_static("Thu, 29 Feb 2024 00:00:00 GMT"),
        );
        assert!(!is_not_modified(&headers, "\"abc\"", last_modified()));

        headers.insert(header::IF_MODIFIED_SINCE, HeaderValue::from_static("yesterday"));
        assert!(!is_not_modified(&headers, "\"abc\"", last_modified()));
    }

    #[test]
    fn test_if_none_match_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"stale\""));
        headers.insert(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_static("Sat, 02 Mar 2024 00:00:00 GMT"),
        );
        assert!(!is_not_modified(&headers, "\"abc\"", last_modified()));
    }
}
