//! `Range: bytes=...` handling

/// An inclusive byte range within an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// What to send for a request's Range header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// No usable Range header; send the whole body
    Full,
    Partial(ByteRange),
    /// Well-formed but outside `[0, total)`
    Unsatisfiable,
}

/// Evaluate a Range header value against an asset of `total` bytes.
///
/// Supports `bytes=S-E`, `bytes=S-` and suffix `bytes=-N`. Syntactically
/// invalid values and multi-range requests are ignored (full body).
pub fn evaluate(header: Option<&str>, total: u64) -> RangeRequest {
    let Some(value) = header else {
        return RangeRequest::Full;
    };
    let Some(spec) = value
        .trim()
        .strip_prefix("bytes=")
        .filter(|spec| !spec.contains(','))
    else {
        return RangeRequest::Full;
    };
    let Some((start, end)) = spec.split_once('-') else {
        return RangeRequest::Full;
    };
    let (start, end) = (start.trim(), end.trim());

    match (start.is_empty(), end.is_empty()) {
        // bytes=-N: last N bytes
        (true, false) => {
            let Ok(suffix) = end.parse::<u64>() else {
                return RangeRequest::Full;
            };
            if suffix == 0 || total == 0 {
                return RangeRequest::Unsatisfiable;
            }
            RangeRequest::Partial(ByteRange {
                start: total.saturating_sub(suffix),
                end: total - 1,
            })
        }
        // bytes=S-: to the end
        (false, true) => {
            let Ok(start) = start.parse::<u64>() else {
                return RangeRequest::Full;
            };
            if start >= total {
                return RangeRequest::Unsatisfiable;
            }
            RangeRequest::Partial(ByteRange { start, end: total - 1 })
        }
        // bytes=S-E
        (false, false) => {
            let (Ok(start), Ok(end)) = (start.parse::<u64>(), end.parse::<u64>()) else {
                return RangeRequest::Full;
            };
            if end < start {
                return RangeRequest::Full;
            }
            if start >= total {
                return RangeRequest::Unsatisfiable;
            }
            RangeRequest::Partial(ByteRange {
                start,
                end: end.min(total - 1),
            })
        }
        (true, true) => RangeRequest::Full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_header() {
        assert_eq!(evaluate(None, 1000), RangeRequest::Full);
    }

    #[test]
    fn test_closed_range() {
        let RangeRequest::Partial(range) = evaluate(Some("bytes=0-99"), 1000) else {
            panic!("expected partial");
        };
        assert_eq!(range.len(), 100);
        assert_eq!(range.content_range(1000), "bytes 0-99/1000");
    }

    #[test]
    fn test_open_ended_range() {
        assert_eq!(
            evaluate(Some("bytes=500-"), 1000),
            RangeRequest::Partial(ByteRange { start: 500, end: 999 })
        );
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(
            evaluate(Some("bytes=-100"), 1000),
            RangeRequest::Partial(ByteRange { start: 900, end: 999 })
        );
        assert_eq!(
            evaluate(Some("bytes=-5000"), 1000),
            RangeRequest::Partial(ByteRange { start: 0, end: 999 })
        );
    }

    #[test]
    fn test_end_is_clamped() {
        assert_eq!(
            evaluate(Some("bytes=990-2000"), 1000),
            RangeRequest::Partial(ByteRange { start: 990, end: 999 })
        );
    }

    #[test]
    fn test_unsatisfiable() {
        assert_eq!(evaluate(Some("bytes=1000-"), 1000), RangeRequest::Unsatisfiable);
        assert_eq!(evaluate(Some("bytes=1500-1600"), 1000), RangeRequest::Unsatisfiable);
        assert_eq!(evaluate(Some("bytes=-0"), 1000), RangeRequest::Unsatisfiable);
        assert_eq!(evaluate(Some("bytes=0-10"), 0), RangeRequest::Unsatisfiable);
    }

    #[test]
    fn test_malformed_is_ignored() {
        assert_eq!(evaluate(Some("items=0-10"), 1000), RangeRequest::Full);
        assert_eq!(evaluate(Some("bytes=abc-def"), 1000), RangeRequest::Full);
        assert_eq!(evaluate(Some("bytes=50-10"), 1000), RangeRequest::Full);
        assert_eq!(evaluate(Some("bytes=0-1,5-6"), 1000), RangeRequest::Full);
        assert_eq!(evaluate(Some("bytes=-"), 1000), RangeRequest::Full);
    }
}
