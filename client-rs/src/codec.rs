//! Container formats and codec negotiation
//!
//! Each candidate format is turned into codec-qualified MIME strings and
//! checked against the runtime's own "can play this type" capability.
//! Negotiation never yields an empty list: if nothing is playable, baseline
//! MP4/H.264 is forced in.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Video container formats the site ships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    Mp4,
    Webm,
    Ogg,
}

/// The most broadly decodable format
pub const FALLBACK_FORMAT: VideoFormat = VideoFormat::Mp4;

/// Baseline H.264 + AAC-LC
const MP4_CODECS: &[&str] = &["video/mp4; codecs=\"avc1.42E01E, mp4a.40.2\""];
/// VP9 + Opus preferred over VP8 + Vorbis
const WEBM_CODECS: &[&str] = &[
    "video/webm; codecs=\"vp9, opus\"",
    "video/webm; codecs=\"vp8, vorbis\"",
];
const OGG_CODECS: &[&str] = &["video/ogg; codecs=\"theora, vorbis\""];

impl VideoFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Webm => "webm",
            VideoFormat::Ogg => "ogg",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" | "m4v" => Some(VideoFormat::Mp4),
            "webm" => Some(VideoFormat::Webm),
            "ogg" | "ogv" => Some(VideoFormat::Ogg),
            _ => None,
        }
    }

    /// Format implied by a filename's extension, ignoring any query string
    pub fn from_filename(filename: &str) -> Option<Self> {
        let path = filename.split(['?', '#']).next().unwrap_or(filename);
        path.rsplit_once('.')
            .and_then(|(_, ext)| Self::from_extension(ext))
    }

    /// MIME type without codec parameters
    pub fn base_mime(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "video/mp4",
            VideoFormat::Webm => "video/webm",
            VideoFormat::Ogg => "video/ogg",
        }
    }

    /// Codec-qualified MIME strings in preference order
    pub fn codec_candidates(&self) -> &'static [&'static str] {
        match self {
            VideoFormat::Mp4 => MP4_CODECS,
            VideoFormat::Webm => WEBM_CODECS,
            VideoFormat::Ogg => OGG_CODECS,
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Answer to a "can play this type" query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackSupport {
    No,
    Maybe,
    Probably,
}

impl PlaybackSupport {
    /// Interpret the media element's `canPlayType` string
    pub fn from_can_play_type(answer: &str) -> Self {
        match answer.trim() {
            "probably" => PlaybackSupport::Probably,
            "maybe" => PlaybackSupport::Maybe,
            _ => PlaybackSupport::No,
        }
    }

    pub fn is_playable(&self) -> bool {
        *self != PlaybackSupport::No
    }
}

/// The runtime's media capability check
///
/// Implementations wrap whatever can answer the question: a browser
/// bridge, a device capability table, or a fixed table in tests.
#[async_trait::async_trait]
pub trait CodecProbe: Send + Sync {
    async fn can_play_type(&self, mime_type: &str) -> PlaybackSupport;
}

/// Table-driven probe keyed by exact codec-qualified MIME string
#[derive(Debug, Clone, Default)]
pub struct StaticCodecProbe {
    table: HashMap<String, PlaybackSupport>,
}

impl StaticCodecProbe {
    /// Probe that supports nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// Probe that answers `probably` for every known candidate
    pub fn all() -> Self {
        [VideoFormat::Mp4, VideoFormat::Webm, VideoFormat::Ogg]
            .iter()
            .flat_map(|format| format.codec_candidates().iter())
            .fold(Self::none(), |probe, mime| probe.with(mime, PlaybackSupport::Probably))
    }

    pub fn with(mut self, mime_type: &str, support: PlaybackSupport) -> Self {
        self.table.insert(mime_type.to_string(), support);
        self
    }
}

#[async_trait::async_trait]
impl CodecProbe for StaticCodecProbe {
    async fn can_play_type(&self, mime_type: &str) -> PlaybackSupport {
        self.table
            .get(mime_type)
            .copied()
            .unwrap_or(PlaybackSupport::No)
    }
}

/// A format the runtime accepted, with the MIME string it accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiatedFormat {
    pub format: VideoFormat,
    pub mime_type: String,
    pub support: PlaybackSupport,
}

impl NegotiatedFormat {
    fn fallback() -> Self {
        Self {
            format: FALLBACK_FORMAT,
            mime_type: FALLBACK_FORMAT.codec_candidates()[0].to_string(),
            support: PlaybackSupport::No,
        }
    }
}

/// Probe one format, returning the first codec variant the runtime accepts
pub async fn probe_format(probe: &dyn CodecProbe, format: VideoFormat) -> Option<NegotiatedFormat> {
    for candidate in format.codec_candidates() {
        let support = probe.can_play_type(candidate).await;
        if support.is_playable() {
            return Some(NegotiatedFormat {
                format,
                mime_type: candidate.to_string(),
                support,
            });
        }
    }
    None
}

/// Filter `formats` to what the runtime can decode, strongest support first.
///
/// Ties keep the caller's order. An empty result is replaced by the
/// fallback format so there is always at least one source.
pub async fn negotiate(probe: &dyn CodecProbe, formats: &[VideoFormat]) -> Vec<NegotiatedFormat> {
    let mut accepted = Vec::with_capacity(formats.len());
    for &format in formats {
        if accepted.iter().any(|n: &NegotiatedFormat| n.format == format) {
            continue;
        }
        match probe_format(probe, format).await {
            Some(negotiated) => accepted.push(negotiated),
            None => debug!("Runtime cannot decode {}", format),
        }
    }

    accepted.sort_by(|a, b| b.support.cmp(&a.support));

    if accepted.is_empty() {
        debug!("No requested format playable, forcing {}", FALLBACK_FORMAT);
        accepted.push(NegotiatedFormat::fallback());
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_filename() {
        assert_eq!(VideoFormat::from_filename("clip.webm"), Some(VideoFormat::Webm));
        assert_eq!(VideoFormat::from_filename("/a/b/clip.MP4?v=1"), Some(VideoFormat::Mp4));
        assert_eq!(VideoFormat::from_filename("clip"), None);
        assert_eq!(VideoFormat::from_filename("notes.txt"), None);
    }

    #[test]
    fn test_can_play_type_parsing() {
        assert_eq!(PlaybackSupport::from_can_play_type("probably"), PlaybackSupport::Probably);
        assert_eq!(PlaybackSupport::from_can_play_type("maybe"), PlaybackSupport::Maybe);
        assert_eq!(PlaybackSupport::from_can_play_type(""), PlaybackSupport::No);
        assert!(PlaybackSupport::Probably > PlaybackSupport::Maybe);
    }

    #[tokio::test]
    async fn test_prefers_vp9_when_supported() {
        let probe = StaticCodecProbe::all();
        let negotiated = probe_format(&probe, VideoFormat::Webm).await.unwrap();
        assert!(negotiated.mime_type.contains("vp9"));
    }

    #[tokio::test]
    async fn test_falls_back_to_vp8() {
        let probe = StaticCodecProbe::none().with(WEBM_CODECS[1], PlaybackSupport::Maybe);
        let negotiated = probe_format(&probe, VideoFormat::Webm).await.unwrap();
        assert!(negotiated.mime_type.contains("vp8"));
        assert_eq!(negotiated.support, PlaybackSupport::Maybe);
    }

    #[tokio::test]
    async fn test_orders_by_support_then_caller_order() {
        let probe = StaticCodecProbe::none()
            .with(WEBM_CODECS[1], PlaybackSupport::Maybe)
            .with(MP4_CODECS[0], PlaybackSupport::Probably)
            .with(OGG_CODECS[0], PlaybackSupport::Maybe);
        let negotiated = negotiate(
            &probe,
            &[VideoFormat::Webm, VideoFormat::Ogg, VideoFormat::Mp4],
        )
        .await;
        let order: Vec<VideoFormat> = negotiated.iter().map(|n| n.format).collect();
        assert_eq!(order, vec![VideoFormat::Mp4, VideoFormat::Webm, VideoFormat::Ogg]);
    }

    #[tokio::test]
    async fn test_never_empty() {
        let negotiated = negotiate(&StaticCodecProbe::none(), &[VideoFormat::Webm]).await;
        assert_eq!(negotiated.len(), 1);
        assert_eq!(negotiated[0].format, FALLBACK_FORMAT);

        let negotiated = negotiate(&StaticCodecProbe::none(), &[]).await;
        assert_eq!(negotiated.len(), 1);
    }
}
