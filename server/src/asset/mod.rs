//! Video asset serving
//!
//! This module resolves logical request paths to files under a fixed public
//! root, computes validators for conditional GET, and selects byte ranges
//! and cache policies for the asset endpoint.

pub mod conditional;
pub mod etag;
pub mod local;
pub mod mime;
pub mod policy;
pub mod range;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::AsyncRead;
use tracing::{debug, error};

use range::ByteRange;

/// Error type for asset serving
#[derive(Error, Debug)]
pub enum AssetError {
    /// The logical path is malformed or escapes the public root
    #[error("Bad asset path: {0}")]
    BadPath(String),

    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Range not satisfiable for {size} byte asset")]
    RangeNotSatisfiable { size: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

impl IntoResponse for AssetError {
    fn into_response(self) -> Response {
        match self {
            AssetError::BadPath(path) => {
                debug!("Rejected asset path {:?}", path);
                (StatusCode::BAD_REQUEST, "Bad request").into_response()
            }
            AssetError::NotFound(path) => {
                debug!("Asset not found: {}", path);
                (StatusCode::NOT_FOUND, "Video not found").into_response()
            }
            AssetError::RangeNotSatisfiable { size } => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(header::CONTENT_RANGE, format!("bytes */{}", size))],
                Body::empty(),
            )
                .into_response(),
            other => {
                error!("❌ Error serving video: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

/// A resolved view of one file under the public root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoAsset {
    /// Path as requested, segments joined with `/`
    pub logical_path: String,
    /// Canonical path, guaranteed to lie under the public root
    pub absolute_path: PathBuf,
    pub size: u64,
    /// Strong validator over (content, logical path), already quoted
    pub etag: String,
    /// Second-granularity modification time; "now" when unavailable
    pub last_modified: DateTime<Utc>,
}

/// Async byte source for a response body
pub type AssetReader = Box<dyn AsyncRead + Send + Unpin>;

/// Trait for the physical storage behind the asset endpoint
///
/// This abstraction allows for different backends (local filesystem,
/// object storage, ...) behind one request-handling contract.
#[async_trait::async_trait]
pub trait AssetStore: Send + Sync {
    /// Resolve a logical path and compute its validators
    async fn stat(&self, logical_path: &str) -> Result<VideoAsset, AssetError>;

    /// Open the asset for reading, limited to `range` when given
    async fn open(&self, asset: &VideoAsset, range: Option<ByteRange>) -> Result<AssetReader, AssetError>;

    /// Get the storage type identifier (e.g., "local")
    fn storage_type(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (AssetError::BadPath("../x".to_string()), StatusCode::BAD_REQUEST),
            (AssetError::NotFound("x.mp4".to_string()), StatusCode::NOT_FOUND),
            (AssetError::RangeNotSatisfiable { size: 10 }, StatusCode::RANGE_NOT_SATISFIABLE),
            (
                AssetError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_unsatisfiable_reports_total_size() {
        let response = AssetError::RangeNotSatisfiable { size: 1000 }.into_response();
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes */1000"
        );
    }
}
