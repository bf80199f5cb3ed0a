use crate::asset::conditional::{self, http_date};
use crate::asset::mime::content_type_for;
use crate::asset::policy::CacheStrategy;
use crate::asset::range::{self, RangeRequest};
use crate::asset::AssetError;
use crate::AppState;
use axum::{
    Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use std::collections::HashMap;
use tokio_util::io::ReaderStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

/// Read buffer size for streamed bodies
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

pub fn create_app(state: AppState) -> Router {
    let route = format!("{}/{{*path}}", state.route_prefix);
    Router::new()
        // `get` also answers HEAD with the body stripped
        .route(&route, get(handle_get_video).options(handle_options))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([
            header::RANGE,
            header::IF_NONE_MATCH,
            header::IF_MODIFIED_SINCE,
        ])
        .expose_headers([
            header::CONTENT_RANGE,
            header::CONTENT_LENGTH,
            header::ACCEPT_RANGES,
            header::ETAG,
        ])
}

async fn handle_get_video(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, AssetError> {
    debug!("📡 Received GET {}/{} query={:?}", state.route_prefix, path, query);

    let asset = state.store.stat(&path).await?;
    let policy = CacheStrategy::classify(&query);
    let now = Utc::now();

    if conditional::is_not_modified(&headers, &asset.etag, asset.last_modified) {
        debug!("Not modified: {} ({})", asset.logical_path, policy.as_str());
        let mut builder = Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(header::ETAG, &asset.etag)
            .header(header::LAST_MODIFIED, http_date(asset.last_modified));
        for (name, value) in policy.headers(now) {
            builder = builder.header(name, value);
        }
        return Ok(builder.body(Body::empty())?);
    }

    let range_header = headers.get(header::RANGE).and_then(|value| value.to_str().ok());
    let range = match range::evaluate(range_header, asset.size) {
        RangeRequest::Full => None,
        RangeRequest::Partial(range) => Some(range),
        RangeRequest::Unsatisfiable => {
            debug!("Unsatisfiable range {:?} for {}", range_header, asset.logical_path);
            return Err(AssetError::RangeNotSatisfiable { size: asset.size });
        }
    };

    let reader = state.store.open(&asset, range).await?;
    let body = Body::from_stream(ReaderStream::with_capacity(reader, STREAM_CHUNK_SIZE));

    let mut builder = Response::builder()
        .header(
            header::CONTENT_TYPE,
            content_type_for(std::path::Path::new(&asset.logical_path)),
        )
        .header(header::ETAG, &asset.etag)
        .header(header::LAST_MODIFIED, http_date(asset.last_modified))
        .header(header::ACCEPT_RANGES, "bytes");

    builder = match range {
        Some(range) => {
            info!(
                "✅ Serving {} bytes {}-{}/{} ({})",
                asset.logical_path,
                range.start,
                range.end,
                asset.size,
                policy.as_str()
            );
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_RANGE, range.content_range(asset.size))
                .header(header::CONTENT_LENGTH, range.len())
        }
        None => {
            info!(
                "✅ Serving {} ({} bytes, {})",
                asset.logical_path,
                asset.size,
                policy.as_str()
            );
            builder
                .status(StatusCode::OK)
                .header(header::CONTENT_LENGTH, asset.size)
        }
    };
    for (name, value) in policy.headers(now) {
        builder = builder.header(name, value);
    }

    Ok(builder.body(body)?)
}

async fn handle_options() -> impl IntoResponse {
    debug!("📡 Received OPTIONS request");
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, HEAD, OPTIONS"),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                "range, if-none-match, if-modified-since",
            ),
            (header::ACCESS_CONTROL_MAX_AGE, "86400"),
        ],
    )
}
