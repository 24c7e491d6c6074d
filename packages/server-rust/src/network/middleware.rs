//! HTTP middleware stack for the Rally server.
//!
//! Middleware ordering follows the outer-to-inner convention: the first
//! layer listed is the outermost (processes the request first on the way
//! in, and the response last on the way out).

use axum::http::header::{HeaderName, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::Router;
use rally_core::Rejection;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::config::NetworkConfig;
use super::handlers::ApiError;

/// Header carrying the per-request id, read back by the `Caller` extractor.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Wraps `router` in the transport-level middleware stack.
///
/// The body limit sits directly on the router; everything else is one
/// `ServiceBuilder` stack.
///
/// **Ordering (outermost to innermost):**
/// 1. `SetRequestId`: assigns a UUID v4 `x-request-id` unless the caller sent one
/// 2. `Tracing`: request/response spans
/// 3. `Compression`: gzip responses
/// 4. `CORS`: configured origins, CRUD methods
/// 5. `PropagateRequestId`: copies `x-request-id` onto the response
/// 6. `json_error_bodies`: rewrites bare error responses as `{"error": ...}`
/// 7. `Timeout`: 408 past the configured duration, surfaced as a 500
/// 8. `RequestBodyLimit`: 413 for oversized bodies, surfaced as a 400
pub fn apply_http_layers(router: Router, config: &NetworkConfig) -> Router {
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    router
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(build_cors_layer(&config.cors_origins))
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(map_response(json_error_bodies))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.request_timeout,
                )),
        )
}

/// Gives error responses produced below the handlers (timeouts, body
/// limits, unmatched routes) the same JSON shape and status set as engine
/// rejections. Responses that already carry JSON pass through.
async fn json_error_bodies(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(&response) {
        return response;
    }

    let rejection = edge_rejection(status);
    if let Some(detail) = &rejection.detail {
        warn!(%status, detail, "edge failure");
    }
    ApiError(rejection).into_response()
}

fn edge_rejection(status: StatusCode) -> Rejection {
    match status {
        StatusCode::REQUEST_TIMEOUT => Rejection::internal("request timed out"),
        StatusCode::PAYLOAD_TOO_LARGE => Rejection::bad_request("request body too large"),
        StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => {
            Rejection::not_found("no such route")
        }
        s if s.is_client_error() => {
            Rejection::bad_request(s.canonical_reason().unwrap_or("bad request"))
        }
        s => Rejection::internal(format!("unhandled {s} below the handlers")),
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// Builds the CORS layer from the configured list of allowed origins.
///
/// A wildcard `"*"` allows any origin; otherwise each origin is parsed into
/// an explicit allowlist and unparsable entries are dropped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}
