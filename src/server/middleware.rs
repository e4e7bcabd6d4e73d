//! Middleware for timing, host filtering, and CORS

use crate::api::ErrorResponse;
use crate::config::CorsConfig;
use crate::server::state::ServerState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sha2::{Digest, Sha256};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// Short request id: first 8 hex chars of SHA-256(uri + current time)
pub fn request_id(uri: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    let digest = Sha256::digest(format!("{}{}", uri, now).as_bytes());
    hex::encode(digest)[..8].to_string()
}

/// Adds `X-Process-Time` (seconds) and logs every request
pub async fn timing_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let mut response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status();
    if let Ok(value) = HeaderValue::from_str(&duration.to_string()) {
        response.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }

    if status.is_client_error() || status.is_server_error() {
        warn!(method = %method, path = %path, status_code = status.as_u16(), duration, "HTTP request");
    } else {
        info!(method = %method, path = %path, status_code = status.as_u16(), duration, "HTTP request");
    }

    response
}

/// Host part of a `Host` header value; bracketed IPv6 literals keep their brackets
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.find(']').map(|end| &host[..=end]).unwrap_or(host);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Whether `host` (without port) matches an allowed pattern; `*` allows
/// any host and `*.example.com` allows subdomains
pub fn host_allowed(host: &str, allowed: &[String]) -> bool {
    let host = strip_port(host).to_ascii_lowercase();
    allowed.iter().any(|pattern| {
        let pattern = pattern.to_ascii_lowercase();
        if pattern == "*" {
            true
        } else if let Some(suffix) = pattern.strip_prefix("*.") {
            host.ends_with(&format!(".{}", suffix))
        } else {
            host == pattern
        }
    })
}

/// Rejects requests whose `Host` is not in `server.trusted_hosts`
pub async fn trusted_host_middleware(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Response {
    let allowed = &state.server_config().trusted_hosts;
    if allowed.is_empty() {
        return next.run(request).await;
    }

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if host_allowed(host, allowed) {
        next.run(request).await
    } else {
        warn!(host = %host, "Rejected request with untrusted host header");
        let body = ErrorResponse::new(
            "Invalid host header",
            "TrustedHostError",
            Some(request_id(&request.uri().to_string())),
        );
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// CORS middleware configuration
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let wildcard = |values: &[String]| values.iter().any(|v| v == "*");
    let credentials = config.allow_credentials;

    let mut cors = CorsLayer::new().max_age(std::time::Duration::from_secs(config.max_age));

    // A literal `*` cannot be combined with credentials, so the request
    // values are echoed back instead
    cors = if wildcard(&config.allow_methods) {
        if credentials {
            cors.allow_methods(AllowMethods::mirror_request())
        } else {
            cors.allow_methods(Any)
        }
    } else {
        let methods: Vec<Method> = config
            .allow_methods
            .iter()
            .filter_map(|m| m.parse().ok())
            .collect();
        cors.allow_methods(methods)
    };

    cors = if wildcard(&config.allow_headers) {
        if credentials {
            cors.allow_headers(AllowHeaders::mirror_request())
        } else {
            cors.allow_headers(Any)
        }
    } else {
        let headers: Vec<header::HeaderName> = config
            .allow_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        cors.allow_headers(headers)
    };

    cors = if wildcard(&config.allow_origins) {
        if credentials {
            cors.allow_origin(AllowOrigin::mirror_request())
        } else {
            cors.allow_origin(Any)
        }
    } else {
        let origins: Vec<HeaderValue> = config
            .allow_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    };

    cors.allow_credentials(credentials)
}
