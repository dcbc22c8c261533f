use std::time::Instant;

use axum::body::Body;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, ORIGIN,
};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use tracing::info;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-vxproxy-request-id";

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Goog-Api-Key";
const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Per-request id, available to handlers as an extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Answers preflights and decorates every other response with CORS headers.
pub async fn cors(request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(ORIGIN)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));
    let expose = request.uri().path() == CHAT_COMPLETIONS_PATH;

    let mut response = if request.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        response
    } else {
        next.run(request).await
    };
    apply_cors_headers(response.headers_mut(), origin, expose);
    response
}

fn apply_cors_headers(headers: &mut HeaderMap, origin: HeaderValue, expose: bool) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    if expose {
        headers.insert(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("Content-Type"),
        );
    }
}

/// Assigns the request id and logs one line per request once headers are out.
pub async fn access_log(mut request: Request, next: Next) -> Response {
    let started_at = Instant::now();
    let trace_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(RequestId(trace_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    info!(
        event = "downstream_responded",
        trace_id = %trace_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started_at.elapsed().as_millis()
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expose_header_only_when_requested() {
        let mut headers = HeaderMap::new();
        apply_cors_headers(&mut headers, HeaderValue::from_static("https://a.test"), false);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://a.test");
        assert!(headers.get(ACCESS_CONTROL_EXPOSE_HEADERS).is_none());

        apply_cors_headers(&mut headers, HeaderValue::from_static("*"), true);
        assert_eq!(headers[ACCESS_CONTROL_EXPOSE_HEADERS], "Content-Type");
        assert_eq!(headers[ACCESS_CONTROL_MAX_AGE], "86400");
    }
}
