use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::HeaderMap;
use http::header::AUTHORIZATION;

use crate::core::CoreState;
use crate::error::ProxyError;

/// Paths served without a client key.
const PUBLIC_PATHS: &[&str] = &["/", "/health"];

pub trait AuthProvider: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap, query: Option<&str>) -> Result<(), ProxyError>;
}

/// Used when no client key is configured.
#[derive(Debug, Default)]
pub struct NoopAuth;

impl AuthProvider for NoopAuth {
    fn authenticate(&self, _headers: &HeaderMap, _query: Option<&str>) -> Result<(), ProxyError> {
        Ok(())
    }
}

/// One shared key for every client.
pub struct StaticKeyAuth {
    key: String,
}

impl StaticKeyAuth {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl AuthProvider for StaticKeyAuth {
    fn authenticate(&self, headers: &HeaderMap, query: Option<&str>) -> Result<(), ProxyError> {
        match extract_api_key(headers, query) {
            Some(presented) if presented == self.key => Ok(()),
            _ => Err(ProxyError::invalid_api_key()),
        }
    }
}

pub fn auth_provider(api_key: Option<&str>) -> Arc<dyn AuthProvider> {
    match api_key {
        Some(key) => Arc::new(StaticKeyAuth::new(key)),
        None => Arc::new(NoopAuth),
    }
}

/// Looks in `Authorization: Bearer`, then `x-goog-api-key`, then `?key=`.
pub fn extract_api_key(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(token) = header_value(headers, AUTHORIZATION.as_str())
        .and_then(|auth| auth.strip_prefix("Bearer ").map(str::to_string))
    {
        return Some(token);
    }

    if let Some(value) = header_value(headers, "x-goog-api-key").filter(|v| !v.is_empty()) {
        return Some(value.to_string());
    }

    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == "key")
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

pub async fn require_api_key(
    State(state): State<Arc<CoreState>>,
    request: Request,
    next: Next,
) -> Response {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }
    match state.auth.authenticate(request.headers(), request.uri().query()) {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn bearer_wins_over_other_sources() {
        let map = headers(&[("authorization", "Bearer a"), ("x-goog-api-key", "b")]);
        assert_eq!(extract_api_key(&map, Some("key=c")).as_deref(), Some("a"));
    }

    #[test]
    fn goog_header_then_query() {
        let map = headers(&[("x-goog-api-key", "b")]);
        assert_eq!(extract_api_key(&map, Some("key=c")).as_deref(), Some("b"));
        assert_eq!(
            extract_api_key(&HeaderMap::new(), Some("alt=sse&key=c%2Bd")).as_deref(),
            Some("c+d")
        );
        assert_eq!(extract_api_key(&HeaderMap::new(), None), None);
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let map = headers(&[("authorization", "Basic xyz")]);
        assert_eq!(extract_api_key(&map, None), None);
    }

    #[test]
    fn static_key_rejects_mismatch() {
        let auth = StaticKeyAuth::new("secret");
        assert!(auth.authenticate(&headers(&[("authorization", "Bearer secret")]), None).is_ok());
        assert!(auth.authenticate(&headers(&[("authorization", "Bearer nope")]), None).is_err());
        assert!(auth.authenticate(&HeaderMap::new(), None).is_err());
    }
}
