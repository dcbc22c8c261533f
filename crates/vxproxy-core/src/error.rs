use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use vxproxy_protocol::error::{ErrorCode, ErrorResponse};
use vxproxy_provider_core::{UpstreamError, header_get};
use vxproxy_transform::TransformError;

/// A complete error response: status plus the body to send as-is.
#[derive(Debug)]
pub struct ProxyError {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl ProxyError {
    /// OpenAI-shaped `{"error":{...}}` body with the status as its code.
    pub fn openai(status: StatusCode, r#type: &str, message: impl Into<String>) -> Self {
        let body = ErrorResponse::new(message, r#type)
            .with_code(ErrorCode::Int(i64::from(status.as_u16())));
        Self::json(status, &body)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::openai(StatusCode::BAD_REQUEST, "invalid_request_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::openai(StatusCode::NOT_FOUND, "invalid_request_error", message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::openai(StatusCode::BAD_GATEWAY, "server_error", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::openai(StatusCode::INTERNAL_SERVER_ERROR, "server_error", message)
    }

    pub fn invalid_api_key() -> Self {
        let body = ErrorResponse::new("Invalid API key", "invalid_request_error")
            .with_code(ErrorCode::Str("invalid_api_key".to_string()));
        Self::json(StatusCode::UNAUTHORIZED, &body)
    }

    /// Exhausted upstream failure. HTTP errors keep the backend's status and
    /// body; everything else is a 502.
    pub fn from_upstream(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Http {
                status,
                headers,
                body,
            } => Self {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                content_type: Some(
                    header_get(&headers, "content-type")
                        .unwrap_or("application/json")
                        .to_string(),
                ),
                body,
            },
            other => Self::bad_gateway(other.to_string()),
        }
    }

    fn json(status: StatusCode, body: &ErrorResponse) -> Self {
        let body = serde_json::to_vec(body)
            .map(Bytes::from)
            .unwrap_or_else(|_| Bytes::from_static(b"{}"));
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body,
        }
    }
}

impl From<TransformError> for ProxyError {
    fn from(value: TransformError) -> Self {
        ProxyError::bad_request(value.to_string())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut resp = Response::new(Body::from(self.body));
        *resp.status_mut() = self.status;
        if let Some(value) = self
            .content_type
            .as_deref()
            .and_then(|value| HeaderValue::from_str(value).ok())
        {
            resp.headers_mut().insert(CONTENT_TYPE, value);
        }
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_http_error_is_forwarded_verbatim() {
        let err = ProxyError::from_upstream(UpstreamError::Http {
            status: 429,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Bytes::from_static(br#"{"error":{"code":429}}"#),
        });
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(&err.body[..], br#"{"error":{"code":429}}"#);
    }

    #[test]
    fn transport_error_becomes_bad_gateway() {
        let err = ProxyError::from_upstream(UpstreamError::Decode("truncated".to_string()));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        let body: serde_json::Value = serde_json::from_slice(&err.body).unwrap();
        assert_eq!(body["error"]["type"], "server_error");
        assert_eq!(body["error"]["code"], 502);
    }

    #[test]
    fn invalid_api_key_shape() {
        let err = ProxyError::invalid_api_key();
        let body: serde_json::Value = serde_json::from_slice(&err.body).unwrap();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Invalid API key");
        assert_eq!(body["error"]["code"], "invalid_api_key");
    }
}
