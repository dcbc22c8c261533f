use serde::{Deserialize, Serialize};

/// OpenAI-style error envelope returned for every locally generated failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Int(i64),
    Str(String),
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, r#type: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                r#type: r#type.into(),
                code: None,
            },
        }
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.error.code = Some(code);
        self
    }

    /// Extracts `error.message` from an upstream body. Google APIs sometimes
    /// wrap the error object in a one-element array.
    pub fn message_from_body(body: &[u8]) -> Option<String> {
        let value = match serde_json::from_slice(body).ok()? {
            serde_json::Value::Array(items) => items.into_iter().next()?,
            other => other,
        };
        value
            .get("error")?
            .get("message")?
            .as_str()
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_code_when_present() {
        let body = ErrorResponse::new("Invalid API key", "invalid_request_error")
            .with_code(ErrorCode::Str("invalid_api_key".to_string()));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["type"], "invalid_request_error");
        assert_eq!(json["error"]["code"], "invalid_api_key");
    }

    #[test]
    fn omits_missing_code() {
        let json = serde_json::to_value(ErrorResponse::new("boom", "server_error")).unwrap();
        assert!(json["error"].get("code").is_none());
    }

    #[test]
    fn reads_upstream_message() {
        let body = br#"{"error":{"code":400,"message":"bad project","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            ErrorResponse::message_from_body(body).as_deref(),
            Some("bad project")
        );
        assert_eq!(
            ErrorResponse::message_from_body(br#"[{"error":{"message":"wrapped"}}]"#).as_deref(),
            Some("wrapped")
        );
        assert_eq!(ErrorResponse::message_from_body(b"not json"), None);
    }
}
