use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid request body: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}
