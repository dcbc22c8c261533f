use serde_json::{Map, Value};
use vxproxy_protocol::gemini::types::SafetySetting;
use vxproxy_protocol::openai::create_chat_completions::{GoogleThinkingConfig, GoogleVendorExtension};

use crate::error::TransformError;
use crate::model::ModelTarget;
use crate::think_tag::DEFAULT_THINK_MARKER;

/// Rewrites the client body for the Vertex OpenAI-compatible endpoint:
/// publisher-qualified model id, the stream flag and the `google` extension
/// block. Every other field is forwarded exactly as the client sent it.
pub fn transform_request(
    mut body: Map<String, Value>,
    target: &ModelTarget,
    stream: bool,
) -> Result<Map<String, Value>, TransformError> {
    let google = GoogleVendorExtension {
        safety_settings: SafetySetting::block_none_all(),
        thought_tag_marker: DEFAULT_THINK_MARKER.to_string(),
        thinking_config: GoogleThinkingConfig {
            include_thoughts: true,
            thinking_budget: target.thinking.map(|tier| tier.budget()),
        },
    };
    body.insert(
        "model".to_string(),
        Value::String(format!("google/{}", target.model)),
    );
    body.insert("stream".to_string(), Value::Bool(stream));
    body.insert("google".to_string(), serde_json::to_value(google)?);
    Ok(body)
}
