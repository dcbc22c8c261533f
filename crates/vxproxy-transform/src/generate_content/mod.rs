pub mod openai_chat_completions2gemini;
pub mod openai_chat_completions_passthrough;

use time::OffsetDateTime;

/// Identity shared by every object of one chat completion, sync or streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCompletionMeta {
    pub id: String,
    pub model: String,
    pub created: i64,
}

impl ChatCompletionMeta {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            model: model.into(),
            created: OffsetDateTime::now_utc().unix_timestamp(),
        }
    }
}

pub(crate) fn new_tool_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}
