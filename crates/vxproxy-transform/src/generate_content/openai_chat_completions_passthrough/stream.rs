use vxproxy_protocol::openai::create_chat_completions::{
    ChatCompletionChunkObjectType, ChatCompletionStreamChoice, ChatCompletionStreamResponseDelta,
    CreateChatCompletionStreamResponse,
};

use crate::think_tag::{SplitOutput, TagSplitter};

/// Re-emits upstream OpenAI chunks with tagged reasoning moved into
/// `reasoning_content`. Chunks without content pass through untouched.
#[derive(Debug, Clone, Default)]
pub struct OpenAIChatCompletionReasoningStreamState {
    splitter: TagSplitter,
    last_id: Option<(String, i64, String)>,
}

impl OpenAIChatCompletionReasoningStreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transform_chunk(
        &mut self,
        mut chunk: CreateChatCompletionStreamResponse,
    ) -> Vec<CreateChatCompletionStreamResponse> {
        self.last_id = Some((chunk.id.clone(), chunk.created, chunk.model.clone()));

        let finishing = chunk
            .choices
            .iter()
            .any(|choice| choice.finish_reason.is_some());
        let has_text = chunk
            .choices
            .first()
            .is_some_and(|choice| choice.delta.content.is_some());
        if !has_text {
            if !finishing {
                return vec![chunk];
            }
            // Held-back text must precede the finish reason.
            let index = chunk.choices.first().map_or(0, |choice| choice.index);
            let mut out = self.flush(&chunk, index);
            out.push(chunk);
            return out;
        }

        let choice = &mut chunk.choices[0];
        let text = choice.delta.content.take().unwrap_or_default();
        let index = choice.index;
        let mut split = self.splitter.push(&text);
        if finishing {
            split.append(self.splitter.finish());
        }

        let mut out = Vec::new();
        if !split.reasoning.is_empty() {
            let delta = ChatCompletionStreamResponseDelta {
                role: choice.delta.role.take(),
                reasoning_content: Some(split.reasoning),
                ..ChatCompletionStreamResponseDelta::default()
            };
            out.push(derived_chunk(&chunk, index, delta));
        }

        let choice = &mut chunk.choices[0];
        if !split.content.is_empty() {
            choice.delta.content = Some(split.content);
        }
        let carries_more = choice.delta.content.is_some()
            || choice.delta.role.is_some()
            || choice.delta.reasoning_content.is_some()
            || choice.delta.tool_calls.is_some()
            || choice.finish_reason.is_some()
            || chunk.usage.is_some();
        if carries_more {
            out.push(chunk);
        }
        out
    }

    /// Content still held back when the upstream ends without a finish chunk.
    pub fn finish(&mut self) -> Vec<CreateChatCompletionStreamResponse> {
        let Some((id, created, model)) = self.last_id.clone() else {
            let _ = self.splitter.finish();
            return Vec::new();
        };
        let template = CreateChatCompletionStreamResponse {
            id,
            object: ChatCompletionChunkObjectType::ChatCompletionChunk,
            created,
            model,
            choices: Vec::new(),
            usage: None,
            extra: Default::default(),
        };
        self.flush(&template, 0)
    }

    /// Drains the splitter into standalone chunks, reasoning first.
    fn flush(
        &mut self,
        template: &CreateChatCompletionStreamResponse,
        index: i64,
    ) -> Vec<CreateChatCompletionStreamResponse> {
        let SplitOutput { content, reasoning } = self.splitter.finish();
        [
            (!reasoning.is_empty()).then(|| ChatCompletionStreamResponseDelta {
                reasoning_content: Some(reasoning),
                ..ChatCompletionStreamResponseDelta::default()
            }),
            (!content.is_empty()).then(|| ChatCompletionStreamResponseDelta {
                content: Some(content),
                ..ChatCompletionStreamResponseDelta::default()
            }),
        ]
        .into_iter()
        .flatten()
        .map(|delta| derived_chunk(template, index, delta))
        .collect()
    }
}

fn derived_chunk(
    source: &CreateChatCompletionStreamResponse,
    index: i64,
    delta: ChatCompletionStreamResponseDelta,
) -> CreateChatCompletionStreamResponse {
    CreateChatCompletionStreamResponse {
        id: source.id.clone(),
        object: ChatCompletionChunkObjectType::ChatCompletionChunk,
        created: source.created,
        model: source.model.clone(),
        choices: vec![ChatCompletionStreamChoice {
            index,
            delta,
            finish_reason: None,
            extra: Default::default(),
        }],
        usage: None,
        extra: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn chunk(content: Option<&str>, finish: Option<&str>) -> CreateChatCompletionStreamResponse {
        serde_json::from_value(json!({
            "id": "chatcmpl-up",
            "object": "chat.completion.chunk",
            "created": 9,
            "model": "google/gemini-2.5-flash",
            "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": finish}]
        }))
        .unwrap()
    }

    fn texts(chunks: &[CreateChatCompletionStreamResponse]) -> (String, String) {
        let mut content = String::new();
        let mut reasoning = String::new();
        for chunk in chunks {
            if let Some(choice) = chunk.choices.first() {
                content.push_str(choice.delta.content.as_deref().unwrap_or_default());
                reasoning.push_str(choice.delta.reasoning_content.as_deref().unwrap_or_default());
            }
        }
        (content, reasoning)
    }

    #[test]
    fn splits_across_upstream_chunks() {
        let mut state = OpenAIChatCompletionReasoningStreamState::new();
        let mut out = Vec::new();
        for piece in ["<vertex_think", "_tag>a plan</vertex_think_tag>", "Result"] {
            out.extend(state.transform_chunk(chunk(Some(piece), None)));
        }
        out.extend(state.transform_chunk(chunk(None, Some("stop"))));
        out.extend(state.finish());
        assert_eq!(texts(&out), ("Result".to_string(), "a plan".to_string()));
        assert!(out.last().unwrap().choices[0].finish_reason.is_some());
    }

    #[test]
    fn fully_buffered_chunk_is_dropped() {
        let mut state = OpenAIChatCompletionReasoningStreamState::new();
        assert!(state.transform_chunk(chunk(Some("<vertex"), None)).is_empty());
        let tail = state.finish();
        assert_eq!(texts(&tail), ("<vertex".to_string(), String::new()));
    }

    #[test]
    fn finish_reason_flushes_pending_text_into_same_chunk() {
        let mut state = OpenAIChatCompletionReasoningStreamState::new();
        let out = state.transform_chunk(chunk(Some("end <"), Some("stop")));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].choices[0].delta.content.as_deref(), Some("end <"));
        assert!(state.finish().is_empty());
    }

    #[test]
    fn held_back_text_precedes_a_bare_finish_chunk() {
        let mut state = OpenAIChatCompletionReasoningStreamState::new();
        let mut out = state.transform_chunk(chunk(Some("a <"), None));
        out.extend(state.transform_chunk(chunk(None, Some("stop"))));
        out.extend(state.finish());

        let contents: Vec<Option<&str>> = out
            .iter()
            .map(|c| c.choices[0].delta.content.as_deref())
            .collect();
        assert_eq!(contents, vec![Some("a "), Some("<"), None]);
        assert!(out.last().unwrap().choices[0].finish_reason.is_some());
    }

    #[test]
    fn unterminated_reasoning_is_flushed_before_finish() {
        let mut state = OpenAIChatCompletionReasoningStreamState::new();
        let mut out = state.transform_chunk(chunk(Some("<vertex_think_tag>still thinking"), None));
        out.extend(state.transform_chunk(chunk(None, Some("length"))));
        out.extend(state.finish());

        assert_eq!(texts(&out), (String::new(), "still thinking".to_string()));
        let finish_at = out
            .iter()
            .position(|c| c.choices[0].finish_reason.is_some())
            .unwrap();
        assert_eq!(finish_at, out.len() - 1);
    }

    #[test]
    fn usage_only_chunk_passes_through() {
        let mut state = OpenAIChatCompletionReasoningStreamState::new();
        let usage_chunk: CreateChatCompletionStreamResponse = serde_json::from_value(json!({
            "id": "x", "object": "chat.completion.chunk", "created": 1, "model": "m",
            "choices": [],
            "usage": {"prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3}
        }))
        .unwrap();
        let out = state.transform_chunk(usage_chunk.clone());
        assert_eq!(out, vec![usage_chunk]);
    }
}
