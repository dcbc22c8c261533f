use vxproxy_protocol::gemini::generate_content::GenerateContentResponse;
use vxproxy_protocol::openai::create_chat_completions::{
    ChatCompletionChunkObjectType, ChatCompletionFinishReason, ChatCompletionMessageToolCallChunk,
    ChatCompletionMessageToolCallChunkFunction, ChatCompletionRole, ChatCompletionStreamChoice,
    ChatCompletionStreamResponseDelta, ChatCompletionToolCallType, CompletionUsage,
    CreateChatCompletionStreamResponse,
};

use super::response::{map_finish_reason, map_function_call, map_usage};
use crate::generate_content::ChatCompletionMeta;
use crate::think_tag::{SplitOutput, TagSplitter};

/// Turns Gemini stream chunks into OpenAI chat-completion chunks for a single
/// choice. Reasoning goes out before content, the first chunk carries the
/// assistant role, and `finish` emits the single terminal chunk.
#[derive(Debug, Clone)]
pub struct GeminiToOpenAIChatCompletionStreamState {
    meta: ChatCompletionMeta,
    splitter: TagSplitter,
    role_sent: bool,
    finished: bool,
    next_tool_index: i64,
    finish_reason: Option<ChatCompletionFinishReason>,
    usage: Option<CompletionUsage>,
}

impl GeminiToOpenAIChatCompletionStreamState {
    pub fn new(meta: ChatCompletionMeta) -> Self {
        Self {
            meta,
            splitter: TagSplitter::new(),
            role_sent: false,
            finished: false,
            next_tool_index: 0,
            finish_reason: None,
            usage: None,
        }
    }

    pub fn meta(&self) -> &ChatCompletionMeta {
        &self.meta
    }

    pub fn transform_response(
        &mut self,
        response: GenerateContentResponse,
    ) -> Vec<CreateChatCompletionStreamResponse> {
        if let Some(usage) = &response.usage_metadata {
            self.usage = Some(map_usage(usage));
        }

        let Some(candidate) = response.candidates.into_iter().next() else {
            return Vec::new();
        };
        if let Some(reason) = candidate.finish_reason {
            self.finish_reason = Some(map_finish_reason(reason));
        }

        let mut split = SplitOutput::default();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|content| content.parts).unwrap_or_default() {
            if let Some(text) = part.text.as_deref() {
                if part.thought == Some(true) {
                    split.reasoning.push_str(text);
                } else {
                    split.append(self.splitter.push(text));
                }
            }
            if let Some(call) = &part.function_call {
                let call = map_function_call(call);
                tool_calls.push(ChatCompletionMessageToolCallChunk {
                    index: self.next_tool_index,
                    id: Some(call.id),
                    r#type: Some(ChatCompletionToolCallType::Function),
                    function: Some(ChatCompletionMessageToolCallChunkFunction {
                        name: Some(call.function.name),
                        arguments: Some(call.function.arguments),
                    }),
                });
                self.next_tool_index += 1;
            }
        }

        let mut chunks = self.text_chunks(split);
        if !tool_calls.is_empty() {
            let delta = ChatCompletionStreamResponseDelta {
                tool_calls: Some(tool_calls),
                ..ChatCompletionStreamResponseDelta::default()
            };
            chunks.push(self.make_chunk(delta, None));
        }
        chunks
    }

    /// Flushes held-back text and emits the terminal chunk. Subsequent calls
    /// return nothing.
    pub fn finish(&mut self) -> Vec<CreateChatCompletionStreamResponse> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let tail = self.splitter.finish();
        let mut chunks = self.text_chunks(tail);
        let reason = self
            .finish_reason
            .unwrap_or(ChatCompletionFinishReason::Stop);
        chunks.push(self.make_chunk(ChatCompletionStreamResponseDelta::default(), Some(reason)));
        chunks
    }

    fn text_chunks(&mut self, split: SplitOutput) -> Vec<CreateChatCompletionStreamResponse> {
        let mut chunks = Vec::new();
        if !split.reasoning.is_empty() {
            let delta = ChatCompletionStreamResponseDelta {
                reasoning_content: Some(split.reasoning),
                ..ChatCompletionStreamResponseDelta::default()
            };
            chunks.push(self.make_chunk(delta, None));
        }
        if !split.content.is_empty() {
            let delta = ChatCompletionStreamResponseDelta {
                content: Some(split.content),
                ..ChatCompletionStreamResponseDelta::default()
            };
            chunks.push(self.make_chunk(delta, None));
        }
        chunks
    }

    fn make_chunk(
        &mut self,
        mut delta: ChatCompletionStreamResponseDelta,
        finish_reason: Option<ChatCompletionFinishReason>,
    ) -> CreateChatCompletionStreamResponse {
        if !self.role_sent {
            self.role_sent = true;
            delta.role = Some(ChatCompletionRole::Assistant);
        }

        CreateChatCompletionStreamResponse {
            id: self.meta.id.clone(),
            object: ChatCompletionChunkObjectType::ChatCompletionChunk,
            created: self.meta.created,
            model: self.meta.model.clone(),
            choices: vec![ChatCompletionStreamChoice {
                index: 0,
                delta,
                finish_reason,
                extra: Default::default(),
            }],
            usage: if finish_reason.is_some() {
                self.usage.clone()
            } else {
                None
            },
            extra: Default::default(),
        }
    }
}
