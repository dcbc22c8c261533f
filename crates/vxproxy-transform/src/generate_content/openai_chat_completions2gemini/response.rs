use vxproxy_protocol::gemini::generate_content::{
    Candidate, FinishReason, GenerateContentResponse, UsageMetadata,
};
use vxproxy_protocol::gemini::types::{FunctionCall as GeminiFunctionCall, Part as GeminiPart};
use vxproxy_protocol::openai::create_chat_completions::{
    ChatCompletionChoice, ChatCompletionFinishReason, ChatCompletionMessageToolCall,
    ChatCompletionMessageToolCallFunction, ChatCompletionObjectType, ChatCompletionResponseMessage,
    ChatCompletionRole, ChatCompletionToolCallType, CompletionTokensDetails, CompletionUsage,
    CreateChatCompletionResponse,
};

use crate::generate_content::{ChatCompletionMeta, new_tool_call_id};
use crate::think_tag::{SplitOutput, TagSplitter};

/// Convert a Gemini generate-content response into an OpenAI chat-completions response.
pub fn transform_response(
    response: GenerateContentResponse,
    meta: &ChatCompletionMeta,
) -> CreateChatCompletionResponse {
    let choices = if response.candidates.is_empty() {
        // Prompt blocked before any candidate was produced.
        vec![ChatCompletionChoice {
            index: 0,
            message: ChatCompletionResponseMessage {
                role: Some(ChatCompletionRole::Assistant),
                content: Some(String::new()),
                ..ChatCompletionResponseMessage::default()
            },
            finish_reason: response
                .prompt_feedback
                .as_ref()
                .and_then(|feedback| feedback.block_reason.as_ref())
                .map(|_| ChatCompletionFinishReason::ContentFilter),
            extra: Default::default(),
        }]
    } else {
        response
            .candidates
            .iter()
            .enumerate()
            .map(|(idx, candidate)| map_candidate(idx, candidate))
            .collect()
    };

    CreateChatCompletionResponse {
        id: meta.id.clone(),
        object: ChatCompletionObjectType::ChatCompletion,
        created: meta.created,
        model: meta.model.clone(),
        choices,
        usage: response.usage_metadata.as_ref().map(map_usage),
        extra: Default::default(),
    }
}

fn map_candidate(idx: usize, candidate: &Candidate) -> ChatCompletionChoice {
    let parts = candidate
        .content
        .as_ref()
        .map(|content| content.parts.as_slice())
        .unwrap_or_default();

    let split = split_parts(parts);
    let tool_calls = parts
        .iter()
        .filter_map(|part| part.function_call.as_ref())
        .map(map_function_call)
        .collect::<Vec<_>>();

    let content = if split.content.is_empty() && !tool_calls.is_empty() {
        None
    } else {
        Some(split.content)
    };

    ChatCompletionChoice {
        index: candidate.index.map(i64::from).unwrap_or(idx as i64),
        message: ChatCompletionResponseMessage {
            role: Some(ChatCompletionRole::Assistant),
            content,
            reasoning_content: (!split.reasoning.is_empty()).then_some(split.reasoning),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            extra: Default::default(),
        },
        finish_reason: candidate.finish_reason.map(map_finish_reason),
        extra: Default::default(),
    }
}

/// Concatenates text parts in order and splits tagged reasoning out of them.
/// Parts Gemini itself flags as thoughts go straight to reasoning, one per
/// line like tagged regions.
fn split_parts(parts: &[GeminiPart]) -> SplitOutput {
    let mut thoughts = Vec::new();
    let mut text = String::new();
    for part in parts {
        let Some(part_text) = part.text.as_deref() else {
            continue;
        };
        if part.thought == Some(true) {
            if !part_text.is_empty() {
                thoughts.push(part_text);
            }
        } else {
            text.push_str(part_text);
        }
    }

    let thoughts = thoughts.join("\n");
    let mut split = TagSplitter::new().split_complete(&text);
    if !thoughts.is_empty() {
        split.reasoning = if split.reasoning.is_empty() {
            thoughts
        } else {
            format!("{thoughts}\n{}", split.reasoning)
        };
    }
    split
}

pub(crate) fn map_function_call(call: &GeminiFunctionCall) -> ChatCompletionMessageToolCall {
    let arguments = call
        .args
        .as_ref()
        .and_then(|args| serde_json::to_string(args).ok())
        .unwrap_or_else(|| "{}".to_string());

    ChatCompletionMessageToolCall {
        id: new_tool_call_id(),
        r#type: ChatCompletionToolCallType::Function,
        function: ChatCompletionMessageToolCallFunction {
            name: call.name.clone(),
            arguments,
        },
    }
}

/// Unknown non-empty reasons map to `stop`.
pub fn map_finish_reason(reason: FinishReason) -> ChatCompletionFinishReason {
    match reason {
        FinishReason::Stop => ChatCompletionFinishReason::Stop,
        FinishReason::MaxTokens => ChatCompletionFinishReason::Length,
        FinishReason::Safety | FinishReason::Recitation => ChatCompletionFinishReason::ContentFilter,
        _ => ChatCompletionFinishReason::Stop,
    }
}

pub fn map_usage(usage: &UsageMetadata) -> CompletionUsage {
    CompletionUsage {
        prompt_tokens: i64::from(usage.prompt_token_count),
        completion_tokens: i64::from(usage.candidates_token_count),
        total_tokens: i64::from(usage.total_token_count),
        completion_tokens_details: usage
            .thoughts_token_count
            .filter(|count| *count > 0)
            .map(|count| CompletionTokensDetails {
                reasoning_tokens: Some(i64::from(count)),
            }),
        extra: Default::default(),
    }
}
