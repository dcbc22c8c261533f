use vxproxy_protocol::openai::create_chat_completions::CreateChatCompletionResponse;

use crate::think_tag::TagSplitter;

/// Splits tagged reasoning out of every choice's message content.
pub fn transform_response(mut response: CreateChatCompletionResponse) -> CreateChatCompletionResponse {
    for choice in &mut response.choices {
        let Some(content) = choice.message.content.take() else {
            continue;
        };
        let split = TagSplitter::new().split_complete(&content);
        choice.message.content = Some(split.content);
        if !split.reasoning.is_empty() {
            choice.message.reasoning_content = Some(match choice.message.reasoning_content.take() {
                Some(existing) if !existing.is_empty() => format!("{existing}\n{}", split.reasoning),
                _ => split.reasoning,
            });
        }
    }
    response
}
