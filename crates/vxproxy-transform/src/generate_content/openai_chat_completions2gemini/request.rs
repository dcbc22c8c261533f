use std::collections::HashMap;

use serde_json::{Value as JsonValue, json};
use vxproxy_protocol::gemini::generate_content::GenerateContentRequest;
use vxproxy_protocol::gemini::types::{
    Blob as GeminiBlob, Content as GeminiContent, ContentRole as GeminiContentRole,
    FunctionCall as GeminiFunctionCall, FunctionCallingConfig, FunctionCallingMode,
    FunctionDeclaration, FunctionResponse as GeminiFunctionResponse, GenerationConfig,
    Part as GeminiPart, ThinkingConfig, Tool as GeminiTool, ToolConfig,
};
use vxproxy_protocol::openai::create_chat_completions::{
    ChatCompletionContentPart, ChatCompletionMessageContent, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestMessage, ChatCompletionRequestToolMessage, ChatCompletionResponseFormat,
    ChatCompletionToolChoiceMode, ChatCompletionToolChoiceOption, ChatCompletionToolDefinition,
    CreateChatCompletionRequest,
};

use crate::error::TransformError;
use crate::model::ModelTarget;

/// Convert an OpenAI chat-completions request into a Gemini generate-content body.
/// The physical model travels in the upstream URL, not in the body.
pub fn transform_request(
    request: &CreateChatCompletionRequest,
    target: &ModelTarget,
) -> Result<GenerateContentRequest, TransformError> {
    if request.model.trim().is_empty() {
        return Err(TransformError::MissingField("model"));
    }
    if request.messages.is_empty() {
        return Err(TransformError::MissingField("messages"));
    }

    let mut system_texts = Vec::new();
    let mut contents = Vec::new();
    // tool_call id -> function name, for tool results that omit `name`.
    let mut call_names: HashMap<String, String> = HashMap::new();

    for message in &request.messages {
        match message {
            ChatCompletionRequestMessage::System(system)
            | ChatCompletionRequestMessage::Developer(system) => {
                let text = content_text(system.content.as_ref());
                if !text.is_empty() {
                    system_texts.push(text);
                }
            }
            ChatCompletionRequestMessage::User(user) => {
                let parts = map_user_parts(user.content.as_ref());
                if !parts.is_empty() {
                    contents.push(GeminiContent {
                        parts,
                        role: Some(GeminiContentRole::User),
                    });
                }
            }
            ChatCompletionRequestMessage::Assistant(assistant) => {
                if let Some(content) = map_assistant_message(assistant, &mut call_names) {
                    contents.push(content);
                }
            }
            ChatCompletionRequestMessage::Tool(tool) => {
                contents.push(map_tool_message(tool, &call_names));
            }
        }
    }

    let system_instruction = (!system_texts.is_empty()).then(|| GeminiContent {
        parts: vec![GeminiPart::text(system_texts.join("\n"))],
        role: None,
    });

    Ok(GenerateContentRequest {
        contents,
        system_instruction,
        generation_config: map_generation_config(request, target),
        tools: map_tools(request.tools.as_deref()),
        tool_config: request.tool_choice.as_ref().map(map_tool_choice),
        safety_settings: request
            .safety_settings
            .clone()
            .filter(|settings| !settings.is_empty()),
    })
}

fn content_text(content: Option<&ChatCompletionMessageContent>) -> String {
    content.map(ChatCompletionMessageContent::text).unwrap_or_default()
}

fn map_user_parts(content: Option<&ChatCompletionMessageContent>) -> Vec<GeminiPart> {
    match content {
        None => Vec::new(),
        Some(ChatCompletionMessageContent::Text(text)) if text.is_empty() => Vec::new(),
        Some(ChatCompletionMessageContent::Text(text)) => vec![GeminiPart::text(text.clone())],
        Some(ChatCompletionMessageContent::Parts(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                ChatCompletionContentPart::Text { text } if !text.is_empty() => {
                    Some(GeminiPart::text(text.clone()))
                }
                ChatCompletionContentPart::ImageUrl { image_url } => image_part(&image_url.url),
                _ => None,
            })
            .collect(),
    }
}

fn map_assistant_message(
    assistant: &ChatCompletionRequestAssistantMessage,
    call_names: &mut HashMap<String, String>,
) -> Option<GeminiContent> {
    let tool_calls = assistant.tool_calls.as_deref().unwrap_or_default();
    let parts = if tool_calls.is_empty() {
        let text = content_text(assistant.content.as_ref());
        if text.is_empty() {
            Vec::new()
        } else {
            vec![GeminiPart::text(text)]
        }
    } else {
        // Tool calls win; any text on the same turn is dropped.
        tool_calls
            .iter()
            .map(|call| {
                call_names.insert(call.id.clone(), call.function.name.clone());
                GeminiPart {
                    function_call: Some(GeminiFunctionCall {
                        id: None,
                        name: call.function.name.clone(),
                        args: Some(parse_arguments(&call.function.arguments)),
                    }),
                    ..GeminiPart::default()
                }
            })
            .collect()
    };

    (!parts.is_empty()).then(|| GeminiContent {
        parts,
        role: Some(GeminiContentRole::Model),
    })
}

fn map_tool_message(
    tool: &ChatCompletionRequestToolMessage,
    call_names: &HashMap<String, String>,
) -> GeminiContent {
    let name = tool
        .name
        .clone()
        .filter(|name| !name.is_empty())
        .or_else(|| {
            tool.tool_call_id
                .as_ref()
                .and_then(|id| call_names.get(id).cloned())
        })
        .unwrap_or_default();

    let text = content_text(tool.content.as_ref());
    let response = match serde_json::from_str::<JsonValue>(&text) {
        Ok(value @ JsonValue::Object(_)) => value,
        _ => json!({ "result": text }),
    };

    GeminiContent {
        parts: vec![GeminiPart {
            function_response: Some(GeminiFunctionResponse {
                id: None,
                name,
                response,
            }),
            ..GeminiPart::default()
        }],
        role: Some(GeminiContentRole::User),
    }
}

fn parse_arguments(arguments: &str) -> JsonValue {
    match serde_json::from_str::<JsonValue>(arguments) {
        Ok(value @ JsonValue::Object(_)) => value,
        _ => json!({}),
    }
}

/// Data URLs (bare or inside a markdown image) become inline data. Remote
/// URLs are never fetched and yield no part.
fn image_part(url: &str) -> Option<GeminiPart> {
    let data_url = if url.starts_with("data:") {
        url
    } else {
        markdown_data_url(url)?
    };
    let (meta, data) = data_url.strip_prefix("data:")?.split_once(',')?;

    Some(GeminiPart {
        inline_data: Some(GeminiBlob {
            mime_type: image_mime_type(meta).to_string(),
            data: data.to_string(),
        }),
        ..GeminiPart::default()
    })
}

fn markdown_data_url(text: &str) -> Option<&str> {
    let start = text.find("![")?;
    let rest = &text[start + 2..];
    let target = &rest[rest.find("](data:")? + 2..];
    let end = target.find(')')?;
    Some(&target[..end])
}

fn image_mime_type(meta: &str) -> &'static str {
    if meta.contains("image/jpeg") {
        "image/jpeg"
    } else if meta.contains("image/gif") {
        "image/gif"
    } else if meta.contains("image/webp") {
        "image/webp"
    } else {
        "image/png"
    }
}

fn map_generation_config(
    request: &CreateChatCompletionRequest,
    target: &ModelTarget,
) -> Option<GenerationConfig> {
    let config = GenerationConfig {
        stop_sequences: request
            .stop
            .clone()
            .map(|stop| stop.into_vec())
            .filter(|stops| !stops.is_empty()),
        response_mime_type: matches!(
            request.response_format,
            Some(ChatCompletionResponseFormat::JsonObject)
        )
        .then(|| "application/json".to_string()),
        candidate_count: request
            .n
            .filter(|n| *n > 1)
            .and_then(|n| u32::try_from(n).ok()),
        max_output_tokens: request
            .max_completion_tokens
            .or(request.max_tokens)
            .and_then(|value| u32::try_from(value).ok()),
        temperature: request.temperature,
        top_p: request.top_p,
        top_k: request.top_k.and_then(|value| u32::try_from(value).ok()),
        thinking_config: target.thinking.map(|tier| ThinkingConfig {
            include_thoughts: None,
            thinking_budget: Some(tier.budget()),
        }),
    };

    (!config.is_empty()).then_some(config)
}

fn map_tools(tools: Option<&[ChatCompletionToolDefinition]>) -> Option<Vec<GeminiTool>> {
    let declarations = tools?
        .iter()
        .filter_map(|tool| match tool {
            ChatCompletionToolDefinition::Function { function } => Some(FunctionDeclaration {
                name: function.name.clone(),
                description: function.description.clone(),
                parameters: function.parameters.clone(),
            }),
            ChatCompletionToolDefinition::Unsupported => None,
        })
        .collect::<Vec<_>>();

    (!declarations.is_empty()).then(|| {
        vec![GeminiTool {
            function_declarations: Some(declarations),
        }]
    })
}

fn map_tool_choice(choice: &ChatCompletionToolChoiceOption) -> ToolConfig {
    let config = match choice {
        ChatCompletionToolChoiceOption::Mode(mode) => FunctionCallingConfig {
            mode: Some(match mode {
                ChatCompletionToolChoiceMode::None => FunctionCallingMode::None,
                ChatCompletionToolChoiceMode::Auto => FunctionCallingMode::Auto,
                ChatCompletionToolChoiceMode::Required => FunctionCallingMode::Any,
            }),
            allowed_function_names: None,
        },
        ChatCompletionToolChoiceOption::Named(named) => FunctionCallingConfig {
            mode: Some(FunctionCallingMode::Any),
            allowed_function_names: Some(vec![named.function.name.clone()]),
        },
    };

    ToolConfig {
        function_calling_config: Some(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ThinkingTier;

    fn parse(value: JsonValue) -> CreateChatCompletionRequest {
        serde_json::from_value(value).unwrap()
    }

    fn to_json(request: &CreateChatCompletionRequest, target: &ModelTarget) -> JsonValue {
        serde_json::to_value(transform_request(request, target).unwrap()).unwrap()
    }

    #[test]
    fn system_turns_become_one_instruction() {
        let request = parse(json!({
            "model": "gemini-2.5-pro",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "developer", "content": "use metric"},
                {"role": "user", "content": "hi"}
            ]
        }));
        let body = to_json(&request, &ModelTarget::plain("gemini-2.5-pro"));
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief\nuse metric");
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["contents"][0]["role"], "user");
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn tool_calls_take_precedence_over_text() {
        let request = parse(json!({
            "model": "m",
            "messages": [
                {"role": "user", "content": "weather?"},
                {"role": "assistant", "content": "checking", "tool_calls": [
                    {"id": "call_1", "type": "function",
                     "function": {"name": "get_weather", "arguments": "{\"city\":\"Oslo\"}"}},
                    {"id": "call_2", "type": "function",
                     "function": {"name": "get_time", "arguments": "not json"}}
                ]},
                {"role": "tool", "tool_call_id": "call_1", "content": "{\"temp\":3}"},
                {"role": "tool", "tool_call_id": "call_2", "name": "get_time", "content": "noon"}
            ]
        }));
        let body = to_json(&request, &ModelTarget::plain("m"));
        let model_turn = &body["contents"][1];
        assert_eq!(model_turn["role"], "model");
        assert_eq!(model_turn["parts"].as_array().unwrap().len(), 2);
        assert!(model_turn["parts"][0].get("text").is_none());
        assert_eq!(model_turn["parts"][0]["functionCall"]["args"]["city"], "Oslo");
        assert_eq!(model_turn["parts"][1]["functionCall"]["args"], json!({}));

        let first = &body["contents"][2]["parts"][0]["functionResponse"];
        assert_eq!(body["contents"][2]["role"], "user");
        assert_eq!(first["name"], "get_weather");
        assert_eq!(first["response"], json!({"temp": 3}));
        let second = &body["contents"][3]["parts"][0]["functionResponse"];
        assert_eq!(second["response"], json!({"result": "noon"}));
    }

    #[test]
    fn images_use_inline_data_and_skip_remote_urls() {
        let request = parse(json!({
            "model": "m",
            "messages": [{"role": "user", "content": [
                {"type": "text", "text": "what is this"},
                {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,AAAA"}},
                {"type": "image_url", "image_url": {"url": "![cat](data:image/webp;base64,BBBB)"}},
                {"type": "image_url", "image_url": {"url": "data:application/octet-stream;base64,CCCC"}},
                {"type": "image_url", "image_url": {"url": "https://example.com/cat.png"}}
            ]}]
        }));
        let body = to_json(&request, &ModelTarget::plain("m"));
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[1]["inlineData"], json!({"mimeType": "image/jpeg", "data": "AAAA"}));
        assert_eq!(parts[2]["inlineData"], json!({"mimeType": "image/webp", "data": "BBBB"}));
        assert_eq!(parts[3]["inlineData"]["mimeType"], "image/png");
    }

    #[test]
    fn generation_parameters_map_by_name() {
        let request = parse(json!({
            "model": "m",
            "messages": [{"role": "user", "content": "x"}],
            "temperature": 0.2,
            "top_p": 0.9,
            "top_k": 40,
            "max_tokens": 100,
            "max_completion_tokens": 200,
            "stop": "END",
            "n": 1,
            "response_format": {"type": "json_object"}
        }));
        let body = to_json(&request, &ModelTarget::plain("m"));
        let config = &body["generationConfig"];
        assert_eq!(config["temperature"], 0.2);
        assert_eq!(config["topP"], 0.9);
        assert_eq!(config["topK"], 40);
        assert_eq!(config["maxOutputTokens"], 200);
        assert_eq!(config["stopSequences"], json!(["END"]));
        assert!(config.get("candidateCount").is_none());
        assert_eq!(config["responseMimeType"], "application/json");
    }

    #[test]
    fn candidate_count_only_above_one() {
        let request = parse(json!({
            "model": "m",
            "messages": [{"role": "user", "content": "x"}],
            "n": 3,
            "stop": ["a", "b"]
        }));
        let body = to_json(&request, &ModelTarget::plain("m"));
        assert_eq!(body["generationConfig"]["candidateCount"], 3);
        assert_eq!(body["generationConfig"]["stopSequences"], json!(["a", "b"]));
    }

    #[test]
    fn alias_tier_sets_thinking_budget() {
        let request = parse(json!({
            "model": "gemini-3-pro-preview-high",
            "messages": [{"role": "user", "content": "x"}]
        }));
        let target = ModelTarget {
            model: "gemini-3-pro-preview".to_string(),
            thinking: Some(ThinkingTier::High),
        };
        let body = to_json(&request, &target);
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 8192);

        let low = ModelTarget {
            thinking: Some(ThinkingTier::Low),
            ..target
        };
        let body = to_json(&request, &low);
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 1024);
    }

    #[test]
    fn tool_choice_modes() {
        let cases = [
            (json!("none"), "NONE"),
            (json!("auto"), "AUTO"),
            (json!("required"), "ANY"),
        ];
        for (choice, mode) in cases {
            let request = parse(json!({
                "model": "m",
                "messages": [{"role": "user", "content": "x"}],
                "tool_choice": choice
            }));
            let body = to_json(&request, &ModelTarget::plain("m"));
            assert_eq!(body["toolConfig"]["functionCallingConfig"]["mode"], mode);
        }
    }

    #[test]
    fn named_tool_choice_forces_single_function() {
        let request = parse(json!({
            "model": "m",
            "messages": [{"role": "user", "content": "x"}],
            "tools": [{"type": "function", "function": {
                "name": "foo", "description": "d", "parameters": {"type": "object"}}}],
            "tool_choice": {"type": "function", "function": {"name": "foo"}}
        }));
        let body = to_json(&request, &ModelTarget::plain("m"));
        assert_eq!(
            body["toolConfig"]["functionCallingConfig"],
            json!({"mode": "ANY", "allowedFunctionNames": ["foo"]})
        );
        assert_eq!(body["tools"][0]["functionDeclarations"][0]["name"], "foo");
    }

    #[test]
    fn safety_settings_pass_through() {
        let request = parse(json!({
            "model": "m",
            "messages": [{"role": "user", "content": "x"}],
            "safety_settings": [
                {"category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE"}
            ]
        }));
        let body = to_json(&request, &ModelTarget::plain("m"));
        assert_eq!(body["safetySettings"][0]["threshold"], "BLOCK_NONE");
    }

    #[test]
    fn rejects_empty_messages() {
        let request = parse(json!({"model": "m", "messages": []}));
        let err = transform_request(&request, &ModelTarget::plain("m")).unwrap_err();
        assert!(matches!(err, TransformError::MissingField("messages")));
    }
}
