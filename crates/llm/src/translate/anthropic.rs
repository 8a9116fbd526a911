//! OpenAI chat/completions ↔ Anthropic Messages translation (spec §4.4
//! "OpenAI chat → Anthropic-on-Vertex").

use crate::error::{LlmError, Result};
use crate::messages::anthropic::{AnthropicMessage, AnthropicRequest, AnthropicResponse, AnthropicTool, ContentBlock, ImageSource};
use crate::messages::openai::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, ContentPart, MessageContent, ResponseMessage, Tool,
    ToolCallFunction, ToolCallOut, ToolChoice, Usage,
};
use serde_json::{Value, json};

const DEFAULT_MAX_TOKENS: u32 = 4_096;

/// Translate an inbound OpenAI chat request into an Anthropic Messages
/// request body (spec §4.4 steps: "merge leading system messages", "map
/// tool_choice", "carry max_tokens through, defaulting when absent").
pub fn to_anthropic_request(request: &ChatCompletionRequest, canonical_model: &str) -> Result<AnthropicRequest> {
    let mut system_parts = Vec::new();
    let mut messages = Vec::new();

    for message in &request.messages {
        if message.role == "system" {
            system_parts.push(text_of(&message.content));
            continue;
        }
        messages.push(to_anthropic_message(message)?);
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(Value::String(system_parts.join("\n\n")))
    };

    let tools = request
        .tools
        .iter()
        .map(to_anthropic_tool)
        .collect::<Vec<_>>();

    let tool_choice = request.tool_choice.as_ref().map(to_anthropic_tool_choice);

    Ok(AnthropicRequest {
        model: Some(canonical_model.to_string()),
        anthropic_version: Some("vertex-2023-10-16".to_string()),
        messages,
        system,
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: request.temperature,
        top_p: request.top_p,
        stop_sequences: request.stop.clone().map(|s| s.into_vec()).unwrap_or_default(),
        stream: request.stream,
        tools,
        tool_choice,
    })
}

fn text_of(content: &Option<MessageContent>) -> String {
    match content {
        Some(MessageContent::Text(text)) => text.clone(),
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.clone()),
                ContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        None => String::new(),
    }
}

fn to_anthropic_message(message: &ChatMessage) -> Result<AnthropicMessage> {
    let role = match message.role.as_str() {
        "user" => "user",
        "assistant" => "assistant",
        "tool" => "user",
        other => {
            return Err(LlmError::InvalidRequest(format!("unsupported message role '{other}'")));
        }
    };

    let mut content = Vec::new();

    if message.role == "tool" {
        let tool_use_id = message
            .tool_call_id
            .clone()
            .ok_or_else(|| LlmError::InvalidRequest("tool message missing tool_call_id".to_string()))?;
        content.push(ContentBlock::ToolResult {
            tool_use_id,
            content: Value::String(text_of(&message.content)),
            is_error: false,
        });
        return Ok(AnthropicMessage { role: role.to_string(), content });
    }

    match &message.content {
        Some(MessageContent::Text(text)) if !text.is_empty() => {
            content.push(ContentBlock::Text { text: text.clone() });
        }
        Some(MessageContent::Parts(parts)) => {
            for part in parts {
                content.push(to_content_block(part)?);
            }
        }
        _ => {}
    }

    for call in &message.tool_calls {
        content.push(ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.function.name.clone(),
            input: serde_json::from_str(&call.function.arguments).unwrap_or(Value::Null),
        });
    }

    Ok(AnthropicMessage { role: role.to_string(), content })
}

fn to_content_block(part: &ContentPart) -> Result<ContentBlock> {
    match part {
        ContentPart::Text { text } => Ok(ContentBlock::Text { text: text.clone() }),
        ContentPart::ImageUrl { image_url } => {
            let (media_type, data) = decode_data_url(&image_url.url)
                .ok_or_else(|| LlmError::InvalidRequest("only data: image URLs are supported inline".to_string()))?;
            Ok(ContentBlock::Image {
                source: ImageSource::Base64 { media_type, data },
            })
        }
    }
}

/// Parse a `data:<mime>;base64,<payload>` URL. Remote `http(s)://` image URLs
/// are rejected here with `InvalidRequest` rather than fetched (spec §4.4
/// "Image handling": fetch-with-placeholder-fallback is the Imagen/Gemini
/// path; Anthropic requires inline base64, so a remote URL is a client error,
/// not a proxy failure).
fn decode_data_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let media_type = header.strip_suffix(";base64")?;
    Some((media_type.to_string(), data.to_string()))
}

fn to_anthropic_tool(tool: &Tool) -> AnthropicTool {
    AnthropicTool {
        name: tool.function.name.clone(),
        description: tool.function.description.clone(),
        input_schema: tool.function.parameters.clone(),
    }
}

fn to_anthropic_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Mode(mode) if mode == "auto" => json!({"type": "auto"}),
        ToolChoice::Mode(mode) if mode == "none" => json!({"type": "none"}),
        ToolChoice::Mode(mode) if mode == "required" => json!({"type": "any"}),
        ToolChoice::Mode(other) => json!({"type": "auto", "name": other}),
        ToolChoice::Named { function, .. } => json!({"type": "tool", "name": function.name}),
    }
}

/// Translate a completed (non-streaming) Anthropic response into an OpenAI
/// chat completion response (spec §4.5 non-streaming response handler).
pub fn from_anthropic_response(response: AnthropicResponse, request_model: &str, created: i64) -> ChatCompletionResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            ContentBlock::Text { text: part } => text.push_str(&part),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCallOut {
                id,
                kind: "function",
                function: ToolCallFunction {
                    name,
                    arguments: serde_json::to_string(&input).unwrap_or_default(),
                },
            }),
            _ => {}
        }
    }

    let finish_reason = map_stop_reason(response.stop_reason.as_deref());

    ChatCompletionResponse {
        id: response.id,
        object: "chat.completion",
        created,
        model: request_model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant",
                content: if text.is_empty() { None } else { Some(text) },
                tool_calls,
            },
            finish_reason,
        }],
        usage: Usage {
            prompt_tokens: response.usage.input_tokens,
            completion_tokens: response.usage.output_tokens,
            total_tokens: response.usage.input_tokens + response.usage.output_tokens,
        },
    }
}

/// `stop_reason` mapping decided in the project's open-questions log: only
/// `end_turn` and `tool_use` are translated; everything else (including
/// future Anthropic reasons) passes through verbatim so clients that already
/// understand Anthropic's vocabulary keep working.
pub fn map_stop_reason(reason: Option<&str>) -> Option<String> {
    match reason {
        Some("end_turn") => Some("stop".to_string()),
        Some("tool_use") => Some("tool_calls".to_string()),
        Some(other) => Some(other.to_string()),
        None => None,
    }
}
