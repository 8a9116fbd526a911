//! OpenAI chat ↔ Gemini `generateContent` translation (spec §4.4 "OpenAI chat
//! → Gemini").

use crate::error::{LlmError, Result};
use crate::messages::gemini::{
    Candidate, Content, FunctionCall, FunctionDeclaration, GeminiTool, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, Part, TextPart,
};
use crate::messages::openai::{
    ChatCompletionRequest, ChatMessage, Choice, ContentPart, MessageContent, ResponseMessage, Tool, ToolCallFunction, ToolCallOut,
    Usage,
};
use serde_json::Value;

pub fn to_gemini_request(request: &ChatCompletionRequest) -> Result<GenerateContentRequest> {
    let mut system_instruction = None;
    let mut contents = Vec::new();

    for message in &request.messages {
        if message.role == "system" {
            let text = text_of(&message.content);
            system_instruction = Some(Content {
                role: "system".to_string(),
                parts: vec![Part::Text(TextPart { text })],
            });
            continue;
        }
        contents.push(to_gemini_content(message)?);
    }

    let generation_config = Some(GenerationConfig {
        temperature: request.temperature,
        top_p: request.top_p,
        max_output_tokens: request.max_tokens,
        stop_sequences: request.stop.clone().map(|s| s.into_vec()).unwrap_or_default(),
    });

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![GeminiTool {
            function_declarations: request.tools.iter().map(to_function_declaration).collect(),
        }]
    };

    Ok(GenerateContentRequest {
        contents,
        system_instruction,
        generation_config,
        tools,
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

fn to_gemini_content(message: &ChatMessage) -> Result<Content> {
    let role = match message.role.as_str() {
        "user" | "tool" => "user",
        "assistant" => "model",
        other => return Err(LlmError::InvalidRequest(format!("unsupported message role '{other}'"))),
    };

    let mut parts = Vec::new();

    match &message.content {
        Some(MessageContent::Text(text)) if !text.is_empty() => parts.push(Part::Text(TextPart { text: text.clone() })),
        Some(MessageContent::Parts(content_parts)) => {
            for part in content_parts {
                parts.push(to_gemini_part(part)?);
            }
        }
        _ => {}
    }

    for call in &message.tool_calls {
        parts.push(Part::FunctionCall {
            function_call: FunctionCall {
                name: call.function.name.clone(),
                args: serde_json::from_str(&call.function.arguments).unwrap_or(Value::Null),
            },
        });
    }

    Ok(Content { role: role.to_string(), parts })
}

fn to_gemini_part(part: &ContentPart) -> Result<Part> {
    match part {
        ContentPart::Text { text } => Ok(Part::Text(TextPart { text: text.clone() })),
        ContentPart::ImageUrl { image_url } => {
            let (mime_type, data) = super::imagen::inline_image_data(&image_url.url)?;
            Ok(Part::InlineData {
                inline_data: crate::messages::gemini::InlineData { mime_type, data },
            })
        }
    }
}

fn to_function_declaration(tool: &Tool) -> FunctionDeclaration {
    FunctionDeclaration {
        name: tool.function.name.clone(),
        description: tool.function.description.clone(),
        parameters: tool.function.parameters.clone(),
    }
}

pub fn from_gemini_response(
    response: GenerateContentResponse,
    id: &str,
    request_model: &str,
    created: i64,
) -> crate::messages::openai::ChatCompletionResponse {
    let candidate = response.candidates.into_iter().next();
    let (text, tool_calls, finish_reason) = match candidate {
        Some(Candidate { content, finish_reason }) => {
            let mut text = String::new();
            let mut tool_calls = Vec::new();
            if let Some(content) = content {
                for part in content.parts {
                    match part {
                        Part::Text(TextPart { text: part_text }) => text.push_str(&part_text),
                        Part::FunctionCall { function_call } => tool_calls.push(ToolCallOut {
                            id: format!("call_{}", uuid::Uuid::new_v4()),
                            kind: "function",
                            function: ToolCallFunction {
                                name: function_call.name,
                                arguments: serde_json::to_string(&function_call.args).unwrap_or_default(),
                            },
                        }),
                        _ => {}
                    }
                }
            }
            (text, tool_calls, map_finish_reason(finish_reason.as_deref()))
        }
        None => (String::new(), Vec::new(), None),
    };

    let usage = response
        .usage_metadata
        .map(|metadata| Usage {
            prompt_tokens: metadata.prompt_token_count,
            completion_tokens: metadata.candidates_token_count.unwrap_or(0),
            total_tokens: metadata.prompt_token_count + metadata.candidates_token_count.unwrap_or(0),
        })
        .unwrap_or_default();

    crate::messages::openai::ChatCompletionResponse {
        id: id.to_string(),
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
        usage,
    }
}

fn map_finish_reason(reason: Option<&str>) -> Option<String> {
    match reason {
        Some("STOP") => Some("stop".to_string()),
        Some("MAX_TOKENS") => Some("length".to_string()),
        Some(other) => Some(other.to_lowercase()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::gemini::UsageMetadata;
    use crate::messages::openai::ChatMessage;

    fn chat_request(messages: Vec<ChatMessage>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "gpt-4o".to_string(),
            messages,
            stream: false,
            temperature: None,
            top_p: None,
            max_tokens: Some(256),
            stop: None,
            tools: Vec::new(),
            tool_choice: None,
        }
    }

    #[test]
    fn assistant_role_maps_to_model() {
        let request = chat_request(vec![ChatMessage {
            role: "assistant".to_string(),
            content: Some(MessageContent::Text("hi".to_string())),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }]);
        let translated = to_gemini_request(&request).unwrap();
        assert_eq!(translated.contents[0].role, "model");
    }

    #[test]
    fn system_message_becomes_system_instruction_not_a_content_entry() {
        let request = chat_request(vec![
            ChatMessage {
                role: "system".to_string(),
                content: Some(MessageContent::Text("Be terse.".to_string())),
                tool_calls: Vec::new(),
                tool_call_id: None,
            },
            ChatMessage {
                role: "user".to_string(),
                content: Some(MessageContent::Text("hi".to_string())),
                tool_calls: Vec::new(),
                tool_call_id: None,
            },
        ]);
        let translated = to_gemini_request(&request).unwrap();
        assert!(translated.system_instruction.is_some());
        assert_eq!(translated.contents.len(), 1);
    }

    #[test]
    fn finish_reason_stop_maps_to_stop() {
        let response = GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: "model".to_string(),
                    parts: vec![Part::Text(TextPart { text: "hi".to_string() })],
                }),
                finish_reason: Some("STOP".to_string()),
            }],
            usage_metadata: Some(UsageMetadata {
                prompt_token_count: 3,
                candidates_token_count: Some(2),
            }),
        };
        let translated = from_gemini_response(response, "gen-1", "gemini-2.5-flash", 0);
        assert_eq!(translated.choices[0].finish_reason, Some("stop".to_string()));
        assert_eq!(translated.usage.total_tokens, 5);
    }
}
