//! Legacy `/v1/completions` → chat prompt-lift (spec §4.4 "Completions
//! passthrough via prompt-lift"): wrap the raw prompt as a single user
//! message and delegate to the same chat translators every other route uses.

use crate::messages::openai::{ChatCompletionRequest, ChatMessage, CompletionChoice, CompletionsRequest, CompletionsResponse, MessageContent};

pub fn lift_to_chat_request(request: &CompletionsRequest) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: request.model.clone(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: Some(MessageContent::Text(request.prompt.clone())),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }],
        stream: request.stream,
        temperature: request.temperature,
        top_p: None,
        max_tokens: request.max_tokens,
        stop: request.stop.clone(),
        tools: Vec::new(),
        tool_choice: None,
    }
}

/// Lower a chat completion response back onto the legacy `text` shape (spec
/// §4.4: "the completions response has one choice, carrying assistant text
/// only — tool calls are not representable here and are dropped").
pub fn lower_to_completions_response(
    chat: crate::messages::openai::ChatCompletionResponse,
) -> CompletionsResponse {
    let choice = chat.choices.into_iter().next();
    let (text, finish_reason) = match choice {
        Some(choice) => (choice.message.content.unwrap_or_default(), choice.finish_reason),
        None => (String::new(), None),
    };

    CompletionsResponse {
        id: chat.id,
        object: "text_completion",
        created: chat.created,
        model: chat.model,
        choices: vec![CompletionChoice { index: 0, text, finish_reason }],
        usage: chat.usage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::openai::{ChatCompletionResponse, Choice, ResponseMessage, Usage};

    #[test]
    fn prompt_becomes_a_single_user_message() {
        let request = CompletionsRequest {
            model: "claude-sonnet-4-5@20250929".to_string(),
            prompt: "Once upon a time".to_string(),
            stream: false,
            temperature: None,
            max_tokens: Some(100),
            stop: None,
        };
        let lifted = lift_to_chat_request(&request);
        assert_eq!(lifted.messages.len(), 1);
        assert_eq!(lifted.messages[0].role, "user");
    }

    #[test]
    fn tool_calls_are_dropped_when_lowering() {
        let chat = ChatCompletionResponse {
            id: "chatcmpl-1".to_string(),
            object: "chat.completion",
            created: 0,
            model: "claude-sonnet-4-5@20250929".to_string(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage {
                    role: "assistant",
                    content: Some("done".to_string()),
                    tool_calls: Vec::new(),
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: Usage::default(),
        };
        let lowered = lower_to_completions_response(chat);
        assert_eq!(lowered.choices[0].text, "done");
    }
}
