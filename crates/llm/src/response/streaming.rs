//! Streaming response translation (spec §4.7): turns the provider's own SSE
//! stream into OpenAI-shaped `chat.completion.chunk` SSE frames, preserving
//! the required frame ordering — a role-only frame first, then content
//! deltas, then one finish-reason frame, then `[DONE]`. Grounded on the
//! teacher's `AnthropicStreamProcessor`, generalized to also drive from
//! Gemini's streamed JSON array.

use crate::messages::anthropic::{StreamContentBlockStart, StreamDelta, StreamEvent};
use crate::messages::gemini::GenerateContentResponse;
use crate::messages::openai::{ChatCompletionChunk, ChunkChoice, ChunkDelta, ToolCallDelta, ToolCallFunctionDelta};
use crate::translate::anthropic::map_stop_reason;

/// Per-stream state threaded through every event of one upstream SSE
/// connection (spec §3 `StreamState`). Tracks whether the role-opening frame
/// has been sent yet and which content-block index is an in-progress tool
/// call, since Anthropic's `input_json_delta` events carry only a partial
/// JSON fragment per event.
pub struct AnthropicStreamState {
    id: String,
    model: String,
    created: i64,
    role_sent: bool,
    tool_use_index: Option<u32>,
}

impl AnthropicStreamState {
    pub fn new(request_model: String, created: i64) -> Self {
        Self {
            id: String::new(),
            model: request_model,
            created,
            role_sent: false,
            tool_use_index: None,
        }
    }

    /// Feed one parsed upstream event, producing zero or more chunks to emit
    /// immediately (spec §4.7: "never buffer more than one event's worth of
    /// output"). Returns `None` once `message_stop` is seen, signaling the
    /// caller to emit `[DONE]` and close.
    pub fn on_event(&mut self, event: StreamEvent) -> Option<Vec<ChatCompletionChunk>> {
        match event {
            StreamEvent::MessageStart { message } => {
                self.id = message.id;
                self.model = message.model;
                Some(vec![self.chunk(ChunkDelta {
                    role: Some("assistant"),
                    ..Default::default()
                }, None)])
            }
            StreamEvent::ContentBlockStart { index, content_block } => match content_block {
                StreamContentBlockStart::ToolUse { id, name } => {
                    self.tool_use_index = Some(index);
                    Some(vec![self.chunk(
                        ChunkDelta {
                            tool_calls: vec![ToolCallDelta {
                                index,
                                id: Some(id),
                                kind: Some("function"),
                                function: ToolCallFunctionDelta {
                                    name: Some(name),
                                    arguments: Some(String::new()),
                                },
                            }],
                            ..Default::default()
                        },
                        None,
                    )])
                }
                StreamContentBlockStart::Text { text } if !text.is_empty() => {
                    Some(vec![self.chunk(ChunkDelta { content: Some(text), ..Default::default() }, None)])
                }
                StreamContentBlockStart::Text { .. } => Some(Vec::new()),
            },
            StreamEvent::ContentBlockDelta { index, delta } => match delta {
                StreamDelta::TextDelta { text } => Some(vec![self.chunk(ChunkDelta { content: Some(text), ..Default::default() }, None)]),
                StreamDelta::InputJsonDelta { partial_json } => Some(vec![self.chunk(
                    ChunkDelta {
                        tool_calls: vec![ToolCallDelta {
                            index,
                            id: None,
                            kind: None,
                            function: ToolCallFunctionDelta {
                                name: None,
                                arguments: Some(partial_json),
                            },
                        }],
                        ..Default::default()
                    },
                    None,
                )]),
            },
            StreamEvent::ContentBlockStop { .. } => Some(Vec::new()),
            StreamEvent::MessageDelta { delta, .. } => {
                Some(vec![self.chunk(ChunkDelta::default(), map_stop_reason(delta.stop_reason.as_deref()))])
            }
            StreamEvent::MessageStop => None,
            StreamEvent::Ping => Some(Vec::new()),
            StreamEvent::Error { error } => {
                log::warn!("upstream stream fault after headers were sent: {} {}", error.kind, error.message);
                None
            }
        }
    }

    fn chunk(&mut self, delta: ChunkDelta, finish_reason: Option<String>) -> ChatCompletionChunk {
        if matches!(delta.role, Some(_)) {
            self.role_sent = true;
        }
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk",
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice { index: 0, delta, finish_reason }],
        }
    }
}

/// Gemini streams a JSON array of complete `GenerateContentResponse`
/// fragments rather than discrete deltas (spec §4.4 "Gemini streaming");
/// each fragment becomes exactly one chunk carrying the whole fragment's
/// text as a delta.
pub fn gemini_chunk(fragment: GenerateContentResponse, id: &str, request_model: &str, created: i64) -> ChatCompletionChunk {
    let candidate = fragment.candidates.into_iter().next();
    let (text, finish_reason) = match candidate {
        Some(candidate) => {
            let text = candidate
                .content
                .map(|content| {
                    content
                        .parts
                        .into_iter()
                        .filter_map(|part| match part {
                            crate::messages::gemini::Part::Text(crate::messages::gemini::TextPart { text }) => Some(text),
                            _ => None,
                        })
                        .collect::<String>()
                })
                .unwrap_or_default();
            (text, candidate.finish_reason)
        }
        None => (String::new(), None),
    };

    ChatCompletionChunk {
        id: id.to_string(),
        object: "chat.completion.chunk",
        created,
        model: request_model.to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta {
                content: if text.is_empty() { None } else { Some(text) },
                ..Default::default()
            },
            finish_reason,
        }],
    }
}

/// Render one chunk as an SSE `data:` frame (spec §4.7 wire format).
pub fn sse_frame(chunk: &ChatCompletionChunk) -> String {
    format!("data: {}\n\n", serde_json::to_string(chunk).unwrap_or_default())
}

/// The terminal `[DONE]` sentinel every OpenAI-compatible stream ends with.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::anthropic::{StreamMessageDelta, StreamMessageStart};

    #[test]
    fn message_start_emits_role_frame_first() {
        let mut state = AnthropicStreamState::new("claude-sonnet-4-5@20250929".to_string(), 0);
        let chunks = state
            .on_event(StreamEvent::MessageStart {
                message: StreamMessageStart {
                    id: "msg_1".to_string(),
                    model: "claude-sonnet-4-5@20250929".to_string(),
                },
            })
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].choices[0].delta.role, Some("assistant"));
        assert!(state.role_sent);
    }

    #[test]
    fn text_delta_carries_through_as_content() {
        let mut state = AnthropicStreamState::new("m".to_string(), 0);
        let chunks = state
            .on_event(StreamEvent::ContentBlockDelta {
                index: 0,
                delta: StreamDelta::TextDelta { text: "hi".to_string() },
            })
            .unwrap();
        assert_eq!(chunks[0].choices[0].delta.content, Some("hi".to_string()));
    }

    #[test]
    fn tool_use_start_opens_a_tool_call_delta() {
        let mut state = AnthropicStreamState::new("m".to_string(), 0);
        let chunks = state
            .on_event(StreamEvent::ContentBlockStart {
                index: 0,
                content_block: StreamContentBlockStart::ToolUse {
                    id: "call_1".to_string(),
                    name: "get_weather".to_string(),
                },
            })
            .unwrap();
        assert_eq!(chunks[0].choices[0].delta.tool_calls[0].id, Some("call_1".to_string()));
        assert_eq!(state.tool_use_index, Some(0));
    }

    #[test]
    fn message_stop_signals_stream_end() {
        let mut state = AnthropicStreamState::new("m".to_string(), 0);
        assert!(state.on_event(StreamEvent::MessageStop).is_none());
    }

    #[test]
    fn message_delta_carries_mapped_finish_reason() {
        let mut state = AnthropicStreamState::new("m".to_string(), 0);
        let chunks = state
            .on_event(StreamEvent::MessageDelta {
                delta: StreamMessageDelta { stop_reason: Some("end_turn".to_string()) },
                usage: None,
            })
            .unwrap();
        assert_eq!(chunks[0].choices[0].finish_reason, Some("stop".to_string()));
    }

    #[test]
    fn mid_stream_error_event_closes_silently() {
        // spec §4.7: after headers are sent, faults never become an OpenAI
        // error payload — the connection just ends.
        let mut state = AnthropicStreamState::new("m".to_string(), 0);
        assert!(
            state
                .on_event(StreamEvent::Error {
                    error: crate::messages::anthropic::StreamError {
                        kind: "overloaded_error".to_string(),
                        message: "overloaded".to_string(),
                    },
                })
                .is_none()
        );
    }

    #[test]
    fn sse_frame_is_prefixed_and_terminated_per_event() {
        let chunk = ChatCompletionChunk {
            id: "1".to_string(),
            object: "chat.completion.chunk",
            created: 0,
            model: "m".to_string(),
            choices: Vec::new(),
        };
        let frame = sse_frame(&chunk);
        assert!(frame.starts_with("data: "));
        assert!(frame.ends_with("\n\n"));
    }
}
