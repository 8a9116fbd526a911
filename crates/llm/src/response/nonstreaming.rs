//! Non-streaming response assembly (spec §4.5 "Response Handlers"): parses a
//! fully-buffered upstream body and hands back the OpenAI-shaped JSON value
//! dispatch serializes to the client.

use crate::catalog::Provider;
use crate::error::{LlmError, Result};
use crate::messages::anthropic::AnthropicResponse;
use crate::messages::gemini::GenerateContentResponse;
use crate::messages::imagen::PredictResponse;
use crate::messages::openai::ChatCompletionResponse;
use crate::translate::{anthropic as translate_anthropic, gemini as translate_gemini};

/// Parse and translate one complete, successful upstream body into the
/// OpenAI chat-completion shape (spec §4.5 step 7). The caller has already
/// classified the response as [`crate::failover::Outcome::Success`].
pub fn translate_chat_response(provider: Provider, body: &str, request_model: &str, created: i64) -> Result<ChatCompletionResponse> {
    match provider {
        Provider::Anthropic => {
            let parsed: AnthropicResponse = serde_json::from_str(body)
                .map_err(|e| LlmError::Internal(Some(anyhow::anyhow!("malformed anthropic response: {e}"))))?;
            Ok(translate_anthropic::from_anthropic_response(parsed, request_model, created))
        }
        Provider::Google => {
            let parsed: GenerateContentResponse = serde_json::from_str(body)
                .map_err(|e| LlmError::Internal(Some(anyhow::anyhow!("malformed gemini response: {e}"))))?;
            let id = format!("chatcmpl-{}", uuid::Uuid::new_v4());
            Ok(translate_gemini::from_gemini_response(parsed, &id, request_model, created))
        }
        Provider::Imagen => Err(LlmError::Internal(Some(anyhow::anyhow!(
            "imagen responses are not chat completions; route handler bug"
        )))),
    }
}

pub fn translate_image_response(body: &str, created: i64) -> Result<crate::messages::openai::ImageGenerationResponse> {
    let parsed: PredictResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Internal(Some(anyhow::anyhow!("malformed imagen response: {e}"))))?;
    Ok(crate::translate::imagen::from_predict_response(parsed, created))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_anthropic_body_is_an_internal_error_not_a_panic() {
        let result = translate_chat_response(Provider::Anthropic, "not json", "claude-sonnet-4-5@20250929", 0);
        assert!(result.is_err());
    }

    #[test]
    fn imagen_provider_cannot_produce_a_chat_response() {
        let result = translate_chat_response(Provider::Imagen, "{}", "imagen-4.0-generate-001", 0);
        assert!(result.is_err());
    }
}
