//! Dispatcher (spec §4.5): the core orchestration that ties model
//! resolution, region planning, credentialing, translation and failover
//! together into one request lifecycle.

use std::pin::Pin;
use std::sync::Arc;

use config::Config;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::Client;

use crate::catalog::{self, Provider};
use crate::credential::CredentialProvider;
use crate::error::{LlmError, Result};
use crate::failover::{self, Outcome};
use crate::messages::openai::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ContentPart, ImageGenerationRequest,
    ImageGenerationResponse, MessageContent,
};
use crate::region::{self, DiscoveryCache};
use crate::response::nonstreaming;
use crate::response::streaming::{self, AnthropicStreamState};
use crate::translate::{anthropic as translate_anthropic, gemini as translate_gemini, imagen as translate_imagen};
use crate::url::{self, Method};

const AUTO_TRUNCATE_KEEP: usize = 4;

/// Owns everything a request needs to reach an upstream Vertex AI endpoint
/// and come back translated (spec §3 "Dispatcher"). Cheap to clone — every
/// field is either `Arc`-wrapped or a `reqwest::Client`, which is itself
/// internally reference-counted.
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<Config>,
    credential: Arc<dyn CredentialProvider>,
    http: Client,
    discovery: Arc<DiscoveryCache>,
    /// Overrides the scheme+host of every built endpoint, keeping the path
    /// and query untouched. `None` in production; set by tests to point the
    /// dispatcher at a local fake upstream instead of real Vertex AI.
    base_url_override: Option<String>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, credential: Arc<dyn CredentialProvider>, discovery: DiscoveryCache) -> Self {
        Self {
            config,
            credential,
            http: crate::http_client::build(),
            discovery: Arc::new(discovery),
            base_url_override: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(config: Arc<Config>, credential: Arc<dyn CredentialProvider>, discovery: DiscoveryCache, base_url: String) -> Self {
        Self {
            config,
            credential,
            http: crate::http_client::build(),
            discovery: Arc::new(discovery),
            base_url_override: Some(base_url),
        }
    }

    /// Build one region's upstream URL, substituting [`Self::base_url_override`]'s
    /// scheme and host for the real Vertex AI host when set, keeping the path
    /// and query [`url::build`] produced.
    fn endpoint(&self, region: &str, provider: Provider, canonical_model: &str, method: Method) -> String {
        let built = url::build(&self.config.project_id, region, provider, canonical_model, method);
        let Some(base) = &self.base_url_override else {
            return built;
        };
        let path_and_query = built.splitn(4, '/').nth(3).unwrap_or("");
        format!("{base}/{path_and_query}")
    }

    /// Run one non-streaming chat completion end to end (spec §4.5 steps
    /// 1-7, with the single fallback-chain retry of step 6 on full
    /// exhaustion).
    pub async fn chat_completion(&self, mut request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let requested_model = request.model.clone();
        let resolved = catalog::resolve(&requested_model, &self.config);

        truncate_messages(&mut request.messages, self.config.auto_truncate);
        if resolved.provider == Provider::Google {
            self.inline_remote_images(&mut request.messages).await;
        }

        match self.attempt_chat(&request, &resolved.canonical, resolved.provider).await {
            Ok(response) => Ok(response),
            Err(LlmError::UpstreamExhausted { .. }) => {
                if let Some(fallback_targets) = self.config.fallback_chains.get(&resolved.canonical) {
                    for fallback in fallback_targets {
                        let fallback_resolved = catalog::resolve(fallback, &self.config);
                        log::warn!("model '{}' exhausted every region; falling back to '{}'", resolved.canonical, fallback);
                        if let Ok(response) = self.attempt_chat(&request, &fallback_resolved.canonical, fallback_resolved.provider).await {
                            return Ok(response);
                        }
                    }
                }
                Err(LlmError::UpstreamExhausted {
                    attempts: 0,
                    status: 503,
                    body: "every region and fallback model was exhausted".to_string(),
                })
            }
            Err(other) => Err(other),
        }
    }

    async fn attempt_chat(&self, request: &ChatCompletionRequest, canonical_model: &str, provider: Provider) -> Result<ChatCompletionResponse> {
        let spec = catalog::CATALOG.iter().find(|spec| spec.canonical_id == canonical_model);
        let plan = region::plan(spec, &self.discovery, canonical_model);
        if plan.is_empty() {
            return Err(LlmError::NoRegion(canonical_model.to_string()));
        }

        let body = match provider {
            Provider::Anthropic => {
                let anthropic_request = translate_anthropic::to_anthropic_request(request, canonical_model)?;
                serde_json::to_string(&anthropic_request).map_err(|e| LlmError::Internal(Some(anyhow::anyhow!(e))))?
            }
            Provider::Google => {
                let gemini_request = translate_gemini::to_gemini_request(request)?;
                serde_json::to_string(&gemini_request).map_err(|e| LlmError::Internal(Some(anyhow::anyhow!(e))))?
            }
            Provider::Imagen => unreachable!("imagen never reaches chat dispatch"),
        };

        let method = match provider {
            Provider::Anthropic => Method::RawPredict,
            Provider::Google => Method::GenerateContent,
            Provider::Imagen => unreachable!(),
        };

        let created = current_unix_time();
        let mut last_retryable: Option<(usize, u16, String)> = None;

        for (attempt_index, region) in plan.iter().enumerate() {
            let endpoint = self.endpoint(region, provider, canonical_model, method);
            let token = self.credential.token().await.map_err(|e| LlmError::Auth(e.to_string()))?;

            let outcome = self.send(&endpoint, &token, &body).await;
            match outcome {
                Ok((status, response_body)) => match failover::classify(status, &response_body) {
                    Outcome::Success => {
                        return nonstreaming::translate_chat_response(provider, &response_body, &request.model, created);
                    }
                    Outcome::Retryable { status, body } => {
                        last_retryable = Some((attempt_index + 1, status, body));
                    }
                    Outcome::Terminal { status, body } => {
                        return Err(LlmError::UpstreamTerminal { status, body });
                    }
                },
                Err(message) => {
                    last_retryable = Some((attempt_index + 1, 0, message));
                }
            }
        }

        let (attempts, status, body) = last_retryable.unwrap_or((plan.0.len(), 503, "no attempts were made".to_string()));
        Err(LlmError::UpstreamExhausted { attempts, status, body })
    }

    /// Run a streaming chat completion (spec §4.7). Region failover only
    /// happens before the first byte of the upstream response is read — once
    /// a connection's status line comes back successful, the stream is
    /// committed to the client and a later fault closes the connection
    /// silently rather than failing over (spec §4.7 "Mid-stream error
    /// handling").
    pub async fn chat_completion_stream(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = String> + Send>>> {
        let requested_model = request.model.clone();
        let resolved = catalog::resolve(&requested_model, &self.config);
        truncate_messages(&mut request.messages, self.config.auto_truncate);

        if resolved.provider == Provider::Imagen {
            return Err(LlmError::InvalidRequest("image models do not support chat streaming".to_string()));
        }
        if resolved.provider == Provider::Google {
            self.inline_remote_images(&mut request.messages).await;
        }

        let spec = catalog::CATALOG.iter().find(|spec| spec.canonical_id == resolved.canonical);
        let plan = region::plan(spec, &self.discovery, &resolved.canonical);
        if plan.is_empty() {
            return Err(LlmError::NoRegion(resolved.canonical));
        }

        let body = match resolved.provider {
            Provider::Anthropic => {
                let mut anthropic_request = translate_anthropic::to_anthropic_request(&request, &resolved.canonical)?;
                anthropic_request.stream = true;
                serde_json::to_string(&anthropic_request).map_err(|e| LlmError::Internal(Some(anyhow::anyhow!(e))))?
            }
            Provider::Google => {
                let gemini_request = translate_gemini::to_gemini_request(&request)?;
                serde_json::to_string(&gemini_request).map_err(|e| LlmError::Internal(Some(anyhow::anyhow!(e))))?
            }
            Provider::Imagen => unreachable!(),
        };

        let method = match resolved.provider {
            Provider::Anthropic => Method::StreamRawPredict,
            Provider::Google => Method::StreamGenerateContent,
            Provider::Imagen => unreachable!(),
        };

        let created = current_unix_time();
        let mut last_retryable: Option<(usize, u16, String)> = None;

        for (attempt_index, region) in plan.iter().enumerate() {
            let endpoint = self.endpoint(region, resolved.provider, &resolved.canonical, method);
            let token = self.credential.token().await.map_err(|e| LlmError::Auth(e.to_string()))?;

            let sent = self
                .http
                .post(&endpoint)
                .bearer_auth(secrecy::ExposeSecret::expose_secret(&token))
                .header("content-type", "application/json")
                .body(body.clone())
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) => {
                    last_retryable = Some((attempt_index + 1, 0, e.to_string()));
                    continue;
                }
            };

            let status = response.status().as_u16();
            if (200..300).contains(&status) {
                let provider = resolved.provider;
                let model_name = request.model.clone();
                return Ok(build_stream(provider, response, model_name, created));
            }

            let body_text = response.text().await.unwrap_or_default();
            match failover::classify(status, &body_text) {
                Outcome::Success => unreachable!("2xx already handled above"),
                Outcome::Retryable { status, body } => last_retryable = Some((attempt_index + 1, status, body)),
                Outcome::Terminal { status, body } => return Err(LlmError::UpstreamTerminal { status, body }),
            }
        }

        let (attempts, status, body) = last_retryable.unwrap_or((plan.0.len(), 503, "no attempts were made".to_string()));
        Err(LlmError::UpstreamExhausted { attempts, status, body })
    }

    /// Fetch remote `http(s)://` image URLs and rewrite them as inline `data:`
    /// URLs (spec §4.4 "remote http(s):// URLs are fetched once and inlined").
    /// A failed fetch degrades the part to a text placeholder rather than
    /// failing the whole request (spec §4.4 edge-case table, "Image fetch
    /// failure"). Gemini-only: the Anthropic passthrough and translated paths
    /// never accept remote image URLs (spec §4.4 "Anthropic requires inline
    /// image data").
    async fn inline_remote_images(&self, messages: &mut [ChatMessage]) {
        for message in messages {
            let Some(MessageContent::Parts(parts)) = &mut message.content else {
                continue;
            };
            for part in parts.iter_mut() {
                let ContentPart::ImageUrl { image_url } = part else {
                    continue;
                };
                if !(image_url.url.starts_with("http://") || image_url.url.starts_with("https://")) {
                    continue;
                }
                match self.fetch_remote_image(&image_url.url).await {
                    Ok(data_url) => image_url.url = data_url,
                    Err(e) => {
                        log::warn!("failed to fetch remote image '{}': {e}", image_url.url);
                        *part = ContentPart::Text {
                            text: "[image unavailable]".to_string(),
                        };
                    }
                }
            }
        }
    }

    async fn fetch_remote_image(&self, url: &str) -> std::result::Result<String, String> {
        use base64::Engine;

        let response = self.http.get(url).send().await.map_err(|e| e.to_string())?;
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(format!("data:{mime_type};base64,{data}"))
    }

    async fn send(&self, endpoint: &str, token: &secrecy::SecretString, body: &str) -> std::result::Result<(u16, String), String> {
        use secrecy::ExposeSecret;

        let response = self
            .http
            .post(endpoint)
            .bearer_auth(token.expose_secret())
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| e.to_string())?;
        Ok((status, text))
    }

    /// Passthrough for `/v1/messages` (spec §4.4 "Anthropic passthrough"):
    /// the request is already Anthropic-shaped, so nothing is translated —
    /// the dispatcher only resolves the model id, plans regions, injects a
    /// bearer token, and forwards the body unchanged.
    pub async fn anthropic_messages(&self, mut request: crate::messages::anthropic::AnthropicRequest) -> Result<crate::messages::anthropic::AnthropicResponse> {
        let requested_model = request
            .model
            .clone()
            .ok_or_else(|| LlmError::InvalidRequest("model is required".to_string()))?;
        let resolved = catalog::resolve(&requested_model, &self.config);
        request.model = Some(resolved.canonical.clone());
        request.stream = false;

        let spec = catalog::CATALOG.iter().find(|spec| spec.canonical_id == resolved.canonical);
        let plan = region::plan(spec, &self.discovery, &resolved.canonical);
        if plan.is_empty() {
            return Err(LlmError::NoRegion(resolved.canonical));
        }

        let body = serde_json::to_string(&request).map_err(|e| LlmError::Internal(Some(anyhow::anyhow!(e))))?;
        let mut last_retryable: Option<(usize, u16, String)> = None;

        for (attempt_index, region) in plan.iter().enumerate() {
            let endpoint = self.endpoint(region, Provider::Anthropic, &resolved.canonical, Method::RawPredict);
            let token = self.credential.token().await.map_err(|e| LlmError::Auth(e.to_string()))?;

            match self.send(&endpoint, &token, &body).await {
                Ok((status, response_body)) => match failover::classify(status, &response_body) {
                    Outcome::Success => {
                        return serde_json::from_str(&response_body)
                            .map_err(|e| LlmError::Internal(Some(anyhow::anyhow!("malformed anthropic response: {e}"))));
                    }
                    Outcome::Retryable { status, body } => last_retryable = Some((attempt_index + 1, status, body)),
                    Outcome::Terminal { status, body } => return Err(LlmError::UpstreamTerminal { status, body }),
                },
                Err(message) => last_retryable = Some((attempt_index + 1, 0, message)),
            }
        }

        let (attempts, status, body) = last_retryable.unwrap_or((plan.0.len(), 503, "no attempts were made".to_string()));
        Err(LlmError::UpstreamExhausted { attempts, status, body })
    }

    /// Streaming counterpart of [`Self::anthropic_messages`]: the upstream
    /// SSE frames are forwarded byte-for-byte (spec §4.4 "Anthropic
    /// passthrough is not re-encoded, only re-authenticated").
    pub async fn anthropic_messages_stream(
        &self,
        mut request: crate::messages::anthropic::AnthropicRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = String> + Send>>> {
        let requested_model = request
            .model
            .clone()
            .ok_or_else(|| LlmError::InvalidRequest("model is required".to_string()))?;
        let resolved = catalog::resolve(&requested_model, &self.config);
        request.model = Some(resolved.canonical.clone());
        request.stream = true;

        let spec = catalog::CATALOG.iter().find(|spec| spec.canonical_id == resolved.canonical);
        let plan = region::plan(spec, &self.discovery, &resolved.canonical);
        if plan.is_empty() {
            return Err(LlmError::NoRegion(resolved.canonical));
        }

        let body = serde_json::to_string(&request).map_err(|e| LlmError::Internal(Some(anyhow::anyhow!(e))))?;
        let mut last_retryable: Option<(usize, u16, String)> = None;

        for (attempt_index, region) in plan.iter().enumerate() {
            let endpoint = self.endpoint(region, Provider::Anthropic, &resolved.canonical, Method::StreamRawPredict);
            let token = self.credential.token().await.map_err(|e| LlmError::Auth(e.to_string()))?;

            let sent = self
                .http
                .post(&endpoint)
                .bearer_auth(secrecy::ExposeSecret::expose_secret(&token))
                .header("content-type", "application/json")
                .body(body.clone())
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) => {
                    last_retryable = Some((attempt_index + 1, 0, e.to_string()));
                    continue;
                }
            };

            let status = response.status().as_u16();
            if (200..300).contains(&status) {
                let raw = response.bytes_stream().eventsource().map(|event| match event {
                    Ok(event) => format!("event: {}\ndata: {}\n\n", event.event, event.data),
                    Err(e) => {
                        log::warn!("anthropic passthrough stream transport error: {e}");
                        String::new()
                    }
                });
                return Ok(Box::pin(raw.filter(|frame| {
                    let keep = !frame.is_empty();
                    async move { keep }
                })));
            }

            let body_text = response.text().await.unwrap_or_default();
            match failover::classify(status, &body_text) {
                Outcome::Success => unreachable!("2xx already handled above"),
                Outcome::Retryable { status, body } => last_retryable = Some((attempt_index + 1, status, body)),
                Outcome::Terminal { status, body } => return Err(LlmError::UpstreamTerminal { status, body }),
            }
        }

        let (attempts, status, body) = last_retryable.unwrap_or((plan.0.len(), 503, "no attempts were made".to_string()));
        Err(LlmError::UpstreamExhausted { attempts, status, body })
    }

    pub async fn image_generation(&self, request: ImageGenerationRequest) -> Result<ImageGenerationResponse> {
        let model = request
            .model
            .clone()
            .or_else(|| self.config.default_model.clone())
            .unwrap_or_else(|| "imagen-4.0-generate-001".to_string());
        let resolved = catalog::resolve(&model, &self.config);
        if resolved.provider != Provider::Imagen {
            return Err(LlmError::InvalidRequest(format!(
                "model '{model}' does not support image generation"
            )));
        }

        let spec = catalog::CATALOG.iter().find(|spec| spec.canonical_id == resolved.canonical);
        let plan = region::plan(spec, &self.discovery, &resolved.canonical);
        if plan.is_empty() {
            return Err(LlmError::NoRegion(resolved.canonical));
        }

        let predict_request = translate_imagen::to_predict_request(&request);
        let body = serde_json::to_string(&predict_request).map_err(|e| LlmError::Internal(Some(anyhow::anyhow!(e))))?;
        let created = current_unix_time();
        let mut last_retryable: Option<(usize, u16, String)> = None;

        for (attempt_index, region) in plan.iter().enumerate() {
            let endpoint = self.endpoint(region, Provider::Imagen, &resolved.canonical, Method::Predict);
            let token = self.credential.token().await.map_err(|e| LlmError::Auth(e.to_string()))?;

            match self.send(&endpoint, &token, &body).await {
                Ok((status, response_body)) => match failover::classify(status, &response_body) {
                    Outcome::Success => return nonstreaming::translate_image_response(&response_body, created),
                    Outcome::Retryable { status, body } => last_retryable = Some((attempt_index + 1, status, body)),
                    Outcome::Terminal { status, body } => return Err(LlmError::UpstreamTerminal { status, body }),
                },
                Err(message) => last_retryable = Some((attempt_index + 1, 0, message)),
            }
        }

        let (attempts, status, body) = last_retryable.unwrap_or((plan.0.len(), 503, "no attempts were made".to_string()));
        Err(LlmError::UpstreamExhausted { attempts, status, body })
    }
}

/// Trim the oldest messages once `auto_truncate` is enabled, always keeping
/// leading system messages and the most recent [`AUTO_TRUNCATE_KEEP`]
/// non-system messages (spec §4.5 step 2: "auto-truncate keeps the system
/// preamble and the most recent turns, dropping whatever came between").
fn truncate_messages(messages: &mut Vec<ChatMessage>, auto_truncate: bool) {
    if !auto_truncate {
        return;
    }

    let system_count = messages.iter().take_while(|m| m.role == "system").count();
    let rest_len = messages.len() - system_count;
    if rest_len <= AUTO_TRUNCATE_KEEP {
        return;
    }

    let drop_from = system_count;
    let drop_to = messages.len() - AUTO_TRUNCATE_KEEP;
    messages.drain(drop_from..drop_to);
}

/// Wire one already-200'd upstream response into a stream of OpenAI-shaped
/// SSE frames. `[DONE]` is only appended when the upstream stream ended
/// cleanly; a mid-stream transport error, a malformed event, or an Anthropic
/// `error` event marks the stream faulted and the connection is closed with
/// no `[DONE]` sentinel and no JSON error body (spec §4.7 "Mid-stream error
/// handling" — faults close silently once headers are sent).
fn build_stream(provider: Provider, response: reqwest::Response, model_name: String, created: i64) -> Pin<Box<dyn Stream<Item = String> + Send>> {
    use std::sync::atomic::{AtomicBool, Ordering};

    let byte_stream = response.bytes_stream().eventsource();
    let faulted = Arc::new(AtomicBool::new(false));

    match provider {
        Provider::Anthropic => {
            let state = Arc::new(tokio::sync::Mutex::new(AnthropicStreamState::new(model_name, created)));
            let faulted_events = faulted.clone();
            let faulted_done = faulted.clone();
            let frames = byte_stream
                .filter_map(move |event| {
                    let state = state.clone();
                    let faulted = faulted_events.clone();
                    async move {
                        let event = match event {
                            Ok(event) => event,
                            Err(e) => {
                                log::warn!("anthropic stream transport error: {e}");
                                faulted.store(true, Ordering::Relaxed);
                                return None;
                            }
                        };
                        let parsed: crate::messages::anthropic::StreamEvent = match serde_json::from_str(&event.data) {
                            Ok(parsed) => parsed,
                            Err(e) => {
                                log::warn!("malformed anthropic stream event: {e}");
                                faulted.store(true, Ordering::Relaxed);
                                return None;
                            }
                        };
                        if matches!(parsed, crate::messages::anthropic::StreamEvent::Error { .. }) {
                            faulted.store(true, Ordering::Relaxed);
                        }
                        let mut state = state.lock().await;
                        state.on_event(parsed)
                    }
                })
                .flat_map(|chunks: Vec<ChatCompletionChunk>| futures::stream::iter(chunks))
                .map(|chunk| streaming::sse_frame(&chunk))
                .chain(futures::stream::once(async move {
                    if faulted_done.load(Ordering::Relaxed) {
                        String::new()
                    } else {
                        streaming::DONE_FRAME.to_string()
                    }
                }))
                .filter(|frame| {
                    let keep = !frame.is_empty();
                    async move { keep }
                });

            Box::pin(frames)
        }
        Provider::Google => {
            let id = format!("chatcmpl-{}", uuid::Uuid::new_v4());
            let faulted_events = faulted.clone();
            let faulted_done = faulted.clone();
            let frames = byte_stream
                .filter_map(move |event| {
                    let id = id.clone();
                    let model_name = model_name.clone();
                    let faulted = faulted_events.clone();
                    async move {
                        let event = match event {
                            Ok(event) => event,
                            Err(e) => {
                                log::warn!("gemini stream transport error: {e}");
                                faulted.store(true, Ordering::Relaxed);
                                return None;
                            }
                        };
                        let parsed: crate::messages::gemini::GenerateContentResponse = match serde_json::from_str(&event.data) {
                            Ok(parsed) => parsed,
                            Err(e) => {
                                log::warn!("malformed gemini stream fragment: {e}");
                                faulted.store(true, Ordering::Relaxed);
                                return None;
                            }
                        };
                        Some(streaming::gemini_chunk(parsed, &id, &model_name, created))
                    }
                })
                .map(|chunk| streaming::sse_frame(&chunk))
                .chain(futures::stream::once(async move {
                    if faulted_done.load(Ordering::Relaxed) {
                        String::new()
                    } else {
                        streaming::DONE_FRAME.to_string()
                    }
                }))
                .filter(|frame| {
                    let keep = !frame.is_empty();
                    async move { keep }
                });

            Box::pin(frames)
        }
        Provider::Imagen => unreachable!("imagen never reaches the streaming path"),
    }
}

fn current_unix_time() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::openai::MessageContent;

    fn message(role: &str, text: &str) -> ChatMessage {
        ChatMessage {
            role: role.to_string(),
            content: Some(MessageContent::Text(text.to_string())),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    #[test]
    fn truncate_keeps_system_and_last_four() {
        let mut messages = vec![message("system", "be terse")];
        for i in 0..10 {
            messages.push(message("user", &format!("turn {i}")));
        }
        truncate_messages(&mut messages, true);
        assert_eq!(messages.len(), 1 + AUTO_TRUNCATE_KEEP);
        assert_eq!(messages[0].role, "system");
    }

    #[test]
    fn truncate_is_a_noop_when_disabled() {
        let mut messages = vec![message("system", "be terse")];
        for i in 0..10 {
            messages.push(message("user", &format!("turn {i}")));
        }
        let before = messages.len();
        truncate_messages(&mut messages, false);
        assert_eq!(messages.len(), before);
    }

    #[test]
    fn truncate_is_a_noop_under_the_keep_threshold() {
        let mut messages = vec![message("user", "hi")];
        truncate_messages(&mut messages, true);
        assert_eq!(messages.len(), 1);
    }
}

/// Drives the dispatcher end to end against a local fake upstream instead of
/// mocking `reqwest` directly, so region failover and streaming termination
/// are exercised through the same HTTP stack production uses.
#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::credential::test_support::FixedCredentialProvider;
    use crate::messages::openai::{ChatMessage, MessageContent};
    use axum::http::StatusCode;
    use axum::routing::post as axum_post;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ANTHROPIC_SUCCESS_BODY: &str = r#"{"id":"msg_1","role":"assistant","content":[{"type":"text","text":"hi"}],"model":"claude-sonnet-4-5@20250929","stop_reason":"end_turn","usage":{"input_tokens":1,"output_tokens":1}}"#;

    /// Spawn an axum server on an ephemeral local port that answers every
    /// request with `responses[n]` on its `n`-th call, clamped to the last
    /// entry once exhausted. Returns the server's base URL.
    async fn spawn_fake_upstream(responses: Vec<(StatusCode, &'static str)>) -> String {
        let responses = Arc::new(responses);
        let counter = Arc::new(AtomicUsize::new(0));

        let app = axum::Router::new().route(
            "/{*rest}",
            axum_post(move || {
                let responses = responses.clone();
                let counter = counter.clone();
                async move {
                    let index = counter.fetch_add(1, Ordering::SeqCst).min(responses.len() - 1);
                    responses[index]
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn test_dispatcher(base_url: String) -> Dispatcher {
        let config = Arc::new(Config {
            project_id: "demo-project".to_string(),
            ..Default::default()
        });
        let credential = Arc::new(FixedCredentialProvider(Some("test-token"))) as Arc<dyn CredentialProvider>;
        Dispatcher::new_for_test(config, credential, DiscoveryCache::empty(), base_url)
    }

    fn chat_request(model: &str, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(MessageContent::Text("hello".to_string())),
                tool_calls: Vec::new(),
                tool_call_id: None,
            }],
            stream,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
            tools: Vec::new(),
            tool_choice: None,
        }
    }

    #[tokio::test]
    async fn region_failover_retries_the_next_region_on_a_retryable_status() {
        let base = spawn_fake_upstream(vec![
            (StatusCode::SERVICE_UNAVAILABLE, "model is overloaded"),
            (StatusCode::OK, ANTHROPIC_SUCCESS_BODY),
        ])
        .await;
        let dispatcher = test_dispatcher(base);

        let response = dispatcher
            .chat_completion(chat_request("claude-sonnet-4-5@20250929", false))
            .await
            .expect("second region should have succeeded");
        assert_eq!(response.choices.len(), 1);
    }

    #[tokio::test]
    async fn terminal_status_aborts_without_trying_further_regions() {
        let base = spawn_fake_upstream(vec![(StatusCode::UNAUTHORIZED, "invalid token")]).await;
        let dispatcher = test_dispatcher(base);

        let err = dispatcher.chat_completion(chat_request("claude-sonnet-4-5@20250929", false)).await.unwrap_err();
        assert!(matches!(err, LlmError::UpstreamTerminal { status: 401, .. }));
    }

    #[tokio::test]
    async fn streaming_happy_path_ends_with_done() {
        let body = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"model\":\"claude-sonnet-4-5@20250929\"}}\n\n",
            "event: content_block_start\n",
            "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"hi\"}}\n\n",
            "event: content_block_stop\n",
            "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
            "event: message_delta\n",
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":null}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        let base = spawn_fake_upstream(vec![(StatusCode::OK, body)]).await;
        let dispatcher = test_dispatcher(base);

        let stream = dispatcher
            .chat_completion_stream(chat_request("claude-sonnet-4-5@20250929", true))
            .await
            .expect("stream should start");
        let frames: Vec<String> = stream.collect().await;

        assert_eq!(frames.last().map(String::as_str), Some(streaming::DONE_FRAME));
        assert!(frames.iter().any(|frame| frame.contains("\"content\":\"hi\"")));
    }

    #[tokio::test]
    async fn tool_call_streaming_carries_the_tool_call_delta() {
        let body = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"model\":\"claude-sonnet-4-5@20250929\"}}\n\n",
            "event: content_block_start\n",
            "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"tool_use\",\"id\":\"call_1\",\"name\":\"lookup\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{}\"}}\n\n",
            "event: content_block_stop\n",
            "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
            "event: message_delta\n",
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"tool_use\"},\"usage\":null}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        let base = spawn_fake_upstream(vec![(StatusCode::OK, body)]).await;
        let dispatcher = test_dispatcher(base);

        let stream = dispatcher
            .chat_completion_stream(chat_request("claude-sonnet-4-5@20250929", true))
            .await
            .expect("stream should start");
        let frames: Vec<String> = stream.collect().await;

        assert_eq!(frames.last().map(String::as_str), Some(streaming::DONE_FRAME));
        assert!(frames.iter().any(|frame| frame.contains("\"name\":\"lookup\"")));
    }

    #[tokio::test]
    async fn mid_stream_fault_closes_without_a_done_sentinel() {
        let body = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"model\":\"claude-sonnet-4-5@20250929\"}}\n\n",
            "event: content_block_start\n",
            "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"partial\"}}\n\n",
            "event: error\n",
            "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"backend fell over mid-stream\"}}\n\n",
        );
        let base = spawn_fake_upstream(vec![(StatusCode::OK, body)]).await;
        let dispatcher = test_dispatcher(base);

        let stream = dispatcher
            .chat_completion_stream(chat_request("claude-sonnet-4-5@20250929", true))
            .await
            .expect("stream should start — the fault happens after headers are sent");
        let frames: Vec<String> = stream.collect().await;

        assert!(frames.iter().any(|frame| frame.contains("\"content\":\"partial\"")));
        assert!(!frames.iter().any(|frame| frame == streaming::DONE_FRAME));
    }
}
