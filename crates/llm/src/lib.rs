//! The OpenAI-compatible HTTP surface in front of Google Vertex AI's
//! generative model endpoints (spec §1 OVERVIEW). This crate owns model
//! resolution, region planning, credentialing, request/response translation,
//! and the failover loop; [`server`] wraps it with the process-level HTTP
//! listener, middleware, and observability.

pub mod catalog;
pub mod credential;
pub mod dispatch;
pub mod error;
mod http_client;
pub mod messages;
pub mod region;
pub mod request;
pub mod response;
pub mod translate;
pub mod url;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;

use config::Config;
use dispatch::Dispatcher;
use error::{LlmError, Result};
use messages::anthropic::AnthropicRequest;
use messages::openai::{
    ChatCompletionRequest, CompletionsRequest, ImageGenerationRequest, ModelObject, ModelsListResponse,
};
use request::RequestContext;

/// Shared application state handed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<Config>,
}

/// Build the router implementing the full OpenAI-compatible surface (spec
/// §4.8 "HTTP Surface"): chat completions, legacy completions, the Anthropic
/// passthrough under both its conventional paths, image generation, and
/// model listing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/completions", post(completions))
        .route("/v1/messages", post(anthropic_messages))
        .route("/messages", post(anthropic_messages))
        .route("/v1/images/generations", post(image_generations))
        .route("/v1/models", get(list_models))
        .with_state(state)
}

async fn chat_completions(State(state): State<AppState>, Json(request): Json<ChatCompletionRequest>) -> axum::response::Response {
    let ctx = RequestContext::new("/v1/chat/completions", request.stream);
    log::info!(request_id = ctx.request_id.as_str(), model = request.model.as_str(); "chat completion request");

    if request.stream {
        match state.dispatcher.chat_completion_stream(request).await {
            Ok(stream) => {
                let events = stream.map(|frame| Ok::<_, std::convert::Infallible>(Event::default().data(frame.trim_start_matches("data: ").trim_end())));
                Sse::new(events).keep_alive(KeepAlive::default()).into_response()
            }
            Err(e) => e.into_response(),
        }
    } else {
        match state.dispatcher.chat_completion(request).await {
            Ok(response) => Json(response).into_response(),
            Err(e) => e.into_response(),
        }
    }
}

async fn completions(State(state): State<AppState>, Json(request): Json<CompletionsRequest>) -> axum::response::Response {
    let ctx = RequestContext::new("/v1/completions", request.stream);
    log::info!(request_id = ctx.request_id.as_str(), model = request.model.as_str(); "legacy completions request (prompt-lift)");

    let lifted = translate::completions::lift_to_chat_request(&request);

    if request.stream {
        match state.dispatcher.chat_completion_stream(lifted).await {
            Ok(stream) => {
                let events = stream.map(|frame| Ok::<_, std::convert::Infallible>(Event::default().data(frame.trim_start_matches("data: ").trim_end())));
                Sse::new(events).keep_alive(KeepAlive::default()).into_response()
            }
            Err(e) => e.into_response(),
        }
    } else {
        match state.dispatcher.chat_completion(lifted).await {
            Ok(response) => Json(translate::completions::lower_to_completions_response(response)).into_response(),
            Err(e) => e.into_response(),
        }
    }
}

async fn anthropic_messages(State(state): State<AppState>, Json(request): Json<AnthropicRequest>) -> axum::response::Response {
    let ctx = RequestContext::new("/v1/messages", request.stream);
    log::info!(
        request_id = ctx.request_id.as_str(),
        model = request.model.clone().unwrap_or_default().as_str();
        "anthropic passthrough request"
    );

    if request.stream {
        match state.dispatcher.anthropic_messages_stream(request).await {
            Ok(stream) => {
                // Forwarded byte-for-byte, not re-encoded through axum's `Sse`
                // wrapper, so the client sees exactly the `event:`/`data:`
                // framing Anthropic-on-Vertex sent (spec §4.4 "Anthropic
                // passthrough is not re-encoded").
                let body = axum::body::Body::from_stream(stream.map(|frame| Ok::<_, std::convert::Infallible>(axum::body::Bytes::from(frame))));
                axum::response::Response::builder()
                    .header(axum::http::header::CONTENT_TYPE, "text/event-stream")
                    .header(axum::http::header::CACHE_CONTROL, "no-cache")
                    .body(body)
                    .unwrap_or_else(|_| LlmError::Internal(None).into_response())
            }
            Err(e) => e.into_response(),
        }
    } else {
        match state.dispatcher.anthropic_messages(request).await {
            Ok(response) => Json(response).into_response(),
            Err(e) => e.into_response(),
        }
    }
}

async fn image_generations(State(state): State<AppState>, Json(request): Json<ImageGenerationRequest>) -> axum::response::Response {
    let ctx = RequestContext::new("/v1/images/generations", false);
    log::info!(request_id = ctx.request_id.as_str(); "image generation request");

    match state.dispatcher.image_generation(request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `GET /v1/models` (spec §6 "vendor-extension model-listing block"):
/// restricted to `Config::enabled_models` when that list is non-empty,
/// otherwise the full catalog, plus one entry per configured alias with
/// `root` set to the alias's resolved target (spec §8 scenario 7). Alias
/// entries are hidden along with their target when the allowlist excludes it
/// — an alias pointing at a disabled model isn't independently reachable.
async fn list_models(State(state): State<AppState>) -> Json<ModelsListResponse> {
    let created = current_unix_time();
    let allow_all = state.config.enabled_models.is_empty();
    let is_enabled = |canonical: &str| allow_all || state.config.enabled_models.iter().any(|id| id == canonical);

    let mut data: Vec<ModelObject> = catalog::CATALOG
        .iter()
        .filter(|spec| is_enabled(spec.canonical_id))
        .map(|spec| ModelObject {
            id: spec.canonical_id.to_string(),
            object: "model",
            created,
            owned_by: "vertex-ai",
            root: None,
            provider: spec.provider,
            context_window: spec.context_window,
            max_output_tokens: spec.max_output,
            regions: spec.regions.to_vec(),
            capabilities: spec.capabilities,
            prices: spec.prices,
        })
        .collect();

    for (alias, target) in &state.config.model_aliases {
        let Some(spec) = catalog::CATALOG.iter().find(|spec| spec.canonical_id == target.as_str()) else {
            continue;
        };
        if !is_enabled(spec.canonical_id) {
            continue;
        }
        data.push(ModelObject {
            id: alias.clone(),
            object: "model",
            created,
            owned_by: "vertex-ai",
            root: Some(spec.canonical_id.to_string()),
            provider: spec.provider,
            context_window: spec.context_window,
            max_output_tokens: spec.max_output,
            regions: spec.regions.to_vec(),
            capabilities: spec.capabilities,
            prices: spec.prices,
        });
    }

    Json(ModelsListResponse { object: "list", data })
}

fn current_unix_time() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_models_respects_enabled_models_allowlist() {
        let enabled = vec!["claude-sonnet-4-5@20250929".to_string()];
        let filtered: Vec<_> = catalog::CATALOG
            .iter()
            .filter(|spec| enabled.iter().any(|id| id == spec.canonical_id))
            .collect();
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn alias_target_resolves_to_a_catalog_spec_with_matching_root() {
        let target = "claude-sonnet-4-5@20250929";
        let spec = catalog::CATALOG.iter().find(|spec| spec.canonical_id == target);
        assert!(spec.is_some());

        let alias_entry = ModelObject {
            id: "sonnet".to_string(),
            object: "model",
            created: 0,
            owned_by: "vertex-ai",
            root: Some(spec.unwrap().canonical_id.to_string()),
            provider: spec.unwrap().provider,
            context_window: spec.unwrap().context_window,
            max_output_tokens: spec.unwrap().max_output,
            regions: spec.unwrap().regions.to_vec(),
            capabilities: spec.unwrap().capabilities,
            prices: spec.unwrap().prices,
        };
        assert_eq!(alias_entry.root.as_deref(), Some(target));
    }

    #[test]
    fn alias_pointing_at_an_unknown_model_is_skipped() {
        let found = catalog::CATALOG.iter().find(|spec| spec.canonical_id == "not-a-real-model");
        assert!(found.is_none());
    }
}
