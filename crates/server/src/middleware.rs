//! Request-lifecycle middleware: assigns a request id, logs ingress and
//! completion, appends one line to the request log, and bumps the stats
//! counter. Grounded on the teacher's `TracingLayer`, collapsed from a
//! span-based OTel layer into a plain `log`-based before/after wrapper since
//! this proxy carries no distributed tracing (spec §10.1).

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::reqlog::RequestLog;
use crate::stats::Stats;

#[derive(Clone)]
pub struct RequestLifecycle {
    pub request_log: Option<Arc<RequestLog>>,
    pub stats: Arc<Stats>,
}

/// Wired up via `axum::middleware::from_fn_with_state` at router assembly
/// time (spec §11 "structured request-lifecycle logging").
pub async fn request_lifecycle(State(state): State<RequestLifecycle>, request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    log::info!(request_id = request_id.as_str(), method = method.as_str(), path = path.as_str(); "request received");

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let elapsed_ms = started_at.elapsed().as_millis() as u64;

    log::info!(request_id = request_id.as_str(), status = status, elapsed_ms = elapsed_ms; "request completed");

    if let Some(request_log) = &state.request_log {
        let line = format!(
            r#"{{"request_id":"{request_id}","method":"{method}","path":"{path}","status":{status},"elapsed_ms":{elapsed_ms}}}"#
        );
        if let Err(e) = request_log.append(&line) {
            log::warn!("failed to append to request log: {e}");
        }
    }

    state.stats.record_request();

    response
}
