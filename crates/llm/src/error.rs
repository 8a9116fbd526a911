use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

/// The error taxonomy of spec §7. Every non-streaming path converts one of
/// these into an on-wire `{error:...}` body; every streaming path only ever
/// reaches this type *before* headers are sent (spec §4.7 "Mid-stream error
/// handling" — after headers, faults are logged and the connection is
/// closed silently, never turned into one of these).
#[derive(Debug, Error)]
pub enum LlmError {
    /// Malformed JSON body, missing required fields, wrong route for the model's provider.
    #[error("{0}")]
    InvalidRequest(String),

    /// The ambient credential provider could not produce a bearer token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The region plan for a resolved model was empty (spec §4.5 step 3 — "should not happen").
    #[error("no region available for model '{0}'")]
    NoRegion(String),

    /// Every region in the plan (and, if attempted, the one fallback chain) returned a
    /// retryable failure. Carries the last attempt's status and body for reporting.
    #[error("upstream exhausted after {attempts} region(s): {status} {body}")]
    UpstreamExhausted { attempts: usize, status: u16, body: String },

    /// A non-2xx, non-retryable response from upstream (spec §4.6 classification: terminal).
    #[error("upstream error {status}: {body}")]
    UpstreamTerminal { status: u16, body: String },

    /// A transport-level failure before any response headers were read.
    #[error("transport error: {0}")]
    Transport(String),

    /// Internal error not meant to be exposed verbatim to API consumers.
    #[error("internal error")]
    Internal(#[source] Option<anyhow::Error>),
}

impl LlmError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRegion(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamExhausted { status, .. } => status_from_upstream(*status),
            Self::UpstreamTerminal { status, .. } => status_from_upstream(*status),
            Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Auth(_) | Self::NoRegion(_) | Self::Transport(_) | Self::Internal(_) => "proxy_error",
            Self::UpstreamExhausted { .. } | Self::UpstreamTerminal { .. } => "upstream_error",
        }
    }

    /// Message safe to expose to API consumers; `Internal` never leaks the source error.
    pub fn client_message(&self) -> String {
        match self {
            Self::UpstreamExhausted { body, .. } | Self::UpstreamTerminal { body, .. } => body.clone(),
            Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

fn status_from_upstream(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    r#type: String,
    code: u16,
}

impl IntoResponse for LlmError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: ErrorDetails {
                message: self.client_message(),
                r#type: self.error_type().to_string(),
                code: status.as_u16(),
            },
        };
        (status, Json(body)).into_response()
    }
}
