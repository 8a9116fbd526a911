//! Inbound request context (spec §3 `RequestContext`). Assembled once per
//! HTTP request at the edge of the router and threaded through dispatch,
//! translation and response handling so every log line can carry the same
//! request id.

use uuid::Uuid;

/// Per-request identity and bookkeeping, independent of which OpenAI-shaped
/// route was hit (spec §3 `RequestContext`).
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Generated at ingress; never taken from a client header (spec §4 "every
    /// request is assigned a request id at ingress").
    pub request_id: String,
    /// The inbound route, used for request-lifecycle logging and stats.
    pub route: &'static str,
    /// Whether the client asked for `stream: true`.
    pub streaming: bool,
}

impl RequestContext {
    pub fn new(route: &'static str, streaming: bool) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            route,
            streaming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique_per_context() {
        let a = RequestContext::new("/v1/chat/completions", false);
        let b = RequestContext::new("/v1/chat/completions", false);
        assert_ne!(a.request_id, b.request_id);
    }
}
