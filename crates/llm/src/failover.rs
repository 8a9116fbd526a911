//! Failover Loop (spec §4.6): classifies one upstream attempt's outcome and
//! drives the region-by-region retry. Grounded on the teacher's
//! status-code → error mapping table, generalized from a single-provider enum
//! into a three-way retryable/terminal/success classification that the
//! dispatcher drives across an entire [`crate::region::RegionPlan`].

/// What the dispatcher should do next after one region attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Try the next region in the plan (spec §4.6: 429, 500, 503, and any
    /// response whose body contains `"capacity"`, `"overloaded"`, or
    /// `"unavailable"`, matched case-insensitively).
    Retryable { status: u16, body: String },
    /// Stop immediately and surface the error to the client (spec §4.6: 400,
    /// 401, 403, 404, and anything not explicitly retryable).
    Terminal { status: u16, body: String },
}

/// Classify a completed upstream HTTP response (spec §4.6 "classification
/// table"). Takes an already-buffered body so the same function serves both
/// the non-streaming and streaming-preflight paths.
pub fn classify(status: u16, body: &str) -> Outcome {
    if (200..300).contains(&status) {
        return Outcome::Success;
    }

    let retryable_status = matches!(status, 429 | 500 | 503);
    let lower_body = body.to_lowercase();
    let retryable_body = ["capacity", "overloaded", "unavailable"].iter().any(|needle| lower_body.contains(needle));

    if retryable_status || retryable_body {
        Outcome::Retryable {
            status,
            body: body.to_string(),
        }
    } else {
        Outcome::Terminal {
            status,
            body: body.to_string(),
        }
    }
}

/// Classify a transport-level failure (connection refused, timeout, TLS
/// error — no response was ever read). Always retryable: a dead region
/// should not abort the whole request when others remain in the plan (spec
/// §4.6 "transport failures retry like 503").
pub fn classify_transport_error(message: &str) -> Outcome {
    Outcome::Retryable {
        status: 0,
        body: message.to_string(),
    }
}
