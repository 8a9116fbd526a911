//! Request/response translators between the OpenAI-compatible surface and
//! each upstream Vertex AI publisher API (spec §4.4).

pub mod anthropic;
pub mod completions;
pub mod gemini;
pub mod imagen;
