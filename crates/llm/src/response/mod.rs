//! Response Handlers (spec §4.5, §4.7): turn a classified upstream response
//! into the OpenAI-shaped body or SSE stream the client actually receives.

pub mod nonstreaming;
pub mod streaming;
