//! Startup-time errors (spec §7, `Configuration`/fatal class). Per-request
//! errors are handled entirely by `llm::error::LlmError`; this enum only
//! covers failures that prevent the HTTP surface from ever coming up.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to initialize credentials: {0}")]
    Credential(String),
}
