use thiserror::Error;

/// Configuration errors. A non-`Ok` result from [`crate::Config::load`] or
/// [`crate::Config::validate`] is fatal at startup (spec §7, Configuration error).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("project_id is required but was not set (config file or VERTEX_PROXY_PROJECT_ID)")]
    MissingProjectId,

    #[error("model alias '{alias}' targets unknown model '{target}'")]
    UnknownAliasTarget { alias: String, target: String },

    #[error("fallback chain for '{model}' targets unknown model '{target}'")]
    UnknownFallbackTarget { model: String, target: String },
}
