//! Vertex proxy configuration structures, mapping the proxy's TOML config file
//! plus environment-variable overrides (spec §6) onto a read-only, process-scoped
//! [`Config`] (spec §3).

mod error;
mod loader;

pub use error::ConfigError;

use indexmap::IndexMap;
use std::path::PathBuf;

/// Process-scoped configuration, loaded once at startup and treated as
/// read-only by the core (spec §3 `Config`).
#[derive(Debug, Clone, serde::Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// GCP project id used to build every upstream Vertex AI URL.
    pub project_id: String,
    /// Default region for Anthropic-on-Vertex models when the catalog/discovery
    /// cache has no opinion.
    pub default_region: Option<String>,
    /// Default region for Google (Gemini/Imagen) models.
    pub google_region: Option<String>,
    /// Model used when a request omits `model` entirely (rare, but
    /// `/v1/completions` callers sometimes do).
    pub default_model: Option<String>,
    /// Restricts the models surfaced by `GET /v1/models` to this set, when non-empty.
    pub enabled_models: Vec<String>,
    /// Alias → canonical model id.
    pub model_aliases: IndexMap<String, String>,
    /// Canonical model id → ordered list of canonical fallback ids, tried one at a time
    /// when every region for the original model is exhausted (spec §4.5 step 6).
    pub fallback_chains: IndexMap<String, Vec<String>>,
    /// Whether the dispatcher is allowed to trim old messages to fit the context window
    /// (spec §4.5 step 2).
    pub auto_truncate: bool,
    /// Tokens reserved for the model's own output when auto-truncating.
    pub reserve_output_tokens: u32,
    /// Path to an optional discovery-cache file (spec §4.2, §GLOSSARY).
    pub discovery_cache_path: Option<PathBuf>,
    /// HTTP listen port.
    pub port: u16,
    /// Append-only request log path (spec §6 "Persisted state").
    pub log_path: Option<PathBuf>,
    /// Stats JSON path (spec §6 "Persisted state").
    pub stats_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file, then apply environment-variable
    /// overrides (spec §6 "Environment variables").
    pub fn load(path: &std::path::Path) -> Result<Config, ConfigError> {
        loader::load(path)
    }

    /// Load configuration entirely from the environment, for deployments
    /// that don't supply a config file (spec §6 "Environment variables").
    pub fn load_from_env() -> Config {
        loader::load_from_env()
    }

    /// Structural validation that does not require the model catalog: presently
    /// just the mandatory `project_id` (spec §7, fatal at startup, exit code 1).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::MissingProjectId);
        }
        Ok(())
    }

    /// Cross-check alias and fallback-chain targets against the model catalog
    /// (spec §3 `Config` invariants). `is_known` should answer whether a
    /// canonical id exists in the catalog; the catalog itself lives in the
    /// `llm` crate so it is passed in rather than depended on here.
    pub fn validate_against_catalog(&self, is_known: impl Fn(&str) -> bool) -> Result<(), ConfigError> {
        for (alias, target) in &self.model_aliases {
            if !is_known(target) {
                return Err(ConfigError::UnknownAliasTarget {
                    alias: alias.clone(),
                    target: target.clone(),
                });
            }
        }

        for (model, targets) in &self.fallback_chains {
            for target in targets {
                if !is_known(target) {
                    return Err(ConfigError::UnknownFallbackTarget {
                        model: model.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// HTTP listen address, combining an all-interfaces bind with the configured port.
    pub fn listen_address(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_no_project_id() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_against_catalog_rejects_unknown_alias_target() {
        let mut config = Config {
            project_id: "demo".to_string(),
            ..Default::default()
        };
        config.model_aliases.insert("sonnet".to_string(), "nonexistent".to_string());

        let err = config.validate_against_catalog(|id| id == "claude-sonnet-4-5@20250929").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAliasTarget { .. }));
    }

    #[test]
    fn validate_against_catalog_accepts_known_targets() {
        let mut config = Config {
            project_id: "demo".to_string(),
            ..Default::default()
        };
        config
            .model_aliases
            .insert("sonnet".to_string(), "claude-sonnet-4-5@20250929".to_string());
        config
            .fallback_chains
            .insert("claude-opus-4-1@20250805".to_string(), vec!["claude-sonnet-4-5@20250929".to_string()]);

        config
            .validate_against_catalog(|id| matches!(id, "claude-sonnet-4-5@20250929" | "claude-opus-4-1@20250805"))
            .unwrap();
    }
}
