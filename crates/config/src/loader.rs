use std::path::Path;

use crate::{Config, ConfigError};

/// Load the TOML config file (spec §6 "Config file"), then apply the
/// documented environment-variable overrides (spec §6 "Environment
/// variables") on top of it. File first, environment second: an operator
/// overriding a single value at deploy time should not have to rewrite the
/// whole file.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let mut config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source: Box::new(source),
    })?;

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load defaults (no config file) and apply environment overrides. Used when
/// `--config` is not supplied; the project id must then come entirely from
/// the environment.
pub fn load_from_env() -> Config {
    let mut config = Config::default();
    apply_env_overrides(&mut config);
    config
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(project_id) = std::env::var("VERTEX_PROXY_PROJECT_ID") {
        config.project_id = project_id;
    }

    if let Ok(region) = std::env::var("VERTEX_PROXY_DEFAULT_REGION") {
        config.default_region = Some(region);
    }

    if let Ok(region) = std::env::var("VERTEX_PROXY_GOOGLE_REGION") {
        config.google_region = Some(region);
    }

    if let Ok(port) = std::env::var("VERTEX_PROXY_PORT") {
        match port.parse() {
            Ok(port) => config.port = port,
            Err(e) => log::warn!("ignoring invalid VERTEX_PROXY_PORT={port:?}: {e}"),
        }
    }

    if config.port == 0 {
        config.port = 8080;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_take_precedence_over_file_defaults() {
        temp_env::with_var("VERTEX_PROXY_PROJECT_ID", Some("from-env"), || {
            let mut config = Config {
                project_id: "from-file".to_string(),
                ..Default::default()
            };
            apply_env_overrides(&mut config);
            assert_eq!(config.project_id, "from-env");
        });
    }

    #[test]
    fn missing_port_defaults_to_8080() {
        let mut config = Config::default();
        apply_env_overrides(&mut config);
        assert_eq!(config.port, 8080);
    }
}
