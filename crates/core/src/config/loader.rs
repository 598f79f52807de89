use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Nested keys use a double underscore, e.g. `PROPALERT_STORE__UPSTASH__TOKEN`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("PROPALERT_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(describe_errors(e)))?;

    Ok(config)
}

/// One line per failing key, naming the source that supplied the value.
fn describe_errors(error: figment::Error) -> String {
    error
        .into_iter()
        .map(|e| {
            let key = if e.path.is_empty() {
                "<root>".to_string()
            } else {
                e.path.join(".")
            };
            match &e.metadata {
                Some(source) => format!("{}: {} (from {})", key, e.kind, source.name),
                None => format!("{}: {}", key, e.kind),
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
