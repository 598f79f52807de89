use super::{
    types::{Config, NotifierBackend, StoreBackend},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - The selected store backend has its section (upstash) with a URL and token
/// - Key names are non-empty
/// - Timeouts are not 0
/// - The selected notifier backend has its section with a token and chat id
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let store = &config.store;

    if store.key_prefix.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "store.key_prefix cannot be empty".to_string(),
        ));
    }
    if store.outstanding_key.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "store.outstanding_key cannot be empty".to_string(),
        ));
    }

    if store.backend == StoreBackend::Upstash {
        let upstash = store.upstash.as_ref().ok_or_else(|| {
            ConfigError::ValidationError(
                "store.upstash must be set when backend = \"upstash\"".to_string(),
            )
        })?;
        if upstash.url.is_empty() || upstash.token.is_empty() {
            return Err(ConfigError::ValidationError(
                "store.upstash.url and store.upstash.token are required".to_string(),
            ));
        }
        if upstash.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "store.upstash.timeout_secs cannot be 0".to_string(),
            ));
        }
    }

    if config.renderer.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "renderer.timeout_secs cannot be 0".to_string(),
        ));
    }
    if url::Url::parse(&config.renderer.listing_base_url).is_err() {
        return Err(ConfigError::ValidationError(format!(
            "renderer.listing_base_url is not a valid URL: {}",
            config.renderer.listing_base_url
        )));
    }

    if let Some(notifier) = &config.notifier {
        match notifier.backend {
            NotifierBackend::Telegram => {
                let telegram = notifier.telegram.as_ref().ok_or_else(|| {
                    ConfigError::ValidationError(
                        "notifier.telegram must be set when backend = \"telegram\"".to_string(),
                    )
                })?;
                if telegram.bot_token.is_empty() || telegram.chat_id.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "notifier.telegram.bot_token and chat_id are required".to_string(),
                    ));
                }
                if telegram.timeout_secs == 0 {
                    return Err(ConfigError::ValidationError(
                        "notifier.telegram.timeout_secs cannot be 0".to_string(),
                    ));
                }
            }
        }
    }

    Ok(())
}
