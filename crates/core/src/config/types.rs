use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::fingerprint::DEFAULT_KEY_PREFIX;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub notifier: Option<NotifierConfig>,
    #[serde(default)]
    pub run: RunConfig,
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Storage backend type
    pub backend: StoreBackend,
    /// Prefix shared by all per-search keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Set key holding the outstanding search URLs
    #[serde(default = "default_outstanding_key")]
    pub outstanding_key: String,
    /// SQLite-specific configuration (defaults apply when omitted)
    #[serde(default)]
    pub sqlite: Option<SqliteConfig>,
    /// Upstash-specific configuration (required when backend = "upstash")
    #[serde(default)]
    pub upstash: Option<UpstashConfig>,
}

impl StoreConfig {
    /// SQLite configuration at `path` with default keys.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            key_prefix: default_key_prefix(),
            outstanding_key: default_outstanding_key(),
            sqlite: Some(SqliteConfig { path: path.into() }),
            upstash: None,
        }
    }
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_outstanding_key() -> String {
    "outstanding_searches".to_string()
}

/// Available storage backends
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Sqlite,
    Upstash,
}

/// SQLite storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SqliteConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("propalert.db")
}

/// Upstash (Redis over REST) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstashConfig {
    /// REST endpoint (e.g., "https://eu1-example.upstash.io")
    pub url: String,
    /// REST token
    pub token: String,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u32,
}

fn default_store_timeout() -> u32 {
    10
}

/// Search page fetching configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RendererConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Navigation timeout in seconds (default: 30)
    #[serde(default = "default_render_timeout")]
    pub timeout_secs: u32,
    /// Base URL listing detail links are built on
    #[serde(default = "default_listing_base_url")]
    pub listing_base_url: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_render_timeout(),
            listing_base_url: default_listing_base_url(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string()
}

fn default_render_timeout() -> u32 {
    30
}

fn default_listing_base_url() -> String {
    "https://www.airbnb.com".to_string()
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifierConfig {
    pub backend: NotifierBackend,
    /// Telegram-specific configuration (required when backend = "telegram")
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

/// Available notification backends
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotifierBackend {
    Telegram,
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u32,
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

fn default_notify_timeout() -> u32 {
    15
}

/// Per-run behaviour
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunConfig {
    /// Include listings found on a search's first run in the notification.
    #[serde(default)]
    pub notify_on_first_run: bool,
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub store: SanitizedStoreConfig,
    pub renderer: RendererConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifier: Option<SanitizedNotifierConfig>,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStoreConfig {
    pub backend: String,
    pub key_prefix: String,
    pub outstanding_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstash_url: Option<String>,
    pub upstash_token_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedNotifierConfig {
    pub backend: String,
    pub chat_id: Option<String>,
    pub bot_token_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let store = &config.store;
        Self {
            store: SanitizedStoreConfig {
                backend: match store.backend {
                    StoreBackend::Sqlite => "sqlite".to_string(),
                    StoreBackend::Upstash => "upstash".to_string(),
                },
                key_prefix: store.key_prefix.clone(),
                outstanding_key: store.outstanding_key.clone(),
                sqlite_path: match store.backend {
                    StoreBackend::Sqlite => Some(
                        store
                            .sqlite
                            .as_ref()
                            .map(|s| s.path.clone())
                            .unwrap_or_else(default_db_path),
                    ),
                    StoreBackend::Upstash => None,
                },
                upstash_url: store.upstash.as_ref().map(|u| u.url.clone()),
                upstash_token_configured: store
                    .upstash
                    .as_ref()
                    .is_some_and(|u| !u.token.is_empty()),
            },
            renderer: config.renderer.clone(),
            notifier: config.notifier.as_ref().map(|n| SanitizedNotifierConfig {
                backend: match n.backend {
                    NotifierBackend::Telegram => "telegram".to_string(),
                },
                chat_id: n.telegram.as_ref().map(|t| t.chat_id.clone()),
                bot_token_configured: n
                    .telegram
                    .as_ref()
                    .is_some_and(|t| !t.bot_token.is_empty()),
            }),
            run: config.run.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_sqlite_config() {
        let toml = r#"
[store]
backend = "sqlite"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.key_prefix, "search");
        assert_eq!(config.store.outstanding_key, "outstanding_searches");
        assert!(config.store.sqlite.is_none());
        assert!(config.notifier.is_none());
        assert!(!config.run.notify_on_first_run);
        assert_eq!(config.renderer.timeout_secs, 30);
        assert_eq!(config.renderer.listing_base_url, "https://www.airbnb.com");
    }

    #[test]
    fn test_deserialize_missing_store_fails() {
        let toml = r#"
[run]
notify_on_first_run = true
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_upstash_and_telegram() {
        let toml = r#"
[store]
backend = "upstash"
key_prefix = "alerts"

[store.upstash]
url = "https://eu1-example.upstash.io"
token = "secret-token"

[notifier]
backend = "telegram"

[notifier.telegram]
bot_token = "123:abc"
chat_id = "-100200"

[run]
notify_on_first_run = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Upstash);
        assert_eq!(config.store.key_prefix, "alerts");

        let upstash = config.store.upstash.as_ref().unwrap();
        assert_eq!(upstash.url, "https://eu1-example.upstash.io");
        assert_eq!(upstash.timeout_secs, 10); // default

        let telegram = config.notifier.as_ref().unwrap().telegram.as_ref().unwrap();
        assert_eq!(telegram.chat_id, "-100200");
        assert_eq!(telegram.api_base, "https://api.telegram.org");
        assert!(config.run.notify_on_first_run);
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let toml = r#"
[store]
backend = "upstash"

[store.upstash]
url = "https://eu1-example.upstash.io"
token = "secret-token"

[notifier]
backend = "telegram"

[notifier.telegram]
bot_token = "123:abc"
chat_id = "42"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.store.backend, "upstash");
        assert!(sanitized.store.upstash_token_configured);
        assert!(sanitized.store.sqlite_path.is_none());

        let notifier = sanitized.notifier.as_ref().unwrap();
        assert!(notifier.bot_token_configured);
        assert_eq!(notifier.chat_id.as_deref(), Some("42"));

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret-token"));
        assert!(!json.contains("123:abc"));
    }

    #[test]
    fn test_sanitized_config_reports_default_db_path() {
        let config = Config {
            store: StoreConfig {
                backend: StoreBackend::Sqlite,
                key_prefix: default_key_prefix(),
                outstanding_key: default_outstanding_key(),
                sqlite: None,
                upstash: None,
            },
            renderer: RendererConfig::default(),
            notifier: None,
            run: RunConfig::default(),
        };
        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(
            sanitized.store.sqlite_path.as_ref().unwrap().to_str().unwrap(),
            "propalert.db"
        );
    }
}
