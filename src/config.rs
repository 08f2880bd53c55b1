use std::env;
use std::fmt;

use tracing::warn;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LOG_FILTER: &str = "trip_planner_svc=info,tower_http=debug,axum::rejection=info";
const DEFAULT_MODEL: &str = "deepseek-chat";
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub chat: ChatSettings,
    pub amap_key: Option<String>,
}

/// Settings for the chat-completion provider.
#[derive(Clone)]
pub struct ChatSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("PORT '{}' is not a valid number, using {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        Self {
            host: non_empty("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            log_level: non_empty("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            chat: ChatSettings {
                api_key: non_empty("OPENAI_API_KEY"),
                base_url: non_empty("OPENAI_BASE_URL").map(|url| normalize_base_url(&url)),
                model: non_empty("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            },
            amap_key: non_empty("AMAP_WEB_KEY"),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("chat", &self.chat)
            .field("amap_key", &self.amap_key.as_deref().map(mask_secret))
            .finish()
    }
}

impl ChatSettings {
    /// Which provider family the base URL points at.
    pub fn provider(&self) -> &'static str {
        match &self.base_url {
            Some(url) if url.contains("deepseek.com") => "deepseek",
            _ => "openai",
        }
    }

    /// The API key reduced to its first 8 characters.
    pub fn masked_key(&self) -> Option<String> {
        self.api_key.as_deref().map(mask_secret)
    }
}

impl fmt::Debug for ChatSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSettings")
            .field("api_key", &self.masked_key())
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// DeepSeek only serves the OpenAI-compatible API under `/v1`.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim();
    if url == DEEPSEEK_BASE_URL {
        format!("{}/v1", DEEPSEEK_BASE_URL)
    } else {
        url.to_string()
    }
}

pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(8).collect();
    format!("{}...", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.chat.model, "deepseek-chat");
        assert!(config.chat.api_key.is_none());
        assert!(config.amap_key.is_none());
        assert_eq!(config.chat.provider(), "openai");
    }

    #[test]
    fn test_bad_port_falls_back() {
        let config = config_from(&[("PORT", "eighty")]);
        assert_eq!(config.port, 8080);

        let config = config_from(&[("PORT", "3000")]);
        assert_eq!(config.server_url(), "http://0.0.0.0:3000");
    }

    #[test]
    fn test_deepseek_base_url_is_normalized() {
        let config = config_from(&[("OPENAI_BASE_URL", "https://api.deepseek.com")]);
        assert_eq!(
            config.chat.base_url.as_deref(),
            Some("https://api.deepseek.com/v1")
        );
        assert_eq!(config.chat.provider(), "deepseek");

        let config = config_from(&[("OPENAI_BASE_URL", "https://example.com/v1")]);
        assert_eq!(config.chat.base_url.as_deref(), Some("https://example.com/v1"));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config_from(&[("OPENAI_API_KEY", "  "), ("AMAP_WEB_KEY", "")]);
        assert!(config.chat.api_key.is_none());
        assert!(config.amap_key.is_none());
    }

    #[test]
    fn test_debug_masks_api_key() {
        let config = config_from(&[("OPENAI_API_KEY", "sk-1234567890abcdef")]);
        let printed = format!("{:?}", config.chat);
        assert!(printed.contains("sk-12345..."));
        assert!(!printed.contains("abcdef"));
    }
}
