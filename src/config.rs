//! Environment-driven configuration for the chat client and the relay.

use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
pub const DEFAULT_GATEWAY_MODEL: &str = "google/gemini-2.5-flash";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Where the chat functions live and how long a silent stream may stall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub publishable_key: String,
    /// `None` disables the idle-read timeout.
    pub idle_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = required(&lookup, "CHAT_BASE_URL")?;
        let publishable_key = required(&lookup, "CHAT_PUBLISHABLE_KEY")?;
        let idle_secs = match non_empty(&lookup, "CHAT_IDLE_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "CHAT_IDLE_TIMEOUT_SECS",
                value: raw,
            })?,
            None => DEFAULT_IDLE_TIMEOUT_SECS,
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            publishable_key,
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
        })
    }

    pub fn function_url(&self, name: &str) -> String {
        format!("{}/functions/v1/{}", self.base_url, name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub gateway_url: String,
    /// Checked per request so the relay can start (and answer health checks)
    /// without a key.
    pub gateway_api_key: Option<String>,
    pub model: String,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_addr =
            non_empty(&lookup, "RELAY_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr = raw_addr.parse().map_err(|_| ConfigError::Invalid {
            name: "RELAY_BIND_ADDR",
            value: raw_addr.clone(),
        })?;

        Ok(Self {
            bind_addr,
            gateway_url: non_empty(&lookup, "GATEWAY_URL")
                .unwrap_or_else(|| DEFAULT_GATEWAY_URL.into()),
            gateway_api_key: non_empty(&lookup, "GATEWAY_API_KEY"),
            model: non_empty(&lookup, "GATEWAY_MODEL")
                .unwrap_or_else(|| DEFAULT_GATEWAY_MODEL.into()),
        })
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    non_empty(lookup, name).ok_or(ConfigError::Missing(name))
}
