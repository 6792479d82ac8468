use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base address of the TAP backend, e.g. "http://127.0.0.1:8000".
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    /// How long a notification stays visible before auto-dismissing.
    pub notification_ttl_secs: u64,
    /// Event loop tick interval in milliseconds.
    pub tick_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            api: ApiConfig {
                base_url: env::var("TAP_API_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
                timeout_secs: env::var("TAP_API_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
            },
            ui: UiConfig {
                notification_ttl_secs: env::var("TAP_NOTIFICATION_TTL_SECS")
                    .unwrap_or_else(|_| "6".to_string())
                    .parse()?,
                tick_ms: env::var("TAP_UI_TICK_MS")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()?,
            },
        })
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl UiConfig {
    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notification_ttl_secs)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
