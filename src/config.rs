//! Configuration management
//!
//! Twelve-factor: every setting is sourced from an environment variable
//! (`.env` is loaded first via `dotenvy` if present), with the same
//! nested-struct-with-defaults shape the rest of this codebase uses for
//! typed settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub twilio: TwilioConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    pub url: Option<String>,
    pub service_key: Option<String>,
}

/// Sentinel user-token value that reroutes webhook dispatch to the
/// hard-coded fallback URL regardless of the per-call configured endpoint.
pub const SENTINEL_TOKEN: &str = "konclui";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_n8n_url")]
    pub default_url: String,
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,
}

fn default_n8n_url() -> String {
    env::var("N8N_WEBHOOK_URL").unwrap_or_default()
}

fn default_fallback_url() -> String {
    env::var("FALLBACK_WEBHOOK_URL").unwrap_or_default()
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { default_url: default_n8n_url(), fallback_url: default_fallback_url() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsConfig {
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
}

impl Config {
    /// Load configuration from the process environment, loading `.env`
    /// first if one is present in the working directory.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("no .env file loaded: {e}");
        }

        Ok(Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| default_host()),
                port: env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or_else(default_port),
            },
            openai: OpenAiConfig { api_key: env::var("OPENAI_API_KEY").ok() },
            object_store: ObjectStoreConfig {
                url: env::var("OBJECT_STORE_URL").ok(),
                service_key: env::var("OBJECT_STORE_SERVICE_KEY").ok(),
            },
            webhook: WebhookConfig::default(),
            twilio: TwilioConfig {
                account_sid: env::var("TWILIO_ACCOUNT_SID").ok(),
                auth_token: env::var("TWILIO_AUTH_TOKEN").ok(),
                from_number: env::var("TWILIO_FROM_NUMBER").ok(),
                base_url: env::var("TWILIO_BASE_URL").ok(),
            },
            tts: TtsConfig {
                api_key: env::var("TTS_API_KEY").or_else(|_| env::var("OPENAI_API_KEY")).ok(),
            },
            transcription: TranscriptionConfig {
                api_key: env::var("TRANSCRIPTION_API_KEY").or_else(|_| env::var("OPENAI_API_KEY")).ok(),
                endpoint: env::var("TRANSCRIPTION_ENDPOINT").ok(),
            },
        })
    }
}
