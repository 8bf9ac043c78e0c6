//! Webhook dispatcher.
//!
//! Builds the completion or fallback event payload and POSTs it
//! at-most-once to the selected endpoint. The at-least-once guarantee comes
//! from every HTTP-layer failure branch calling `dispatch_fallback`, not
//! from retrying here — see the design note on fire-and-forget external
//! calls.

use crate::config::{WebhookConfig, SENTINEL_TOKEN};
use crate::types::{CompletionEvent, FallbackEvent};
use tracing::{info, warn};

/// Minimum length for a per-call endpoint URL to be considered usable;
/// anything shorter falls back to the process-wide default.
const MIN_URL_LEN: usize = 8;

/// Select the dispatch endpoint per the sentinel-token rule: a matching
/// user token always reroutes to the hard-coded fallback URL regardless of
/// the per-call configured endpoint.
pub fn select_endpoint(config: &WebhookConfig, user_token: Option<&str>, per_call_url: Option<&str>) -> String {
    if user_token == Some(SENTINEL_TOKEN) {
        return config.fallback_url.clone();
    }

    match per_call_url {
        Some(url) if url.len() >= MIN_URL_LEN => url.to_string(),
        _ => config.default_url.clone(),
    }
}

pub struct WebhookDispatcher {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookDispatcher {
    pub fn new(config: WebhookConfig) -> Self {
        Self { client: reqwest::Client::new(), config }
    }

    pub async fn dispatch_completion(&self, event: &CompletionEvent, user_token: Option<&str>, per_call_url: Option<&str>) {
        let endpoint = select_endpoint(&self.config, user_token, per_call_url);
        if endpoint.is_empty() {
            warn!("webhook: no endpoint configured, dropping completion event for call {:?}", event.call_id);
            return;
        }
        self.post(&endpoint, event).await;
    }

    pub async fn dispatch_fallback(&self, event: &FallbackEvent, user_token: Option<&str>, per_call_url: Option<&str>) {
        let endpoint = select_endpoint(&self.config, user_token, per_call_url);
        if endpoint.is_empty() {
            warn!("webhook: no endpoint configured, dropping fallback event (reason: {})", event.error_reason);
            return;
        }
        self.post(&endpoint, event).await;
    }

    async fn post(&self, endpoint: &str, body: &impl serde::Serialize) {
        match self.client.post(endpoint).json(body).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("webhook: dispatched to {endpoint}");
            }
            Ok(resp) => {
                warn!("webhook: {endpoint} responded with {}", resp.status());
            }
            Err(e) => {
                warn!("webhook: request to {endpoint} failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WebhookConfig {
        WebhookConfig { default_url: "https://default.example/hook".to_string(), fallback_url: "https://fallback.example/hook".to_string() }
    }

    #[test]
    fn sentinel_token_always_wins() {
        let url = select_endpoint(&config(), Some(SENTINEL_TOKEN), Some("https://per-call.example/hook"));
        assert_eq!(url, "https://fallback.example/hook");
    }

    #[test]
    fn per_call_url_used_when_present_and_long_enough() {
        let url = select_endpoint(&config(), Some("user-token"), Some("https://per-call.example/hook"));
        assert_eq!(url, "https://per-call.example/hook");
    }

    #[test]
    fn short_per_call_url_falls_back_to_default() {
        let url = select_endpoint(&config(), Some("user-token"), Some("x"));
        assert_eq!(url, "https://default.example/hook");
    }

    #[test]
    fn missing_per_call_url_falls_back_to_default() {
        let url = select_endpoint(&config(), Some("user-token"), None);
        assert_eq!(url, "https://default.example/hook");
    }
}
