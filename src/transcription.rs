//! Transcription client.
//!
//! Submits a WAV payload to an external speech-to-text endpoint as
//! multipart form data. Errors degrade to an empty transcript rather than
//! failing the call — transcription is best-effort.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::warn;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, wav_bytes: Vec<u8>) -> String;
}

pub struct HttpTranscriber {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpTranscriber {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model: "whisper-1".to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, wav_bytes: Vec<u8>) -> String {
        let part = match Part::bytes(wav_bytes).file_name("segment.wav").mime_str("audio/wav") {
            Ok(p) => p,
            Err(e) => {
                warn!("transcription: failed to build multipart body: {e}");
                return String::new();
            }
        };

        let form = Form::new()
            .text("model", self.model.clone())
            .text("language", "pt")
            .part("file", part);

        let mut req = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        match req.send().await {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => match resp.json::<TranscriptionResponse>().await {
                    Ok(body) => body.text,
                    Err(e) => {
                        warn!("transcription: failed to parse response: {e}");
                        String::new()
                    }
                },
                Err(e) => {
                    warn!("transcription: upstream returned an error status: {e}");
                    String::new()
                }
            },
            Err(e) => {
                warn!("transcription: request failed: {e}");
                String::new()
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}
