//! Process-wide shared state: configuration plus the collaborators every
//! HTTP handler and media session needs a handle to.

use crate::classification::{ChatClassifier, Classifier};
use crate::config::Config;
use crate::detection_cache::DetectionCache;
use crate::transcription::{HttpTranscriber, Transcriber};
use crate::tts_stream::TtsStreamClient;
use crate::upload::{HttpUploader, Uploader};
use crate::webhook::WebhookDispatcher;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub detection_cache: Arc<DetectionCache>,
    pub transcriber: Arc<dyn Transcriber>,
    pub classifier: Arc<dyn Classifier>,
    pub tts: Arc<TtsStreamClient>,
    pub uploader: Arc<dyn Uploader>,
    pub webhook: Arc<WebhookDispatcher>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let transcription_endpoint = config
            .transcription
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1/audio/transcriptions".to_string());

        Self {
            transcriber: Arc::new(HttpTranscriber::new(transcription_endpoint, config.transcription.api_key.clone())),
            classifier: Arc::new(ChatClassifier::new(
                "https://api.openai.com/v1/chat/completions".to_string(),
                "gpt-4o-mini".to_string(),
            )),
            tts: Arc::new(TtsStreamClient::new("https://api.elevenlabs.io/v1/text-to-speech/stream".to_string())),
            uploader: Arc::new(HttpUploader::new(config.object_store.url.clone(), config.object_store.service_key.clone())),
            webhook: Arc::new(WebhookDispatcher::new(config.webhook.clone())),
            detection_cache: Arc::new(DetectionCache::new()),
            config,
        }
    }
}
