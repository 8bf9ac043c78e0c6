//! TTS stream client.
//!
//! Streams μ-law audio from an external TTS vendor and forwards it to the
//! telephony socket as 160-byte (20 ms) media frames, the same framing used
//! for outbound audio everywhere else in the bridge.

use tokio::sync::mpsc;
use tracing::warn;

/// 160 bytes of μ-law = 20ms at 8kHz, one provider media frame.
const FRAME_BYTES: usize = 160;

pub struct TtsStreamClient {
    client: reqwest::Client,
    endpoint: String,
}

impl TtsStreamClient {
    pub fn new(endpoint: String) -> Self {
        Self { client: reqwest::Client::new(), endpoint }
    }

    /// Stream `text` as μ-law bytes from the vendor, forwarding a `media`
    /// event for each 20ms frame to `outbound_tx`. Errors are logged and
    /// swallowed — TTS is best-effort and never fails the call.
    pub async fn speak(&self, text: &str, voice_id: &str, api_key: &str, stream_sid: &str, outbound_tx: &mpsc::Sender<String>) {
        let body = serde_json::json!({
            "text": text,
            "voice_id": voice_id,
            "output_format": "ulaw_8000",
            "optimize_streaming_latency": 4,
        });

        let resp = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("tts stream: request failed: {e}");
                return;
            }
        };

        let mut resp = match resp.error_for_status() {
            Ok(r) => r,
            Err(e) => {
                warn!("tts stream: upstream returned an error status: {e}");
                return;
            }
        };

        let mut pending = Vec::new();
        loop {
            let chunk = match resp.chunk().await {
                Ok(Some(c)) => c,
                Ok(None) => break,
                Err(e) => {
                    warn!("tts stream: read error mid-stream: {e}");
                    break;
                }
            };
            pending.extend_from_slice(&chunk);

            while pending.len() >= FRAME_BYTES {
                let frame: Vec<u8> = pending.drain(..FRAME_BYTES).collect();
                if send_media_frame(stream_sid, &frame, outbound_tx).await.is_err() {
                    return;
                }
            }
        }

        if !pending.is_empty() {
            let _ = send_media_frame(stream_sid, &pending, outbound_tx).await;
        }
    }
}

async fn send_media_frame(stream_sid: &str, frame: &[u8], outbound_tx: &mpsc::Sender<String>) -> Result<(), ()> {
    use base64::{engine::general_purpose::STANDARD, Engine};
    let payload = STANDARD.encode(frame);
    let msg = serde_json::json!({
        "event": "media",
        "streamSid": stream_sid,
        "media": {"payload": payload},
    })
    .to_string();
    outbound_tx.send(msg).await.map_err(|_| ())
}
