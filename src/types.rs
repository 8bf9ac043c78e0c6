//! Wire and domain types shared across the bridge: the call session record,
//! the detection cache entry, audio chunks/transcripts, and the two event
//! payloads dispatched to the automation endpoint.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Which flow a media session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Agent,
    Bridge,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Agent => "agent",
            Mode::Bridge => "bridge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceProvider {
    Openai,
    Elevenlabs,
}

/// Role of a transcript entry or chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn to_openai_string(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_openai_string())
    }
}

/// Recognized stream parameters carried by the telephony control document,
/// echoed back on the media WebSocket's start frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamOptions {
    pub voice_id: Option<String>,
    pub voice_provider: Option<VoiceProvider>,
    pub alt_tts_api_key: Option<String>,
    pub custom_llm_key: Option<String>,
    pub custom_system_prompt: Option<String>,
    pub first_message: Option<String>,
    pub automation_endpoint: Option<String>,
    pub user_token: Option<String>,
    pub lead_id: Option<String>,
}

/// One μ-law frame as delivered on the media WebSocket.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Milliseconds since stream start, provider-supplied and monotonic.
    pub timestamp_ms: u64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// SDR or lead human-vs-voicemail verdict, shared shape for both classifier
/// operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionOutcome {
    pub is_human: bool,
    pub confidence: f64,
    pub reason: String,
}

/// Short-lived record handed from the HTTP verification handler to the media
/// session via the detection cache. Read exactly once, or evicted after 5
/// minutes.
#[derive(Debug, Clone)]
pub struct DetectionRecord {
    pub call_id: String,
    pub sdr_answered: bool,
    pub reason: String,
    pub confidence: f64,
    pub first_words: String,
    pub created_at: DateTime<Utc>,
}

/// One active media WebSocket's worth of state. Created on the stream-start
/// frame, destroyed once the completion/fallback event has been dispatched.
#[derive(Debug, Clone)]
pub struct CallSession {
    pub stream_sid: String,
    pub call_id: String,
    pub call_sid: Option<String>,
    pub mode: Mode,
    pub source: String,
    pub options: StreamOptions,
    pub inbound_chunks: Vec<AudioChunk>,
    pub outbound_chunks: Vec<AudioChunk>,
    pub agent_chunks: Vec<AudioChunk>,
    pub transcripts: Vec<TranscriptEntry>,
    pub sdr_answered: bool,
    pub sdr_reason: String,
    pub sdr_confidence: f64,
    pub sdr_first_words: String,
    pub sdr_no_detection_stored: bool,
    pub lead_phone: Option<String>,
    /// Seconds from stream start during which the outbound track is the
    /// pre-recorded announcement (spoken by the system voice "BIANCA"),
    /// used by the VAD segmenter to distinguish BIANCA from LEAD speech.
    pub announcement_span_secs: f64,
}

impl CallSession {
    pub fn new(stream_sid: String, call_id: String, mode: Mode, source: String, options: StreamOptions) -> Self {
        Self {
            stream_sid,
            call_id,
            call_sid: None,
            mode,
            source,
            options,
            inbound_chunks: Vec::new(),
            outbound_chunks: Vec::new(),
            agent_chunks: Vec::new(),
            transcripts: Vec::new(),
            sdr_answered: false,
            sdr_reason: String::new(),
            sdr_confidence: 0.0,
            sdr_first_words: String::new(),
            sdr_no_detection_stored: true,
            lead_phone: None,
            announcement_span_secs: 6.0,
        }
    }
}

/// A `realtime_messages[]` entry in the dispatched event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage {
    pub role: Role,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&TranscriptEntry> for RealtimeMessage {
    fn from(t: &TranscriptEntry) -> Self {
        RealtimeMessage { role: t.role, message: t.text.clone(), timestamp: t.timestamp }
    }
}

/// The success-path payload POSTed to the automation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionEvent {
    #[serde(rename = "assistantName")]
    pub assistant_name: String,
    pub transcript: String,
    pub realtime_messages: Vec<RealtimeMessage>,
    #[serde(rename = "recordingUrl")]
    pub recording_url: String,
    pub timestamp: DateTime<Utc>,
    pub status: &'static str,
    pub mode: &'static str,
    pub source: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdr_transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdr_answered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdr_detection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdr_detection_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdr_first_words: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_answered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_detection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_detection_confidence: Option<f64>,
}

/// The failed-attempt payload, dispatched from every HTTP-layer failure
/// branch and from the status callback.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackEvent {
    #[serde(rename = "assistantName")]
    pub assistant_name: String,
    pub transcript: String,
    pub realtime_messages: Vec<RealtimeMessage>,
    #[serde(rename = "recordingUrl")]
    pub recording_url: String,
    pub timestamp: DateTime<Utc>,
    pub status: &'static str,
    pub mode: &'static str,
    pub source: &'static str,
    pub error_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sip_response_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}
