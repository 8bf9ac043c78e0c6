//! The per-call media-stream session: the actor that owns the telephony
//! WebSocket, the LLM realtime WebSocket, the audio buffers, and the
//! transcript, from stream-start through finalize.
//!
//! The two sockets are drained by independent reader tasks feeding a single
//! mailbox (`SessionEvent`), so neither socket can block the other; all
//! state mutation happens on the one task that owns the `CallSession`,
//! matching the single-writer discipline the teacher's realtime voice
//! session uses for its own mailbox.

use crate::codec::{mono_wav, mu_law_to_pcm16, stereo_wav, synchronize_tracks};
use crate::state::AppState;
use crate::types::{AudioChunk, CallSession, CompletionEvent, FallbackEvent, Mode, RealtimeMessage, Role, StreamOptions, VoiceProvider};
use crate::vad::{correct_announcement_misattribution, segment_tracks, Speaker};
use axum::extract::ws::{Message, WebSocket};
use base64::{engine::general_purpose::STANDARD, Engine};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info};

// ─── Telephony media WebSocket wire frames ───

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum StreamEvent {
    Connected,
    Start { start: StartMetadata },
    Media { media: MediaPayload },
    Stop,
    Mark,
}

#[derive(Debug, Deserialize)]
struct StartMetadata {
    #[serde(rename = "streamSid")]
    stream_sid: String,
    #[serde(rename = "callSid")]
    call_sid: Option<String>,
    #[serde(rename = "customParameters", default)]
    custom_parameters: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct MediaPayload {
    track: Option<String>,
    timestamp: String,
    payload: String,
}

// ─── LLM realtime WebSocket wire frames ───

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseCreateBody },
    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

#[derive(Debug, Serialize)]
struct SessionConfig {
    modalities: Vec<&'static str>,
    input_audio_format: &'static str,
    output_audio_format: &'static str,
    input_audio_transcription: TranscriptionModel,
    turn_detection: ServerVad,
    instructions: String,
}

#[derive(Debug, Serialize)]
struct TranscriptionModel {
    model: &'static str,
}

#[derive(Debug, Serialize)]
struct ServerVad {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ResponseCreateBody {
    instructions: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ServerEvent {
    #[serde(rename = "session.updated")]
    SessionUpdated,
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta { delta: String },
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted { transcript: String },
    #[serde(rename = "response.audio_transcript.done")]
    ResponseAudioTranscriptDone { transcript: String },
    #[serde(other)]
    Other,
}

const SCRIBE_PROMPT: &str = "You are a silent transcriber. Do not speak, do not generate audio responses, only transcribe.";
const AGENT_PROMPT: &str = "You are a helpful voice agent speaking with a caller.";

/// Mailbox entries the session loop multiplexes over.
enum SessionEvent {
    Telephony(StreamEvent),
    TelephonyClosed,
    Llm(ServerEvent),
    LlmClosed,
}

/// Entry point: drive one media WebSocket connection end to end.
pub async fn run(socket: WebSocket, state: Arc<AppState>, llm_ws_url: String) {
    let (mut telephony_tx, mut telephony_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(256);

    // drains the outbound mailbox and writes to the telephony socket.
    let sender_task = tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if telephony_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let (mailbox_tx, mut mailbox_rx) = mpsc::channel::<SessionEvent>(256);
    let telephony_mailbox = mailbox_tx.clone();
    let telephony_reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = telephony_rx.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<StreamEvent>(&text) {
                    Ok(event) => {
                        if telephony_mailbox.send(SessionEvent::Telephony(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!("media session: unrecognized telephony frame: {e}"),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
        let _ = telephony_mailbox.send(SessionEvent::TelephonyClosed).await;
    });

    // wait for the start frame before doing anything else.
    let mut session: Option<CallSession> = None;
    let mut llm_tx: Option<mpsc::Sender<ClientEvent>> = None;
    let mut llm_ready = false;
    let mut pending_audio: Vec<String> = Vec::new();
    let mut external_tts_active = false;

    while let Some(event) = mailbox_rx.recv().await {
        match event {
            SessionEvent::Telephony(StreamEvent::Start { start }) => {
                let mode = infer_mode(&start.custom_parameters);
                let options = parse_stream_options(&start.custom_parameters);
                let mut cs = CallSession::new(
                    start.stream_sid.clone(),
                    start.custom_parameters.get("call_id").cloned().unwrap_or_default(),
                    mode,
                    start.custom_parameters.get("source").cloned().unwrap_or_else(|| "media_stream".to_string()),
                    options,
                );
                cs.call_sid = start.call_sid.clone();
                cs.lead_phone = start.custom_parameters.get("lead_phone").cloned();

                if mode == Mode::Bridge {
                    if let Some(call_sid) = &cs.call_sid {
                        if let Some(record) = state.detection_cache.take(call_sid) {
                            cs.sdr_answered = record.sdr_answered;
                            cs.sdr_reason = record.reason;
                            cs.sdr_confidence = record.confidence;
                            cs.sdr_first_words = record.first_words;
                            cs.sdr_no_detection_stored = false;
                        } else {
                            cs.sdr_reason = "no_detection_stored".to_string();
                            cs.sdr_no_detection_stored = true;
                        }
                    }
                }

                external_tts_active = cs.options.voice_provider == Some(VoiceProvider::Elevenlabs) && cs.options.alt_tts_api_key.is_some();
                if mode == Mode::Agent && external_tts_active {
                    if let Some(first_message) = cs.options.first_message.clone() {
                        let tts = state.tts.clone();
                        let voice_id = cs.options.voice_id.clone().unwrap_or_default();
                        let api_key = cs.options.alt_tts_api_key.clone().unwrap_or_default();
                        let stream_sid = cs.stream_sid.clone();
                        let tx = outbound_tx.clone();
                        tokio::spawn(async move {
                            tts.speak(&first_message, &voice_id, &api_key, &stream_sid, &tx).await;
                        });
                    }
                }

                let (client_tx, client_rx) = mpsc::channel::<ClientEvent>(64);
                llm_tx = Some(client_tx);
                let instructions = match mode {
                    Mode::Bridge => SCRIBE_PROMPT.to_string(),
                    Mode::Agent => cs.options.custom_system_prompt.clone().unwrap_or_else(|| AGENT_PROMPT.to_string()),
                };
                spawn_llm_connection(llm_ws_url.clone(), mailbox_tx.clone(), client_rx, instructions);

                info!("media session started: stream_sid={} mode={:?}", cs.stream_sid, cs.mode);
                session = Some(cs);
            }
            SessionEvent::Telephony(StreamEvent::Media { media }) => {
                let Some(cs) = session.as_mut() else { continue };
                let Ok(timestamp_ms) = media.timestamp.parse::<u64>() else { continue };
                let Ok(payload) = STANDARD.decode(&media.payload) else { continue };
                let chunk = AudioChunk { timestamp_ms, payload: payload.clone() };

                match (cs.mode, media.track.as_deref()) {
                    (Mode::Bridge, Some("inbound")) => cs.inbound_chunks.push(chunk),
                    (Mode::Bridge, Some("outbound")) => cs.outbound_chunks.push(chunk),
                    (Mode::Bridge, _) => cs.inbound_chunks.push(chunk),
                    (Mode::Agent, _) => cs.agent_chunks.push(chunk),
                }

                let append = ClientEvent::InputAudioBufferAppend { audio: media.payload };
                if llm_ready {
                    if let Some(tx) = &llm_tx {
                        let _ = tx.send(append).await;
                    }
                } else {
                    pending_audio.push(STANDARD.encode(&payload));
                }
            }
            SessionEvent::Telephony(StreamEvent::Stop) | SessionEvent::TelephonyClosed => {
                if let Some(tx) = llm_tx.take() {
                    drop(tx);
                }
                if let Some(cs) = session.take() {
                    finalize(cs, state.clone()).await;
                }
                break;
            }
            SessionEvent::Telephony(_) => {}
            SessionEvent::Llm(ServerEvent::SessionUpdated) => {
                llm_ready = true;
                if let Some(tx) = &llm_tx {
                    for audio in pending_audio.drain(..) {
                        let _ = tx.send(ClientEvent::InputAudioBufferAppend { audio }).await;
                    }
                }
                if let Some(cs) = &session {
                    if cs.mode == Mode::Agent && !external_tts_active {
                        if let Some(first_message) = &cs.options.first_message {
                            if let Some(tx) = &llm_tx {
                                let _ = tx
                                    .send(ClientEvent::ResponseCreate {
                                        response: ResponseCreateBody { instructions: format!("Say '{first_message}'") },
                                    })
                                    .await;
                            }
                        }
                    }
                }
            }
            SessionEvent::Llm(ServerEvent::ResponseAudioDelta { delta }) => {
                if external_tts_active {
                    continue;
                }
                if let Some(cs) = &session {
                    if cs.mode == Mode::Agent {
                        let msg = serde_json::json!({
                            "event": "media",
                            "streamSid": cs.stream_sid,
                            "media": {"payload": delta},
                        })
                        .to_string();
                        let _ = outbound_tx.send(msg).await;
                    }
                }
            }
            SessionEvent::Llm(ServerEvent::SpeechStarted) => {
                if let Some(cs) = &session {
                    if cs.mode == Mode::Agent {
                        let clear = serde_json::json!({"event": "clear", "streamSid": cs.stream_sid}).to_string();
                        let _ = outbound_tx.send(clear).await;
                        if let Some(tx) = &llm_tx {
                            let _ = tx.send(ClientEvent::ResponseCancel).await;
                        }
                    }
                }
            }
            SessionEvent::Llm(ServerEvent::InputTranscriptionCompleted { transcript }) => {
                if let Some(cs) = session.as_mut() {
                    cs.transcripts.push(crate::types::TranscriptEntry { role: Role::User, text: transcript, timestamp: chrono::Utc::now() });
                }
            }
            SessionEvent::Llm(ServerEvent::ResponseAudioTranscriptDone { transcript }) => {
                if let Some(cs) = session.as_mut() {
                    cs.transcripts.push(crate::types::TranscriptEntry { role: Role::Assistant, text: transcript.clone(), timestamp: chrono::Utc::now() });
                    if external_tts_active {
                        let tts = state.tts.clone();
                        let voice_id = cs.options.voice_id.clone().unwrap_or_default();
                        let api_key = cs.options.alt_tts_api_key.clone().unwrap_or_default();
                        let stream_sid = cs.stream_sid.clone();
                        let tx = outbound_tx.clone();
                        tokio::spawn(async move {
                            tts.speak(&transcript, &voice_id, &api_key, &stream_sid, &tx).await;
                        });
                    }
                }
            }
            SessionEvent::Llm(ServerEvent::Other) => {}
            SessionEvent::LlmClosed => {
                // continue buffering; finalize happens on stream-stop, not here.
            }
        }
    }

    sender_task.abort();
    telephony_reader.abort();
}

fn infer_mode(params: &HashMap<String, String>) -> Mode {
    match params.get("mode").map(String::as_str) {
        Some("bridge") => Mode::Bridge,
        _ => Mode::Agent,
    }
}

fn parse_stream_options(params: &HashMap<String, String>) -> StreamOptions {
    StreamOptions {
        voice_id: params.get("voice_id").cloned(),
        voice_provider: params.get("voice_provider").and_then(|v| match v.as_str() {
            "elevenlabs" => Some(VoiceProvider::Elevenlabs),
            "openai" => Some(VoiceProvider::Openai),
            _ => None,
        }),
        alt_tts_api_key: params.get("alt_tts_api_key").cloned(),
        custom_llm_key: params.get("custom_llm_key").cloned(),
        custom_system_prompt: params.get("custom_system_prompt").cloned(),
        first_message: params.get("first_message").cloned(),
        automation_endpoint: params.get("automation_endpoint").cloned(),
        user_token: params.get("token").cloned(),
        lead_id: params.get("lead_id").cloned(),
    }
}

fn spawn_llm_connection(ws_url: String, mailbox_tx: mpsc::Sender<SessionEvent>, mut client_rx: mpsc::Receiver<ClientEvent>, instructions: String) {
    tokio::spawn(async move {
        let (ws_stream, _) = match tokio_tungstenite::connect_async(&ws_url).await {
            Ok(pair) => pair,
            Err(e) => {
                error!("media session: failed to open LLM realtime socket: {e}");
                let _ = mailbox_tx.send(SessionEvent::LlmClosed).await;
                return;
            }
        };
        let (mut write, mut read) = ws_stream.split();

        let session_update = ClientEvent::SessionUpdate {
            session: SessionConfig {
                modalities: vec!["text", "audio"],
                input_audio_format: "g711_ulaw",
                output_audio_format: "g711_ulaw",
                input_audio_transcription: TranscriptionModel { model: "whisper-1" },
                turn_detection: ServerVad { kind: "server_vad" },
                instructions,
            },
        };
        if let Ok(text) = serde_json::to_string(&session_update) {
            let _ = write.send(WsMessage::Text(text.into())).await;
        }

        let mailbox_for_read = mailbox_tx.clone();
        let read_task = tokio::spawn(async move {
            while let Some(Ok(msg)) = read.next().await {
                if let WsMessage::Text(text) = msg {
                    match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            if mailbox_for_read.send(SessionEvent::Llm(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!("media session: unrecognized LLM frame: {e}"),
                    }
                }
            }
            let _ = mailbox_for_read.send(SessionEvent::LlmClosed).await;
        });

        while let Some(event) = client_rx.recv().await {
            if let Ok(text) = serde_json::to_string(&event) {
                if write.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }

        read_task.abort();
    });
}

async fn finalize(session: CallSession, state: Arc<AppState>) {
    let call_id = session.call_id.clone();
    let user_token = session.options.user_token.clone();
    let per_call_url = session.options.automation_endpoint.clone();

    match session.mode {
        Mode::Bridge => finalize_bridge(session, &state, user_token.as_deref(), per_call_url.as_deref()).await,
        Mode::Agent => finalize_agent(session, &state, user_token.as_deref(), per_call_url.as_deref()).await,
    }

    info!("media session finalized: call_id={call_id}");
}

async fn finalize_bridge(mut session: CallSession, state: &Arc<AppState>, user_token: Option<&str>, per_call_url: Option<&str>) {
    let has_audio = !session.inbound_chunks.is_empty() || !session.outbound_chunks.is_empty();

    let mut recording_url = String::new();
    let mut sdr_transcript = String::new();
    let mut lead_transcript = String::new();
    let mut combined_transcript = String::new();

    if has_audio {
        let (left, right) = synchronize_tracks(&session.inbound_chunks, &session.outbound_chunks, 8000);
        let wav = stereo_wav(&left, &right, 8000);
        recording_url = state.uploader.upload_wav(&session.call_id, wav).await;

        let mut segments = segment_tracks(&left, &right, session.announcement_span_secs);
        for seg in segments.iter_mut() {
            let track = match seg.speaker {
                Speaker::Sdr => &right,
                _ => &left,
            };
            let start = ((seg.start_sec * 8000.0) as usize).min(track.len());
            let end = ((seg.end_sec * 8000.0) as usize).min(track.len());
            let wav = mono_wav(&track[start..end], 8000);
            seg.text = state.transcriber.transcribe(wav).await;
        }
        correct_announcement_misattribution(&mut segments);

        let sdr_parts: Vec<&str> = segments.iter().filter(|s| s.speaker == Speaker::Sdr).map(|s| s.text.as_str()).collect();
        sdr_transcript = sdr_parts.join(" ");
        let lead_parts: Vec<&str> = segments.iter().filter(|s| s.speaker == Speaker::Lead).map(|s| s.text.as_str()).collect();
        lead_transcript = lead_parts.join(" ");
        combined_transcript = segments.iter().filter(|s| !s.text.is_empty()).map(|s| format!("[{}]: {}", s.speaker.as_str(), s.text)).collect::<Vec<_>>().join("\n");
    }

    if session.sdr_no_detection_stored && !sdr_transcript.is_empty() {
        let api_key = session.options.custom_llm_key.clone().unwrap_or_else(|| state.config.openai.api_key.clone().unwrap_or_default());
        let outcome = crate::classification::classify_sdr_first_speech(state.classifier.as_ref(), &sdr_transcript, &api_key).await;
        session.sdr_answered = outcome.is_human;
        session.sdr_reason = outcome.reason;
        session.sdr_confidence = outcome.confidence;
        session.sdr_first_words = sdr_transcript.clone();
    }

    let api_key = session.options.custom_llm_key.clone().unwrap_or_else(|| state.config.openai.api_key.clone().unwrap_or_default());
    let lead_outcome = crate::classification::classify_lead_speech(state.classifier.as_ref(), &lead_transcript, &api_key).await;

    let event = CompletionEvent {
        assistant_name: "BIANCA".to_string(),
        transcript: combined_transcript,
        realtime_messages: session.transcripts.iter().map(RealtimeMessage::from).collect(),
        recording_url,
        timestamp: chrono::Utc::now(),
        status: "success",
        mode: Mode::Bridge.as_str(),
        source: session.source.clone(),
        sdr_transcript: Some(sdr_transcript),
        lead_transcript: Some(lead_transcript),
        token: session.options.user_token.clone(),
        lead_id: session.options.lead_id.clone(),
        call_id: Some(session.call_id.clone()),
        sdr_answered: Some(session.sdr_answered),
        sdr_detection_reason: Some(session.sdr_reason.clone()),
        sdr_detection_confidence: Some(session.sdr_confidence),
        sdr_first_words: Some(session.sdr_first_words.clone()),
        lead_answered: Some(lead_outcome.is_human),
        lead_detection_reason: Some(lead_outcome.reason),
        lead_detection_confidence: Some(lead_outcome.confidence),
    };

    state.webhook.dispatch_completion(&event, user_token, per_call_url).await;
}

async fn finalize_agent(session: CallSession, state: &Arc<AppState>, user_token: Option<&str>, per_call_url: Option<&str>) {
    let mut recording_url = String::new();
    if !session.agent_chunks.is_empty() {
        let mut pcm = Vec::new();
        for chunk in &session.agent_chunks {
            pcm.extend(mu_law_to_pcm16(&chunk.payload));
        }
        let wav = mono_wav(&pcm, 8000);
        recording_url = state.uploader.upload_wav(&session.call_id, wav).await;
    }

    let transcript = session
        .transcripts
        .iter()
        .map(|t| format!("[{}]: {}", t.role, t.text))
        .collect::<Vec<_>>()
        .join("\n");

    let event = CompletionEvent {
        assistant_name: "Agent".to_string(),
        transcript,
        realtime_messages: session.transcripts.iter().map(RealtimeMessage::from).collect(),
        recording_url,
        timestamp: chrono::Utc::now(),
        status: "success",
        mode: Mode::Agent.as_str(),
        source: session.source.clone(),
        sdr_transcript: None,
        lead_transcript: None,
        token: session.options.user_token.clone(),
        lead_id: session.options.lead_id.clone(),
        call_id: Some(session.call_id.clone()),
        sdr_answered: None,
        sdr_detection_reason: None,
        sdr_detection_confidence: None,
        sdr_first_words: None,
        lead_answered: None,
        lead_detection_reason: None,
        lead_detection_confidence: None,
    };

    state.webhook.dispatch_completion(&event, user_token, per_call_url).await;
}

/// Build a fallback event for one of the HTTP-layer failure branches in
/// `server.rs`.
pub fn build_fallback_event(source: &'static str, error_reason: String, sip_response_code: Option<String>, call_sid: Option<String>, token: Option<String>, lead_id: Option<String>, call_id: Option<String>) -> FallbackEvent {
    FallbackEvent {
        assistant_name: "BIANCA".to_string(),
        transcript: String::new(),
        realtime_messages: Vec::new(),
        recording_url: String::new(),
        timestamp: chrono::Utc::now(),
        status: "failed",
        mode: Mode::Bridge.as_str(),
        source,
        error_reason,
        sip_response_code,
        call_sid,
        token,
        lead_id,
        call_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_mode_defaults_to_agent() {
        let params = HashMap::new();
        assert_eq!(infer_mode(&params), Mode::Agent);
    }

    #[test]
    fn infer_mode_reads_bridge_parameter() {
        let mut params = HashMap::new();
        params.insert("mode".to_string(), "bridge".to_string());
        assert_eq!(infer_mode(&params), Mode::Bridge);
    }

    #[test]
    fn parse_stream_options_reads_recognized_fields() {
        let mut params = HashMap::new();
        params.insert("voice_id".to_string(), "v1".to_string());
        params.insert("voice_provider".to_string(), "elevenlabs".to_string());
        params.insert("first_message".to_string(), "Hello!".to_string());
        let options = parse_stream_options(&params);
        assert_eq!(options.voice_id.as_deref(), Some("v1"));
        assert_eq!(options.voice_provider, Some(VoiceProvider::Elevenlabs));
        assert_eq!(options.first_message.as_deref(), Some("Hello!"));
    }

    fn loud_chunks(start_ms: u64, count: u64, sample_byte: u8) -> Vec<AudioChunk> {
        (0..count).map(|i| AudioChunk { timestamp_ms: start_ms + i * 20, payload: vec![sample_byte; 160] }).collect()
    }

    /// End-to-end `finalize_bridge` pass against mocked transcriber/classifier/
    /// uploader collaborators: a loud SDR-only recording should produce one
    /// segment, feed it through transcription and classification exactly
    /// once, and upload exactly one recording.
    #[tokio::test]
    async fn finalize_bridge_transcribes_and_classifies_each_segment() {
        use crate::classification::MockClassifier;
        use crate::transcription::MockTranscriber;
        use crate::upload::MockUploader;
        use crate::types::DetectionOutcome;
        use crate::webhook::WebhookDispatcher;

        let mut transcriber = MockTranscriber::new();
        transcriber.expect_transcribe().times(1).returning(|_| "quero saber mais sobre o produto".to_string());

        let mut classifier = MockClassifier::new();
        classifier
            .expect_detect()
            .times(1)
            .returning(|_, _, _| Ok(DetectionOutcome { is_human: true, confidence: 0.8, reason: "affirmative_tone".to_string() }));

        let mut uploader = MockUploader::new();
        uploader.expect_upload_wav().times(1).returning(|_, _| "https://store.example/rec.wav".to_string());

        let state = Arc::new(AppState {
            config: Arc::new(crate::config::Config::default()),
            detection_cache: Arc::new(crate::detection_cache::DetectionCache::new()),
            transcriber: Arc::new(transcriber),
            classifier: Arc::new(classifier),
            tts: Arc::new(crate::tts_stream::TtsStreamClient::new("https://tts.example".to_string())),
            uploader: Arc::new(uploader),
            webhook: Arc::new(WebhookDispatcher::new(crate::config::WebhookConfig { default_url: String::new(), fallback_url: String::new() })),
        });

        let mut session = CallSession::new("SS1".to_string(), "call-1".to_string(), Mode::Bridge, "test".to_string(), StreamOptions::default());
        session.inbound_chunks = loud_chunks(0, 100, 0x00);
        session.announcement_span_secs = 0.0;

        finalize_bridge(session, &state, None, None).await;
    }
}
