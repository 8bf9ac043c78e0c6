//! Call flow controller: the HTTP surface and the media-stream WebSocket
//! upgrade. Every handler here either emits a telephony control document or
//! is a provider callback; CORS is permissive on all of them, matching an
//! externally-triggered automation surface with no browser-session auth.

use crate::error::BridgeError;
use crate::media_session;
use crate::state::AppState;
use crate::twiml::{self, Param};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub async fn run(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port).parse()?;

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/", any(incoming_handler))
        .route("/incoming", any(incoming_handler))
        .route("/trigger-call", post(trigger_call_handler))
        .route("/webhook/speed-dial", post(speed_dial_handler))
        .route("/connect-lead", any(connect_lead_handler))
        .route("/verify-sdr", any(verify_sdr_handler))
        .route("/call-status", any(call_status_handler))
        .route("/media-stream", get(media_stream_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state));

    info!("speed-to-lead bridge listening on {addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn media_ws_url(host_hint: &str) -> String {
    format!("wss://{host_hint}/media-stream")
}

fn llm_realtime_url(state: &AppState) -> String {
    let key = state.config.openai.api_key.clone().unwrap_or_default();
    format!("wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview&authorization={key}")
}

async fn media_stream_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let llm_url = llm_realtime_url(&state);
    ws.on_upgrade(move |socket| async move { media_session::run(socket, state, llm_url).await })
}

fn parse_form(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn sanitize_phone(raw: &str) -> String {
    let mut out = String::new();
    for (i, c) in raw.chars().enumerate() {
        if c.is_ascii_digit() || (i == 0 && c == '+') {
            out.push(c);
        }
    }
    out
}

fn generate_call_id() -> String {
    let ms = chrono::Utc::now().timestamp_millis();
    let rand_suffix: u32 = rand::random();
    format!("{ms}-{rand_suffix:08x}")
}

// ─── /trigger-call and /webhook/speed-dial ───

#[derive(Debug, Deserialize)]
pub struct TwilioOverride {
    #[serde(rename = "accountSid")]
    pub account_sid: Option<String>,
    #[serde(rename = "authToken")]
    pub auth_token: Option<String>,
    #[serde(rename = "fromNumber")]
    pub from_number: Option<String>,
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TriggerCallRequest {
    pub lead_name: String,
    pub lead_phone: String,
    pub sdr_phone: String,
    #[serde(default)]
    pub n8n_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub twilio_config: Option<TwilioOverride>,
}

#[derive(Debug, Serialize)]
pub struct TriggerCallResponse {
    pub success: bool,
    pub call_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn trigger_call_handler(State(state): State<Arc<AppState>>, Json(req): Json<TriggerCallRequest>) -> impl IntoResponse {
    handle_trigger(state, req).await
}

#[derive(Debug, Deserialize)]
pub struct SpeedDialRequest {
    pub nome_lead: String,
    pub telefone_lead: String,
    pub telefone_sdr: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub n8n_url: Option<String>,
}

async fn speed_dial_handler(State(state): State<Arc<AppState>>, Json(req): Json<SpeedDialRequest>) -> impl IntoResponse {
    let trigger = TriggerCallRequest {
        lead_name: req.nome_lead,
        lead_phone: req.telefone_lead,
        sdr_phone: req.telefone_sdr,
        n8n_url: req.n8n_url,
        token: req.token,
        lead_id: req.lead_id,
        twilio_config: None,
    };
    handle_trigger(state, trigger).await
}

async fn handle_trigger(state: Arc<AppState>, req: TriggerCallRequest) -> impl IntoResponse {
    let source = "speed_dial_fallback";
    let call_id = generate_call_id();
    let lead_phone = sanitize_phone(&req.lead_phone);
    let sdr_phone = sanitize_phone(&req.sdr_phone);

    let account_sid = req.twilio_config.as_ref().and_then(|t| t.account_sid.clone()).or_else(|| state.config.twilio.account_sid.clone());
    let auth_token = req.twilio_config.as_ref().and_then(|t| t.auth_token.clone()).or_else(|| state.config.twilio.auth_token.clone());
    let from_number = req.twilio_config.as_ref().and_then(|t| t.from_number.clone()).or_else(|| state.config.twilio.from_number.clone());
    let base_url = req
        .twilio_config
        .as_ref()
        .and_then(|t| t.base_url.clone())
        .or_else(|| state.config.twilio.base_url.clone())
        .unwrap_or_else(|| "https://api.twilio.com".to_string());

    let (Some(account_sid), Some(auth_token), Some(from_number)) = (account_sid, auth_token, from_number) else {
        let reason = BridgeError::MissingField("twilio_credentials").to_string();
        let event = media_session::build_fallback_event(source, reason.clone(), None, None, req.token.clone(), req.lead_id.clone(), Some(call_id.clone()));
        state.webhook.dispatch_fallback(&event, req.token.as_deref(), req.n8n_url.as_deref()).await;
        return (axum::http::StatusCode::BAD_REQUEST, Json(TriggerCallResponse { success: false, call_id, sid: None, error: Some(reason) }));
    };

    let connect_lead_url = format!(
        "{base_url}/connect-lead?call_id={call_id}&lead_phone={lead_phone}&lead_name={lead_name}&token={token}&lead_id={lead_id}&n8n_url={n8n_url}",
        lead_name = urlencode(&req.lead_name),
        token = urlencode(req.token.as_deref().unwrap_or_default()),
        lead_id = urlencode(req.lead_id.as_deref().unwrap_or_default()),
        n8n_url = urlencode(req.n8n_url.as_deref().unwrap_or_default()),
    );
    let status_callback_url = format!(
        "{base_url}/call-status?call_id={call_id}&token={}&lead_id={}&n8n_url={}",
        urlencode(req.token.as_deref().unwrap_or_default()),
        urlencode(req.lead_id.as_deref().unwrap_or_default()),
        urlencode(req.n8n_url.as_deref().unwrap_or_default()),
    );

    let client = reqwest::Client::new();
    let create_url = format!("{base_url}/2010-04-01/Accounts/{account_sid}/Calls.json");
    let params = [
        ("To", sdr_phone.as_str()),
        ("From", from_number.as_str()),
        ("Url", connect_lead_url.as_str()),
        ("MachineDetection", "Enable"),
        ("StatusCallback", status_callback_url.as_str()),
        ("StatusCallbackEvent", "completed"),
    ];

    match client.post(&create_url).basic_auth(&account_sid, Some(&auth_token)).form(&params).send().await {
        Ok(resp) if resp.status().is_success() => {
            let sid = resp.json::<serde_json::Value>().await.ok().and_then(|v| v["sid"].as_str().map(str::to_string));
            (axum::http::StatusCode::OK, Json(TriggerCallResponse { success: true, call_id, sid, error: None }))
        }
        Ok(resp) => {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let reason = BridgeError::TwilioApiError(format!("{status} {body}")).to_string();
            warn!("trigger-call: {reason}");
            let event = media_session::build_fallback_event(source, reason.clone(), None, None, req.token.clone(), req.lead_id.clone(), Some(call_id.clone()));
            state.webhook.dispatch_fallback(&event, req.token.as_deref(), req.n8n_url.as_deref()).await;
            (axum::http::StatusCode::OK, Json(TriggerCallResponse { success: false, call_id, sid: None, error: Some(reason) }))
        }
        Err(e) => {
            let reason = BridgeError::from(e).to_string();
            warn!("trigger-call: {reason}");
            let event = media_session::build_fallback_event(source, reason.clone(), None, None, req.token.clone(), req.lead_id.clone(), Some(call_id.clone()));
            state.webhook.dispatch_fallback(&event, req.token.as_deref(), req.n8n_url.as_deref()).await;
            (axum::http::StatusCode::OK, Json(TriggerCallResponse { success: false, call_id, sid: None, error: Some(reason) }))
        }
    }
}

// ─── /connect-lead ───

#[derive(Debug, Deserialize, Default)]
pub struct ConnectLeadQuery {
    pub call_id: Option<String>,
    pub lead_phone: Option<String>,
    pub lead_name: Option<String>,
    pub token: Option<String>,
    pub lead_id: Option<String>,
    pub n8n_url: Option<String>,
    #[serde(rename = "AnsweredBy")]
    pub answered_by: Option<String>,
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
}

async fn connect_lead_handler(State(state): State<Arc<AppState>>, Query(q): Query<ConnectLeadQuery>) -> impl IntoResponse {
    if let Some(answered_by) = &q.answered_by {
        if answered_by.starts_with("machine") || answered_by == "fax" {
            let reason = format!("machine_detection: {answered_by}");
            let event = media_session::build_fallback_event("speed_dial_fallback", reason, None, q.call_sid.clone(), q.token.clone(), q.lead_id.clone(), q.call_id.clone());
            state.webhook.dispatch_fallback(&event, q.token.as_deref(), q.n8n_url.as_deref()).await;
            return axum_xml(twiml::hangup_document());
        }
    }

    let host = state.config.server.host.clone();
    let stream_url = media_ws_url(&host);
    let lead_name = q.lead_name.clone().unwrap_or_default();
    let announcement = format!("Novo lead: {lead_name}");

    let params = vec![
        Param { name: "mode", value: "bridge" },
        Param { name: "call_id", value: q.call_id.as_deref().unwrap_or_default() },
        Param { name: "lead_phone", value: q.lead_phone.as_deref().unwrap_or_default() },
        Param { name: "token", value: q.token.as_deref().unwrap_or_default() },
        Param { name: "lead_id", value: q.lead_id.as_deref().unwrap_or_default() },
        Param { name: "automation_endpoint", value: q.n8n_url.as_deref().unwrap_or_default() },
        Param { name: "source", value: "speed_dial_bridge" },
    ];

    axum_xml(twiml::connect_lead_document(&stream_url, &params, &announcement, "/verify-sdr", "/verify-sdr?speech_result=timeout"))
}

// ─── /verify-sdr ───

#[derive(Debug, Deserialize, Default)]
pub struct VerifySdrQuery {
    pub call_id: Option<String>,
    pub lead_phone: Option<String>,
    pub token: Option<String>,
    pub lead_id: Option<String>,
    pub n8n_url: Option<String>,
    pub speech_result: Option<String>,
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
}

/// `SpeechResult` arrives in the POST body on a normal `<Gather>` callback,
/// but in the query string on the no-speech `<Redirect>` fallthrough (a bare
/// GET with no form body at all).
fn resolve_speech_result(form: &HashMap<String, String>, query_speech_result: Option<&str>) -> String {
    form.get("SpeechResult").cloned().or_else(|| query_speech_result.map(str::to_string)).unwrap_or_default()
}

async fn verify_sdr_handler(State(state): State<Arc<AppState>>, Query(query): Query<VerifySdrQuery>, body: axum::body::Bytes) -> impl IntoResponse {
    let form = parse_form(&body);
    let speech_result = resolve_speech_result(&form, query.speech_result.as_deref());

    let api_key = state.config.openai.api_key.clone().unwrap_or_default();
    let outcome = crate::classification::classify_sdr_first_speech(state.classifier.as_ref(), &speech_result, &api_key).await;

    if let Some(call_sid) = form.get("CallSid").cloned().or_else(|| query.call_sid.clone()) {
        state.detection_cache.insert(
            call_sid,
            crate::types::DetectionRecord {
                call_id: query.call_id.clone().unwrap_or_default(),
                sdr_answered: outcome.is_human,
                reason: outcome.reason.clone(),
                confidence: outcome.confidence,
                first_words: speech_result.clone(),
                created_at: chrono::Utc::now(),
            },
        );
    }

    if outcome.is_human {
        let from_number = state.config.twilio.from_number.clone().unwrap_or_default();
        let lead_phone = query.lead_phone.clone().unwrap_or_default();
        axum_xml(twiml::say_then_dial_document("Conectando com o lead agora", &from_number, &lead_phone))
    } else {
        let reason = BridgeError::SdrNotConfirmed(outcome.reason.clone()).to_string();
        let event = media_session::build_fallback_event("speed_dial_fallback", reason, None, query.call_sid.clone(), query.token.clone(), query.lead_id.clone(), query.call_id.clone());
        state.webhook.dispatch_fallback(&event, query.token.as_deref(), query.n8n_url.as_deref()).await;
        axum_xml(twiml::say_then_hangup_document("Não foi possível confirmar o atendimento. A ligação será encerrada."))
    }
}

// ─── /call-status ───

#[derive(Debug, Deserialize, Default)]
pub struct CallStatusQuery {
    pub call_id: Option<String>,
    pub token: Option<String>,
    pub lead_id: Option<String>,
    pub n8n_url: Option<String>,
}

const TERMINAL_FAILURE_STATUSES: &[&str] = &["busy", "no-answer", "canceled", "failed"];

async fn call_status_handler(State(state): State<Arc<AppState>>, Query(query): Query<CallStatusQuery>, body: axum::body::Bytes) -> impl IntoResponse {
    let form = parse_form(&body);
    let status = form.get("CallStatus").cloned().unwrap_or_default();

    if TERMINAL_FAILURE_STATUSES.contains(&status.as_str()) {
        let sip = form.get("SipResponseCode").cloned();
        let call_sid = form.get("CallSid").cloned();
        let reason = format!("call_status_{status}");
        let event = media_session::build_fallback_event("speed_dial_fallback", reason, sip, call_sid, query.token.clone(), query.lead_id.clone(), query.call_id.clone());
        state.webhook.dispatch_fallback(&event, query.token.as_deref(), query.n8n_url.as_deref()).await;
    }

    axum::http::StatusCode::OK
}

// ─── /incoming and / ───

async fn incoming_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let host = state.config.server.host.clone();
    let stream_url = media_ws_url(&host);
    let params = [Param { name: "mode", value: "agent" }, Param { name: "source", value: "inbound" }];
    axum_xml(twiml::connect_stream_document(&stream_url, &params))
}

fn axum_xml(body: String) -> Response {
    ([(axum::http::header::CONTENT_TYPE, "text/xml")], body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_phone_keeps_digits_and_leading_plus() {
        assert_eq!(sanitize_phone("+55 (11) 99999-8888"), "+5511999998888");
        assert_eq!(sanitize_phone("11 99999-8888"), "11999998888");
    }

    #[test]
    fn call_id_has_timestamp_and_random_suffix() {
        let a = generate_call_id();
        let b = generate_call_id();
        assert!(a.contains('-'));
        assert_ne!(a, b);
    }

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("a b&c"), "a%20b%26c");
    }

    #[test]
    fn resolve_speech_result_prefers_body_over_query() {
        let mut form = HashMap::new();
        form.insert("SpeechResult".to_string(), "sim pode mandar".to_string());
        assert_eq!(resolve_speech_result(&form, Some("timeout")), "sim pode mandar");
    }

    #[test]
    fn resolve_speech_result_falls_back_to_query_on_no_speech_redirect() {
        let form = HashMap::new();
        assert_eq!(resolve_speech_result(&form, Some("timeout")), "timeout");
    }

    #[test]
    fn resolve_speech_result_defaults_to_empty_when_absent_from_both() {
        let form = HashMap::new();
        assert_eq!(resolve_speech_result(&form, None), "");
    }
}
