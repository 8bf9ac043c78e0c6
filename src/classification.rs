//! Classification client: human-vs-voicemail and real-speech-vs-noise
//! detection, with a fast local short-circuit for common affirmations.
//!
//! The quick-confirmation fast path is load-bearing for SDR-to-lead bridge
//! latency and for robustness under classifier outage; the pattern list is
//! part of the contract and is ported verbatim, case-insensitive, with
//! punctuation stripped before matching.

use crate::types::DetectionOutcome;
use crate::vad::{clean_ring_tone_artifacts, matches_announcement_pattern};
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// Verbatim pattern set of short SDR affirmations/greetings that skip the
/// external chat-LLM call entirely.
const QUICK_CONFIRMATION_PATTERNS: &[&str] = &[
    "ok", "sim", "alo", "pode", "confirmado", "beleza", "manda", "positivo",
];

static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]").unwrap());
static PURE_NOISE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\s\d]*$").unwrap());

fn normalize(text: &str) -> String {
    let stripped = PUNCTUATION.replace_all(text.trim(), "");
    strip_diacritics(&stripped).to_lowercase()
}

fn strip_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

fn quick_confirmation_match(text: &str) -> bool {
    let normalized = normalize(text);
    QUICK_CONFIRMATION_PATTERNS.contains(&normalized.as_str())
}

/// A trait seam over the external chat LLM call, so tests can substitute a
/// stub instead of hitting the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    async fn detect(&self, prompt: &str, text: &str, api_key: &str) -> anyhow::Result<DetectionOutcome>;
}

pub struct ChatClassifier {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl ChatClassifier {
    pub fn new(endpoint: String, model: String) -> Self {
        Self { client: reqwest::Client::new(), endpoint, model }
    }
}

#[async_trait::async_trait]
impl Classifier for ChatClassifier {
    async fn detect(&self, prompt: &str, text: &str, api_key: &str) -> anyhow::Result<DetectionOutcome> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt},
                {"role": "user", "content": text},
            ],
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let value: serde_json::Value = resp.json().await?;
        let content = value["choices"][0]["message"]["content"].as_str().unwrap_or_default();
        parse_detection_json(content)
    }
}

fn parse_detection_json(content: &str) -> anyhow::Result<DetectionOutcome> {
    let start = content.find('{').ok_or_else(|| anyhow::anyhow!("no JSON object in classifier response"))?;
    let end = content.rfind('}').ok_or_else(|| anyhow::anyhow!("no JSON object in classifier response"))?;
    let raw = &content[start..=end];

    #[derive(serde::Deserialize)]
    struct Raw {
        is_human: bool,
        confidence: f64,
        reason: String,
    }
    let parsed: Raw = serde_json::from_str(raw)?;
    Ok(DetectionOutcome { is_human: parsed.is_human, confidence: parsed.confidence, reason: parsed.reason })
}

const SDR_DETECTOR_PROMPT: &str = "You are a strict voicemail detector. Given a transcript of the first \
words spoken after a phone is answered, decide whether a real human answered or this is a voicemail \
greeting. Respond with only a JSON object: {\"is_human\": bool, \"confidence\": number between 0 and 1, \
\"reason\": string}. Default to voicemail when uncertain.";

const LEAD_DETECTOR_PROMPT: &str = "You are a strict voicemail detector for a prospective customer's \
phone line. Given a transcript, decide whether a real human spoke. Respond with only a JSON object: \
{\"is_human\": bool, \"confidence\": number between 0 and 1, \"reason\": string}. Default to voicemail \
when uncertain.";

/// `classifySdrFirstSpeech` — fast path first, external classifier otherwise.
pub async fn classify_sdr_first_speech(classifier: &dyn Classifier, text: &str, api_key: &str) -> DetectionOutcome {
    if quick_confirmation_match(text) {
        return DetectionOutcome { is_human: true, confidence: 0.99, reason: "quick_confirmation_pattern".to_string() };
    }

    match classifier.detect(SDR_DETECTOR_PROMPT, text, api_key).await {
        Ok(outcome) => outcome,
        Err(e) => DetectionOutcome { is_human: false, confidence: 0.0, reason: format!("error: {e}") },
    }
}

/// `classifyLeadSpeech` — pre-checks first, external classifier otherwise.
pub async fn classify_lead_speech(classifier: &dyn Classifier, text: &str, api_key: &str) -> DetectionOutcome {
    if text.trim().is_empty() {
        return DetectionOutcome { is_human: false, confidence: 1.0, reason: "no_transcript".to_string() };
    }

    if matches_announcement_pattern(text) {
        return DetectionOutcome { is_human: false, confidence: 0.95, reason: "only_bianca_messages".to_string() };
    }

    let cleaned = clean_ring_tone_artifacts(text);
    if cleaned.chars().count() < 3 || PURE_NOISE.is_match(&cleaned) {
        return DetectionOutcome { is_human: false, confidence: 0.9, reason: "noise_or_artifacts".to_string() };
    }

    match classifier.detect(LEAD_DETECTOR_PROMPT, text, api_key).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("lead classification failed: {e}");
            DetectionOutcome { is_human: false, confidence: 0.0, reason: format!("error: {e}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysErrClassifier;
    #[async_trait::async_trait]
    impl Classifier for AlwaysErrClassifier {
        async fn detect(&self, _prompt: &str, _text: &str, _api_key: &str) -> anyhow::Result<DetectionOutcome> {
            Err(anyhow::anyhow!("transport down"))
        }
    }

    #[tokio::test]
    async fn quick_confirmation_patterns_skip_the_classifier() {
        let c = AlwaysErrClassifier;
        for phrase in ["Ok.", "SIM!", "alô?", "  Pode  ", "Confirmado!!"] {
            let outcome = classify_sdr_first_speech(&c, phrase, "key").await;
            assert!(outcome.is_human);
            assert_eq!(outcome.reason, "quick_confirmation_pattern");
        }
    }

    #[tokio::test]
    async fn transport_error_defaults_to_voicemail() {
        let c = AlwaysErrClassifier;
        let outcome = classify_sdr_first_speech(&c, "a completely unrecognized sentence", "key").await;
        assert!(!outcome.is_human);
        assert_eq!(outcome.confidence, 0.0);
    }

    #[tokio::test]
    async fn empty_lead_transcript_is_no_transcript() {
        let c = AlwaysErrClassifier;
        let outcome = classify_lead_speech(&c, "", "key").await;
        assert_eq!(outcome.reason, "no_transcript");
        assert!(!outcome.is_human);
    }

    #[tokio::test]
    async fn announcement_only_lead_transcript_is_rejected() {
        let c = AlwaysErrClassifier;
        let outcome = classify_lead_speech(&c, "Novo lead: conectando com o especialista", "key").await;
        assert_eq!(outcome.reason, "only_bianca_messages");
    }

    #[tokio::test]
    async fn ring_tone_only_lead_transcript_is_noise() {
        let c = AlwaysErrClassifier;
        let outcome = classify_lead_speech(&c, "BIIIIING RIIIING", "key").await;
        assert_eq!(outcome.reason, "noise_or_artifacts");
    }
}
