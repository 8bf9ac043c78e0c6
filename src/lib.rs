//! Speed-to-lead telephony bridge.
//!
//! Pairs a provider media WebSocket (μ-law/G.711, base64-framed JSON) with
//! an LLM realtime voice session, in either a two-party voice-agent mode or
//! a three-party SDR/lead bridge mode with dual-track recording, VAD-based
//! speaker segmentation, and post-call transcription.

pub mod classification;
pub mod codec;
pub mod config;
pub mod detection_cache;
pub mod error;
pub mod media_session;
pub mod server;
pub mod state;
pub mod transcription;
pub mod tts_stream;
pub mod twiml;
pub mod types;
pub mod upload;
pub mod vad;
pub mod webhook;

pub use config::Config;
pub use state::AppState;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
