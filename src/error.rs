//! Typed errors for call sites that branch on error kind.
//!
//! Most of the crate propagates `anyhow::Result` across handler boundaries
//! (see `config.rs`, `server.rs`); these variants exist only where a caller
//! needs to match on *which* thing failed rather than just logging it.

use thiserror::Error;

/// Error kinds whose `Display` text is dispatched verbatim as a fallback
/// event's `error_reason`, so the message format is the wire contract, not
/// just a log line.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("twilio_api_error: {0}")]
    TwilioApiError(String),

    #[error("sdr_not_confirmed: {0}")]
    SdrNotConfirmed(String),

    #[error("twilio_api_error: {0}")]
    Upstream(#[from] reqwest::Error),
}
