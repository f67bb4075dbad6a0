// src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Inbound text was not JSON, or had no string `type`/`action` field.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// NFC adapter missing or switched off.
    #[error("NFC hardware unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("malformed NDEF record: {0}")]
    MalformedRecord(String),

    #[error("image capture failed: {0}")]
    CaptureFailure(String),

    /// PC/SC transport failure while talking to a reader or card.
    #[error("reader error: {0}")]
    Reader(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<pcsc::Error> for BridgeError {
    fn from(err: pcsc::Error) -> Self {
        BridgeError::Reader(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
