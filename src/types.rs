// src/types.rs
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

// Inbound kinds (surface -> native)
pub const KIND_APP_READY: &str = "APP_READY";
pub const KIND_START_NFC_SCAN: &str = "START_NFC_SCAN";
pub const KIND_STOP_NFC_SCAN: &str = "STOP_NFC_SCAN";
pub const KIND_OPEN_CAMERA: &str = "OPEN_CAMERA";

// Outbound kinds (native -> surface)
pub const KIND_BRIDGE_READY: &str = "BRIDGE_READY";
pub const KIND_NFC_READY: &str = "NFC_READY";
pub const KIND_NFC_TAG_DETECTED: &str = "NFC_TAG_DETECTED";
pub const KIND_NFC_ERROR: &str = "NFC_ERROR";
pub const KIND_CAMERA_RESULT: &str = "CAMERA_RESULT";
pub const KIND_CAMERA_ERROR: &str = "CAMERA_ERROR";

pub const HANDOVER_TOKEN_PARAM: &str = "__clerk_handover_token";
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

// User-facing messages shown by the web app as-is
pub const NFC_UNAVAILABLE_MESSAGE: &str = "NFC niedostępne lub wyłączone na tym urządzeniu.";
pub const CAMERA_NO_IMAGE_MESSAGE: &str = "Nie zrobiono zdjęcia.";
pub const CAMERA_PROCESSING_MESSAGE: &str = "Błąd przetwarzania zdjęcia.";

// Last ATR byte as lowercase hex; every other card is read as NTAG
pub const CARD_TYPE_MIFARE_1K: &str = "6a"; // MIFARE Classic 1K

/// Actions the surface may request. Anything else lands in `Unrecognized`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AppReady,
    StartNfcScan,
    StopNfcScan,
    OpenCamera,
    Unrecognized(String),
}

impl Action {
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            KIND_APP_READY => Action::AppReady,
            KIND_START_NFC_SCAN => Action::StartNfcScan,
            KIND_STOP_NFC_SCAN => Action::StopNfcScan,
            KIND_OPEN_CAMERA => Action::OpenCamera,
            other => Action::Unrecognized(other.to_string()),
        }
    }
}

// Messages sent TO the content surface
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingMessage {
    BridgeReady { timestamp: i64 },
    NfcReady,
    NfcTagDetected { id: String, content: String },
    NfcError { message: String },
    CameraResult { image: String },
    CameraError { message: String },
}

impl OutgoingMessage {
    pub fn bridge_ready() -> Self {
        OutgoingMessage::BridgeReady {
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutgoingMessage::BridgeReady { .. } => KIND_BRIDGE_READY,
            OutgoingMessage::NfcReady => KIND_NFC_READY,
            OutgoingMessage::NfcTagDetected { .. } => KIND_NFC_TAG_DETECTED,
            OutgoingMessage::NfcError { .. } => KIND_NFC_ERROR,
            OutgoingMessage::CameraResult { .. } => KIND_CAMERA_RESULT,
            OutgoingMessage::CameraError { .. } => KIND_CAMERA_ERROR,
        }
    }

    pub fn payload(&self) -> Map<String, Value> {
        let value = match self {
            OutgoingMessage::BridgeReady { timestamp } => {
                json!({ "status": "connected", "timestamp": timestamp })
            }
            OutgoingMessage::NfcReady => json!({}),
            OutgoingMessage::NfcTagDetected { id, content } => {
                json!({ "id": id, "content": content })
            }
            OutgoingMessage::NfcError { message } | OutgoingMessage::CameraError { message } => {
                json!({ "message": message })
            }
            OutgoingMessage::CameraResult { image } => json!({ "image": image }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// A tag read during an armed scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: Vec<u8>,
    /// `None` when the tag carried no decodable NDEF record. `Some("")` is a real, empty text.
    pub text: Option<String>,
    pub discovered_at: DateTime<Utc>,
}

impl Tag {
    pub fn hex_id(&self) -> String {
        hex::encode_upper(&self.id)
    }

    pub fn into_message(self) -> OutgoingMessage {
        let id = self.hex_id();
        let content = self.text.unwrap_or_else(|| id.clone());
        OutgoingMessage::NfcTagDetected { id, content }
    }
}
