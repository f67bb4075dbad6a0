// src/codec.rs
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};
use crate::types::OutgoingMessage;

/// Name of the global hook the web app installs to receive native messages.
pub const DISPATCH_HOOK: &str = "window.__nativeDispatch";

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: String,
    pub payload: Map<String, Value>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Map::new(),
        }
    }
}

impl From<&OutgoingMessage> for Envelope {
    fn from(msg: &OutgoingMessage) -> Self {
        Envelope {
            kind: msg.kind().to_string(),
            payload: msg.payload(),
        }
    }
}

/// Parses inbound text. The discriminator may be `type` or the legacy `action`;
/// `type` wins when both are present.
pub fn decode(raw: &str) -> Result<Envelope> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| BridgeError::MalformedEnvelope(e.to_string()))?;

    let Value::Object(mut object) = value else {
        return Err(BridgeError::MalformedEnvelope("not a JSON object".into()));
    };

    let kind = match object.remove("type").or_else(|| object.remove("action")) {
        Some(Value::String(kind)) => kind,
        Some(_) => {
            return Err(BridgeError::MalformedEnvelope(
                "discriminator is not a string".into(),
            ));
        }
        None => {
            return Err(BridgeError::MalformedEnvelope(
                "missing type/action field".into(),
            ));
        }
    };

    let payload = match object.remove("payload") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(payload)) => payload,
        Some(_) => {
            return Err(BridgeError::MalformedEnvelope(
                "payload is not an object".into(),
            ));
        }
    };

    Ok(Envelope { kind, payload })
}

/// Emits `{"type": kind, "payload": {...}}`.
///
/// The output is also safe to splice into a script: besides the JSON escaping of
/// quotes and backslashes, characters that could close a string literal or a
/// `<script>` block (`'`, `<`, `>`, `&`, U+2028, U+2029) are emitted as `\uXXXX`.
/// Those characters can only occur inside JSON strings, so the result stays valid JSON.
pub fn encode(kind: &str, payload: &Map<String, Value>) -> String {
    let mut object = Map::with_capacity(2);
    object.insert("type".into(), Value::String(kind.to_string()));
    object.insert("payload".into(), Value::Object(payload.clone()));

    let json = Value::Object(object).to_string();
    escape_for_script(&json)
}

pub fn encode_message(msg: &OutgoingMessage) -> String {
    encode(msg.kind(), &msg.payload())
}

/// Wraps an encoded envelope in the expression a script-evaluating host runs.
pub fn dispatch_script(encoded: &str) -> String {
    format!(
        "(function() {{ try {{ const message = {encoded}; {DISPATCH_HOOK}?.(message); }} \
         catch (e) {{ console.error('[Bridge]', e); }} }})();"
    )
}

fn escape_for_script(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        match ch {
            '\'' => out.push_str("\\u0027"),
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(ch),
        }
    }
    out
}
