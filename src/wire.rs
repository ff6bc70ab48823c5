//! Client/server message shapes and CBOR framing.
//!
//! Every logical message is one binary frame: a self-describing map encoded
//! with `ciborium`, carried over a WebSocket binary frame. CBOR round-trips
//! the same dynamically-shaped maps JSON would without committing to a text
//! encoding, and is a format this codebase already reaches for elsewhere.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("cbor encode error: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),
    #[error("cbor decode error: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
}

/// One server → client `event` frame.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'static str,
    pub ts_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Event {
    #[must_use]
    pub fn heartbeat(ts_ms: i64, latency_ms: i64) -> Self {
        Self {
            kind: "event",
            name: "heartbeat",
            ts_ms,
            latency_ms: Some(latency_ms),
            parsed: None,
            error: None,
        }
    }

    #[must_use]
    pub fn status(ts_ms: i64, latency_ms: i64, parsed: Value) -> Self {
        Self {
            kind: "event",
            name: "status",
            ts_ms,
            latency_ms: Some(latency_ms),
            parsed: Some(parsed),
            error: None,
        }
    }

    #[must_use]
    pub fn status_error(ts_ms: i64, latency_ms: i64, error: String) -> Self {
        Self {
            kind: "event",
            name: "status_error",
            ts_ms,
            latency_ms: Some(latency_ms),
            parsed: None,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn getall(ts_ms: i64, parsed: Value) -> Self {
        Self {
            kind: "event",
            name: "getall",
            ts_ms,
            latency_ms: None,
            parsed: Some(parsed),
            error: None,
        }
    }

    #[must_use]
    pub fn getall_error(ts_ms: i64, error: String) -> Self {
        Self {
            kind: "event",
            name: "getall_error",
            ts_ms,
            latency_ms: None,
            parsed: None,
            error: Some(error),
        }
    }
}

/// `{type:"ack", op:"subscribe"}` — the only ack this gateway emits.
#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub op: &'static str,
}

impl Ack {
    #[must_use]
    pub fn subscribe() -> Self {
        Self {
            kind: "ack",
            op: "subscribe",
        }
    }
}

/// Reply to a client `exec` request.
#[derive(Debug, Clone, Serialize)]
pub struct ExecResult {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: Value,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<i64>,
    pub ts_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ExecResult {
    #[must_use]
    pub fn rejected(id: Value, ts_ms: i64, reason: String) -> Self {
        Self {
            kind: "result",
            id,
            ok: false,
            stdout: None,
            parsed: None,
            latency_ms: None,
            ts_ms,
            error: Some("Command not allowed by policy".to_string()),
            reason: Some(reason),
        }
    }

    #[must_use]
    pub fn ok(id: Value, ts_ms: i64, latency_ms: i64, stdout: String, parsed: Option<Value>) -> Self {
        Self {
            kind: "result",
            id,
            ok: true,
            stdout: Some(stdout),
            parsed,
            latency_ms: Some(latency_ms),
            ts_ms,
            error: None,
            reason: None,
        }
    }

    #[must_use]
    pub fn failed(id: Value, ts_ms: i64, error: String) -> Self {
        Self {
            kind: "result",
            id,
            ok: false,
            stdout: None,
            parsed: None,
            latency_ms: None,
            ts_ms,
            error: Some(error),
            reason: None,
        }
    }
}

/// `{type:"error", error}` — reply to an unrecognized message type.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMsg {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub error: String,
}

impl ErrorMsg {
    #[must_use]
    pub fn unknown_type(t: &str) -> Self {
        Self {
            kind: "error",
            error: format!("Unknown message type: {t}"),
        }
    }
}

/// Client → server frames.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMsg {
    Exec { id: Value, cmd: String },
    Subscribe,
}

/// Encode any server → client message to its CBOR wire form.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(msg, &mut buf)?;
    Ok(buf)
}

/// Decode a client → server frame from its CBOR wire form.
pub fn decode_client_msg(bytes: &[u8]) -> Result<ClientMsg, WireError> {
    ciborium::de::from_reader(bytes).map_err(WireError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_message_round_trips() {
        let msg = ClientMsg::Exec {
            id: Value::from(7),
            cmd: "status".to_string(),
        };
        let bytes = encode(&msg).expect("encode");
        let decoded = decode_client_msg(&bytes).expect("decode");
        match decoded {
            ClientMsg::Exec { id, cmd } => {
                assert_eq!(id, Value::from(7));
                assert_eq!(cmd, "status");
            }
            ClientMsg::Subscribe => panic!("expected Exec"),
        }
    }

    #[test]
    fn subscribe_message_round_trips() {
        let bytes = encode(&ClientMsg::Subscribe).expect("encode");
        let decoded = decode_client_msg(&bytes).expect("decode");
        assert!(matches!(decoded, ClientMsg::Subscribe));
    }

    #[test]
    fn event_encodes_without_error() {
        let bytes = encode(&Event::heartbeat(1, 2)).expect("encode heartbeat");
        assert!(!bytes.is_empty());
    }
}
