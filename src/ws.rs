//! Per-connection client handler: the WebSocket transport clients use to
//! exec commands and receive telemetry.
//!
//! Shaped like the teacher's `ws::handle_ws`: split sink/stream, an mpsc
//! channel funneling outgoing frames through a dedicated send task, and a
//! loop over incoming frames. Unlike the teacher, there's no second
//! `tokio::select!` arm for a broadcast channel — telemetry pushed by the
//! [`crate::telemetry::TelemetryHub`] lands on this same outgoing mpsc
//! channel (registered via [`TelemetryHub::add`](crate::telemetry::TelemetryHub::add)),
//! so the send task alone drains both exec replies and hub broadcasts.
//! Frames here are binary CBOR (see [`crate::wire`]) rather than JSON text.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::parsers::{getall, process, status};
use crate::policy;
use crate::state::AppState;
use crate::wire::{self, Ack, ClientMsg, ErrorMsg, Event, ExecResult};

const EXEC_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
const OUTBOUND_CAPACITY: usize = 64;

/// `GET /ws` — upgrade to the client WebSocket transport.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_client(socket, state))
}

async fn handle_client(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(OUTBOUND_CAPACITY);

    let sub_id = state.hub.add(tx.clone()).await;
    audit(&state, "connect", Map::new());

    send_initial_getall(&state, &tx).await;

    let send_task = tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if sink.send(Message::Binary(bytes.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        match stream.next().await {
            Some(Ok(Message::Binary(bytes))) => {
                handle_frame(&state, &tx, &bytes).await;
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {
                // Text/Ping/Pong frames carry no protocol meaning here.
            }
            Some(Err(e)) => {
                debug!("client socket error: {e}");
                break;
            }
        }
    }

    state.hub.remove(sub_id).await;
    audit(&state, "disconnect", Map::new());
    send_task.abort();
}

async fn send_initial_getall(state: &AppState, tx: &mpsc::Sender<Vec<u8>>) {
    let ts_ms = now_ms();
    match state.session.exec("getall", EXEC_TIMEOUT).await {
        Ok(text) => {
            let parsed = getall::parse_getall(&text);
            let value = serde_json::to_value(&parsed).unwrap_or(Value::Null);
            send(tx, &Event::getall(ts_ms, value)).await;
        }
        Err(e) => {
            warn!("initial getall failed: {e}");
            send(tx, &Event::getall_error(ts_ms, e.to_string())).await;
        }
    }
}

async fn handle_frame(state: &AppState, tx: &mpsc::Sender<Vec<u8>>, bytes: &[u8]) {
    let msg = match wire::decode_client_msg(bytes) {
        Ok(m) => m,
        Err(e) => {
            debug!("bad client frame: {e}");
            send(tx, &ErrorMsg::unknown_type("malformed")).await;
            return;
        }
    };

    match msg {
        ClientMsg::Subscribe => {
            send(tx, &Ack::subscribe()).await;
        }
        ClientMsg::Exec { id, cmd } => {
            handle_exec(state, tx, id, cmd).await;
        }
    }
}

async fn handle_exec(state: &AppState, tx: &mpsc::Sender<Vec<u8>>, id: Value, cmd: String) {
    let (allowed, reason) = policy::is_allowed(&cmd);

    let mut audit_fields = Map::new();
    audit_fields.insert("cmd".to_string(), Value::from(cmd.clone()));
    audit_fields.insert("allowed".to_string(), Value::from(allowed));
    audit_fields.insert("reason".to_string(), Value::from(reason.clone()));
    audit(state, "exec", audit_fields);

    if !allowed {
        send(tx, &ExecResult::rejected(id, now_ms(), reason)).await;
        return;
    }

    let verb = policy::normalize_verb(&cmd);
    let t0 = tokio::time::Instant::now();
    match state.session.exec(&cmd, EXEC_TIMEOUT).await {
        Ok(text) => {
            #[allow(clippy::cast_possible_truncation)]
            let latency_ms = t0.elapsed().as_millis() as i64;
            let parsed = parse_for_verb(&verb, &text);
            send(
                tx,
                &ExecResult::ok(id, now_ms(), latency_ms, text, parsed),
            )
            .await;
        }
        Err(e) => {
            send(tx, &ExecResult::failed(id, now_ms(), e.to_string())).await;
        }
    }
}

/// Parse `text` with whichever telemetry parser matches `verb`, or `None`
/// for any other command — the reply still carries raw `stdout` in that case.
fn parse_for_verb(verb: &str, text: &str) -> Option<Value> {
    match verb {
        "status" => serde_json::to_value(status::parse_status(text)).ok(),
        "cur_pro" | "feeder_pro" => serde_json::to_value(process::parse_process(text)).ok(),
        "getall" => serde_json::to_value(getall::parse_getall(text)).ok(),
        _ => None,
    }
}

async fn send<T: serde::Serialize>(tx: &mpsc::Sender<Vec<u8>>, msg: &T) {
    match wire::encode(msg) {
        Ok(bytes) => {
            let _ = tx.send(bytes).await;
        }
        Err(e) => warn!("wire encode failed: {e}"),
    }
}

fn audit(state: &AppState, kind: &'static str, mut fields: Map<String, Value>) {
    let Some(handle) = state.audit.as_ref() else {
        return;
    };
    fields.insert("kind".to_string(), Value::from(kind));
    handle.log(fields);
}

#[allow(clippy::cast_possible_truncation)]
fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_verb_gets_status_parser() {
        let parsed = parse_for_verb("status", "Work State: RUN\nmsh >");
        let v = parsed.expect("status produces a parsed value");
        assert_eq!(v["work_state"], "RUN");
    }

    #[test]
    fn getall_verb_gets_getall_parser() {
        let parsed = parse_for_verb("getall", ".SN: 6832CEC4\nmsh >");
        let v = parsed.expect("getall produces a parsed value");
        assert_eq!(v["sn"]["raw"], "6832CEC4");
    }

    #[test]
    fn unrecognized_verb_yields_no_parsed_value() {
        assert!(parse_for_verb("version", "v1.2.3\nmsh >").is_none());
    }
}
