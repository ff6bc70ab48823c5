//! Background poller: periodically execs `status` against the device and
//! fans the result out through the [`TelemetryHub`].
//!
//! Shaped like the teacher's GPS poller (`spawn_gps_poller` in `gps.rs`): a
//! single `tokio::spawn`'d loop returning a `JoinHandle` the caller aborts on
//! shutdown. Unlike the GPS poller's fixed `tokio::time::interval`, the cycle
//! period here is computed from a configurable rate and the loop sleeps only
//! the time left after the exec, so a slow device exec shortens (never
//! doubles up) the next sleep.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::parsers::status::parse_status;
use crate::serial::SerialSession;
use crate::telemetry::TelemetryHub;
use crate::wire::Event;

const EXEC_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_HZ: f64 = 0.5;
const MAX_HZ: f64 = 5.0;

/// Clamp a requested poll rate into `[0.5, 5.0]` Hz.
#[must_use]
pub fn clamp_hz(hz: f64) -> f64 {
    hz.clamp(MIN_HZ, MAX_HZ)
}

/// Spawn the poll loop. Returns a `JoinHandle` for the caller to `.abort()`
/// (or await after cancellation) on shutdown.
pub fn spawn<S>(
    session: Arc<SerialSession<S>>,
    hub: Arc<TelemetryHub>,
    hz: f64,
) -> tokio::task::JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let period = Duration::from_secs_f64(1.0 / clamp_hz(hz));
    tokio::spawn(async move {
        loop {
            let t0 = Instant::now();
            let ts_ms = now_ms();

            match session.exec("status", EXEC_TIMEOUT).await {
                Ok(text) => {
                    let parsed = parse_status(&text);
                    #[allow(clippy::cast_possible_truncation)]
                    let latency_ms = t0.elapsed().as_millis() as i64;
                    debug!(latency_ms, "status poll cycle ok");

                    hub.broadcast(&Event::heartbeat(ts_ms, latency_ms)).await;

                    if hub.changed(&parsed).await {
                        let value = serde_json::to_value(&parsed)
                            .unwrap_or(serde_json::Value::Null);
                        hub.broadcast(&Event::status(ts_ms, latency_ms, value)).await;
                    }
                }
                Err(e) => {
                    #[allow(clippy::cast_possible_truncation)]
                    let latency_ms = t0.elapsed().as_millis() as i64;
                    warn!("status poll cycle failed: {e}");
                    hub.broadcast(&Event::status_error(ts_ms, latency_ms, e.to_string()))
                        .await;
                }
            }

            let elapsed = t0.elapsed();
            let sleep_for = period.saturating_sub(elapsed);
            if !sleep_for.is_zero() {
                tokio::time::sleep(sleep_for).await;
            }
        }
    })
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
    fn hz_clamps_into_supported_range() {
        assert!((clamp_hz(0.1) - MIN_HZ).abs() < f64::EPSILON);
        assert!((clamp_hz(100.0) - MAX_HZ).abs() < f64::EPSILON);
        assert!((clamp_hz(2.0) - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn one_cycle_broadcasts_heartbeat_then_status_on_success() {
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(respond_status_forever(server));

        let session = Arc::new(SerialSession::new(client));
        let hub = Arc::new(TelemetryHub::new());
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Vec<u8>>(16);
        hub.add(tx).await;

        let handle = spawn(session, hub, 5.0);
        // Give the loop one full cycle to run, then stop it.
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        let first = rx.recv().await.expect("heartbeat frame");
        let decoded: serde_json::Value =
            ciborium::de::from_reader(first.as_slice()).expect("decode heartbeat");
        assert_eq!(decoded["name"], "heartbeat");

        let second = rx.recv().await.expect("status frame");
        let decoded: serde_json::Value =
            ciborium::de::from_reader(second.as_slice()).expect("decode status");
        assert_eq!(decoded["name"], "status");
    }

    async fn respond_status_forever(mut io: tokio::io::DuplexStream) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut buf = [0u8; 512];
        loop {
            match io.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if io
                        .write_all(b"Work State: RUN\nmsh >\n")
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }
    }
}
