//! Subscriber fan-out and change detection for polled `status` telemetry.
//!
//! Every WebSocket connection registers an `mpsc::Sender<Vec<u8>>` sink with
//! the hub (already-encoded CBOR frames, so the hub never needs to know the
//! message shape). [`TelemetryHub::broadcast`] fans one frame out to every
//! registered sink and evicts any sink whose receiver has gone away — the
//! same pattern the teacher's WS layer uses for its `session_events`
//! broadcast, adapted from a `tokio::sync::broadcast` channel to an explicit
//! sink list since frames here are pre-encoded bytes, not a `Clone` value.
//!
//! This gateway does not build a FIFO dispatch queue on top of the sink list;
//! `Mutex`'s own fairness among already-waiting lock acquisitions is enough.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::parsers::status::ParsedStatus;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Vec<u8>>,
}

/// The exact field subset a debounce cycle watches for changes. Built from
/// the current [`ParsedStatus`] by reference so no field is ever copied
/// unless a broadcast actually needs it encoded.
#[derive(Serialize)]
struct Fingerprint<'a> {
    work_state: &'a Option<String>,
    work_mode: &'a Option<String>,
    laser_state: &'a Option<String>,
    power_out: &'a Option<crate::parsers::status::PowerOut>,
    warning: &'a Option<crate::parsers::status::MaskField>,
    error: &'a Option<crate::parsers::status::MaskField>,
    lock: &'a Option<crate::parsers::status::MaskField>,
    io_flags: &'a indexmap::IndexMap<String, i64>,
    env: &'a Option<crate::parsers::status::EnvSummary>,
    pressure: &'a Option<crate::parsers::status::AdcScalar>,
    tem: &'a Option<i64>,
}

/// Registry of live WebSocket subscribers plus the last broadcast
/// fingerprint, used to decide whether a `status` event is worth sending.
pub struct TelemetryHub {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    last_fingerprint: Mutex<Option<Vec<u8>>>,
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryHub {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            last_fingerprint: Mutex::new(None),
        }
    }

    /// Register a new subscriber sink and return its id, used later to
    /// [`remove`](Self::remove) it on disconnect.
    pub async fn add(&self, tx: mpsc::Sender<Vec<u8>>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().await.push(Subscriber { id, tx });
        id
    }

    /// Deregister a subscriber by id. A no-op if it's already gone.
    pub async fn remove(&self, id: u64) {
        self.subscribers.lock().await.retain(|s| s.id != id);
    }

    #[must_use]
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Encode `msg` once and push it to every live subscriber, dropping any
    /// whose receiving end has gone away.
    pub async fn broadcast<T: Serialize>(&self, msg: &T) {
        let bytes = match crate::wire::encode(msg) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("telemetry broadcast encode failed: {e}");
                return;
            }
        };

        let mut subs = self.subscribers.lock().await;
        let mut dead = Vec::new();
        for sub in subs.iter() {
            if sub.tx.send(bytes.clone()).await.is_err() {
                dead.push(sub.id);
            }
        }
        if !dead.is_empty() {
            subs.retain(|s| !dead.contains(&s.id));
            debug!(count = dead.len(), "evicted dead telemetry subscribers");
        }
    }

    /// Whether `parsed`'s debounce-relevant fields differ from the last call
    /// that returned `true` (or this is the first call ever). The fingerprint
    /// is the canonical CBOR-adjacent JSON encoding of [`Fingerprint`]: this
    /// crate's `serde_json` has no `preserve_order` feature, so
    /// `serde_json::Value`'s object variant is backed by a `BTreeMap` and
    /// `to_vec` on it always emits keys in sorted order, at every nesting
    /// level, with no manual sorting.
    pub async fn changed(&self, parsed: &ParsedStatus) -> bool {
        let fp = Fingerprint {
            work_state: &parsed.work_state,
            work_mode: &parsed.work_mode,
            laser_state: &parsed.laser_state,
            power_out: &parsed.power_out,
            warning: &parsed.warning,
            error: &parsed.error,
            lock: &parsed.lock,
            io_flags: &parsed.io_flags,
            env: &parsed.env,
            pressure: &parsed.pressure,
            tem: &parsed.tem,
        };
        let value = match serde_json::to_value(&fp) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("telemetry fingerprint encode failed: {e}");
                return true;
            }
        };
        let bytes = canonical_bytes(&value);

        let mut last = self.last_fingerprint.lock().await;
        if last.as_ref() == Some(&bytes) {
            false
        } else {
            *last = Some(bytes);
            true
        }
    }
}

fn canonical_bytes(v: &Value) -> Vec<u8> {
    serde_json::to_vec(v).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::status::ParsedStatus;

    #[tokio::test]
    async fn broadcast_evicts_dead_subscriber_and_keeps_live_one() {
        let hub = TelemetryHub::new();

        let (good_tx, mut good_rx) = mpsc::channel::<Vec<u8>>(8);
        let (dead_tx, dead_rx) = mpsc::channel::<Vec<u8>>(8);
        drop(dead_rx); // receiver gone before the send happens

        let good_id = hub.add(good_tx).await;
        let dead_id = hub.add(dead_tx).await;
        assert_eq!(hub.subscriber_count().await, 2);

        hub.broadcast(&crate::wire::Event::heartbeat(1, 2)).await;

        assert_eq!(hub.subscriber_count().await, 1);
        let received = good_rx.recv().await.expect("good subscriber got a frame");
        assert!(!received.is_empty());

        hub.remove(good_id).await;
        hub.remove(dead_id).await;
        assert_eq!(hub.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn changed_is_true_on_first_call_and_false_when_unchanged() {
        let hub = TelemetryHub::new();
        let parsed = ParsedStatus {
            work_state: Some("RUN".to_string()),
            ..Default::default()
        };

        assert!(hub.changed(&parsed).await);
        assert!(!hub.changed(&parsed).await);
    }

    #[tokio::test]
    async fn changed_is_true_again_once_a_watched_field_differs() {
        let hub = TelemetryHub::new();
        let mut parsed = ParsedStatus {
            work_state: Some("RUN".to_string()),
            ..Default::default()
        };
        assert!(hub.changed(&parsed).await);

        parsed.work_state = Some("STOP".to_string());
        assert!(hub.changed(&parsed).await);
    }

    #[tokio::test]
    async fn changed_ignores_fields_outside_the_watched_subset() {
        let hub = TelemetryHub::new();
        let mut parsed = ParsedStatus {
            work_state: Some("RUN".to_string()),
            ..Default::default()
        };
        assert!(hub.changed(&parsed).await);

        // rtc_time is not in the fingerprint subset.
        parsed.rtc_time = Some("12:00:00".to_string());
        assert!(!hub.changed(&parsed).await);
    }
}
