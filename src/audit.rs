//! Durable append-only JSONL audit log.
//!
//! Grounded in the teacher's session journal (`sessions/journal.rs`): a
//! bounded `mpsc` channel feeds a single background writer task that batches
//! queued entries before each flush. This gateway additionally calls
//! `sync_data()` every `flush_every` lines, since an audit trail that
//! survives a crash but not a power loss isn't durable enough for a device
//! log that may be read back as evidence of what commands were actually run.
//!
//! Unlike the original Python implementation, this is **not** a process-wide
//! singleton: [`AuditHandle`] is a small cloneable handle that call sites
//! receive as `Option<AuditHandle>` and thread through explicitly. A `None`
//! means auditing didn't start (or failed to); callers log best-effort and
//! never fail a request because auditing is unavailable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::error;

/// Audit sink configuration.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub path: String,
    /// Channel capacity; once full, new events are dropped and counted.
    pub max_queue: usize,
    /// Flush (and fsync) to disk every this many written lines.
    pub flush_every: usize,
}

impl AuditConfig {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            max_queue: 2000,
            flush_every: 1,
        }
    }
}

enum Msg {
    Event(Value),
    Shutdown,
}

struct Inner {
    tx: mpsc::Sender<Msg>,
    dropped: AtomicU64,
    pid: u32,
    join: AsyncMutex<Option<JoinHandle<()>>>,
}

/// Cloneable handle to a running audit sink.
#[derive(Clone)]
pub struct AuditHandle {
    inner: Arc<Inner>,
}

impl AuditHandle {
    /// Open `cfg.path` in append mode and spawn the background writer.
    pub async fn start(cfg: AuditConfig) -> std::io::Result<Self> {
        if let Some(parent) = std::path::Path::new(&cfg.path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cfg.path)
            .await?;

        let (tx, rx) = mpsc::channel(cfg.max_queue.max(1));
        let join = tokio::spawn(writer_task(file, rx, cfg.flush_every.max(1)));

        Ok(Self {
            inner: Arc::new(Inner {
                tx,
                dropped: AtomicU64::new(0),
                pid: std::process::id(),
                join: AsyncMutex::new(Some(join)),
            }),
        })
    }

    /// Enqueue an audit event, best-effort. `ts_ms` and `pid` are filled in
    /// if the caller didn't already set them.
    pub fn log(&self, mut event: Map<String, Value>) {
        event
            .entry("ts_ms")
            .or_insert_with(|| Value::from(now_ms()));
        event.entry("pid").or_insert_with(|| Value::from(self.inner.pid));

        if self
            .inner
            .tx
            .try_send(Msg::Event(Value::Object(event)))
            .is_err()
        {
            let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            let mut drop_event = Map::new();
            drop_event.insert("kind".to_string(), Value::from("audit_drop"));
            drop_event.insert("ts_ms".to_string(), Value::from(now_ms()));
            drop_event.insert("pid".to_string(), Value::from(self.inner.pid));
            drop_event.insert("dropped_total".to_string(), Value::from(dropped));
            let _ = self.inner.tx.try_send(Msg::Event(Value::Object(drop_event)));
        }
    }

    /// Signal shutdown and wait for the writer to drain and fsync.
    ///
    /// Idempotent: only the first caller (across all clones) actually waits
    /// on the writer task; later calls see no join handle left and return
    /// immediately.
    pub async fn stop(&self) {
        let mut guard = self.inner.join.lock().await;
        let Some(handle) = guard.take() else {
            return;
        };
        drop(guard);
        let _ = self.inner.tx.send(Msg::Shutdown).await;
        let _ = handle.await;
    }
}

async fn writer_task(mut file: File, mut rx: mpsc::Receiver<Msg>, flush_every: usize) {
    let mut since_flush = 0usize;
    while let Some(msg) = rx.recv().await {
        match msg {
            Msg::Shutdown => {
                while let Ok(pending) = rx.try_recv() {
                    if let Msg::Event(v) = pending {
                        write_line(&mut file, &v).await;
                    }
                }
                if let Err(e) = file.flush().await {
                    error!("audit flush error on shutdown: {e}");
                }
                if let Err(e) = file.sync_data().await {
                    error!("audit fsync error on shutdown: {e}");
                }
                return;
            }
            Msg::Event(v) => {
                write_line(&mut file, &v).await;
                since_flush += 1;
                if since_flush >= flush_every {
                    if let Err(e) = file.flush().await {
                        error!("audit flush error: {e}");
                    }
                    if let Err(e) = file.sync_data().await {
                        error!("audit fsync error: {e}");
                    }
                    since_flush = 0;
                }
            }
        }
    }
}

async fn write_line(file: &mut File, v: &Value) {
    match serde_json::to_string(v) {
        Ok(mut line) => {
            line.push('\n');
            if let Err(e) = file.write_all(line.as_bytes()).await {
                error!("audit write error: {e}");
            }
        }
        Err(e) => error!("audit serialize error: {e}"),
    }
}

fn now_ms() -> u64 {
    #[allow(clippy::cast_possible_truncation)]
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[tokio::test]
    async fn events_are_durably_written_and_readable_back() {
        let dir = std::env::temp_dir().join(format!("lydia-audit-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("audit.jsonl");

        let handle = AuditHandle::start(AuditConfig::new(path.to_str().unwrap()))
            .await
            .expect("audit starts");

        let mut ev = Map::new();
        ev.insert("kind".to_string(), Value::from("connect"));
        handle.log(ev);

        let mut ev2 = Map::new();
        ev2.insert("kind".to_string(), Value::from("exec"));
        ev2.insert("cmd".to_string(), Value::from("status"));
        handle.log(ev2);

        handle.stop().await;

        let mut contents = String::new();
        std::fs::File::open(&path)
            .expect("audit file exists")
            .read_to_string(&mut contents)
            .expect("read audit file");

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["kind"], "connect");
        assert!(first.get("ts_ms").is_some());
        assert!(first.get("pid").is_some());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn stop_is_idempotent_across_clones() {
        let dir = std::env::temp_dir().join(format!("lydia-audit-test2-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("audit.jsonl");

        let handle = AuditHandle::start(AuditConfig::new(path.to_str().unwrap()))
            .await
            .expect("audit starts");
        let clone = handle.clone();

        handle.stop().await;
        clone.stop().await;

        let _ = std::fs::remove_dir_all(&dir);
    }
}
