//! Prompt-framed request/response session over the `msh` serial shell.
//!
//! One command executes at a time: [`SerialSession::exec`] takes an async
//! mutex for its whole duration, so concurrent callers queue rather than
//! interleave writes. Fairness between queued callers is whatever
//! `tokio::sync::Mutex` gives for free; this gateway does not add its own
//! FIFO queue on top.
//!
//! Generic over the duplex stream so production code drives a real
//! [`tokio_serial::SerialStream`] and tests drive an in-memory
//! [`tokio::io::DuplexStream`] pipe.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::Instant;

const PROMPT_LINE: &str = "msh >";
const READ_CHUNK: usize = 512;
const IDLE_RETRY: Duration = Duration::from_millis(10);
const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out waiting for msh prompt")]
    Timeout,
}

struct Inner<S> {
    stream: S,
    rx_buf: String,
    bootstrapped: bool,
}

/// A mutex-serialized `msh` prompt session over an async duplex stream.
pub struct SerialSession<S> {
    inner: Mutex<Inner<S>>,
}

impl<S> SerialSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            inner: Mutex::new(Inner {
                stream,
                rx_buf: String::new(),
                bootstrapped: false,
            }),
        }
    }

    /// Run `cmd` against the shell and return the raw text received back,
    /// up to but not including the closing prompt line.
    ///
    /// Bootstraps the session on first use, then resyncs to a fresh prompt
    /// boundary before sending `cmd` so that any stale output from a prior
    /// command (or from power-up banner chatter) never leaks into the result.
    pub async fn exec(&self, cmd: &str, timeout: Duration) -> Result<String, SerialError> {
        let mut guard = self.inner.lock().await;

        guard.bootstrap().await?;

        guard.stream.write_all(b"\n").await?;
        guard.read_until_prompt(timeout).await?;
        guard.rx_buf.clear();

        let line = format!("{}\n", cmd.trim());
        guard.stream.write_all(line.as_bytes()).await?;

        let text = guard.read_until_prompt(timeout).await?;
        guard.rx_buf.clear();
        Ok(text)
    }
}

impl<S> Inner<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn bootstrap(&mut self) -> Result<(), SerialError> {
        if self.bootstrapped {
            return Ok(());
        }
        self.stream.write_all(b"\n").await?;
        let data = self.read_until_prompt(BOOTSTRAP_TIMEOUT).await?;
        self.rx_buf = match data.rsplit_once(PROMPT_LINE) {
            Some((_, tail)) => tail.to_string(),
            None => data,
        };
        self.bootstrapped = true;
        Ok(())
    }

    async fn read_until_prompt(&mut self, timeout: Duration) -> Result<String, SerialError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if contains_prompt(&self.rx_buf) {
                return Ok(self.rx_buf.clone());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SerialError::Timeout);
            }
            match tokio::time::timeout(remaining, self.stream.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    tokio::time::sleep(IDLE_RETRY).await;
                }
                Ok(Ok(n)) => {
                    self.rx_buf
                        .push_str(&String::from_utf8_lossy(&chunk[..n]));
                }
                Ok(Err(e)) => return Err(SerialError::Io(e)),
                Err(_) => return Err(SerialError::Timeout),
            }
        }
    }
}

fn contains_prompt(buf: &str) -> bool {
    buf.lines().any(is_prompt_line)
}

fn is_prompt_line(line: &str) -> bool {
    let Some(rest) = line.trim().strip_prefix("msh") else {
        return false;
    };
    let Some(rest) = rest.trim_start().strip_prefix('>') else {
        return false;
    };
    rest.trim().is_empty()
}

/// Real serial transport, built over [`tokio_serial`].
pub type RealSerialSession = SerialSession<tokio_serial::SerialStream>;

impl SerialSession<tokio_serial::SerialStream> {
    /// Open the device at `path` at `baud` and wrap it in a session.
    pub fn open(path: &str, baud: u32) -> std::io::Result<Self> {
        use tokio_serial::SerialPortBuilderExt;
        let stream = tokio_serial::new(path, baud).open_native_async()?;
        Ok(Self::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::DuplexStream;
    use tokio::sync::Mutex as TokioMutex;

    async fn fake_device(mut io: DuplexStream, log: Arc<TokioMutex<Vec<u8>>>) {
        let mut buf = [0u8; 512];
        loop {
            match io.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    log.lock().await.extend_from_slice(&buf[..n]);
                    if io.write_all(b"msh >\n").await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn exec_sends_expected_write_sequence() {
        let (client, server) = tokio::io::duplex(4096);
        let log = Arc::new(TokioMutex::new(Vec::new()));
        tokio::spawn(fake_device(server, log.clone()));

        let session = SerialSession::new(client);
        let out1 = session
            .exec("first", Duration::from_secs(1))
            .await
            .expect("first exec succeeds");
        let out2 = session
            .exec("second", Duration::from_secs(1))
            .await
            .expect("second exec succeeds");

        assert!(out1.contains("msh >"));
        assert!(out2.contains("msh >"));

        let bytes = log.lock().await.clone();
        assert_eq!(bytes, b"\n\nfirst\n\nsecond\n".to_vec());
    }

    #[tokio::test]
    async fn exec_times_out_when_device_is_silent() {
        let (client, _server) = tokio::io::duplex(64);
        let session = SerialSession::new(client);
        // Skip the (hard-coded 5s) bootstrap wait so this test exercises
        // exec's own timeout path instead.
        session.inner.lock().await.bootstrapped = true;
        let result = session.exec("status", Duration::from_millis(50)).await;
        assert!(matches!(result, Err(SerialError::Timeout)));
    }

    #[test]
    fn prompt_detection_tolerates_surrounding_whitespace() {
        assert!(contains_prompt("garbage\n  msh  >  \nmore"));
        assert!(contains_prompt("msh>"));
        assert!(!contains_prompt("msh > extra"));
        assert!(!contains_prompt("no prompt here"));
    }

    #[test]
    fn bootstrap_keeps_tail_after_last_prompt_occurrence() {
        let data = "banner\nmsh >\nmid\nmsh >\ntail";
        let tail = data.rsplit_once(PROMPT_LINE).map(|(_, t)| t).unwrap_or(data);
        assert_eq!(tail, "\ntail");
    }
}
