//! Byte transport to the relay.
//!
//! Replies are framed by a buffered line reader: bytes are accumulated
//! until a line terminator arrives, and lines are gathered until the last
//! line of a (possibly multi-line) reply. Every operation runs under a
//! deadline and aborts as soon as the cancellation token fires.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Timeouts;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::Reply;

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum reply line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Maximum number of lines in one multi-line reply.
const MAX_REPLY_LINES: usize = 512;

/// Runs `fut` under `limit`, giving up early if `cancel` fires.
async fn guarded<T, F>(
    cancel: &CancellationToken,
    limit: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        outcome = tokio::time::timeout(limit, fut) => match outcome {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout { operation, after: limit }),
        },
    }
}

/// Resolves `host:port` to candidate endpoints (IPv4 and IPv6 alike).
///
/// # Errors
///
/// Returns [`Error::Connect`] if resolution fails or yields nothing,
/// [`Error::Timeout`] or [`Error::Cancelled`] if it does not finish.
pub async fn resolve(
    host: &str,
    port: u16,
    timeouts: Timeouts,
    cancel: &CancellationToken,
) -> Result<Vec<SocketAddr>> {
    let lookup = async {
        tokio::net::lookup_host((host, port))
            .await
            .map(|addrs| addrs.collect::<Vec<_>>())
            .map_err(|e| Error::Connect {
                host: host.to_string(),
                port,
                message: e.to_string(),
            })
    };

    let candidates = guarded(cancel, timeouts.connect, "resolve", lookup).await?;
    if candidates.is_empty() {
        return Err(Error::Connect {
            host: host.to_string(),
            port,
            message: "no addresses resolved".into(),
        });
    }

    debug!(host, port, candidates = candidates.len(), "resolved relay");
    Ok(candidates)
}

/// Blocking-style transport over one stream.
///
/// Owned by a single delivery and never shared.
#[derive(Debug)]
pub struct Transport<S = TcpStream> {
    reader: BufReader<S>,
    timeouts: Timeouts,
    cancel: CancellationToken,
}

impl Transport<TcpStream> {
    /// Resolves the relay and connects to the first candidate that accepts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] carrying the last failure if no candidate
    /// succeeds, or [`Error::Cancelled`] if cancelled meanwhile.
    pub async fn connect(
        host: &str,
        port: u16,
        timeouts: Timeouts,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let candidates = resolve(host, port, timeouts, &cancel).await?;

        let mut last_failure = String::new();
        for addr in candidates {
            let attempt = async { TcpStream::connect(addr).await.map_err(Error::from) };
            match guarded(&cancel, timeouts.connect, "connect", attempt).await {
                Ok(stream) => {
                    info!(%addr, "connected to relay");
                    return Ok(Self::new(stream, timeouts, cancel));
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    debug!(%addr, error = %e, "connection attempt failed");
                    last_failure = e.to_string();
                }
            }
        }

        Err(Error::Connect {
            host: host.to_string(),
            port,
            message: last_failure,
        })
    }
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already established stream.
    pub fn new(stream: S, timeouts: Timeouts, cancel: CancellationToken) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            timeouts,
            cancel,
        }
    }

    /// Writes `data` and returns how many bytes the peer accepted.
    ///
    /// Keeps writing until everything is accepted or the peer stops taking
    /// bytes; a short count is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails, stalls or is cancelled.
    pub async fn send(&mut self, data: &[u8]) -> Result<usize> {
        let Self {
            reader,
            timeouts,
            cancel,
        } = self;
        let stream = reader.get_mut();

        let write = async {
            let mut written = 0;
            while written < data.len() {
                let n = stream.write(&data[written..]).await?;
                if n == 0 {
                    break;
                }
                written += n;
            }
            stream.flush().await?;
            Ok::<_, Error>(written)
        };

        guarded(cancel, timeouts.io, "send", write).await
    }

    /// Reads one complete reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] on EOF before any reply line,
    /// [`Error::MalformedReply`] if the reply cannot be framed, and
    /// [`Error::Timeout`] or [`Error::Cancelled`] if it does not arrive.
    pub async fn receive(&mut self) -> Result<Reply> {
        let Self {
            reader,
            timeouts,
            cancel,
        } = self;

        let read = async {
            let mut lines = Vec::new();
            loop {
                let line = read_line(reader).await?;
                if line.is_empty() {
                    continue;
                }

                let is_last = is_last_reply_line(&line);
                lines.push(line);

                if is_last {
                    break;
                }
                if lines.len() >= MAX_REPLY_LINES {
                    return Err(Error::MalformedReply(format!(
                        "reply longer than {MAX_REPLY_LINES} lines"
                    )));
                }
            }
            parse_reply(lines)
        };

        guarded(cancel, timeouts.io, "receive", read).await
    }

    /// Shuts the stream down. Failures are logged and otherwise ignored.
    pub async fn close(&mut self) {
        if let Err(e) = self.reader.get_mut().shutdown().await {
            debug!(error = %e, "shutdown failed");
        }
    }
}

/// Reads a single line, terminator stripped.
///
/// A final line without terminator is returned as-is when the peer closes.
async fn read_line<S>(reader: &mut BufReader<S>) -> Result<String>
where
    S: AsyncRead + Unpin,
{
    let mut line = Vec::new();

    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            if line.is_empty() {
                return Err(Error::ConnectionClosed);
            }
            break;
        }

        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&buf[..=pos]);
            reader.consume(pos + 1);
            break;
        }

        let len = buf.len();
        line.extend_from_slice(buf);
        reader.consume(len);

        if line.len() > MAX_LINE_LENGTH {
            return Err(Error::MalformedReply(format!(
                "reply line longer than {MAX_LINE_LENGTH} bytes"
            )));
        }
    }

    let text = String::from_utf8_lossy(&line);
    Ok(text.trim_end_matches(['\r', '\n']).to_string())
}
