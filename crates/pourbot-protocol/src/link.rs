//! Text link between the sensing and control nodes.
//!
//! The sessions never speak to a socket directly; they hold a [`Link`] and
//! the transport behind it can be swapped for an in-memory duplex pair in
//! tests. Framing matches the original rig: each payload is written as one
//! small chunk and each receive drains whatever the peer sent, which is
//! sound here because the protocol is strictly alternating and every payload
//! fits well inside one chunk.

use std::time::Duration;

use async_trait::async_trait;
use pourbot_types::DispenserError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

/// Receive buffer size; every protocol payload is far smaller.
const RECV_CHUNK: usize = 1024;

/// A bidirectional text link to the peer node.
#[async_trait]
pub trait Link: Send {
    /// Send one text payload to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`DispenserError::Link`] when the transport fails; link loss
    /// mid-cycle is fatal to the process, recovery belongs to an outer
    /// supervisor.
    async fn send_text(&mut self, payload: &str) -> Result<(), DispenserError>;

    /// Block until the peer's next payload arrives.
    ///
    /// There is no timeout anywhere in the protocol: a peer that never
    /// sends stalls its counterpart indefinitely (documented liveness risk).
    ///
    /// # Errors
    ///
    /// Returns [`DispenserError::Link`] on transport failure or when the
    /// peer closes the connection.
    async fn recv_text(&mut self) -> Result<String, DispenserError>;
}

/// Retry policy for the initial connection, mirroring the original node
/// bootstrap that spins until the peer is listening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectRetry {
    /// Maximum connection attempts, `None` for unbounded.
    pub max_attempts: Option<usize>,
    /// Pause between failed attempts.
    pub backoff: Duration,
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: Duration::from_millis(250),
        }
    }
}

/// [`Link`] over any tokio byte stream.
pub struct StreamLink<S> {
    stream: S,
}

impl<S> StreamLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-connected byte stream.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl StreamLink<TcpStream> {
    /// Connect to the peer at `addr`, retrying per `retry` until the peer
    /// is listening.
    ///
    /// # Errors
    ///
    /// Returns [`DispenserError::Link`] once a bounded retry policy is
    /// exhausted; with the unbounded default this only returns on success.
    pub async fn connect(
        addr: impl ToSocketAddrs + Clone + Send,
        retry: ConnectRetry,
    ) -> Result<Self, DispenserError> {
        let mut attempts = 0usize;
        loop {
            attempts += 1;
            match TcpStream::connect(addr.clone()).await {
                Ok(stream) => {
                    info!(attempts, "connected to peer");
                    return Ok(Self::new(stream));
                }
                Err(e) => {
                    if let Some(max) = retry.max_attempts
                        && attempts >= max
                    {
                        return Err(DispenserError::Link(format!(
                            "peer unreachable after {max} attempts: {e}"
                        )));
                    }
                    debug!(attempts, error = %e, "connect failed; retrying");
                    tokio::time::sleep(retry.backoff).await;
                }
            }
        }
    }

    /// Bind `addr` and accept a single peer connection.
    ///
    /// The protocol is strictly two-node; further connection attempts are
    /// not served.
    ///
    /// # Errors
    ///
    /// Returns [`DispenserError::Link`] when binding or accepting fails.
    pub async fn accept(addr: impl ToSocketAddrs + Send) -> Result<Self, DispenserError> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| DispenserError::Link(format!("bind failed: {e}")))?;
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| DispenserError::Link(format!("accept failed: {e}")))?;
        info!(%peer, "peer connected");
        Ok(Self::new(stream))
    }
}

#[async_trait]
impl<S> Link for StreamLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_text(&mut self, payload: &str) -> Result<(), DispenserError> {
        self.stream
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| DispenserError::Link(format!("send failed: {e}")))?;
        self.stream
            .flush()
            .await
            .map_err(|e| DispenserError::Link(format!("flush failed: {e}")))?;
        debug!(payload, "sent");
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<String, DispenserError> {
        let mut buf = [0u8; RECV_CHUNK];
        let n = self
            .stream
            .read(&mut buf)
            .await
            .map_err(|e| DispenserError::Link(format!("recv failed: {e}")))?;
        if n == 0 {
            warn!("peer closed the connection");
            return Err(DispenserError::Link("peer closed the connection".to_string()));
        }
        let text = String::from_utf8(buf[..n].to_vec())
            .map_err(|e| DispenserError::Link(format!("payload not UTF-8: {e}")))?;
        debug!(payload = %text, "received");
        Ok(text)
    }
}
