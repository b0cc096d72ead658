//! JSON WebSocket client for end-to-end signaling tests.
//!
//! Wraps a `tokio-tungstenite` stream. Every frame sent or received is a
//! single JSON object; `expect_type` skips nothing, so tests see events in
//! exactly the order the server wrote them.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// How long a receive waits before failing.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Signaling client speaking JSON text frames.
pub struct WsTestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    timeout: Duration,
}

impl WsTestClient {
    /// Connect to `url` (for example `ws://127.0.0.1:3000/rooms/abc/ws`).
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _response) = connect_async(url)
            .await
            .with_context(|| format!("WebSocket handshake with {url} failed"))?;
        Ok(Self {
            stream,
            timeout: DEFAULT_RECV_TIMEOUT,
        })
    }

    /// Send one JSON frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is closed.
    pub async fn send_json(&mut self, frame: &Value) -> Result<()> {
        self.stream
            .send(Message::Text(frame.to_string()))
            .await
            .context("send failed")
    }

    /// Send a raw text frame, e.g. to exercise malformed input.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is closed.
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .context("send failed")
    }

    /// Receive the next JSON frame, skipping control frames.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, close, or a non-JSON text frame.
    pub async fn recv_json(&mut self) -> Result<Value> {
        loop {
            let frame = tokio::time::timeout(self.timeout, self.stream.next())
                .await
                .map_err(|_| anyhow!("no frame within {:?}", self.timeout))?
                .ok_or_else(|| anyhow!("socket closed"))?
                .context("socket error")?;

            match frame {
                Message::Text(text) => {
                    return serde_json::from_str(&text)
                        .with_context(|| format!("server sent non-JSON text: {text}"));
                }
                Message::Close(_) => bail!("server closed the socket"),
                Message::Binary(_) => bail!("server sent a binary frame"),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    /// Receive the next frame and check its `type`.
    ///
    /// # Errors
    ///
    /// Returns an error if no frame arrives or its type differs.
    pub async fn expect_type(&mut self, event_type: &str) -> Result<Value> {
        let frame = self.recv_json().await?;
        if frame["type"] != event_type {
            bail!("expected {event_type}, got {frame}");
        }
        Ok(frame)
    }

    /// Succeeds when no text frame arrives within `window`.
    ///
    /// Keeps reading for the whole window, so server pings are answered and
    /// do not end the wait early.
    ///
    /// # Errors
    ///
    /// Returns an error if a text frame arrives or the socket closes.
    pub async fn expect_silence(&mut self, window: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, self.stream.next()).await {
                Err(_) => return Ok(()),
                Ok(Some(Ok(Message::Text(text)))) => bail!("expected silence, got {text}"),
                Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                    bail!("server closed the socket")
                }
                Ok(Some(Ok(_))) => {}
                Ok(Some(Err(e))) => return Err(e).context("socket error"),
            }
        }
    }

    /// Close the socket politely.
    ///
    /// # Errors
    ///
    /// Returns an error if the close frame cannot be sent.
    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await.context("close failed")
    }
}
