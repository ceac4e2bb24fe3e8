//! WebSocket transport for the push channel.
//!
//! # Responsibilities
//! - Open the socket within a deadline
//! - Run one writer task (outbound queue → sink) and one reader task (stream → events)
//! - Report every inbound text frame and the final close, in delivery order
//!
//! The transport knows nothing about subscriptions; the provider consumes
//! [`ConnectionEvent`]s and owns all state.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("connect failed: {0}")]
    Transport(#[from] tungstenite::Error),
}

/// Something the reader observed on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Frame(String),
    /// The socket is gone. Emitted once, last.
    Closed(String),
}

/// Open a WebSocket to `url`, bounded by `connect_timeout`.
pub async fn open(url: &str, connect_timeout: Duration) -> Result<WsStream, ConnectError> {
    match tokio::time::timeout(connect_timeout, connect_async(url)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(ConnectError::Transport(e)),
        Err(_) => Err(ConnectError::Timeout(connect_timeout)),
    }
}

/// A live push connection.
///
/// Dropping it stops the reader; the writer finishes once the outbound queue closes.
#[derive(Debug)]
pub struct Connection {
    generation: u64,
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Split `stream` into writer and reader tasks.
    ///
    /// `on_event` runs on the reader task, once per frame and once on close.
    pub fn start<F>(stream: WsStream, generation: u64, on_event: F) -> Self
    where
        F: Fn(ConnectionEvent) + Send + Sync + 'static,
    {
        let (mut sink, mut source) = stream.split();
        let (outbound, mut queue) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            while let Some(message) = queue.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    tracing::debug!(generation, error = %e, "WebSocket write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        on_event(ConnectionEvent::Frame(text.as_str().to_owned()))
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(frame) => format!("closed by server ({}): {}", frame.code, frame.reason.as_str()),
                            None => "closed by server".to_string(),
                        };
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        tracing::debug!(generation, len = bytes.len(), "Ignoring binary frame");
                    }
                    // Ping/pong are answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break format!("transport error: {}", e),
                    None => break "stream ended".to_string(),
                }
            };
            on_event(ConnectionEvent::Closed(reason));
        });

        Self {
            generation,
            outbound,
            reader,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue a text frame. Fails only when the writer has already stopped.
    pub fn send_text(&self, text: String) -> Result<(), String> {
        self.outbound
            .send(Message::text(text))
            .map_err(|_| "writer stopped".to_string())
    }

    /// Send a close frame and stop reading. No close event is emitted afterwards.
    pub fn close(self) {
        let _ = self.outbound.send(Message::Close(None));
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
