//! Client socket adapter.
//!
//! Binary audio frames come in untouched; JSON transcript and status frames
//! go out. Outbound frames pass through a bounded channel drained by a
//! writer task that owns the sink, so no session loop ever blocks on a slow
//! client. Write failures are logged and do not by themselves tear down the
//! session; the socket reader observes the failure on its next read.

pub mod messages;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, warn};

pub use messages::{ClientEvent, ErrorType};

const OUTBOUND_BUFFER: usize = 64;

/// A frame queued for the writer task.
#[derive(Debug)]
pub enum OutboundFrame {
    Event(ClientEvent),
    Close,
}

/// Cheaply cloneable handle to one client connection's outbound lane.
#[derive(Clone)]
pub struct ClientSocket {
    tx: mpsc::Sender<OutboundFrame>,
}

impl ClientSocket {
    /// Split an upgraded WebSocket, spawn the writer task, and hand back the
    /// outbound handle plus the raw inbound frame stream.
    pub fn attach(socket: WebSocket) -> (Self, SplitStream<WebSocket>) {
        let (sink, stream) = socket.split();
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        tokio::spawn(write_loop(sink, rx));
        (Self { tx }, stream)
    }

    /// A socket backed by a plain channel instead of a network sink, for
    /// exercising the session machinery in tests.
    pub fn from_channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue one JSON frame for the client. An error here means the writer
    /// task is gone, not that the wire write failed.
    pub async fn send(&self, event: ClientEvent) -> Result<(), ()> {
        self.tx
            .send(OutboundFrame::Event(event))
            .await
            .map_err(|_| ())
    }

    /// Ask the writer to emit a close frame and shut down. Idempotent.
    pub async fn close(&self) {
        let _ = self.tx.send(OutboundFrame::Close).await;
    }
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<OutboundFrame>,
) {
    while let Some(frame) = rx.recv().await {
        match frame {
            OutboundFrame::Event(event) => {
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to encode client frame: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json)).await {
                    warn!("Client socket write failed: {}", e);
                }
            }
            OutboundFrame::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_socket_delivers_events() {
        let (socket, mut rx) = ClientSocket::from_channel(8);
        socket
            .send(ClientEvent::error(ErrorType::Audio, "x"))
            .await
            .unwrap();
        socket.close().await;

        assert!(matches!(
            rx.recv().await,
            Some(OutboundFrame::Event(ClientEvent::Error { .. }))
        ));
        assert!(matches!(rx.recv().await, Some(OutboundFrame::Close)));
    }

    #[tokio::test]
    async fn test_send_after_receiver_drop_reports_failure() {
        let (socket, rx) = ClientSocket::from_channel(1);
        drop(rx);
        assert!(socket
            .send(ClientEvent::error(ErrorType::Stt, "gone"))
            .await
            .is_err());
    }
}
