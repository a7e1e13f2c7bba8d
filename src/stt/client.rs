use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::messages::{
    ClientMessage, ServerMessage, StreamingConfig, TranscriptEvent, TranscriptKind,
};
use crate::error::AsrError;
use crate::session::CancelHandle;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const REALTIME_ENDPOINT: &str = "wss://api.assemblyai.com/v2/realtime/ws";
const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const TRANSCRIPT_BUFFER: usize = 100;
const ERROR_BUFFER: usize = 10;

/// Duplex conduit to the streaming transcription provider.
///
/// One instance maps to one provider session: the supervisor constructs a
/// fresh client on every reconnection rather than reusing this one. The
/// transcript stream is bounded and never drops; when the buffer fills the
/// internal reader blocks, pushing back on the provider socket.
pub struct StreamingAsrClient {
    api_key: String,
    config: std::sync::Mutex<StreamingConfig>,
    sink: Mutex<Option<WsSink>>,
    closed: Arc<AtomicBool>,
    transcript_tx: std::sync::Mutex<Option<mpsc::Sender<TranscriptEvent>>>,
    transcript_rx: std::sync::Mutex<Option<mpsc::Receiver<TranscriptEvent>>>,
    error_tx: broadcast::Sender<AsrError>,
    error_rx: std::sync::Mutex<Option<broadcast::Receiver<AsrError>>>,
}

impl StreamingAsrClient {
    pub fn new(config: StreamingConfig, api_key: impl Into<String>) -> Self {
        let (transcript_tx, transcript_rx) = mpsc::channel(TRANSCRIPT_BUFFER);
        let (error_tx, error_rx) = broadcast::channel(ERROR_BUFFER);

        Self {
            api_key: api_key.into(),
            config: std::sync::Mutex::new(config),
            sink: Mutex::new(None),
            closed: Arc::new(AtomicBool::new(false)),
            transcript_tx: std::sync::Mutex::new(Some(transcript_tx)),
            transcript_rx: std::sync::Mutex::new(Some(transcript_rx)),
            error_tx,
            error_rx: std::sync::Mutex::new(Some(error_rx)),
        }
    }

    fn endpoint_url(&self) -> String {
        let config = self.current_config();
        let mut url = format!(
            "{}?sample_rate={}&format_turns={}",
            REALTIME_ENDPOINT, config.sample_rate, config.format_turns
        );
        if let Some(encoding) = &config.encoding {
            url.push_str("&encoding=");
            url.push_str(encoding);
        }
        url
    }

    /// Establish the provider WebSocket and spawn the reader task.
    ///
    /// Dials up to 3 times with exponential backoff (1 s initial, doubling).
    /// Cancel-aware: a fired handle aborts the remaining attempts.
    pub async fn connect(&self, cancel: &CancelHandle) -> Result<(), AsrError> {
        {
            let guard = self.sink.lock().await;
            if guard.is_some() {
                return Err(AsrError::AlreadyConnected);
            }
        }

        let url = self.endpoint_url();
        let auth = HeaderValue::from_str(&self.api_key)
            .map_err(|e| AsrError::Transport(format!("invalid API key header: {}", e)))?;

        let mut delay = CONNECT_INITIAL_DELAY;
        let mut last_error = String::new();

        for attempt in 1..=CONNECT_ATTEMPTS {
            if cancel.is_cancelled() {
                return Err(AsrError::ConnectFailed {
                    attempts: attempt - 1,
                    message: "cancelled".to_string(),
                });
            }

            let mut request = url
                .as_str()
                .into_client_request()
                .map_err(|e| AsrError::Transport(format!("invalid ASR URL: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, auth.clone());

            debug!("Connecting to ASR at {} (attempt {})", url, attempt);

            let dial = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(AsrError::ConnectFailed {
                        attempts: attempt,
                        message: "cancelled".to_string(),
                    });
                }
                result = connect_async(request) => result,
            };

            match dial {
                Ok((stream, _response)) => {
                    let (sink, source) = stream.split();
                    {
                        let mut guard = self.sink.lock().await;
                        *guard = Some(sink);
                    }

                    let transcript_tx = self
                        .transcript_tx
                        .lock()
                        .expect("transcript sender lock poisoned")
                        .take()
                        .ok_or(AsrError::AlreadyConnected)?;

                    tokio::spawn(run_reader(
                        source,
                        transcript_tx,
                        self.error_tx.clone(),
                        Arc::clone(&self.closed),
                        cancel.clone(),
                    ));

                    info!("ASR streaming session connected");
                    return Ok(());
                }
                Err(e) => {
                    warn!("ASR connection attempt {} failed: {}", attempt, e);
                    last_error = e.to_string();
                    if attempt < CONNECT_ATTEMPTS {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        Err(AsrError::ConnectFailed {
            attempts: CONNECT_ATTEMPTS,
            message: last_error,
        })
    }

    /// Send one PCM frame, base64-encoded per the wire protocol.
    pub async fn send_audio(&self, frame: &[u8]) -> Result<(), AsrError> {
        self.send_message(&ClientMessage::audio(frame)).await
    }

    /// Ask the provider to close the current turn immediately.
    pub async fn force_endpoint(&self) -> Result<(), AsrError> {
        self.send_message(&ClientMessage::ForceEndpoint).await
    }

    /// Replace the provider-side turn parameters mid-session.
    pub async fn update_config(&self, config: StreamingConfig) -> Result<(), AsrError> {
        self.send_message(&ClientMessage::UpdateConfiguration {
            config: config.clone(),
        })
        .await?;
        *self.config.lock().expect("config lock poisoned") = config;
        Ok(())
    }

    pub fn current_config(&self) -> StreamingConfig {
        self.config.lock().expect("config lock poisoned").clone()
    }

    /// A fresh, unconnected client with this one's config and credentials.
    /// Clients are replaced, never reused, across reconnections.
    pub fn successor(&self) -> Self {
        Self::new(self.current_config(), self.api_key.clone())
    }

    /// The transcript stream: finite, non-restartable. Returns `None` once
    /// taken.
    pub fn transcripts(&self) -> Option<mpsc::Receiver<TranscriptEvent>> {
        self.transcript_rx
            .lock()
            .expect("transcript receiver lock poisoned")
            .take()
    }

    /// The non-fatal error stream: finite, non-restartable. Oldest entries
    /// are dropped on overflow; the consumer observes the drop as a lag.
    pub fn errors(&self) -> Option<broadcast::Receiver<AsrError>> {
        self.error_rx
            .lock()
            .expect("error receiver lock poisoned")
            .take()
    }

    /// Terminate the streaming session. Idempotent; the `SessionTermination`
    /// message is best-effort and its failure never blocks the close.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);

        let sink = {
            let mut guard = self.sink.lock().await;
            guard.take()
        };

        if let Some(mut sink) = sink {
            if let Ok(data) = serde_json::to_string(&ClientMessage::SessionTermination) {
                if let Err(e) = sink.send(Message::Text(data)).await {
                    debug!("Failed to send SessionTermination: {}", e);
                }
            }
            let close_frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            };
            if let Err(e) = sink.send(Message::Close(Some(close_frame))).await {
                debug!("Failed to send close frame: {}", e);
            }
            let _ = sink.close().await;
        }

        // Dropping the unused sender ends the transcript stream for a client
        // that never connected; a connected client's stream ends when its
        // reader exits.
        self.transcript_tx
            .lock()
            .expect("transcript sender lock poisoned")
            .take();
    }

    async fn send_message(&self, msg: &ClientMessage) -> Result<(), AsrError> {
        let data =
            serde_json::to_string(msg).map_err(|e| AsrError::Protocol(e.to_string()))?;

        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(AsrError::NotConnected)?;

        match timeout(SEND_TIMEOUT, sink.send(Message::Text(data))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                let err = AsrError::Transport(format!("failed to send: {}", e));
                self.push_error(err.clone());
                Err(err)
            }
            Err(_) => {
                let err = AsrError::SendTimeout(SEND_TIMEOUT);
                self.push_error(err.clone());
                Err(err)
            }
        }
    }

    fn push_error(&self, err: AsrError) {
        // No receiver left is fine; the session is tearing down.
        let _ = self.error_tx.send(err);
    }
}

/// Single reader task per connection: parses provider messages into typed
/// transcript events. Exits silently on normal closure or `SessionTerminated`;
/// abnormal failures surface on the error channel and the supervisor decides
/// whether to reconnect.
async fn run_reader(
    mut source: WsSource,
    transcripts: mpsc::Sender<TranscriptEvent>,
    errors: broadcast::Sender<AsrError>,
    closed: Arc<AtomicBool>,
    cancel: CancelHandle,
) {
    let mut external_id: Option<String> = None;

    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = source.next() => msg,
        };

        let text = match msg {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(frame))) => {
                debug!("ASR socket closed by server: {:?}", frame);
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(WsError::ConnectionClosed)) | Some(Err(WsError::AlreadyClosed)) | None => {
                if !closed.load(Ordering::SeqCst) {
                    let _ = errors.send(AsrError::ConnectionLost);
                }
                break;
            }
            Some(Err(e)) => {
                if closed.load(Ordering::SeqCst) {
                    // Expected while the supervisor replaces this client.
                    let _ = errors.send(AsrError::ConnectionLost);
                } else {
                    error!("ASR read failed: {}", e);
                    let _ = errors.send(AsrError::Transport(format!("read failed: {}", e)));
                }
                break;
            }
        };

        let parsed: ServerMessage = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                let _ = errors.send(AsrError::Protocol(format!("malformed message: {}", e)));
                continue;
            }
        };

        match parsed {
            ServerMessage::SessionBegins { session_id, .. } => {
                info!("ASR session established, id: {}", session_id);
                external_id = Some(session_id.clone());
                let mut event =
                    TranscriptEvent::new(TranscriptKind::SessionBegins, String::new(), 0.0);
                event.session_id = Some(session_id);
                if transcripts.send(event).await.is_err() {
                    break;
                }
            }
            ServerMessage::Connected => {
                info!("Connected to ASR streaming service");
            }
            ServerMessage::PartialTranscript { text, confidence } => {
                if text.is_empty() {
                    continue;
                }
                let mut event = TranscriptEvent::new(TranscriptKind::Partial, text, confidence);
                event.session_id = external_id.clone();
                if transcripts.send(event).await.is_err() {
                    break;
                }
            }
            ServerMessage::FinalTranscript { text, confidence } => {
                if text.is_empty() {
                    continue;
                }
                let mut event = TranscriptEvent::new(TranscriptKind::Final, text, confidence);
                event.session_id = external_id.clone();
                if transcripts.send(event).await.is_err() {
                    break;
                }
            }
            ServerMessage::Turn {
                text,
                confidence,
                turn_id,
            } => {
                let mut event = TranscriptEvent::new(TranscriptKind::Turn, text, confidence);
                event.session_id = external_id.clone();
                event.turn_id = turn_id;
                if transcripts.send(event).await.is_err() {
                    break;
                }
            }
            ServerMessage::Error {
                error: code,
                message,
            } => {
                warn!("ASR server error: {} (code: {})", message, code);
                let _ = errors.send(AsrError::Server { code, message });
            }
            ServerMessage::SessionTerminated => {
                info!("ASR session terminated by server");
                let event = TranscriptEvent::new(TranscriptKind::SessionEnds, String::new(), 0.0);
                let _ = transcripts.send(event).await;
                break;
            }
            ServerMessage::Unknown => {
                debug!("Unhandled ASR message: {}", text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_carries_audio_parameters() {
        let config = StreamingConfig {
            sample_rate: 16000,
            encoding: Some("pcm_s16le".into()),
            format_turns: true,
            ..Default::default()
        };
        let client = StreamingAsrClient::new(config, "test-key");
        let url = client.endpoint_url();
        assert!(url.starts_with("wss://api.assemblyai.com/v2/realtime/ws?"));
        assert!(url.contains("sample_rate=16000"));
        assert!(url.contains("encoding=pcm_s16le"));
        assert!(url.contains("format_turns=true"));
    }

    #[tokio::test]
    async fn test_send_before_connect_is_rejected() {
        let client = StreamingAsrClient::new(StreamingConfig::default(), "test-key");
        assert!(matches!(
            client.send_audio(&[0u8; 32]).await,
            Err(AsrError::NotConnected)
        ));
        assert!(matches!(
            client.force_endpoint().await,
            Err(AsrError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_streams_are_non_restartable() {
        let client = StreamingAsrClient::new(StreamingConfig::default(), "test-key");
        assert!(client.transcripts().is_some());
        assert!(client.transcripts().is_none());
        assert!(client.errors().is_some());
        assert!(client.errors().is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_ends_streams() {
        let client = StreamingAsrClient::new(StreamingConfig::default(), "test-key");
        let mut transcripts = client.transcripts().unwrap();

        client.close().await;
        client.close().await;

        // The sender side is gone, so the stream terminates.
        assert!(transcripts.recv().await.is_none());
        assert!(matches!(
            client.send_audio(&[0u8; 2]).await,
            Err(AsrError::NotConnected)
        ));
    }
}
