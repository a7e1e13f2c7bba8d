use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitStream;
use futures::StreamExt;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use super::record::{CancelHandle, SessionRecord, SessionStatus};
use super::utterance::{
    BoundaryCause, SilenceTick, UtteranceTracker, MAX_SILENCE_TICKS, SILENCE_CHECK_INTERVAL,
};
use crate::audio::VoiceActivityDetector;
use crate::downstream::UtteranceSink;
use crate::error::AsrError;
use crate::stt::{StreamingAsrClient, TranscriptEvent, TranscriptKind};
use crate::ws::{ClientEvent, ClientSocket, ErrorType};

/// Reconnect rounds allowed per utterance before the session terminates.
const MAX_RECONNECT_ROUNDS: u32 = 3;
/// Pause before each reconnect round.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
/// Grace period after closing the old client, so in-flight finals drain.
const DRAIN_WAIT: Duration = Duration::from_millis(500);
/// Connect calls per reconnect round.
const RECONNECT_CONNECT_TRIES: u32 = 3;
const RECONNECT_CONNECT_DELAY: Duration = Duration::from_millis(500);

/// Per-session state machine.
///
/// Runs three cooperating loops sharing the session record: the socket
/// reader (this task), the ASR reader, and the 100 ms silence ticker. All of
/// them stop when the session's cancel handle fires. The ASR session is kept
/// alive across utterance boundaries; reconnection is strictly an error
/// recovery path.
pub struct Supervisor {
    session: Arc<SessionRecord>,
    socket: ClientSocket,
    sink: Arc<dyn UtteranceSink>,
    cancel: CancelHandle,
    tracker: Arc<StdMutex<UtteranceTracker>>,
}

impl Supervisor {
    pub fn new(
        session: Arc<SessionRecord>,
        socket: ClientSocket,
        sink: Arc<dyn UtteranceSink>,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            session,
            socket,
            sink,
            cancel,
            tracker: Arc::new(StdMutex::new(UtteranceTracker::new())),
        }
    }

    /// Drive the session until the client disconnects, the ASR is
    /// unrecoverable, or the session is closed.
    pub async fn run(self, mut frames: SplitStream<WebSocket>) {
        let asr = { self.session.lock().await.asr.clone() };

        if let Err(e) = asr.connect(&self.cancel).await {
            error!(
                "Failed to connect streaming ASR for session {}: {}",
                self.session.id, e
            );
            let _ = self
                .socket
                .send(ClientEvent::error(ErrorType::Stt, e.to_string()))
                .await;
            self.terminate().await;
            return;
        }
        info!("Streaming ASR connected for session: {}", self.session.id);

        self.spawn_asr_reader(&asr);
        self.spawn_silence_ticker();

        let mut vad = VoiceActivityDetector::default();

        loop {
            let msg = tokio::select! {
                _ = self.cancel.cancelled() => break,
                msg = frames.next() => msg,
            };

            match msg {
                Some(Ok(Message::Binary(frame))) => {
                    if !self.handle_frame(&mut vad, frame).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("WebSocket closed for session: {}", self.session.id);
                    break;
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Text(_))) => {
                    debug!("Ignoring text frame on audio socket");
                }
                Some(Err(e)) => {
                    error!(
                        "Error reading client socket for session {}: {}",
                        self.session.id, e
                    );
                    break;
                }
            }
        }

        self.terminate().await;
    }

    /// Route one binary audio frame. Returns `false` when the session must
    /// terminate.
    async fn handle_frame(&self, vad: &mut VoiceActivityDetector, frame: Vec<u8>) -> bool {
        let now = Instant::now();

        // Hard cap first: an overlong utterance closes regardless of what
        // this frame contains. The ASR stays up for in-flight finals.
        let cut = {
            let mut tracker = self.tracker.lock().expect("tracker lock poisoned");
            tracker.check_max_duration(now)
        };
        if cut {
            info!(
                "[{}] utterance boundary: {}",
                self.session.id,
                BoundaryCause::MaxDuration
            );
            self.sink
                .utterance_boundary(&self.session.id, BoundaryCause::MaxDuration)
                .await;
            return true;
        }

        let has_voice = match vad.detect(&frame) {
            Ok(v) => v,
            Err(e) => {
                warn!("VAD error for session {}: {}", self.session.id, e);
                let _ = self
                    .socket
                    .send(ClientEvent::error(ErrorType::Audio, e.to_string()))
                    .await;
                return true;
            }
        };

        // Silence frames are not forwarded; the ticker tracks the gap.
        if !has_voice {
            return true;
        }

        let asr = { self.session.lock().await.asr.clone() };
        match asr.send_audio(&frame).await {
            Ok(()) => {
                let started = {
                    let mut tracker = self.tracker.lock().expect("tracker lock poisoned");
                    tracker.reset_reconnect();
                    tracker.note_voice(now)
                };
                if started {
                    info!("[{}] utterance started", self.session.id);
                }
                true
            }
            Err(e) => {
                error!(
                    "Error sending audio to ASR for session {}: {}",
                    self.session.id, e
                );
                self.reconnect_asr(vad).await
            }
        }
    }

    /// Error-recovery reconnect. Returns `false` once the rounds allowed for
    /// this utterance are spent or no fresh connection could be established.
    async fn reconnect_asr(&self, vad: &mut VoiceActivityDetector) -> bool {
        let round = {
            let mut tracker = self.tracker.lock().expect("tracker lock poisoned");
            tracker.begin_reconnect_round()
        };
        if round > MAX_RECONNECT_ROUNDS {
            error!(
                "Exceeded maximum ASR reconnection attempts for session {}",
                self.session.id
            );
            return false;
        }

        info!(
            "Reconnecting ASR for session {} (round {})",
            self.session.id, round
        );
        tokio::time::sleep(RECONNECT_DELAY).await;

        let old = { self.session.lock().await.asr.clone() };
        old.close().await;
        tokio::time::sleep(DRAIN_WAIT).await;

        let fresh = Arc::new(old.successor());
        let mut connected = false;
        for attempt in 1..=RECONNECT_CONNECT_TRIES {
            if self.cancel.is_cancelled() {
                return false;
            }
            match fresh.connect(&self.cancel).await {
                Ok(()) => {
                    connected = true;
                    break;
                }
                Err(e) => {
                    warn!(
                        "ASR reconnect dial {} failed for session {}: {}",
                        attempt, self.session.id, e
                    );
                    if attempt < RECONNECT_CONNECT_TRIES {
                        tokio::time::sleep(RECONNECT_CONNECT_DELAY).await;
                    }
                }
            }
        }
        if !connected {
            error!(
                "Failed to recover ASR connection for session {}",
                self.session.id
            );
            return false;
        }

        {
            let mut inner = self.session.lock().await;
            inner.asr = fresh.clone();
            // The provider will assign a new id; relearn it from the stream.
            inner.asr_session_id = None;
        }
        vad.reset();
        self.spawn_asr_reader(&fresh);

        info!(
            "Successfully reconnected ASR for session {} (round {})",
            self.session.id, round
        );
        true
    }

    /// One ASR reader per client instance; a replaced client's reader exits
    /// when its channels close.
    fn spawn_asr_reader(&self, asr: &Arc<StreamingAsrClient>) {
        let (Some(transcripts), Some(errors)) = (asr.transcripts(), asr.errors()) else {
            warn!(
                "ASR streams already taken for session {}; reader not started",
                self.session.id
            );
            return;
        };

        tokio::spawn(pump_asr(
            self.session.clone(),
            self.socket.clone(),
            self.sink.clone(),
            self.cancel.clone(),
            transcripts,
            errors,
        ));
    }

    fn spawn_silence_ticker(&self) {
        let session = self.session.clone();
        let sink = self.sink.clone();
        let cancel = self.cancel.clone();
        let tracker = self.tracker.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SILENCE_CHECK_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let outcome = {
                    let mut tracker = tracker.lock().expect("tracker lock poisoned");
                    tracker.tick(Instant::now())
                };

                match outcome {
                    SilenceTick::Idle => {}
                    SilenceTick::Waiting { silence, count } => {
                        debug!(
                            "[{}] waiting for more speech ({:.1}s) [{}/{}]",
                            session.id,
                            silence.as_secs_f64(),
                            count,
                            MAX_SILENCE_TICKS
                        );
                    }
                    SilenceTick::Boundary { silence } => {
                        info!(
                            "[{}] utterance boundary: {} after {:.1}s of silence",
                            session.id,
                            BoundaryCause::SustainedSilence,
                            silence.as_secs_f64()
                        );
                        sink.utterance_boundary(&session.id, BoundaryCause::SustainedSilence)
                            .await;
                    }
                }
            }
        });
    }

    /// Shared exit path: close both ends, mark the session disconnected, and
    /// fire the cancel handle so every derived loop stops.
    async fn terminate(&self) {
        let (socket, asr) = {
            let mut inner = self.session.lock().await;
            if inner.status != SessionStatus::Closed {
                inner.status = SessionStatus::Disconnected;
            }
            (inner.socket.take(), inner.asr.clone())
        };

        self.cancel.cancel();

        if let Some(socket) = socket {
            socket.close().await;
        }
        asr.close().await;

        info!("Session supervisor stopped: {}", self.session.id);
    }
}

/// Consume one ASR client's transcript and error streams.
async fn pump_asr(
    session: Arc<SessionRecord>,
    socket: ClientSocket,
    sink: Arc<dyn UtteranceSink>,
    cancel: CancelHandle,
    mut transcripts: mpsc::Receiver<TranscriptEvent>,
    mut errors: broadcast::Receiver<AsrError>,
) {
    let mut errors_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = transcripts.recv() => {
                match event {
                    Some(event) => {
                        handle_transcript_event(&session, &socket, sink.as_ref(), event).await;
                    }
                    None => break,
                }
            }
            err = errors.recv(), if errors_open => {
                match err {
                    Ok(err) if err.is_connection_lost() => {
                        // Expected while the supervisor swaps clients.
                    }
                    Ok(err) => {
                        error!(
                            "Streaming ASR error for session {}: {}",
                            session.id, err
                        );
                        let _ = socket
                            .send(ClientEvent::error(ErrorType::Stt, err.to_string()))
                            .await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Dropped {} oldest ASR errors for session {}", n, session.id);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        errors_open = false;
                    }
                }
            }
        }
    }

    debug!("ASR reader stopped for session: {}", session.id);
}

/// Apply one transcript event to the session: counters and log under the
/// session mutex, then client forwarding and the downstream handoff outside
/// it. Events with empty text update bookkeeping only.
pub async fn handle_transcript_event(
    session: &SessionRecord,
    socket: &ClientSocket,
    sink: &dyn UtteranceSink,
    event: TranscriptEvent,
) {
    let forward = {
        let mut inner = session.lock().await;
        inner.transcript_count += 1;

        if inner.asr_session_id.is_none() {
            if let Some(external) = &event.session_id {
                info!(
                    "Tracking ASR session id {} for session {}",
                    external, session.id
                );
                inner.asr_session_id = Some(external.clone());
            }
        }

        if event.text.is_empty() {
            false
        } else {
            if event.kind == TranscriptKind::Turn {
                inner.utterance_count += 1;
                info!(
                    "[{}] utterance #{} (confidence {:.2}): {}",
                    session.id, inner.utterance_count, event.confidence, event.text
                );
            }
            inner.append_transcript(event.clone());
            true
        }
    };

    if !forward {
        return;
    }

    if socket.send(ClientEvent::transcript(&event)).await.is_err() {
        warn!(
            "Failed to forward transcript to client for session {}",
            session.id
        );
    }

    if event.kind == TranscriptKind::Turn {
        sink.utterance_complete(&session.id, &event.text, event.confidence)
            .await;
    }
}
