use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::warn;

use crate::lesson::LessonPlan;
use crate::stt::{StreamingAsrClient, StreamingConfig, TranscriptEvent};
use crate::ws::ClientSocket;

/// Cap on the per-session transcript log. The log is append-only in normal
/// operation; past the cap the oldest entry is trimmed.
const MAX_TRANSCRIPT_LOG: usize = 4096;

/// Lifecycle state of an interview session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Initialized,
    Connected,
    Disconnected,
    Closed,
}

/// One handle cancels every loop derived from a session. Cloned into the
/// socket reader, silence ticker, ASR reader, and the ASR client's internal
/// reader; replaced only when a disconnected session is re-attached.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the handle fires. Cancel-safe for use inside `select!`.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Status snapshot returned by the session-status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub transcript_count: u64,
    pub utterance_count: u64,
}

/// Mutable session state, guarded by the record's mutex. Every field here is
/// shared between the supervisor loops; the lock is never held across I/O.
pub struct SessionInner {
    pub status: SessionStatus,
    pub transcript_count: u64,
    pub utterance_count: u64,
    /// Provider-assigned session id; cleared on every ASR reconnection.
    pub asr_session_id: Option<String>,
    /// Current ASR client. Replaced, never reused, on reconnection.
    pub asr: Arc<StreamingAsrClient>,
    /// At most one attached client socket.
    pub socket: Option<ClientSocket>,
    pub cancel: CancelHandle,
    pub config: StreamingConfig,
    transcript_log: Vec<TranscriptEvent>,
}

impl SessionInner {
    pub fn append_transcript(&mut self, event: TranscriptEvent) {
        if self.transcript_log.len() >= MAX_TRANSCRIPT_LOG {
            warn!("Transcript log full, trimming oldest entry");
            self.transcript_log.remove(0);
        }
        self.transcript_log.push(event);
    }

    pub fn transcript_log(&self) -> &[TranscriptEvent] {
        &self.transcript_log
    }
}

/// One interview session: identity and creation time are immutable, the rest
/// lives behind the session mutex.
pub struct SessionRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Case lesson delivered at init; never mutated by the core.
    pub lesson: Option<Arc<LessonPlan>>,
    inner: Mutex<SessionInner>,
}

impl SessionRecord {
    pub fn new(
        id: String,
        config: StreamingConfig,
        asr: Arc<StreamingAsrClient>,
        lesson: Option<LessonPlan>,
    ) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            lesson: lesson.map(Arc::new),
            inner: Mutex::new(SessionInner {
                status: SessionStatus::Initialized,
                transcript_count: 0,
                utterance_count: 0,
                asr_session_id: None,
                asr,
                socket: None,
                cancel: CancelHandle::new(),
                config,
                transcript_log: Vec::new(),
            }),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().await
    }

    pub async fn status(&self) -> SessionStatus {
        self.inner.lock().await.status
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        SessionSnapshot {
            session_id: self.id.clone(),
            status: inner.status,
            start_time: self.created_at,
            transcript_count: inner.transcript_count,
            utterance_count: inner.utterance_count,
        }
    }
}
