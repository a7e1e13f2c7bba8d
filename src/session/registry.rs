use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use super::record::{CancelHandle, SessionRecord, SessionSnapshot, SessionStatus};
use crate::error::SessionError;
use crate::lesson::LessonPlan;
use crate::stt::{StreamingAsrClient, StreamingConfig};
use crate::ws::ClientSocket;

/// Everything the supervisor needs after a socket is admitted.
pub struct Attachment {
    pub session: Arc<SessionRecord>,
    pub cancel: CancelHandle,
}

/// Maps session id to session record and enforces state-dependent admission
/// of socket connections. The registry lock guards only the map; admission
/// decisions happen under the individual session mutex so two simultaneous
/// connection attempts cannot both succeed.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionRecord>>>,
    asr_api_key: String,
}

impl SessionRegistry {
    pub fn new(asr_api_key: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            asr_api_key: asr_api_key.into(),
        }
    }

    /// Create a session in `initialized` state with an unconnected ASR
    /// client and optional read-only lesson context.
    pub async fn create(
        &self,
        config: StreamingConfig,
        lesson: Option<LessonPlan>,
    ) -> Arc<SessionRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let asr = Arc::new(StreamingAsrClient::new(config.clone(), &self.asr_api_key));
        let record = Arc::new(SessionRecord::new(id.clone(), config, asr, lesson));

        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), record.clone());
        info!("Interview session initialized: {}", id);

        record
    }

    pub async fn get(&self, id: &str) -> Result<Arc<SessionRecord>, SessionError> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned().ok_or(SessionError::NotFound)
    }

    pub async fn status(&self, id: &str) -> Result<SessionSnapshot, SessionError> {
        let session = self.get(id).await?;
        Ok(session.snapshot().await)
    }

    /// Admit a client socket according to the session's current state.
    ///
    /// `initialized` accepts the first connection; `disconnected` accepts a
    /// reconnection with a fresh cancel handle and a fresh ASR client built
    /// from the stored config (the transcript log survives); `connected`
    /// rejects with `AlreadyConnected`; `closed` is indistinguishable from
    /// absent.
    pub async fn attach_socket(
        &self,
        id: &str,
        socket: ClientSocket,
    ) -> Result<Attachment, SessionError> {
        let session = self.get(id).await?;

        let mut inner = session.lock().await;
        match inner.status {
            SessionStatus::Initialized => {
                inner.socket = Some(socket);
                inner.status = SessionStatus::Connected;
            }
            SessionStatus::Disconnected => {
                info!("Re-attaching socket to session: {}", id);
                inner.cancel = CancelHandle::new();
                inner.asr = Arc::new(inner.asr.successor());
                inner.asr_session_id = None;
                inner.socket = Some(socket);
                inner.status = SessionStatus::Connected;
            }
            SessionStatus::Connected => {
                warn!("Rejecting duplicate socket for session: {}", id);
                return Err(SessionError::AlreadyConnected);
            }
            SessionStatus::Closed => return Err(SessionError::NotFound),
        }
        let cancel = inner.cancel.clone();
        drop(inner);

        Ok(Attachment { session, cancel })
    }

    /// Close and unregister a session: fire the cancel handle, close the
    /// socket and ASR client best-effort, remove the record. Closing from a
    /// caller that never attached is permitted.
    pub async fn close(&self, id: &str) -> Result<(), SessionError> {
        let session = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(id).ok_or(SessionError::NotFound)?
        };

        let (socket, asr) = {
            let mut inner = session.lock().await;
            inner.status = SessionStatus::Closed;
            inner.cancel.cancel();
            (inner.socket.take(), inner.asr.clone())
        };

        if let Some(socket) = socket {
            socket.close().await;
        }
        asr.close().await;

        info!("Interview session closed: {}", id);
        Ok(())
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
