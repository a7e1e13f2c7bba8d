use axum::http::StatusCode;
use thiserror::Error;

/// Errors surfaced by the session registry and HTTP surface.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,

    #[error("Session already connected")]
    AlreadyConnected,

    #[error("Session error: {0}")]
    Internal(String),
}

impl From<SessionError> for StatusCode {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => StatusCode::NOT_FOUND,
            SessionError::AlreadyConnected => StatusCode::CONFLICT,
            SessionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors from the streaming ASR client. `Clone` because non-fatal errors
/// fan out on a broadcast channel.
#[derive(Error, Debug, Clone)]
pub enum AsrError {
    #[error("not connected")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    #[error("connection lost")]
    ConnectionLost,

    #[error("failed to connect after {attempts} attempts: {message}")]
    ConnectFailed { attempts: u32, message: String },

    #[error("send timed out after {0:?}")]
    SendTimeout(std::time::Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error: {message} (code: {code})")]
    Server { code: String, message: String },
}

impl AsrError {
    /// The expected signal while a reconnection is in flight; the supervisor
    /// swallows it instead of logging.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, AsrError::ConnectionLost)
    }
}

/// Voice activity detection errors.
#[derive(Error, Debug)]
pub enum VadError {
    #[error("insufficient audio data: {0} bytes")]
    InvalidFrame(usize),
}

/// Fatal startup configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    MissingKey(&'static str),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
