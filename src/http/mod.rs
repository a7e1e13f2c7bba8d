//! HTTP API server for session control and the audio socket
//!
//! This module provides the synchronous session surface plus the WebSocket
//! upgrade that hands a connection to the session supervisor:
//! - POST /session/init - Create a new interview session
//! - POST /session/init-with-lesson - Create a session with case material
//! - GET /session/status?session_id=... - Query session status
//! - DELETE /session/close?session_id=... - Close a session
//! - GET /ws/interview/:session_id - Audio streaming socket
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
