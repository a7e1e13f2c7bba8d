use super::state::AppState;
use crate::lesson::LessonPlan;
use crate::session::{SessionSnapshot, SessionStatus, Supervisor};
use crate::stt::StreamingConfig;
use crate::ws::ClientSocket;
use axum::{
    extract::{
        ws::WebSocket,
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct InitSessionRequest {
    /// Audio sample rate in Hz (default: service config, typically 16000)
    pub sample_rate: Option<u32>,

    /// PCM encoding tag (default: service config, typically pcm_s16le)
    pub encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InitWithLessonRequest {
    pub sample_rate: Option<u32>,
    pub encoding: Option<String>,

    /// Case material for the interviewer, read-only after init
    #[serde(flatten)]
    pub lesson: LessonPlan,
}

#[derive(Debug, Serialize)]
pub struct InitSessionResponse {
    pub session_id: String,
    pub websocket_url: String,
    pub status: SessionStatus,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct CloseSessionResponse {
    pub status: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/init
/// Create a new interview session
pub async fn init_session(
    State(state): State<AppState>,
    body: Option<Json<InitSessionRequest>>,
) -> impl IntoResponse {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let config = streaming_config(&state, req.sample_rate, req.encoding);

    let session = state.registry.create(config, None).await;

    (
        StatusCode::OK,
        Json(init_response(&state, &session.id)),
    )
        .into_response()
}

/// POST /session/init-with-lesson
/// Create a new interview session seeded with case material
pub async fn init_session_with_lesson(
    State(state): State<AppState>,
    Json(req): Json<InitWithLessonRequest>,
) -> impl IntoResponse {
    let config = streaming_config(&state, req.sample_rate, req.encoding);

    info!("Initializing session with lesson: {}", req.lesson.lesson);
    let session = state.registry.create(config, Some(req.lesson)).await;

    (
        StatusCode::OK,
        Json(init_response(&state, &session.id)),
    )
        .into_response()
}

/// GET /session/status?session_id=...
/// Get status of an interview session
pub async fn session_status(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> impl IntoResponse {
    match state.registry.status(&query.session_id).await {
        Ok(snapshot) => (StatusCode::OK, Json::<SessionSnapshot>(snapshot)).into_response(),
        Err(e) => (
            StatusCode::from(e),
            Json(ErrorResponse {
                error: format!("Session {} not found", query.session_id),
            }),
        )
            .into_response(),
    }
}

/// DELETE /session/close?session_id=...
/// Close an interview session
pub async fn close_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> impl IntoResponse {
    match state.registry.close(&query.session_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(CloseSessionResponse {
                status: "closed".to_string(),
                session_id: query.session_id,
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::from(e),
            Json(ErrorResponse {
                error: format!("Session {} not found", query.session_id),
            }),
        )
            .into_response(),
    }
}

/// GET /ws/interview/:session_id
/// Upgrade to the audio streaming socket
pub async fn interview_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    // Early admission check so a duplicate connection gets a clean HTTP 409
    // before the upgrade. The authoritative decision is repeated under the
    // session mutex in attach_socket.
    let session = match state.registry.get(&session_id).await {
        Ok(session) => session,
        Err(e) => return StatusCode::from(e).into_response(),
    };
    if session.status().await == SessionStatus::Connected {
        warn!(
            "Rejecting duplicate WebSocket connection for session: {}",
            session_id
        );
        return StatusCode::CONFLICT.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(state, session_id, socket))
}

async fn handle_socket(state: AppState, session_id: String, socket: WebSocket) {
    let (client_socket, frames) = ClientSocket::attach(socket);

    match state
        .registry
        .attach_socket(&session_id, client_socket.clone())
        .await
    {
        Ok(attachment) => {
            info!("WebSocket connected for session: {}", session_id);
            Supervisor::new(
                attachment.session,
                client_socket,
                state.sink.clone(),
                attachment.cancel,
            )
            .run(frames)
            .await;
        }
        Err(e) => {
            warn!("Rejecting socket for session {}: {}", session_id, e);
            client_socket.close().await;
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "service": state.config.service.name,
        })),
    )
}

// ============================================================================
// Helpers
// ============================================================================

fn streaming_config(
    state: &AppState,
    sample_rate: Option<u32>,
    encoding: Option<String>,
) -> StreamingConfig {
    let audio = &state.config.audio;
    let asr = &state.config.asr;
    StreamingConfig {
        sample_rate: sample_rate.unwrap_or(audio.sample_rate),
        encoding: Some(encoding.unwrap_or_else(|| audio.encoding.clone())),
        format_turns: asr.format_turns,
        end_of_turn_confidence_threshold: Some(asr.end_of_turn_confidence_threshold),
        min_end_of_turn_silence_when_confident: Some(asr.min_end_of_turn_silence_when_confident),
        max_turn_silence: Some(asr.max_turn_silence),
    }
}

fn init_response(state: &AppState, session_id: &str) -> InitSessionResponse {
    let http = &state.config.service.http;
    InitSessionResponse {
        session_id: session_id.to_string(),
        websocket_url: format!(
            "ws://{}:{}/ws/interview/{}",
            http.bind, http.port, session_id
        ),
        status: SessionStatus::Initialized,
    }
}
