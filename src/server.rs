//! HTTP + WebSocket server for streaming recognition sessions.
//!
//! This module provides a server that:
//! - Accepts landmark frames over `GET /ws/recognize` and streams results back
//! - Lists and force-closes active sessions
//! - Collects prediction feedback and labelled dataset samples
//!
//! # Architecture
//!
//! ```text
//! client ──binary frames──▶ /ws/recognize ──▶ SessionController ──▶ InferencePort
//!    ▲                            │
//!    └──────── SessionEvent ◀─────┘
//! ```

use crate::config::Config;
use crate::core::{SessionController, SessionError, StopHandle};
use crate::extract::LandmarkCodec;
use crate::feedback::{
    DatasetEntry, DatasetExport, FeedbackError, FeedbackRequest, FeedbackStore, FeedbackSummary,
    SharedFeedbackStore,
};
use crate::inference::{BackendStatus, SharedInferencePort};
use crate::protocol::{ControlMessage, SessionEvent};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{HeaderValue, StatusCode},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Notify, RwLock};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Browser origins allowed to call the API.
const ALLOWED_ORIGINS: [&str; 3] = [
    "http://localhost:5173",
    "http://localhost:3000",
    "https://localhost:5001",
];

struct ActiveSession {
    stop: StopHandle,
    /// Wakes the connection loop when the session is closed from outside
    close: Arc<Notify>,
    connected_at: DateTime<Utc>,
}

/// Sessions currently attached to a WebSocket.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, ActiveSession>>,
}

impl SessionRegistry {
    async fn register(&self, session_id: &str, stop: StopHandle, close: Arc<Notify>) {
        self.sessions.write().await.insert(
            session_id.to_string(),
            ActiveSession {
                stop,
                close,
                connected_at: Utc::now(),
            },
        );
    }

    async fn remove(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    /// Stop a session and wake its connection. Returns false if unknown.
    async fn stop(&self, session_id: &str) -> bool {
        match self.sessions.read().await.get(session_id) {
            Some(session) => {
                session.stop.stop();
                session.close.notify_one();
                true
            }
            None => false,
        }
    }

    async fn list(&self) -> Vec<ActiveSessionInfo> {
        let mut sessions: Vec<ActiveSessionInfo> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, session)| ActiveSessionInfo {
                session_id: id.clone(),
                connected_at: session.connected_at,
            })
            .collect();
        sessions.sort_by(|a, b| a.connected_at.cmp(&b.connected_at));
        sessions
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Shared server state
pub struct AppState {
    config: Config,
    port: SharedInferencePort,
    codec: Arc<LandmarkCodec>,
    sessions: SessionRegistry,
    feedback: SharedFeedbackStore,
}

impl AppState {
    pub fn new(config: Config, port: SharedInferencePort) -> Self {
        let codec = LandmarkCodec::new()
            .with_max_frame_bytes(config.server.max_frame_bytes)
            .with_wrist_relative(config.server.wrist_relative);
        let feedback = Arc::new(FeedbackStore::with_persistence(config.data_path.clone()));

        Self {
            config,
            port,
            codec: Arc::new(codec),
            sessions: SessionRegistry::default(),
            feedback,
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend_status: BackendStatus,
    pub active_sessions: usize,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveSessionInfo {
    pub session_id: String,
    pub connected_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ActiveSessionsResponse {
    pub count: usize,
    pub sessions: Vec<ActiveSessionInfo>,
}

#[derive(Serialize)]
pub struct StopSessionResponse {
    pub status: String,
    pub session_id: String,
}

#[derive(Serialize)]
pub struct FeedbackResponse {
    pub status: String,
    pub feedback_id: usize,
}

#[derive(Serialize)]
pub struct DatasetAppendResponse {
    pub status: String,
    pub entry_id: usize,
    pub total_entries: usize,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: String) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error,
            code: code.to_string(),
        }),
    )
}

fn storage_task_failed(e: tokio::task::JoinError) -> ApiError {
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "STORAGE_ERROR",
        format!("Storage task failed: {e}"),
    )
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend_status: state.port.status(),
        active_sessions: state.sessions.len().await,
    })
}

/// GET /ws/recognize
async fn recognize(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one streaming session until the client leaves or the session is stopped.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();

    let session = SessionController::new(
        state.config.recognition,
        Arc::clone(&state.port),
        state.codec.clone(),
        state.codec.clone(),
    );
    let mut session = match session {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "invalid recognition config");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    if let Err(e) = session.start(session_id.clone()) {
        tracing::error!(session_id = %session_id, error = %e, "failed to start session");
        return;
    }

    let close = Arc::new(Notify::new());
    state
        .sessions
        .register(&session_id, session.stop_handle(), Arc::clone(&close))
        .await;

    let heartbeat_every = state.config.server.heartbeat_every;
    let mut frames_received: u64 = 0;
    let mut open = send_event(
        &mut sender,
        &SessionEvent::connection(&session_id, session.backend_status()),
    )
    .await;

    while open {
        let message = tokio::select! {
            _ = close.notified() => {
                tracing::info!(session_id = %session_id, "session closed by request");
                break;
            }
            message = receiver.next() => message,
        };

        let message = match message {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                tracing::warn!(session_id = %session_id, error = %e, "websocket receive failed");
                break;
            }
            None => break,
        };

        match message {
            Message::Binary(data) => {
                frames_received += 1;
                match session.process_frame(&data).await {
                    Ok(Some(result)) => {
                        open = send_event(&mut sender, &SessionEvent::recognition(&session_id, result)).await;
                    }
                    Ok(None) => {}
                    Err(SessionError::Closed) => break,
                    Err(e) => {
                        open = send_event(&mut sender, &SessionEvent::error(&session_id, e.to_string())).await;
                    }
                }

                if open && heartbeat_every > 0 && frames_received % heartbeat_every == 0 {
                    let stats = SessionEvent::stats(&session_id, frames_received, session.summary());
                    open = send_event(&mut sender, &stats).await;
                }
            }
            Message::Text(text) => match serde_json::from_str::<ControlMessage>(&text) {
                Ok(ControlMessage::Ping) => {
                    open = send_event(&mut sender, &SessionEvent::pong()).await;
                }
                Ok(ControlMessage::GetStats) => {
                    let stats = SessionEvent::stats(&session_id, frames_received, session.summary());
                    open = send_event(&mut sender, &stats).await;
                }
                Ok(ControlMessage::Reset) => match session.reset() {
                    Ok(()) => {
                        open = send_event(&mut sender, &SessionEvent::reset(&session_id)).await;
                    }
                    Err(_) => break,
                },
                Ok(ControlMessage::Stop) => break,
                Err(e) => {
                    tracing::debug!(session_id = %session_id, error = %e, "invalid control message");
                    let event = SessionEvent::error(&session_id, format!("Invalid control message: {e}"));
                    open = send_event(&mut sender, &event).await;
                }
            },
            Message::Close(_) => break,
            // Ping/pong frames are answered by the websocket layer
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    session.stop();
    state.sessions.remove(&session_id).await;
    let _ = sender.send(Message::Close(None)).await;
}

/// Serialize and send an event. Returns false once the socket is gone.
async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &SessionEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize event");
            return true;
        }
    };
    sender.send(Message::Text(json)).await.is_ok()
}

/// GET /sessions/active
async fn active_sessions(State(state): State<Arc<AppState>>) -> Json<ActiveSessionsResponse> {
    let sessions = state.sessions.list().await;
    Json(ActiveSessionsResponse {
        count: sessions.len(),
        sessions,
    })
}

/// DELETE /sessions/:id
async fn stop_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<StopSessionResponse>, ApiError> {
    if !state.sessions.stop(&session_id).await {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            "SESSION_NOT_FOUND",
            format!("Session {session_id} not found"),
        ));
    }

    tracing::info!(session_id = %session_id, "stop requested");
    Ok(Json(StopSessionResponse {
        status: "stopped".to_string(),
        session_id,
    }))
}

/// POST /feedback
async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Json(feedback): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    tracing::info!(
        session_id = %feedback.session_id,
        predicted = feedback.predicted_sign.as_deref().unwrap_or("-"),
        correct = %feedback.correct_sign,
        "feedback received"
    );
    let store = Arc::clone(&state.feedback);
    let feedback_id = tokio::task::spawn_blocking(move || store.submit_feedback(feedback))
        .await
        .map_err(storage_task_failed)?;

    Ok(Json(FeedbackResponse {
        status: "ok".to_string(),
        feedback_id,
    }))
}

/// GET /feedback/summary
async fn feedback_summary(State(state): State<Arc<AppState>>) -> Json<FeedbackSummary> {
    Json(state.feedback.summary())
}

/// POST /dataset/append
async fn append_dataset(
    State(state): State<Arc<AppState>>,
    Json(entry): Json<DatasetEntry>,
) -> Result<Json<DatasetAppendResponse>, ApiError> {
    let store = Arc::clone(&state.feedback);
    let appended = tokio::task::spawn_blocking(move || store.append_dataset(entry))
        .await
        .map_err(storage_task_failed)?;
    let entry_id = appended.map_err(|e| match e {
        FeedbackError::InvalidShape(_) => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_SHAPE", e.to_string())
        }
        FeedbackError::Io(_) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string())
        }
    })?;

    Ok(Json(DatasetAppendResponse {
        status: "ok".to_string(),
        entry_id,
        total_entries: state.feedback.dataset_count(),
    }))
}

/// GET /dataset/export
async fn export_dataset(State(state): State<Arc<AppState>>) -> Json<DatasetExport> {
    Json(state.feedback.export_dataset())
}

/// Build the router over an existing state.
pub fn router(state: Arc<AppState>) -> Router {
    let origins = ALLOWED_ORIGINS.map(HeaderValue::from_static);

    Router::new()
        .route("/health", get(health))
        .route("/ws/recognize", get(recognize))
        .route("/sessions/active", get(active_sessions))
        .route("/sessions/:id", delete(stop_session))
        .route("/feedback", post(submit_feedback))
        .route("/feedback/summary", get(feedback_summary))
        .route("/dataset/append", post(append_dataset))
        .route("/dataset/export", get(export_dataset))
        .layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the server
pub async fn run(
    config: Config,
    port: SharedInferencePort,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    config.validate()?;
    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    let actual_addr = listener.local_addr()?;

    let state = Arc::new(AppState::new(config, port));
    tracing::info!(
        backend = %state.port.status(),
        window_size = state.config.recognition.window_size,
        stride = state.config.recognition.stride,
        "gesture stream server listening on http://{}",
        actual_addr
    );
    let app = router(state);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
