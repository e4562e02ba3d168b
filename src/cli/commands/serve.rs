//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for running turns and inspecting sessions.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::agent::Transcript;
use crate::checkpoint::SessionSummary;
use crate::config::Settings;
use crate::error::{DocentError, Result};
use crate::orchestrator::{Orchestrator, ToolCallRecord, TurnOutcome};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
    /// Cancelled on shutdown so in-flight turns stop at their next step.
    shutdown: CancellationToken,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Converse, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState {
        orchestrator: Orchestrator::new(&settings)?,
        shutdown: shutdown.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Docent API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Run turn", "POST   /sessions/:id/turns");
    Output::kv("Retry turn", "POST   /sessions/:id/retry");
    Output::kv("List sessions", "GET    /sessions");
    Output::kv("Get session", "GET    /sessions/:id");
    Output::kv("Delete session", "DELETE /sessions/:id");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/turns", post(run_turn))
        .route("/sessions/{id}/retry", post(retry_turn))
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct TurnRequest {
    message: String,
}

#[derive(Serialize)]
struct TurnResponse {
    session_id: String,
    reply: String,
    model_calls: usize,
    tool_calls: Vec<ToolCallRecord>,
    degraded: bool,
}

/// A turn whose transcript could not be checkpointed. `messages` is the
/// in-memory transcript; `reply` is set when the turn reached a final reply.
#[derive(Serialize)]
struct DegradedTurnResponse {
    session_id: String,
    reply: Option<String>,
    messages: Transcript,
    degraded: bool,
    error: String,
}

#[derive(Serialize)]
struct SessionListResponse {
    sessions: Vec<SessionSummary>,
    total: usize,
}

#[derive(Serialize)]
struct SessionDetailResponse {
    session_id: String,
    messages: Transcript,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    retryable: bool,
}

fn status_for(error: &DocentError) -> StatusCode {
    match error {
        DocentError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        DocentError::ModelUnavailable(_) | DocentError::ModelResponseInvalid(_) => {
            StatusCode::BAD_GATEWAY
        }
        DocentError::TurnBudgetExceeded(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DocentError::NothingToResume(_) => StatusCode::CONFLICT,
        DocentError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: DocentError) -> Response {
    (
        status_for(&error),
        Json(ErrorResponse {
            error: error.to_string(),
            retryable: error.is_retryable(),
        }),
    )
        .into_response()
}

fn turn_response(result: Result<TurnOutcome>) -> Response {
    match result {
        Ok(outcome) => Json(TurnResponse {
            session_id: outcome.session_id,
            reply: outcome.reply,
            model_calls: outcome.model_calls,
            tool_calls: outcome.tool_calls,
            degraded: false,
        })
        .into_response(),
        Err(DocentError::CheckpointWriteFailed {
            session_id,
            reason,
            transcript,
        }) => {
            let reply = transcript.final_reply().map(str::to_string);
            let status = if reply.is_some() {
                StatusCode::OK
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (
                status,
                Json(DegradedTurnResponse {
                    session_id,
                    reply,
                    messages: *transcript,
                    degraded: true,
                    error: format!("checkpoint write failed: {}", reason),
                }),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn run_turn(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<TurnRequest>,
) -> Response {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "message must not be empty".to_string(),
                retryable: false,
            }),
        )
            .into_response();
    }

    let cancel = state.shutdown.child_token();
    turn_response(
        state
            .orchestrator
            .run_turn(&session_id, &req.message, &cancel)
            .await,
    )
}

async fn retry_turn(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    let cancel = state.shutdown.child_token();
    turn_response(state.orchestrator.resume_turn(&session_id, &cancel).await)
}

async fn list_sessions(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.sessions().await {
        Ok(sessions) => Json(SessionListResponse {
            total: sessions.len(),
            sessions,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match state.orchestrator.session(&session_id).await {
        Ok(transcript) => Json(SessionDetailResponse {
            session_id,
            messages: transcript,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match state.orchestrator.delete_session(&session_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}
