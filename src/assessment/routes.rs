//! REST endpoints for the assessment flow and reward schedules.
//!
//! Identity comes from the `x-user-id` header set by the auth layer in
//! front of this service.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::warn;

use super::answers::Answers;
use super::manager::AssessmentManager;
use crate::error::{CompletionError, DatabaseError, Error};
use crate::rewards::PersonalizationInput;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared state for assessment routes.
#[derive(Clone)]
pub struct AssessmentRouteState {
    pub manager: Arc<AssessmentManager>,
}

/// Build the assessment and reward REST routes.
pub fn assessment_routes(manager: Arc<AssessmentManager>) -> Router {
    let state = AssessmentRouteState { manager };

    Router::new()
        .route("/health", get(health))
        .route("/api/assessment/status", get(get_status))
        .route("/api/assessment/advance", post(advance))
        .route("/api/assessment/back", post(go_back))
        .route("/api/assessment/input", post(record_input))
        .route("/api/assessment/complete", post(complete))
        .route("/api/assessment/profile", get(get_profile))
        .route(
            "/api/rewards/schedule",
            post(generate_schedule).get(get_schedule),
        )
        .route(
            "/api/rewards/schedule/regenerate",
            post(regenerate_schedule),
        )
        .with_state(state)
}

// ── Errors ──────────────────────────────────────────────────────────────

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Map a core error to its HTTP status.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Completion(CompletionError::Incomplete(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Completion(
            CompletionError::NotAtTerminalStage { .. } | CompletionError::AlreadyCompleted { .. },
        ) => StatusCode::CONFLICT,
        Error::Completion(CompletionError::Commit(_)) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
        Error::Database(_) | Error::Schedule(_) | Error::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: Error) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!(status = status.as_u16(), error = %err, "Request failed");
    }
    error_body(status, err.to_string())
}

fn user_id(headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| error_body(StatusCode::UNAUTHORIZED, "Missing x-user-id header"))
}

/// Resolve the caller or return the rejection response.
macro_rules! caller {
    ($headers:expr) => {
        match user_id(&$headers) {
            Ok(id) => id,
            Err(resp) => return resp,
        }
    };
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "focus-protocol"
    }))
}

// ── Assessment ──────────────────────────────────────────────────────────

async fn get_status(State(state): State<AssessmentRouteState>, headers: HeaderMap) -> Response {
    let user = caller!(headers);
    match state.manager.status(&user).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => error_response(e),
    }
}

async fn advance(
    State(state): State<AssessmentRouteState>,
    headers: HeaderMap,
    Json(partial): Json<Answers>,
) -> Response {
    let user = caller!(headers);
    match state.manager.advance(&user, partial).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => error_response(e),
    }
}

async fn go_back(State(state): State<AssessmentRouteState>, headers: HeaderMap) -> Response {
    let user = caller!(headers);
    match state.manager.go_back(&user).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct InputBody {
    text: String,
}

async fn record_input(
    State(state): State<AssessmentRouteState>,
    headers: HeaderMap,
    Json(body): Json<InputBody>,
) -> Response {
    let user = caller!(headers);
    match state.manager.record_input(&user, &body.text).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => error_response(e),
    }
}

async fn complete(State(state): State<AssessmentRouteState>, headers: HeaderMap) -> Response {
    let user = caller!(headers);
    match state.manager.complete(&user).await {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_profile(State(state): State<AssessmentRouteState>, headers: HeaderMap) -> Response {
    let user = caller!(headers);
    match state.manager.profile(&user).await {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => error_body(StatusCode::NOT_FOUND, "No profile exists yet"),
        Err(e) => error_response(e),
    }
}

// ── Reward schedules ────────────────────────────────────────────────────

async fn generate_schedule(
    State(state): State<AssessmentRouteState>,
    headers: HeaderMap,
    Json(input): Json<PersonalizationInput>,
) -> Response {
    let user = caller!(headers);
    match state.manager.generate_schedule(&user, input).await {
        Ok(saved) => (StatusCode::CREATED, Json(saved)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn regenerate_schedule(
    State(state): State<AssessmentRouteState>,
    headers: HeaderMap,
) -> Response {
    let user = caller!(headers);
    match state.manager.regenerate_schedule(&user).await {
        Ok(saved) => Json(saved).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleQuery {
    #[serde(default)]
    completed: u32,
}

async fn get_schedule(
    State(state): State<AssessmentRouteState>,
    headers: HeaderMap,
    Query(query): Query<ScheduleQuery>,
) -> Response {
    let user = caller!(headers);
    match state.manager.schedule(&user, query.completed).await {
        Ok(Some(view)) => Json(view).into_response(),
        Ok(None) => error_body(StatusCode::NOT_FOUND, "No reward schedule exists yet"),
        Err(e) => error_response(e),
    }
}
