//! Editing sessions: one debounced auto-save coordinator per open form.
//!
//! The dashboard opens a session when a form mounts, PUTs a draft on every
//! change and deletes the session on unmount. Save failures surface through
//! `GET /api/v1/notifications`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::owner::Owner;
use crate::autosave::{Loaded, SessionActivity, SessionId};
use crate::errors::AppError;
use crate::state::AppState;
use crate::store::{PersistedRecord, Record, RecordKey};

#[derive(Deserialize)]
pub struct OpenSessionRequest {
    pub collection: String,
}

#[derive(Serialize)]
pub struct OpenSessionResponse {
    pub session_id: SessionId,
}

#[derive(Serialize)]
pub struct SessionStatus {
    pub session_id: SessionId,
    pub collection: String,
    pub is_saving: bool,
    pub has_pending_save: bool,
    pub quiet_period_ms: u64,
    #[serde(flatten)]
    pub activity: SessionActivity,
}

#[derive(Deserialize)]
pub struct LoadQuery {
    pub id: Option<String>,
}

/// POST /api/v1/autosave/sessions
pub async fn handle_open_session(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(req): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<OpenSessionResponse>), AppError> {
    let session_id = state.sessions.open(owner, &req.collection)?;
    Ok((StatusCode::CREATED, Json(OpenSessionResponse { session_id })))
}

/// GET /api/v1/autosave/sessions/:id
pub async fn handle_session_status(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionStatus>, AppError> {
    let session = state.sessions.get(owner, id)?;
    let activity = state.sessions.activity(owner, id)?;
    Ok(Json(SessionStatus {
        session_id: id,
        collection: session.collection().to_string(),
        is_saving: session.is_saving(),
        has_pending_save: session.has_pending_save(),
        quiet_period_ms: u64::try_from(session.quiet_period().as_millis()).unwrap_or(u64::MAX),
        activity,
    }))
}

/// GET /api/v1/autosave/sessions/:id/data
/// One record with `?id=`, the whole collection otherwise.
pub async fn handle_load_session_data(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<SessionId>,
    Query(query): Query<LoadQuery>,
) -> Result<Json<Loaded>, AppError> {
    let session = state.sessions.get(owner, id)?;
    let key = query
        .id
        .filter(|id| !id.trim().is_empty())
        .map(RecordKey::new);
    Ok(Json(session.load_data(key).await?))
}

/// PUT /api/v1/autosave/sessions/:id/draft
/// Replaces any pending draft and restarts the quiet period.
pub async fn handle_schedule_draft(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<SessionId>,
    Json(draft): Json<Record>,
) -> Result<StatusCode, AppError> {
    let session = state.sessions.get(owner, id)?;
    let scheduled = session.schedule_save(draft);
    // Failures already reach the user as notifications.
    tokio::spawn(async move {
        match scheduled.outcome().await {
            Some(Ok(record)) => debug!("session {id}: draft saved as {}", record.id),
            Some(Err(err)) => debug!("session {id}: draft save failed: {err}"),
            None => debug!("session {id}: draft superseded"),
        }
    });
    Ok(StatusCode::ACCEPTED)
}

/// DELETE /api/v1/autosave/sessions/:id/draft
pub async fn handle_cancel_draft(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<SessionId>,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = state.sessions.get(owner, id)?;
    let cancelled = session.cancel_pending_save();
    Ok(Json(serde_json::json!({ "cancelled": cancelled })))
}

/// POST /api/v1/autosave/sessions/:id/save
/// Saves `record` immediately, bypassing the quiet period.
pub async fn handle_save_now(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<SessionId>,
    Json(record): Json<Record>,
) -> Result<Json<PersistedRecord>, AppError> {
    let session = state.sessions.get(owner, id)?;
    Ok(Json(session.save_now(Some(record)).await?))
}

/// POST /api/v1/autosave/sessions/:id/flush
/// Saves the pending draft now. 204 when nothing was pending.
pub async fn handle_flush(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<SessionId>,
) -> Result<Response, AppError> {
    let session = state.sessions.get(owner, id)?;
    match session.flush().await {
        Some(outcome) => Ok(Json(outcome?).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// DELETE /api/v1/autosave/sessions/:id
/// Discards any pending draft.
pub async fn handle_close_session(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<SessionId>,
) -> Result<StatusCode, AppError> {
    state.sessions.close(owner, id)?;
    Ok(StatusCode::NO_CONTENT)
}
