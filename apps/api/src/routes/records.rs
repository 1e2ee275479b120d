use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::owner::Owner;
use crate::errors::AppError;
use crate::store::{PersistedRecord, Record, RecordKey};
use crate::state::AppState;

/// GET /api/v1/collections/:collection/records
pub async fn handle_list_records(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(collection): Path<String>,
) -> Result<Json<Vec<PersistedRecord>>, AppError> {
    Ok(Json(state.store.list_records(&collection, owner).await?))
}

/// POST /api/v1/collections/:collection/records
pub async fn handle_create_record(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(collection): Path<String>,
    Json(data): Json<Record>,
) -> Result<(StatusCode, Json<PersistedRecord>), AppError> {
    let created = state.store.create_record(&collection, owner, data).await?;
    state.skills_cache.invalidate_for(&collection, owner);
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/collections/:collection/records/:id
pub async fn handle_get_record(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<PersistedRecord>, AppError> {
    let key = RecordKey::new(id);
    Ok(Json(state.store.get_record(&collection, owner, &key).await?))
}

/// PUT /api/v1/collections/:collection/records/:id
pub async fn handle_update_record(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path((collection, id)): Path<(String, String)>,
    Json(data): Json<Record>,
) -> Result<Json<PersistedRecord>, AppError> {
    let key = RecordKey::new(id);
    let updated = state
        .store
        .update_record(&collection, owner, &key, data)
        .await?;
    state.skills_cache.invalidate_for(&collection, owner);
    Ok(Json(updated))
}

/// DELETE /api/v1/collections/:collection/records/:id
pub async fn handle_delete_record(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .delete_record(&collection, owner, &RecordKey::new(id))
        .await?;
    state.skills_cache.invalidate_for(&collection, owner);
    Ok(StatusCode::NO_CONTENT)
}
