//! Handlers for the structured dashboard collections. Each one extracts the
//! owner and payload and defers to `crate::services`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::owner::Owner;
use crate::errors::AppError;
use crate::notify::Notification;
use crate::schemas::category::CategoryForm;
use crate::schemas::job_offer::JobOfferForm;
use crate::schemas::skill::SkillForm;
use crate::services::skills::SkillStatistics;
use crate::services::{categories, job_offers, personal_info, skills};
use crate::state::AppState;
use crate::store::{Record, RecordKey};

#[derive(Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<RecordKey>,
}

/// GET /api/v1/notifications
pub async fn handle_notifications(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Json<Vec<Notification>> {
    Json(state.notifications.recent(owner))
}

// ── Categories ────────────────────────────────────────────────────────────

/// GET /api/v1/categories
pub async fn handle_list_categories(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Vec<CategoryForm>>, AppError> {
    Ok(Json(categories::list_categories(state.store.as_ref(), owner).await?))
}

/// GET /api/v1/categories/:id
pub async fn handle_get_category(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<CategoryForm>, AppError> {
    let key = RecordKey::new(id);
    Ok(Json(categories::get_category(state.store.as_ref(), owner, &key).await?))
}

/// POST /api/v1/categories
pub async fn handle_create_category(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(form): Json<CategoryForm>,
) -> Result<(StatusCode, Json<CategoryForm>), AppError> {
    let created = categories::create_category(state.store.as_ref(), owner, form).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/v1/categories/:id
pub async fn handle_update_category(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    Json(form): Json<CategoryForm>,
) -> Result<Json<CategoryForm>, AppError> {
    let key = RecordKey::new(id);
    Ok(Json(
        categories::update_category(state.store.as_ref(), owner, &key, form).await?,
    ))
}

/// DELETE /api/v1/categories/:id
pub async fn handle_delete_category(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    categories::delete_category(state.store.as_ref(), owner, &RecordKey::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/categories/reorder
pub async fn handle_reorder_categories(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(req): Json<ReorderRequest>,
) -> Result<StatusCode, AppError> {
    categories::reorder_categories(state.store.as_ref(), owner, &req.ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Skills ────────────────────────────────────────────────────────────────

/// GET /api/v1/skills
pub async fn handle_list_skills(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Vec<SkillForm>>, AppError> {
    Ok(Json(
        skills::list_skill_forms(state.store.as_ref(), &state.skills_cache, owner).await?,
    ))
}

/// POST /api/v1/skills
/// Creates the skill, or updates it when the body carries an `id`.
pub async fn handle_save_skill(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(form): Json<SkillForm>,
) -> Result<Json<SkillForm>, AppError> {
    Ok(Json(
        skills::save_skill(state.store.as_ref(), &state.skills_cache, owner, form).await?,
    ))
}

/// DELETE /api/v1/skills/:id
pub async fn handle_delete_skill(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    skills::delete_skill(
        state.store.as_ref(),
        &state.skills_cache,
        owner,
        &RecordKey::new(id),
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/skills/reorder
pub async fn handle_reorder_skills(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(req): Json<ReorderRequest>,
) -> Result<StatusCode, AppError> {
    skills::reorder_skills(state.store.as_ref(), &state.skills_cache, owner, &req.ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/skills/statistics
pub async fn handle_skill_statistics(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<SkillStatistics>, AppError> {
    Ok(Json(
        skills::skill_statistics(state.store.as_ref(), &state.skills_cache, owner).await?,
    ))
}

/// GET /api/v1/skills/category/:category
pub async fn handle_skills_by_category(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(category): Path<String>,
) -> Result<Json<Vec<SkillForm>>, AppError> {
    Ok(Json(
        skills::skills_by_category(state.store.as_ref(), &state.skills_cache, owner, &category)
            .await?,
    ))
}

// ── Job offers ────────────────────────────────────────────────────────────

/// GET /api/v1/job-offers
pub async fn handle_list_job_offers(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Vec<JobOfferForm>>, AppError> {
    Ok(Json(job_offers::list_job_offers(state.store.as_ref(), owner).await?))
}

/// GET /api/v1/job-offers/:id
pub async fn handle_get_job_offer(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<JobOfferForm>, AppError> {
    let key = RecordKey::new(id);
    Ok(Json(job_offers::get_job_offer(state.store.as_ref(), owner, &key).await?))
}

/// POST /api/v1/job-offers
pub async fn handle_create_job_offer(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(form): Json<JobOfferForm>,
) -> Result<(StatusCode, Json<JobOfferForm>), AppError> {
    let created = job_offers::create_job_offer(state.store.as_ref(), owner, form).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/v1/job-offers/:id
pub async fn handle_update_job_offer(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    Json(form): Json<JobOfferForm>,
) -> Result<Json<JobOfferForm>, AppError> {
    let key = RecordKey::new(id);
    Ok(Json(
        job_offers::update_job_offer(state.store.as_ref(), owner, &key, form).await?,
    ))
}

/// DELETE /api/v1/job-offers/:id
pub async fn handle_delete_job_offer(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    job_offers::delete_job_offer(state.store.as_ref(), owner, &RecordKey::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Personal info ─────────────────────────────────────────────────────────

/// GET /api/v1/personal-info
pub async fn handle_get_personal_info(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Record>, AppError> {
    Ok(Json(personal_info::get_personal_info(state.store.as_ref(), owner).await?))
}

/// PUT /api/v1/personal-info
pub async fn handle_save_personal_info(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(form): Json<Record>,
) -> Result<Json<Record>, AppError> {
    Ok(Json(
        personal_info::save_personal_info(state.store.as_ref(), owner, form).await?,
    ))
}
