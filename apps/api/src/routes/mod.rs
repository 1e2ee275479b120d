pub mod autosave;
pub mod dashboard;
pub mod health;
pub mod owner;
pub mod records;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Generic record API
        .route(
            "/api/v1/collections/:collection/records",
            get(records::handle_list_records).post(records::handle_create_record),
        )
        .route(
            "/api/v1/collections/:collection/records/:id",
            get(records::handle_get_record)
                .put(records::handle_update_record)
                .delete(records::handle_delete_record),
        )
        // Auto-save sessions
        .route("/api/v1/autosave/sessions", post(autosave::handle_open_session))
        .route(
            "/api/v1/autosave/sessions/:id",
            get(autosave::handle_session_status).delete(autosave::handle_close_session),
        )
        .route(
            "/api/v1/autosave/sessions/:id/data",
            get(autosave::handle_load_session_data),
        )
        .route(
            "/api/v1/autosave/sessions/:id/draft",
            put(autosave::handle_schedule_draft).delete(autosave::handle_cancel_draft),
        )
        .route(
            "/api/v1/autosave/sessions/:id/save",
            post(autosave::handle_save_now),
        )
        .route(
            "/api/v1/autosave/sessions/:id/flush",
            post(autosave::handle_flush),
        )
        .route("/api/v1/notifications", get(dashboard::handle_notifications))
        // Categories
        .route(
            "/api/v1/categories",
            get(dashboard::handle_list_categories).post(dashboard::handle_create_category),
        )
        .route(
            "/api/v1/categories/reorder",
            post(dashboard::handle_reorder_categories),
        )
        .route(
            "/api/v1/categories/:id",
            get(dashboard::handle_get_category)
                .put(dashboard::handle_update_category)
                .delete(dashboard::handle_delete_category),
        )
        // Skills
        .route(
            "/api/v1/skills",
            get(dashboard::handle_list_skills).post(dashboard::handle_save_skill),
        )
        .route("/api/v1/skills/reorder", post(dashboard::handle_reorder_skills))
        .route(
            "/api/v1/skills/statistics",
            get(dashboard::handle_skill_statistics),
        )
        .route(
            "/api/v1/skills/category/:category",
            get(dashboard::handle_skills_by_category),
        )
        .route("/api/v1/skills/:id", delete(dashboard::handle_delete_skill))
        // Job offers
        .route(
            "/api/v1/job-offers",
            get(dashboard::handle_list_job_offers).post(dashboard::handle_create_job_offer),
        )
        .route(
            "/api/v1/job-offers/:id",
            get(dashboard::handle_get_job_offer)
                .put(dashboard::handle_update_job_offer)
                .delete(dashboard::handle_delete_job_offer),
        )
        // Personal info
        .route(
            "/api/v1/personal-info",
            get(dashboard::handle_get_personal_info).put(dashboard::handle_save_personal_info),
        )
        .with_state(state)
}
