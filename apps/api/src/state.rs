use std::sync::Arc;

use crate::autosave::SessionRegistry;
use crate::config::Config;
use crate::notify::NotificationLog;
use crate::services::skills::SkillsCache;
use crate::store::RecordStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub config: Config,
    pub skills_cache: Arc<SkillsCache>,
    /// Failure notifications raised by auto-save sessions, per user.
    pub notifications: Arc<NotificationLog>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, config: Config) -> Self {
        let notifications = Arc::new(NotificationLog::new(config.notification_history));
        let skills_cache = Arc::new(SkillsCache::new(config.skills_cache_ttl));
        let saved_skills = skills_cache.clone();
        let sessions = Arc::new(
            SessionRegistry::new(
                store.clone(),
                notifications.clone(),
                config.autosave_quiet_period,
                config.autosave_session_idle,
            )
            .on_saved(move |collection, owner| saved_skills.invalidate_for(collection, owner)),
        );
        AppState {
            skills_cache,
            store,
            config,
            notifications,
            sessions,
        }
    }
}
