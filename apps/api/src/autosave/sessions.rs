use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use super::{AutoSaveCoordinator, AutoSaveError};
use crate::notify::Notifier;
use crate::store::{OwnerId, RecordKey, RecordStore};

pub type SessionId = Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Unknown editing session {0}")]
    Unknown(SessionId),

    #[error("Editing session {0} belongs to another user")]
    ForeignOwner(SessionId),

    #[error(transparent)]
    Invalid(#[from] AutoSaveError),
}

/// What a session's saves have produced so far, for the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionActivity {
    pub last_saved_id: Option<RecordKey>,
    pub last_saved_at: Option<DateTime<Utc>>,
    /// Cleared by the next successful save.
    pub last_error: Option<String>,
}

struct Session {
    coordinator: Arc<AutoSaveCoordinator>,
    activity: Arc<Mutex<SessionActivity>>,
    last_access: Instant,
}

type SavedHook = Arc<dyn Fn(&str, OwnerId) + Send + Sync>;

/// Open editing sessions, one coordinator each.
///
/// A session is bound to the owner that opened it; every lookup checks the
/// caller against it. Closing a session, or leaving it untouched for longer
/// than the idle timeout, cancels its pending save.
pub struct SessionRegistry {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    quiet_period: Duration,
    idle_timeout: Duration,
    on_saved: Option<SavedHook>,
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        quiet_period: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            quiet_period,
            idle_timeout,
            on_saved: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Runs after every successful session save with the collection and owner.
    pub fn on_saved(mut self, hook: impl Fn(&str, OwnerId) + Send + Sync + 'static) -> Self {
        self.on_saved = Some(Arc::new(hook));
        self
    }

    pub fn open(&self, owner: OwnerId, collection: &str) -> Result<SessionId, SessionError> {
        self.evict_idle();

        let activity = Arc::new(Mutex::new(SessionActivity::default()));
        let on_saved = Arc::clone(&activity);
        let on_failed = Arc::clone(&activity);
        let hook = self.on_saved.clone();

        let record_collection = collection.to_string();

        let coordinator = AutoSaveCoordinator::builder(collection, owner, self.store.clone())
            .quiet_period(self.quiet_period)
            .notifier(self.notifier.clone())
            .on_success(move |record| {
                let mut activity = on_saved.lock();
                activity.last_saved_id = Some(record.id.clone());
                activity.last_saved_at = Some(record.updated_at);
                activity.last_error = None;
                drop(activity);
                if let Some(hook) = &hook {
                    hook(&record_collection, record.owner_id);
                }
            })
            .on_error(move |err| on_failed.lock().last_error = Some(err.to_string()))
            .build()?;

        let id = Uuid::new_v4();
        let open = {
            let mut sessions = self.sessions.lock();
            sessions.insert(
                id,
                Session {
                    coordinator: Arc::new(coordinator),
                    activity,
                    last_access: Instant::now(),
                },
            );
            sessions.len()
        };
        info!("Opened editing session {id} on {collection} for {owner} ({open} open)");
        Ok(id)
    }

    fn with_session<T>(
        &self,
        owner: OwnerId,
        id: SessionId,
        f: impl FnOnce(&Session) -> T,
    ) -> Result<T, SessionError> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(&id).ok_or(SessionError::Unknown(id))?;
        if session.coordinator.owner() != owner {
            return Err(SessionError::ForeignOwner(id));
        }
        session.last_access = Instant::now();
        Ok(f(session))
    }

    pub fn get(&self, owner: OwnerId, id: SessionId) -> Result<Arc<AutoSaveCoordinator>, SessionError> {
        self.evict_idle();
        self.with_session(owner, id, |session| session.coordinator.clone())
    }

    pub fn activity(&self, owner: OwnerId, id: SessionId) -> Result<SessionActivity, SessionError> {
        self.with_session(owner, id, |session| session.activity.lock().clone())
    }

    pub fn close(&self, owner: OwnerId, id: SessionId) -> Result<(), SessionError> {
        self.with_session(owner, id, |_| ())?;
        if let Some(session) = self.sessions.lock().remove(&id) {
            // In-flight requests may still hold the coordinator.
            session.coordinator.cancel_pending_save();
        }
        info!("Closed editing session {id}");
        Ok(())
    }

    /// Drops sessions nobody has touched within the idle timeout. A client
    /// that navigates away without closing its session ends up here.
    fn evict_idle(&self) {
        let now = Instant::now();
        let expired: Vec<(SessionId, Session)> = {
            let mut sessions = self.sessions.lock();
            let stale: Vec<SessionId> = sessions
                .iter()
                .filter(|(_, session)| now.duration_since(session.last_access) >= self.idle_timeout)
                .map(|(id, _)| *id)
                .collect();
            stale
                .into_iter()
                .filter_map(|id| sessions.remove(&id).map(|session| (id, session)))
                .collect()
        };
        for (id, session) in expired {
            let discarded = session.coordinator.cancel_pending_save();
            info!("Expired idle editing session {id} (pending draft discarded: {discarded})");
        }
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::TracingNotifier;
    use crate::store::InMemoryRecordStore;
    use serde_json::json;

    fn registry(store: Arc<InMemoryRecordStore>) -> SessionRegistry {
        SessionRegistry::new(
            store,
            Arc::new(TracingNotifier),
            Duration::from_millis(2000),
            Duration::from_secs(1800),
        )
    }

    fn draft(title: &str) -> crate::store::Record {
        json!({ "title": title }).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_session_is_owner_bound() {
        let reg = registry(Arc::new(InMemoryRecordStore::new()));
        let owner = Uuid::new_v4();
        let id = reg.open(owner, "cvs").unwrap();

        assert_eq!(reg.get(owner, id).unwrap().collection(), "cvs");
        assert_eq!(
            reg.get(Uuid::new_v4(), id).err(),
            Some(SessionError::ForeignOwner(id))
        );
        assert_eq!(
            reg.close(Uuid::new_v4(), id),
            Err(SessionError::ForeignOwner(id))
        );
        assert_eq!(reg.open_sessions(), 1);
    }

    #[tokio::test]
    async fn test_open_rejects_blank_collection() {
        let reg = registry(Arc::new(InMemoryRecordStore::new()));
        assert_eq!(
            reg.open(Uuid::new_v4(), ""),
            Err(SessionError::Invalid(AutoSaveError::InvalidCollection))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_save() {
        let store = Arc::new(InMemoryRecordStore::new());
        let reg = registry(store.clone());
        let owner = Uuid::new_v4();
        let id = reg.open(owner, "cvs").unwrap();

        let scheduled = reg
            .get(owner, id)
            .unwrap()
            .schedule_save(json!({"title": "draft"}).as_object().cloned().unwrap());
        reg.close(owner, id).unwrap();

        assert!(scheduled.outcome().await.is_none());
        assert_eq!(reg.get(owner, id).err(), Some(SessionError::Unknown(id)));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(store.list_records("cvs", owner).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_save_scheduled_through_held_handle() {
        let store = Arc::new(InMemoryRecordStore::new());
        let reg = registry(store.clone());
        let owner = Uuid::new_v4();
        let id = reg.open(owner, "cvs").unwrap();

        let held = reg.get(owner, id).unwrap();
        let scheduled = held.schedule_save(draft("draft"));
        reg.close(owner, id).unwrap();

        assert!(!held.has_pending_save());
        assert!(scheduled.outcome().await.is_none());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(store.list_records("cvs", owner).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_expires_and_drops_its_draft() {
        let store = Arc::new(InMemoryRecordStore::new());
        let reg = SessionRegistry::new(
            store.clone(),
            Arc::new(TracingNotifier),
            Duration::from_secs(2),
            Duration::from_secs(1),
        );
        let owner = Uuid::new_v4();
        let idle = reg.open(owner, "cvs").unwrap();
        let scheduled = reg.get(owner, idle).unwrap().schedule_save(draft("draft"));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let fresh = reg.open(owner, "job_offers").unwrap();

        assert_eq!(reg.open_sessions(), 1);
        assert_eq!(reg.get(owner, idle).err(), Some(SessionError::Unknown(idle)));
        assert!(reg.get(owner, fresh).is_ok());
        assert!(scheduled.outcome().await.is_none());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(store.list_records("cvs", owner).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_touched_session_stays_open() {
        let reg = SessionRegistry::new(
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(TracingNotifier),
            Duration::from_secs(2),
            Duration::from_secs(10),
        );
        let owner = Uuid::new_v4();
        let id = reg.open(owner, "cvs").unwrap();

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_secs(6)).await;
            assert!(reg.get(owner, id).is_ok());
        }
        assert_eq!(reg.open_sessions(), 1);
    }

    #[tokio::test]
    async fn test_saved_hook_sees_collection_and_owner() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reg = registry(Arc::new(InMemoryRecordStore::new()))
            .on_saved(move |collection, owner| sink.lock().push((collection.to_string(), owner)));
        let owner = Uuid::new_v4();
        let id = reg.open(owner, "technical_skills").unwrap();

        reg.get(owner, id)
            .unwrap()
            .save_now(Some(draft("Rust")))
            .await
            .unwrap();
        assert_eq!(*seen.lock(), vec![("technical_skills".to_string(), owner)]);
    }

    #[tokio::test]
    async fn test_activity_tracks_last_save_and_error() {
        let store = Arc::new(InMemoryRecordStore::new());
        let reg = registry(store.clone());
        let owner = Uuid::new_v4();
        let id = reg.open(owner, "cvs").unwrap();
        let session = reg.get(owner, id).unwrap();

        let saved = session
            .save_now(json!({"title": "CV"}).as_object().cloned())
            .await
            .unwrap();
        let activity = reg.activity(owner, id).unwrap();
        assert_eq!(activity.last_saved_id, Some(saved.id.clone()));
        assert_eq!(activity.last_error, None);

        let missing = json!({"id": "gone", "title": "CV"}).as_object().cloned();
        assert!(session.save_now(missing).await.is_err());
        let activity = reg.activity(owner, id).unwrap();
        assert_eq!(activity.last_saved_id, Some(saved.id));
        assert!(activity.last_error.unwrap().contains("gone"));
        assert_eq!(
            reg.activity(Uuid::new_v4(), id),
            Err(SessionError::ForeignOwner(id))
        );
    }
}
