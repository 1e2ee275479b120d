use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::{AutoSaveError, Loaded, SaveOutcome};
use crate::notify::{Notifier, TracingNotifier};
use crate::store::{OwnerId, PersistedRecord, Record, RecordKey, RecordStore};

/// Quiet period used by the CV editing forms.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(2000);

type SuccessCallback = Box<dyn Fn(&PersistedRecord) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&AutoSaveError) + Send + Sync>;

/// A save waiting for its quiet period to elapse.
struct Pending {
    generation: u64,
    record: Record,
    reply: oneshot::Sender<SaveOutcome>,
    timer: AbortHandle,
}

struct Shared {
    collection: String,
    owner: OwnerId,
    store: Arc<dyn RecordStore>,
    quiet_period: Duration,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
    notifier: Arc<dyn Notifier>,
    pending: Mutex<Option<Pending>>,
    /// Bumped on every schedule, cancel and flush. A fired timer only saves
    /// if the pending slot still carries its generation.
    generation: AtomicU64,
    /// Held for the duration of every store write: writes never overlap.
    save_gate: tokio::sync::Mutex<()>,
    saving: AtomicBool,
}

/// Clears the in-flight flag even if the save future is dropped mid-call.
struct SavingFlag<'a>(&'a AtomicBool);

impl<'a> SavingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        SavingFlag(flag)
    }
}

impl Drop for SavingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Shared {
    async fn save(&self, record: Option<Record>) -> SaveOutcome {
        let record = match record {
            Some(record) if !record.is_empty() => record,
            _ => {
                let err = AutoSaveError::MissingData;
                self.report_save_failure(&err);
                return Err(err);
            }
        };

        let result = {
            let _gate = self.save_gate.lock().await;
            let _flag = SavingFlag::raise(&self.saving);
            match RecordKey::from_record(&record) {
                Some(key) => {
                    debug!("autosave: updating {}/{}", self.collection, key);
                    self.store
                        .update_record(&self.collection, self.owner, &key, record)
                        .await
                }
                None => {
                    debug!("autosave: creating record in {}", self.collection);
                    self.store
                        .create_record(&self.collection, self.owner, record)
                        .await
                }
            }
        };

        match result {
            Ok(persisted) => {
                info!("autosave: saved {}/{}", self.collection, persisted.id);
                if let Some(on_success) = &self.on_success {
                    on_success(&persisted);
                }
                Ok(persisted)
            }
            Err(err) => {
                let err = AutoSaveError::from(err);
                self.report_save_failure(&err);
                Err(err)
            }
        }
    }

    fn report_save_failure(&self, err: &AutoSaveError) {
        if let Some(on_error) = &self.on_error {
            on_error(err);
        }
        warn!("autosave: save in {} failed: {err}", self.collection);
        self.notifier
            .notify_failure(self.owner, &format!("Save failed: {err}"));
    }

    /// Runs when a timer's quiet period has elapsed.
    async fn fire(&self, generation: u64) {
        let fired = {
            let mut pending = self.pending.lock();
            match pending.as_ref() {
                Some(p) if p.generation == generation => pending.take(),
                _ => None,
            }
        };
        let Some(Pending { record, reply, .. }) = fired else {
            debug!("autosave: timer {generation} superseded");
            return;
        };

        let outcome = self.save(Some(record)).await;
        // The caller may have dropped its `ScheduledSave`.
        let _ = reply.send(outcome);
    }

    fn take_pending(&self) -> Option<Pending> {
        let taken = self.pending.lock().take();
        if let Some(pending) = &taken {
            self.generation.fetch_add(1, Ordering::SeqCst);
            pending.timer.abort();
        }
        taken
    }
}

/// Deferred result of `AutoSaveCoordinator::schedule_save`.
///
/// Yields `None` when the schedule is abandoned: superseded by a later
/// schedule, cancelled, or the coordinator was dropped before the timer fired.
#[must_use = "dropping a ScheduledSave does not cancel the save"]
pub struct ScheduledSave {
    rx: oneshot::Receiver<SaveOutcome>,
}

impl ScheduledSave {
    pub async fn outcome(self) -> Option<SaveOutcome> {
        self.rx.await.ok()
    }
}

pub struct AutoSaveBuilder {
    collection: String,
    owner: OwnerId,
    store: Arc<dyn RecordStore>,
    quiet_period: Duration,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl AutoSaveBuilder {
    pub fn quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    pub fn on_success(
        mut self,
        callback: impl Fn(&PersistedRecord) + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&AutoSaveError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> Result<AutoSaveCoordinator, AutoSaveError> {
        let collection = self.collection.trim().to_string();
        if collection.is_empty() {
            return Err(AutoSaveError::InvalidCollection);
        }
        Ok(AutoSaveCoordinator {
            shared: Arc::new(Shared {
                collection,
                owner: self.owner,
                store: self.store,
                quiet_period: self.quiet_period,
                on_success: self.on_success,
                on_error: self.on_error,
                notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
                pending: Mutex::new(None),
                generation: AtomicU64::new(0),
                save_gate: tokio::sync::Mutex::new(()),
                saving: AtomicBool::new(false),
            }),
        })
    }
}

/// Debounces edits of one collection into deferred store writes.
///
/// One instance per editing session. At most one save is pending at a time;
/// scheduling replaces it. Store writes issued by one coordinator are
/// serialised: a timer firing during an in-flight write waits for it to
/// settle before issuing its own. Dropping the coordinator cancels the
/// pending save but not an in-flight one.
pub struct AutoSaveCoordinator {
    shared: Arc<Shared>,
}

impl AutoSaveCoordinator {
    pub fn builder(
        collection: impl Into<String>,
        owner: OwnerId,
        store: Arc<dyn RecordStore>,
    ) -> AutoSaveBuilder {
        AutoSaveBuilder {
            collection: collection.into(),
            owner,
            store,
            quiet_period: DEFAULT_QUIET_PERIOD,
            on_success: None,
            on_error: None,
            notifier: None,
        }
    }

    pub fn collection(&self) -> &str {
        &self.shared.collection
    }

    pub fn owner(&self) -> OwnerId {
        self.shared.owner
    }

    pub fn quiet_period(&self) -> Duration {
        self.shared.quiet_period
    }

    pub fn is_saving(&self) -> bool {
        self.shared.saving.load(Ordering::SeqCst)
    }

    pub fn has_pending_save(&self) -> bool {
        self.shared.pending.lock().is_some()
    }

    /// Saves `record` once the quiet period passes without another call.
    ///
    /// The snapshot is taken now; later edits need a fresh call. Must be
    /// called from within a tokio runtime.
    pub fn schedule_save(&self, record: Record) -> ScheduledSave {
        let (reply, rx) = oneshot::channel();
        let mut pending = self.shared.pending.lock();
        if let Some(previous) = pending.take() {
            previous.timer.abort();
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let shared = Arc::clone(&self.shared);
        // The slot lock is held until the pending entry is in place, so the
        // timer can never observe an empty slot for its own generation.
        let timer = tokio::spawn(async move {
            tokio::time::sleep(shared.quiet_period).await;
            shared.fire(generation).await;
        });

        *pending = Some(Pending {
            generation,
            record,
            reply,
            timer: timer.abort_handle(),
        });
        debug!(
            "autosave: scheduled save {generation} on {} in {:?}",
            self.shared.collection, self.shared.quiet_period
        );
        ScheduledSave { rx }
    }

    /// Writes `record` immediately: update when it carries an `id`, create
    /// otherwise. `None` or an empty record fails without touching the store.
    pub async fn save_now(&self, record: Option<Record>) -> SaveOutcome {
        self.shared.save(record).await
    }

    /// Runs the pending save right away instead of waiting for its timer.
    /// The matching `ScheduledSave` receives the same outcome.
    pub async fn flush(&self) -> Option<SaveOutcome> {
        let Pending { record, reply, .. } = self.shared.take_pending()?;
        let outcome = self.shared.save(Some(record)).await;
        let _ = reply.send(outcome.clone());
        Some(outcome)
    }

    /// Drops the pending save, if any. Never touches an in-flight write.
    /// Returns whether a save was pending.
    pub fn cancel_pending_save(&self) -> bool {
        let cancelled = self.shared.take_pending().is_some();
        if cancelled {
            debug!("autosave: cancelled pending save on {}", self.shared.collection);
        }
        cancelled
    }

    /// Loads one record by key, or the whole collection newest first.
    pub async fn load_data(&self, key: Option<RecordKey>) -> Result<Loaded, AutoSaveError> {
        let shared = &self.shared;
        let result = match key {
            Some(key) => shared
                .store
                .get_record(&shared.collection, shared.owner, &key)
                .await
                .map(Loaded::One),
            None => shared
                .store
                .list_records(&shared.collection, shared.owner)
                .await
                .map(Loaded::Many),
        };

        result.map_err(|err| {
            let err = AutoSaveError::from(err);
            warn!("autosave: load from {} failed: {err}", shared.collection);
            shared
                .notifier
                .notify_failure(shared.owner, &format!("Load failed: {err}"));
            err
        })
    }
}

impl Drop for AutoSaveCoordinator {
    fn drop(&mut self) {
        self.shared.take_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryRecordStore, StoreError};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;
    use tokio::time::Instant;
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create(Record),
        Update(RecordKey, Record),
    }

    /// Wraps the in-memory store, recording every write with its virtual
    /// timestamp. Optionally delays or rejects writes.
    struct RecordingStore {
        inner: InMemoryRecordStore,
        calls: Mutex<Vec<(Instant, Call)>>,
        delay: Duration,
        reject: Option<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                inner: InMemoryRecordStore::new(),
                calls: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                reject: None,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn rejecting(message: &str) -> Self {
            Self {
                reject: Some(message.to_string()),
                ..Self::new()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        fn calls(&self) -> Vec<(Instant, Call)> {
            self.calls.lock().clone()
        }

        async fn write<F>(&self, call: Call, op: F) -> Result<PersistedRecord, StoreError>
        where
            F: std::future::Future<Output = Result<PersistedRecord, StoreError>>,
        {
            self.calls.lock().push((Instant::now(), call));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let result = match &self.reject {
                Some(message) => Err(StoreError::Rejected(message.clone())),
                None => op.await,
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[async_trait]
    impl RecordStore for RecordingStore {
        async fn create_record(
            &self,
            collection: &str,
            owner: OwnerId,
            data: Record,
        ) -> Result<PersistedRecord, StoreError> {
            self.write(
                Call::Create(data.clone()),
                self.inner.create_record(collection, owner, data),
            )
            .await
        }

        async fn update_record(
            &self,
            collection: &str,
            owner: OwnerId,
            key: &RecordKey,
            data: Record,
        ) -> Result<PersistedRecord, StoreError> {
            self.write(
                Call::Update(key.clone(), data.clone()),
                self.inner.update_record(collection, owner, key, data),
            )
            .await
        }

        async fn get_record(
            &self,
            collection: &str,
            owner: OwnerId,
            key: &RecordKey,
        ) -> Result<PersistedRecord, StoreError> {
            self.inner.get_record(collection, owner, key).await
        }

        async fn list_records(
            &self,
            collection: &str,
            owner: OwnerId,
        ) -> Result<Vec<PersistedRecord>, StoreError> {
            self.inner.list_records(collection, owner).await
        }

        async fn delete_record(
            &self,
            collection: &str,
            owner: OwnerId,
            key: &RecordKey,
        ) -> Result<(), StoreError> {
            self.inner.delete_record(collection, owner, key).await
        }
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn coordinator(store: &Arc<RecordingStore>) -> AutoSaveCoordinator {
        AutoSaveCoordinator::builder("cvs", Uuid::new_v4(), store.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_collection_is_rejected() {
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
        let result = AutoSaveCoordinator::builder("  ", Uuid::new_v4(), store).build();
        assert!(matches!(result, Err(AutoSaveError::InvalidCollection)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_save_of_last_snapshot() {
        let store = Arc::new(RecordingStore::new());
        let coordinator = coordinator(&store);
        let start = Instant::now();

        let first = coordinator.schedule_save(record(json!({"title": "A"})));
        tokio::time::sleep(Duration::from_millis(500)).await;
        let second = coordinator.schedule_save(record(json!({"title": "B"})));

        let outcome = second.outcome().await.expect("latest schedule settles");
        assert_eq!(outcome.unwrap().data, record(json!({"title": "B"})));
        assert!(first.outcome().await.is_none());

        let calls = store.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, Call::Create(record(json!({"title": "B"}))));
        let fired_after = calls[0].0 - start;
        assert!(
            fired_after >= Duration::from_millis(2500) && fired_after < Duration::from_millis(2510),
            "store called after {fired_after:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_is_taken_at_schedule_time() {
        let store = Arc::new(RecordingStore::new());
        let coordinator = coordinator(&store);

        let mut draft = record(json!({"title": "before"}));
        let scheduled = coordinator.schedule_save(draft.clone());
        draft.insert("title".to_string(), json!("after"));

        let saved = scheduled.outcome().await.unwrap().unwrap();
        assert_eq!(saved.data["title"], json!("before"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_store_call() {
        let store = Arc::new(RecordingStore::new());
        let coordinator = coordinator(&store);

        let scheduled = coordinator.schedule_save(record(json!({"title": "A"})));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(coordinator.has_pending_save());
        assert!(coordinator.cancel_pending_save());
        assert!(!coordinator.has_pending_save());

        assert!(scheduled.outcome().await.is_none());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(store.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_without_pending_is_noop() {
        let store = Arc::new(RecordingStore::new());
        let coordinator = coordinator(&store);
        assert!(!coordinator.cancel_pending_save());
        assert!(!coordinator.cancel_pending_save());
    }

    #[tokio::test]
    async fn test_save_now_branches_on_identifier() {
        let store = Arc::new(RecordingStore::new());
        let owner = Uuid::new_v4();
        store
            .inner
            .create_record("cvs", owner, record(json!({"id": "42", "title": "old"})))
            .await
            .unwrap();
        let coordinator = AutoSaveCoordinator::builder("cvs", owner, store.clone())
            .build()
            .unwrap();

        coordinator
            .save_now(Some(record(json!({"title": "X"}))))
            .await
            .unwrap();
        coordinator
            .save_now(Some(record(json!({"id": "42", "title": "X"}))))
            .await
            .unwrap();

        let calls: Vec<Call> = store.calls().into_iter().map(|(_, c)| c).collect();
        assert_eq!(
            calls,
            vec![
                Call::Create(record(json!({"title": "X"}))),
                Call::Update(RecordKey::from("42"), record(json!({"id": "42", "title": "X"}))),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_data_fails_without_store_call() {
        let store = Arc::new(RecordingStore::new());
        let errors = Arc::new(AtomicUsize::new(0));
        let seen = errors.clone();
        let coordinator = AutoSaveCoordinator::builder("cvs", Uuid::new_v4(), store.clone())
            .on_error(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        assert_eq!(coordinator.save_now(None).await, Err(AutoSaveError::MissingData));
        assert_eq!(
            coordinator.save_now(Some(Record::new())).await,
            Err(AutoSaveError::MissingData)
        );
        assert!(store.calls().is_empty());
        assert_eq!(errors.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_success_returns_generated_id_and_calls_back_once() {
        let store = Arc::new(RecordingStore::new());
        let successes = Arc::new(Mutex::new(Vec::<PersistedRecord>::new()));
        let seen = successes.clone();
        let coordinator = AutoSaveCoordinator::builder("cvs", Uuid::new_v4(), store.clone())
            .on_success(move |saved| seen.lock().push(saved.clone()))
            .build()
            .unwrap();

        let saved = coordinator
            .save_now(Some(record(json!({"title": "X"}))))
            .await
            .unwrap();
        assert!(!saved.id.as_str().is_empty());
        assert_eq!(saved.data, record(json!({"title": "X"})));

        let successes = successes.lock();
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0], saved);
    }

    #[tokio::test]
    async fn test_failure_reports_error_and_clears_saving_flag() {
        let store = Arc::new(RecordingStore::rejecting("constraint violation"));
        let errors = Arc::new(AtomicUsize::new(0));
        let seen = errors.clone();
        let log = Arc::new(crate::notify::NotificationLog::new(10));
        let owner = Uuid::new_v4();
        let coordinator = AutoSaveCoordinator::builder("cvs", owner, store.clone())
            .on_error(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .notifier(log.clone())
            .build()
            .unwrap();

        let outcome = coordinator.save_now(Some(record(json!({"title": ""})))).await;
        match outcome {
            Err(AutoSaveError::Store(message)) => assert!(message.contains("constraint violation")),
            other => panic!("expected store error, got {other:?}"),
        }
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_saving());

        let notes = log.recent(owner);
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.contains("constraint violation"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_saving_only_while_in_flight() {
        let store = Arc::new(RecordingStore::slow(Duration::from_secs(1)));
        let coordinator = Arc::new(coordinator(&store));
        assert!(!coordinator.is_saving());

        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.save_now(Some(record(json!({"a": 1})))).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(coordinator.is_saving());

        task.await.unwrap().unwrap();
        assert!(!coordinator.is_saving());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_saves_are_serialised() {
        let store = Arc::new(RecordingStore::slow(Duration::from_secs(1)));
        let coordinator = coordinator(&store);
        let start = Instant::now();

        let (a, b) = tokio::join!(
            coordinator.save_now(Some(record(json!({"n": 1})))),
            coordinator.save_now(Some(record(json!({"n": 2})))),
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(Instant::now() - start >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_firing_during_in_flight_save_waits_for_it() {
        let store = Arc::new(RecordingStore::slow(Duration::from_secs(3)));
        let coordinator = Arc::new(coordinator(&store));

        let first = coordinator.schedule_save(record(json!({"n": 1})));
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(coordinator.is_saving());
        let second = coordinator.schedule_save(record(json!({"n": 2})));

        assert!(first.outcome().await.unwrap().is_ok());
        assert!(second.outcome().await.unwrap().is_ok());
        assert_eq!(store.calls().len(), 2);
        assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_saves_pending_immediately() {
        let store = Arc::new(RecordingStore::new());
        let coordinator = coordinator(&store);
        let start = Instant::now();

        let scheduled = coordinator.schedule_save(record(json!({"title": "now"})));
        let flushed = coordinator.flush().await.expect("a save was pending");
        let flushed = flushed.unwrap();
        assert_eq!(scheduled.outcome().await, Some(Ok(flushed)));
        assert_eq!(store.calls()[0].0, start);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.calls().len(), 1);
        assert!(coordinator.flush().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_timer() {
        let store = Arc::new(RecordingStore::new());
        let scheduled = {
            let coordinator = coordinator(&store);
            coordinator.schedule_save(record(json!({"title": "lost"})))
        };
        assert!(scheduled.outcome().await.is_none());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_load_data_one_many_and_not_found() {
        let store = Arc::new(RecordingStore::new());
        let coordinator = coordinator(&store);
        let a = coordinator
            .save_now(Some(record(json!({"title": "a"}))))
            .await
            .unwrap();
        let b = coordinator
            .save_now(Some(record(json!({"title": "b"}))))
            .await
            .unwrap();

        match coordinator.load_data(Some(a.id.clone())).await.unwrap() {
            Loaded::One(found) => assert_eq!(found, a),
            other => panic!("expected one record, got {other:?}"),
        }
        match coordinator.load_data(None).await.unwrap() {
            Loaded::Many(all) => assert_eq!(all, vec![b, a]),
            other => panic!("expected list, got {other:?}"),
        }
        assert!(matches!(
            coordinator.load_data(Some(RecordKey::from("missing"))).await,
            Err(AutoSaveError::NotFound { .. })
        ));
    }
}
