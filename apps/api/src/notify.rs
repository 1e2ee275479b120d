use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use crate::store::OwnerId;

/// Sink for transient, user-visible failure messages (the dashboard's toast).
pub trait Notifier: Send + Sync {
    fn notify_failure(&self, owner: OwnerId, message: &str);
}

/// Logs notifications only.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_failure(&self, owner: OwnerId, message: &str) {
        warn!(%owner, "{message}");
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Keeps the most recent notifications per owner so the dashboard can poll
/// them. Oldest entries are dropped once `capacity` is reached.
pub struct NotificationLog {
    capacity: usize,
    entries: Mutex<HashMap<OwnerId, VecDeque<Notification>>>,
}

impl NotificationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Newest first.
    pub fn recent(&self, owner: OwnerId) -> Vec<Notification> {
        self.entries
            .lock()
            .get(&owner)
            .map(|queue| queue.iter().rev().cloned().collect())
            .unwrap_or_default()
    }
}

impl Notifier for NotificationLog {
    fn notify_failure(&self, owner: OwnerId, message: &str) {
        warn!(%owner, "{message}");
        let mut entries = self.entries.lock();
        let queue = entries.entry(owner).or_default();
        if queue.len() == self.capacity {
            queue.pop_front();
        }
        queue.push_back(Notification {
            message: message.to_string(),
            created_at: Utc::now(),
        });
    }
}
