//! Auto-save: debounced persistence for open editing forms.
//!
//! An `AutoSaveCoordinator` turns a burst of "content changed" notifications
//! into one store write per quiet period. `SessionRegistry` keeps one
//! coordinator per open editing session for the HTTP layer.

use serde::Serialize;
use thiserror::Error;

use crate::store::{PersistedRecord, RecordKey, StoreError};

pub mod coordinator;
pub mod sessions;

pub use coordinator::AutoSaveCoordinator;
pub use sessions::{SessionActivity, SessionId, SessionRegistry};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AutoSaveError {
    #[error("Missing data to save")]
    MissingData,

    #[error("Collection name must not be empty")]
    InvalidCollection,

    #[error("No record '{key}' in collection '{collection}'")]
    NotFound { collection: String, key: RecordKey },

    #[error("{0}")]
    Store(String),
}

impl From<StoreError> for AutoSaveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, key } => AutoSaveError::NotFound { collection, key },
            other => AutoSaveError::Store(other.to_string()),
        }
    }
}

/// Result of one save cycle. Failures are values, never panics or
/// propagated errors past the coordinator.
pub type SaveOutcome = Result<PersistedRecord, AutoSaveError>;

/// Result shape of `AutoSaveCoordinator::load_data`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Loaded {
    One(PersistedRecord),
    Many(Vec<PersistedRecord>),
}
