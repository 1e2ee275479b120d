//! Record Store: owner-scoped create/read/update/delete on named collections.
//!
//! Every persisted entity in the dashboard (CV content, personal info, job
//! offers, categories, skills) is a JSON object stored under a collection
//! name. The store never interprets the data beyond the `id` field, which
//! lives on the row rather than inside the payload.
//!
//! `AppState` holds an `Arc<dyn RecordStore>`: `PgRecordStore` in production,
//! `InMemoryRecordStore` for tests and database-less local runs.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRecordStore;
pub use postgres::PgRecordStore;

/// One entity's fields, keyed by field name.
pub type Record = Map<String, Value>;

/// Identifier of the authenticated user owning a record.
pub type OwnerId = Uuid;

/// Field carrying the record identifier in form and row payloads.
pub const ID_FIELD: &str = "id";

/// Opaque record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(key: impl Into<String>) -> Self {
        RecordKey(key.into())
    }

    pub fn generate() -> Self {
        RecordKey(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads the identifier of a record. Absent, null and empty ids mean
    /// "not persisted yet". Numeric ids are accepted and rendered as text.
    pub fn from_record(record: &Record) -> Option<Self> {
        match record.get(ID_FIELD)? {
            Value::String(s) if !s.trim().is_empty() => Some(RecordKey(s.trim().to_string())),
            Value::Number(n) => Some(RecordKey(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        RecordKey(s.to_string())
    }
}

/// A record as returned by the store after a successful write or read.
///
/// Serialises flat: payload fields sit next to `id`, `created_at` and
/// `updated_at`, the row shape the dashboard reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedRecord {
    pub id: RecordKey,
    #[serde(skip)]
    pub owner_id: OwnerId,
    #[serde(flatten)]
    pub data: Record,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersistedRecord {
    /// The payload with the row id folded back in, ready for form transforms.
    pub fn to_record(&self) -> Record {
        let mut record = self.data.clone();
        record.insert(ID_FIELD.to_string(), Value::String(self.id.to_string()));
        record
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No record '{key}' in collection '{collection}'")]
    NotFound { collection: String, key: RecordKey },

    #[error("Record rejected: {0}")]
    Rejected(String),

    #[error("Database error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("Stored data is not a JSON object: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn not_found(collection: &str, key: &RecordKey) -> Self {
        StoreError::NotFound {
            collection: collection.to_string(),
            key: key.clone(),
        }
    }
}

/// Owner-scoped persistence for dashboard collections.
///
/// Implementations must strip the `id` field from incoming data (the key is
/// kept on the row) and return lists newest first.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_record(
        &self,
        collection: &str,
        owner: OwnerId,
        data: Record,
    ) -> Result<PersistedRecord, StoreError>;

    /// Replaces the stored payload of an existing record.
    async fn update_record(
        &self,
        collection: &str,
        owner: OwnerId,
        key: &RecordKey,
        data: Record,
    ) -> Result<PersistedRecord, StoreError>;

    async fn get_record(
        &self,
        collection: &str,
        owner: OwnerId,
        key: &RecordKey,
    ) -> Result<PersistedRecord, StoreError>;

    /// All of the owner's records in `collection`, newest first.
    async fn list_records(
        &self,
        collection: &str,
        owner: OwnerId,
    ) -> Result<Vec<PersistedRecord>, StoreError>;

    async fn delete_record(
        &self,
        collection: &str,
        owner: OwnerId,
        key: &RecordKey,
    ) -> Result<(), StoreError>;
}

/// Splits a write payload into its (optional) key and the data to store.
pub(crate) fn split_key(mut data: Record) -> (Option<RecordKey>, Record) {
    let key = RecordKey::from_record(&data);
    data.remove(ID_FIELD);
    (key, data)
}
