use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    split_key, OwnerId, PersistedRecord, Record, RecordKey, RecordStore, StoreError,
};

#[derive(Debug, Clone)]
struct Row {
    record: PersistedRecord,
    /// Insertion sequence, breaks `created_at` ties when listing.
    seq: u64,
}

/// Keys are unique per owner within a collection.
type Slot = (String, OwnerId, RecordKey);

#[derive(Default)]
struct Tables {
    rows: HashMap<Slot, Row>,
    next_seq: u64,
}

/// Process-local record store. Same semantics as `PgRecordStore`, used by
/// tests and by `STORE_BACKEND=memory` local runs.
#[derive(Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<Tables>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create_record(
        &self,
        collection: &str,
        owner: OwnerId,
        data: Record,
    ) -> Result<PersistedRecord, StoreError> {
        let (key, data) = split_key(data);
        let key = key.unwrap_or_else(RecordKey::generate);
        let mut tables = self.tables.write().await;
        let slot = (collection.to_string(), owner, key.clone());
        if tables.rows.contains_key(&slot) {
            return Err(StoreError::Rejected(format!(
                "duplicate key '{key}' in collection '{collection}'"
            )));
        }

        let now = Utc::now();
        let record = PersistedRecord {
            id: key,
            owner_id: owner,
            data,
            created_at: now,
            updated_at: now,
        };
        let seq = tables.next_seq;
        tables.next_seq += 1;
        tables.rows.insert(
            slot,
            Row {
                record: record.clone(),
                seq,
            },
        );
        debug!("memory store: created {}/{}", collection, record.id);
        Ok(record)
    }

    async fn update_record(
        &self,
        collection: &str,
        owner: OwnerId,
        key: &RecordKey,
        data: Record,
    ) -> Result<PersistedRecord, StoreError> {
        let (_, data) = split_key(data);
        let mut tables = self.tables.write().await;
        let row = tables
            .rows
            .get_mut(&(collection.to_string(), owner, key.clone()))
            .ok_or_else(|| StoreError::not_found(collection, key))?;

        row.record.data = data;
        row.record.updated_at = Utc::now();
        debug!("memory store: updated {}/{}", collection, key);
        Ok(row.record.clone())
    }

    async fn get_record(
        &self,
        collection: &str,
        owner: OwnerId,
        key: &RecordKey,
    ) -> Result<PersistedRecord, StoreError> {
        let tables = self.tables.read().await;
        tables
            .rows
            .get(&(collection.to_string(), owner, key.clone()))
            .map(|row| row.record.clone())
            .ok_or_else(|| StoreError::not_found(collection, key))
    }

    async fn list_records(
        &self,
        collection: &str,
        owner: OwnerId,
    ) -> Result<Vec<PersistedRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&Row> = tables
            .rows
            .iter()
            .filter(|((c, o, _), _)| c == collection && *o == owner)
            .map(|(_, row)| row)
            .collect();
        rows.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(rows.into_iter().map(|row| row.record.clone()).collect())
    }

    async fn delete_record(
        &self,
        collection: &str,
        owner: OwnerId,
        key: &RecordKey,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let slot = (collection.to_string(), owner, key.clone());
        match tables.rows.remove(&slot) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found(collection, key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use uuid::Uuid;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_key_and_strips_id() {
        let store = InMemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let created = store
            .create_record("cvs", owner, record(json!({"title": "X"})))
            .await
            .unwrap();
        assert!(!created.id.as_str().is_empty());
        assert!(!created.data.contains_key("id"));

        let fetched = store.get_record("cvs", owner, &created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_keeps_caller_supplied_key() {
        let store = InMemoryRecordStore::new();
        let created = store
            .create_record("cvs", Uuid::new_v4(), record(json!({"id": "fixed", "a": 1})))
            .await
            .unwrap();
        assert_eq!(created.id, RecordKey::from("fixed"));
    }

    #[tokio::test]
    async fn test_duplicate_key_is_rejected() {
        let store = InMemoryRecordStore::new();
        let owner = Uuid::new_v4();
        store
            .create_record("cvs", owner, record(json!({"id": "dup"})))
            .await
            .unwrap();
        let err = store
            .create_record("cvs", owner, record(json!({"id": "dup"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_same_key_under_two_owners_is_independent() {
        let store = InMemoryRecordStore::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        store
            .create_record("cvs", alice, record(json!({"id": "main", "who": "alice"})))
            .await
            .unwrap();
        store
            .create_record("cvs", bob, record(json!({"id": "main", "who": "bob"})))
            .await
            .unwrap();

        let key = RecordKey::from("main");
        let theirs = store.get_record("cvs", alice, &key).await.unwrap();
        assert_eq!(theirs.data["who"], json!("alice"));

        store.delete_record("cvs", bob, &key).await.unwrap();
        assert!(store.get_record("cvs", alice, &key).await.is_ok());
        assert!(store.get_record("cvs", bob, &key).await.is_err());
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_owner_scoped() {
        let store = InMemoryRecordStore::new();
        let owner = Uuid::new_v4();
        for title in ["first", "second", "third"] {
            store
                .create_record("job_offers", owner, record(json!({"title": title})))
                .await
                .unwrap();
        }
        store
            .create_record("job_offers", Uuid::new_v4(), record(json!({"title": "other"})))
            .await
            .unwrap();

        let titles: Vec<_> = store
            .list_records("job_offers", owner)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.data["title"].clone())
            .collect();
        assert_eq!(titles, vec![json!("third"), json!("second"), json!("first")]);
    }

    #[tokio::test]
    async fn test_foreign_owner_cannot_read_update_or_delete() {
        let store = InMemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let created = store
            .create_record("cvs", owner, record(json!({"title": "X"})))
            .await
            .unwrap();

        assert!(matches!(
            store.get_record("cvs", intruder, &created.id).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(store
            .update_record("cvs", intruder, &created.id, record(json!({"title": "Y"})))
            .await
            .is_err());
        assert!(store.delete_record("cvs", intruder, &created.id).await.is_err());
        assert!(store.get_record("cvs", owner, &created.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_replaces_payload() {
        let store = InMemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let created = store
            .create_record("cvs", owner, record(json!({"title": "X", "draft": true})))
            .await
            .unwrap();
        let updated = store
            .update_record("cvs", owner, &created.id, record(json!({"title": "Y"})))
            .await
            .unwrap();
        assert_eq!(updated.data, record(json!({"title": "Y"})));
        assert_eq!(updated.created_at, created.created_at);
    }
}
