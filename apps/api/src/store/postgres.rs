use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::{debug, error};
use uuid::Uuid;

use super::{
    split_key, OwnerId, PersistedRecord, Record, RecordKey, RecordStore, StoreError,
};

/// Row of the shared `records` table. One table serves every collection;
/// the payload is JSONB.
#[derive(Debug, Clone, FromRow)]
struct RecordRow {
    id: String,
    owner_id: Uuid,
    data: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for PersistedRecord {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let data = match row.data {
            Value::Object(map) => map,
            other => return Err(StoreError::Corrupt(format!("record {}: {other}", row.id))),
        };
        Ok(PersistedRecord {
            id: RecordKey::new(row.id),
            owner_id: row.owner_id,
            data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL-backed record store.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Integrity violations (SQLSTATE class 23) and invalid input (22) are the
/// caller's fault; surface the database message as-is.
fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if let Some(code) = db.code() {
            if code.starts_with("23") || code.starts_with("22") {
                return StoreError::Rejected(db.message().to_string());
            }
        }
    }
    error!("records query failed: {err}");
    StoreError::Backend(err)
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn create_record(
        &self,
        collection: &str,
        owner: OwnerId,
        data: Record,
    ) -> Result<PersistedRecord, StoreError> {
        let (key, data) = split_key(data);
        let key = key.unwrap_or_else(RecordKey::generate);

        let row: RecordRow = sqlx::query_as(
            r#"
            INSERT INTO records (id, collection, owner_id, data)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, data, created_at, updated_at
            "#,
        )
        .bind(key.as_str())
        .bind(collection)
        .bind(owner)
        .bind(Value::Object(data))
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        debug!("Inserted {collection}/{key} for owner {owner}");
        row.try_into()
    }

    async fn update_record(
        &self,
        collection: &str,
        owner: OwnerId,
        key: &RecordKey,
        data: Record,
    ) -> Result<PersistedRecord, StoreError> {
        let (_, data) = split_key(data);

        let row: Option<RecordRow> = sqlx::query_as(
            r#"
            UPDATE records
            SET data = $1, updated_at = NOW()
            WHERE collection = $2 AND id = $3 AND owner_id = $4
            RETURNING id, owner_id, data, created_at, updated_at
            "#,
        )
        .bind(Value::Object(data))
        .bind(collection)
        .bind(key.as_str())
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        let row = row.ok_or_else(|| StoreError::not_found(collection, key))?;
        debug!("Updated {collection}/{key} for owner {owner}");
        row.try_into()
    }

    async fn get_record(
        &self,
        collection: &str,
        owner: OwnerId,
        key: &RecordKey,
    ) -> Result<PersistedRecord, StoreError> {
        let row: Option<RecordRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, data, created_at, updated_at
            FROM records
            WHERE collection = $1 AND id = $2 AND owner_id = $3
            "#,
        )
        .bind(collection)
        .bind(key.as_str())
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.ok_or_else(|| StoreError::not_found(collection, key))?
            .try_into()
    }

    async fn list_records(
        &self,
        collection: &str,
        owner: OwnerId,
    ) -> Result<Vec<PersistedRecord>, StoreError> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, data, created_at, updated_at
            FROM records
            WHERE collection = $1 AND owner_id = $2
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(collection)
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(PersistedRecord::try_from).collect()
    }

    async fn delete_record(
        &self,
        collection: &str,
        owner: OwnerId,
        key: &RecordKey,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("DELETE FROM records WHERE collection = $1 AND id = $2 AND owner_id = $3")
                .bind(collection)
                .bind(key.as_str())
                .bind(owner)
                .execute(&self.pool)
                .await
                .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection, key));
        }
        debug!("Deleted {collection}/{key} for owner {owner}");
        Ok(())
    }
}
