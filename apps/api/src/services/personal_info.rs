//! The owner's personal details: a flat record, one per owner, exchanged in
//! camelCase and stored in snake_case.
//!
//! The form calls the photo `avatarUrl`; the stored column is `photo_url`.

use serde_json::Value;
use tracing::info;

use super::collections::PERSONAL_INFO;
use crate::errors::AppError;
use crate::schemas::case::{to_camel_case_keys, to_snake_case_keys};
use crate::store::{OwnerId, PersistedRecord, Record, RecordStore, StoreError, ID_FIELD};

const AVATAR_FIELD: &str = "avatar_url";
const PHOTO_FIELD: &str = "photo_url";

/// Keys managed by the store rather than the form.
const RESERVED: [&str; 4] = [ID_FIELD, "user_id", "created_at", "updated_at"];

async fn current(
    store: &dyn RecordStore,
    owner: OwnerId,
) -> Result<Option<PersistedRecord>, AppError> {
    Ok(store
        .list_records(PERSONAL_INFO, owner)
        .await?
        .into_iter()
        .next())
}

fn to_form(record: &PersistedRecord) -> Record {
    let mut form = to_camel_case_keys(&record.to_record());
    let photo = form.remove("photoUrl").unwrap_or(Value::Null);
    form.insert("avatarUrl".to_string(), photo);
    form
}

pub async fn get_personal_info(
    store: &dyn RecordStore,
    owner: OwnerId,
) -> Result<Record, AppError> {
    match current(store, owner).await? {
        Some(record) => Ok(to_form(&record)),
        None => Err(AppError::NotFound(format!(
            "No personal info for user {owner}"
        ))),
    }
}

/// Creates the owner's record or merges `form` into the existing one.
///
/// `avatarUrl` as a string replaces the photo, `null` removes it, and an
/// absent key leaves the stored photo untouched.
pub async fn save_personal_info(
    store: &dyn RecordStore,
    owner: OwnerId,
    form: Record,
) -> Result<Record, AppError> {
    let mut incoming = to_snake_case_keys(&form);
    for key in RESERVED {
        incoming.remove(key);
    }
    let avatar = incoming.remove(AVATAR_FIELD);

    let saved = match current(store, owner).await? {
        Some(existing) => merge(store, owner, existing, incoming, avatar).await?,
        None => {
            // Keyed by owner so a racing first save collides instead of
            // creating a second record.
            let mut data = incoming.clone();
            apply_avatar(&mut data, avatar.clone());
            data.insert(ID_FIELD.to_string(), Value::String(owner.to_string()));
            match store.create_record(PERSONAL_INFO, owner, data).await {
                Ok(created) => {
                    info!("Created personal info {} for {owner}", created.id);
                    created
                }
                Err(StoreError::Rejected(reason)) => match current(store, owner).await? {
                    Some(existing) => merge(store, owner, existing, incoming, avatar).await?,
                    None => return Err(AppError::Validation(reason)),
                },
                Err(err) => return Err(err.into()),
            }
        }
    };
    Ok(to_form(&saved))
}

async fn merge(
    store: &dyn RecordStore,
    owner: OwnerId,
    existing: PersistedRecord,
    incoming: Record,
    avatar: Option<Value>,
) -> Result<PersistedRecord, AppError> {
    let mut data = existing.data;
    data.extend(incoming);
    apply_avatar(&mut data, avatar);
    Ok(store
        .update_record(PERSONAL_INFO, owner, &existing.id, data)
        .await?)
}

fn apply_avatar(data: &mut Record, avatar: Option<Value>) {
    match avatar {
        Some(Value::String(url)) if !url.trim().is_empty() => {
            data.insert(PHOTO_FIELD.to_string(), Value::String(url));
        }
        Some(Value::Null) | Some(Value::String(_)) => {
            data.remove(PHOTO_FIELD);
        }
        // Anything else would be a file upload, which is handled elsewhere.
        Some(_) | None => {}
    }
}
