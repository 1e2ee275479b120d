use std::collections::HashMap;

use tracing::info;

use super::collections::{CATEGORIES, SKILLS};
use crate::errors::AppError;
use crate::schemas::category::{CategoryForm, CategoryRow};
use crate::schemas::skill::SkillRow;
use crate::schemas::{from_persisted, to_record};
use crate::store::{OwnerId, PersistedRecord, RecordKey, RecordStore};

async fn category_rows(
    store: &dyn RecordStore,
    owner: OwnerId,
) -> Result<Vec<CategoryRow>, AppError> {
    Ok(store
        .list_records(CATEGORIES, owner)
        .await?
        .iter()
        .map(from_persisted::<CategoryRow>)
        .collect::<Result<Vec<_>, _>>()?)
}

/// Number of skills linked to each category id.
async fn skill_counts(
    store: &dyn RecordStore,
    owner: OwnerId,
) -> Result<HashMap<String, u32>, AppError> {
    let mut counts = HashMap::new();
    for record in store.list_records(SKILLS, owner).await? {
        let skill: SkillRow = from_persisted(&record)?;
        if let Some(category_id) = skill.category_id {
            *counts.entry(category_id).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

fn to_form(row: CategoryRow, counts: &HashMap<String, u32>) -> CategoryForm {
    let skill_count = row
        .id
        .as_ref()
        .and_then(|id| counts.get(id).copied())
        .unwrap_or(0);
    CategoryForm {
        skill_count,
        ..CategoryForm::from_row(Some(row))
    }
}

/// All categories of `owner` by display order, with their skill counts.
pub async fn list_categories(
    store: &dyn RecordStore,
    owner: OwnerId,
) -> Result<Vec<CategoryForm>, AppError> {
    let counts = skill_counts(store, owner).await?;
    let mut forms: Vec<CategoryForm> = category_rows(store, owner)
        .await?
        .into_iter()
        .map(|row| to_form(row, &counts))
        .collect();
    forms.sort_by_key(|form| form.display_order);
    Ok(forms)
}

pub async fn get_category(
    store: &dyn RecordStore,
    owner: OwnerId,
    key: &RecordKey,
) -> Result<CategoryForm, AppError> {
    let row = from_persisted(&store.get_record(CATEGORIES, owner, key).await?)?;
    let counts = skill_counts(store, owner).await?;
    Ok(to_form(row, &counts))
}

/// A display order of 0 means "append": the category takes the current
/// category count as its position.
pub async fn create_category(
    store: &dyn RecordStore,
    owner: OwnerId,
    form: CategoryForm,
) -> Result<CategoryForm, AppError> {
    form.validate()?;
    let mut row = form.into_row();
    if row.display_order.unwrap_or(0) == 0 {
        let existing = store.list_records(CATEGORIES, owner).await?.len();
        row.display_order = Some(existing as u32);
    }

    let created = store.create_record(CATEGORIES, owner, to_record(&row)?).await?;
    info!("Created category {} for {owner}", created.id);
    saved_form(&created)
}

pub async fn update_category(
    store: &dyn RecordStore,
    owner: OwnerId,
    key: &RecordKey,
    form: CategoryForm,
) -> Result<CategoryForm, AppError> {
    form.validate()?;
    if form.parent_id.as_deref() == Some(key.as_str()) {
        return Err(AppError::Validation(
            "A category cannot be its own parent".to_string(),
        ));
    }
    let updated = store
        .update_record(CATEGORIES, owner, key, to_record(&form.into_row())?)
        .await?;
    saved_form(&updated)
}

fn saved_form(record: &PersistedRecord) -> Result<CategoryForm, AppError> {
    Ok(CategoryForm::from_row(Some(from_persisted(record)?)))
}

/// Refuses to delete a category that still has linked skills or
/// sub-categories.
pub async fn delete_category(
    store: &dyn RecordStore,
    owner: OwnerId,
    key: &RecordKey,
) -> Result<(), AppError> {
    let linked = skill_counts(store, owner)
        .await?
        .get(key.as_str())
        .copied()
        .unwrap_or(0);
    if linked > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete category: {linked} linked skill(s)"
        )));
    }

    let children = category_rows(store, owner)
        .await?
        .iter()
        .filter(|row| row.parent_id.as_deref() == Some(key.as_str()))
        .count();
    if children > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete category: {children} sub-categor{}",
            if children == 1 { "y" } else { "ies" }
        )));
    }

    store.delete_record(CATEGORIES, owner, key).await?;
    info!("Deleted category {key} for {owner}");
    Ok(())
}

/// Assigns display orders following `ordered_ids`.
pub async fn reorder_categories(
    store: &dyn RecordStore,
    owner: OwnerId,
    ordered_ids: &[RecordKey],
) -> Result<(), AppError> {
    for (position, key) in ordered_ids.iter().enumerate() {
        let mut row: CategoryRow = from_persisted(&store.get_record(CATEGORIES, owner, key).await?)?;
        row.display_order = Some(position as u32);
        store
            .update_record(CATEGORIES, owner, key, to_record(&row)?)
            .await?;
    }
    Ok(())
}
