use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use super::collections::SKILLS;
use crate::errors::AppError;
use crate::schemas::skill::{SkillForm, SkillRow};
use crate::schemas::{from_persisted, to_record};
use crate::store::{OwnerId, RecordKey, RecordStore, StoreError};

/// Per-owner read-through cache of the skills list.
///
/// Every write to the skills collection invalidates the owner's entry,
/// whichever route it came through.
pub struct SkillsCache {
    ttl: Duration,
    entries: Mutex<HashMap<OwnerId, (Instant, Vec<SkillRow>)>>,
}

impl SkillsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, owner: OwnerId) -> Option<Vec<SkillRow>> {
        let entries = self.entries.lock();
        let (expires_at, rows) = entries.get(&owner)?;
        (Instant::now() < *expires_at).then(|| rows.clone())
    }

    fn put(&self, owner: OwnerId, rows: Vec<SkillRow>) {
        self.entries
            .lock()
            .insert(owner, (Instant::now() + self.ttl, rows));
    }

    pub fn invalidate(&self, owner: OwnerId) {
        self.entries.lock().remove(&owner);
    }

    /// Invalidates `owner` when `collection` holds skills.
    pub fn invalidate_for(&self, collection: &str, owner: OwnerId) {
        if collection == SKILLS {
            self.invalidate(owner);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillStatistics {
    pub total_count: usize,
    pub category_counts: BTreeMap<String, usize>,
    pub average_level: f64,
    pub highest_level_skills: Vec<SkillForm>,
    pub most_experienced_skills: Vec<SkillForm>,
}

const TOP_SKILLS: usize = 5;

/// All skills of `owner`, ordered by display order.
pub async fn list_skills(
    store: &dyn RecordStore,
    cache: &SkillsCache,
    owner: OwnerId,
) -> Result<Vec<SkillRow>, AppError> {
    if let Some(rows) = cache.get(owner) {
        debug!("skills cache hit for {owner}");
        return Ok(rows);
    }

    let mut rows = store
        .list_records(SKILLS, owner)
        .await?
        .iter()
        .map(from_persisted::<SkillRow>)
        .collect::<Result<Vec<_>, _>>()?;
    rows.sort_by_key(SkillRow::display_order);
    cache.put(owner, rows.clone());
    Ok(rows)
}

pub async fn list_skill_forms(
    store: &dyn RecordStore,
    cache: &SkillsCache,
    owner: OwnerId,
) -> Result<Vec<SkillForm>, AppError> {
    Ok(list_skills(store, cache, owner)
        .await?
        .into_iter()
        .map(|row| SkillForm::from_row(Some(row)))
        .collect())
}

/// Upserts the skill: updates it when its id is stored, creates it (under
/// that id, or a fresh one) otherwise. New skills go to the end of the list.
pub async fn save_skill(
    store: &dyn RecordStore,
    cache: &SkillsCache,
    owner: OwnerId,
    form: SkillForm,
) -> Result<SkillForm, AppError> {
    form.validate()?;
    let mut row = form.into_row();
    let key = row.id.clone().map(RecordKey::new);

    let updated = match &key {
        Some(key) => match store.update_record(SKILLS, owner, key, to_record(&row)?).await {
            Ok(saved) => Some(saved),
            Err(StoreError::NotFound { .. }) => None,
            Err(err) => return Err(err.into()),
        },
        None => None,
    };

    let saved = match updated {
        Some(saved) => saved,
        None => {
            let existing = list_skills(store, cache, owner).await?;
            row.display_order = Some(
                existing
                    .iter()
                    .map(SkillRow::display_order)
                    .max()
                    .map(|max| max + 1)
                    .unwrap_or(0),
            );
            row.id = Some(key.unwrap_or_else(RecordKey::generate).to_string());
            store.create_record(SKILLS, owner, to_record(&row)?).await?
        }
    };
    cache.invalidate(owner);
    Ok(SkillForm::from_row(Some(from_persisted(&saved)?)))
}

pub async fn delete_skill(
    store: &dyn RecordStore,
    cache: &SkillsCache,
    owner: OwnerId,
    key: &RecordKey,
) -> Result<(), AppError> {
    store.delete_record(SKILLS, owner, key).await?;
    cache.invalidate(owner);
    Ok(())
}

/// Assigns display orders following `ordered_ids`.
pub async fn reorder_skills(
    store: &dyn RecordStore,
    cache: &SkillsCache,
    owner: OwnerId,
    ordered_ids: &[RecordKey],
) -> Result<(), AppError> {
    // Invalidate first: a failure midway leaves some rows reordered.
    cache.invalidate(owner);
    for (position, key) in ordered_ids.iter().enumerate() {
        let mut row: SkillRow = from_persisted(&store.get_record(SKILLS, owner, key).await?)?;
        row.display_order = Some(position as u32);
        store
            .update_record(SKILLS, owner, key, to_record(&row)?)
            .await?;
    }
    cache.invalidate(owner);
    Ok(())
}

pub async fn skills_by_category(
    store: &dyn RecordStore,
    cache: &SkillsCache,
    owner: OwnerId,
    category: &str,
) -> Result<Vec<SkillForm>, AppError> {
    Ok(list_skill_forms(store, cache, owner)
        .await?
        .into_iter()
        .filter(|skill| skill.category == category)
        .collect())
}

pub async fn skill_statistics(
    store: &dyn RecordStore,
    cache: &SkillsCache,
    owner: OwnerId,
) -> Result<SkillStatistics, AppError> {
    Ok(compute_statistics(&list_skills(store, cache, owner).await?))
}

fn compute_statistics(rows: &[SkillRow]) -> SkillStatistics {
    let mut category_counts = BTreeMap::new();
    for row in rows {
        *category_counts
            .entry(row.category.clone().unwrap_or_default())
            .or_insert(0) += 1;
    }

    let average_level = if rows.is_empty() {
        0.0
    } else {
        rows.iter().map(|r| f64::from(r.level())).sum::<f64>() / rows.len() as f64
    };

    let mut by_level: Vec<&SkillRow> = rows.iter().collect();
    by_level.sort_by(|a, b| b.level().cmp(&a.level()));
    let mut by_years: Vec<&SkillRow> = rows.iter().collect();
    by_years.sort_by(|a, b| b.years().total_cmp(&a.years()));

    let top = |sorted: Vec<&SkillRow>| -> Vec<SkillForm> {
        sorted
            .into_iter()
            .take(TOP_SKILLS)
            .map(|row| SkillForm::from_row(Some(row.clone())))
            .collect()
    };

    SkillStatistics {
        total_count: rows.len(),
        category_counts,
        average_level,
        highest_level_skills: top(by_level),
        most_experienced_skills: top(by_years),
    }
}
