use tracing::info;

use super::collections::JOB_OFFERS;
use crate::errors::AppError;
use crate::schemas::job_offer::{JobOfferForm, JobOfferRow};
use crate::schemas::{from_persisted, to_record};
use crate::store::{OwnerId, PersistedRecord, RecordKey, RecordStore};

fn to_form(record: &PersistedRecord) -> Result<JobOfferForm, AppError> {
    Ok(JobOfferForm::from_row(Some(from_persisted(record)?)))
}

/// Offers of `owner`, newest first.
pub async fn list_job_offers(
    store: &dyn RecordStore,
    owner: OwnerId,
) -> Result<Vec<JobOfferForm>, AppError> {
    store
        .list_records(JOB_OFFERS, owner)
        .await?
        .iter()
        .map(to_form)
        .collect()
}

pub async fn get_job_offer(
    store: &dyn RecordStore,
    owner: OwnerId,
    key: &RecordKey,
) -> Result<JobOfferForm, AppError> {
    to_form(&store.get_record(JOB_OFFERS, owner, key).await?)
}

pub async fn create_job_offer(
    store: &dyn RecordStore,
    owner: OwnerId,
    form: JobOfferForm,
) -> Result<JobOfferForm, AppError> {
    form.validate()?;
    let created = store
        .create_record(JOB_OFFERS, owner, to_record(&form.into_row())?)
        .await?;
    info!("Created job offer {} for {owner}", created.id);
    to_form(&created)
}

/// Updates replace the whole payload, so an analysis already stored is
/// carried over when the form does not send one.
pub async fn update_job_offer(
    store: &dyn RecordStore,
    owner: OwnerId,
    key: &RecordKey,
    form: JobOfferForm,
) -> Result<JobOfferForm, AppError> {
    form.validate()?;
    let mut row = form.into_row();
    if row.analysis.is_none() {
        let current: JobOfferRow = from_persisted(&store.get_record(JOB_OFFERS, owner, key).await?)?;
        row.analysis = current.analysis;
    }
    let updated = store
        .update_record(JOB_OFFERS, owner, key, to_record(&row)?)
        .await?;
    to_form(&updated)
}

pub async fn delete_job_offer(
    store: &dyn RecordStore,
    owner: OwnerId,
    key: &RecordKey,
) -> Result<(), AppError> {
    store.delete_record(JOB_OFFERS, owner, key).await?;
    info!("Deleted job offer {key} for {owner}");
    Ok(())
}
