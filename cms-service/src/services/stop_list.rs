use super::events::{EventService, EventSubject};
use crate::models::{EventOrigin, EventType, TppStatus, TppStopListEntry, TppStopListRecord};
use crate::store::CmsStore;
use chrono::{Duration, Utc};
use serde_json::json;
use service_core::error::AppError;
use std::sync::Arc;

/// TPPs an ASPSP has locked out, per CMS instance.
#[derive(Clone)]
pub struct TppStopListService {
    store: Arc<dyn CmsStore>,
    events: EventService,
}

impl TppStopListService {
    pub fn new(store: Arc<dyn CmsStore>, events: EventService) -> Self {
        Self { store, events }
    }

    pub async fn get_record(
        &self,
        tpp_authorisation_number: &str,
        instance_id: &str,
    ) -> Result<Option<TppStopListRecord>, AppError> {
        let entry = self
            .store
            .get_stop_list_entry(tpp_authorisation_number, instance_id)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(entry.map(|e| TppStopListRecord::from_entry(&e, Utc::now())))
    }

    pub async fn is_blocked(
        &self,
        tpp_authorisation_number: &str,
        instance_id: &str,
    ) -> Result<bool, AppError> {
        let entry = self
            .store
            .get_stop_list_entry(tpp_authorisation_number, instance_id)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(entry.map_or(false, |e| e.is_blocked(Utc::now())))
    }

    /// Rejects resource creation for a blocked TPP.
    pub async fn ensure_not_blocked(
        &self,
        tpp_authorisation_number: &str,
        instance_id: &str,
    ) -> Result<(), AppError> {
        if self.is_blocked(tpp_authorisation_number, instance_id).await? {
            tracing::warn!(tpp = %tpp_authorisation_number, "Blocked TPP rejected");
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "TPP {} is blocked",
                tpp_authorisation_number
            )));
        }
        Ok(())
    }

    /// Block the TPP, for `lock_period` if given or until unblocked.
    pub async fn block(
        &self,
        tpp_authorisation_number: &str,
        instance_id: &str,
        lock_period: Option<Duration>,
    ) -> Result<bool, AppError> {
        let mut entry = self
            .store
            .get_stop_list_entry(tpp_authorisation_number, instance_id)
            .await
            .map_err(AppError::DatabaseError)?
            .unwrap_or_else(|| TppStopListEntry::enabled(tpp_authorisation_number, instance_id));

        entry.status = TppStatus::Blocked;
        entry.blocking_expiration = lock_period.map(|period| Utc::now() + period);

        self.store
            .save_stop_list_entry(entry)
            .await
            .map_err(AppError::DatabaseError)?;

        tracing::info!(tpp = %tpp_authorisation_number, instance_id = %instance_id, "TPP blocked");
        self.events
            .record(
                EventType::BlockTpp,
                EventOrigin::Aspsp,
                EventSubject::Tpp,
                instance_id,
                Some(json!({
                    "tppAuthorisationNumber": tpp_authorisation_number,
                    "lockPeriodMs": lock_period.map(|p| p.num_milliseconds()),
                })),
            )
            .await;
        Ok(true)
    }

    /// `true` when the TPP was blocked, `false` when there was nothing to unblock.
    pub async fn unblock(
        &self,
        tpp_authorisation_number: &str,
        instance_id: &str,
    ) -> Result<bool, AppError> {
        let entry = self
            .store
            .get_stop_list_entry(tpp_authorisation_number, instance_id)
            .await
            .map_err(AppError::DatabaseError)?;

        let Some(mut entry) = entry.filter(|e| e.is_blocked(Utc::now())) else {
            return Ok(false);
        };

        entry.status = TppStatus::Enabled;
        entry.blocking_expiration = None;
        self.store
            .save_stop_list_entry(entry)
            .await
            .map_err(AppError::DatabaseError)?;

        tracing::info!(tpp = %tpp_authorisation_number, instance_id = %instance_id, "TPP unblocked");
        self.events
            .record(
                EventType::UnblockTpp,
                EventOrigin::Aspsp,
                EventSubject::Tpp,
                instance_id,
                Some(json!({ "tppAuthorisationNumber": tpp_authorisation_number })),
            )
            .await;
        Ok(true)
    }
}
