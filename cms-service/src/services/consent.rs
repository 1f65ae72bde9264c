use super::checksum::{access_checksum, verify_access};
use super::events::{EventService, EventSubject};
use super::id_codec::IdCodec;
use super::stop_list::TppStopListService;
use crate::models::{ConsentRecord, EventOrigin, EventType, RecordFilter};
use crate::store::CmsStore;
use chrono::Utc;
use serde_json::json;
use service_core::cms::{
    CmsConsent, ConsentStatus, CreateConsentRequest, CreateConsentResponse, PsuIdData,
};
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct ConsentService {
    store: Arc<dyn CmsStore>,
    codec: IdCodec,
    events: EventService,
    stop_list: TppStopListService,
}

impl ConsentService {
    pub fn new(
        store: Arc<dyn CmsStore>,
        codec: IdCodec,
        events: EventService,
        stop_list: TppStopListService,
    ) -> Self {
        Self {
            store,
            codec,
            events,
            stop_list,
        }
    }

    pub async fn create(
        &self,
        request: CreateConsentRequest,
        instance_id: &str,
    ) -> Result<CreateConsentResponse, AppError> {
        self.stop_list
            .ensure_not_blocked(&request.tpp_info.authorisation_number, instance_id)
            .await?;

        request.validate()?;

        let internal_id = Uuid::new_v4().to_string();
        let consent = CmsConsent {
            id: internal_id.clone(),
            access: request.access,
            request_type: request.request_type,
            recurring_indicator: request.recurring_indicator,
            valid_until: request.valid_until,
            frequency_per_day: request.frequency_per_day,
            last_action_date: None,
            consent_status: ConsentStatus::Received,
            with_balance: request.with_balance,
            tpp_redirect_preferred: request.tpp_redirect_preferred,
            psu_id_data_list: request.psu_data.into_iter().filter(|p| p.is_not_empty()).collect(),
            tpp_info: request.tpp_info,
            multilevel_sca_required: false,
            creation_timestamp: Utc::now(),
            status_change_timestamp: None,
            instance_id: instance_id.to_string(),
        };

        self.store
            .insert_consent(ConsentRecord::new(consent))
            .await
            .map_err(AppError::DatabaseError)?;

        let consent_id = self.codec.encode(&internal_id)?;
        tracing::info!(consent_id = %consent_id, "Consent created");
        self.record(EventType::CreateConsent, EventOrigin::Tpp, &consent_id, instance_id, None)
            .await;

        Ok(CreateConsentResponse { consent_id })
    }

    pub async fn get(&self, consent_id: &str) -> Result<CmsConsent, AppError> {
        let record = self.load(consent_id).await?;
        self.to_external(&record)
    }

    pub async fn get_status(&self, consent_id: &str) -> Result<ConsentStatus, AppError> {
        Ok(self.load(consent_id).await?.status())
    }

    pub async fn update_status(
        &self,
        consent_id: &str,
        status: ConsentStatus,
    ) -> Result<(), AppError> {
        let mut record = self.load(consent_id).await?;
        ensure_not_finalised(&record)?;
        verify_checksum(&record, consent_id)?;

        let previous = record.status();
        record.set_status(status);
        if status == ConsentStatus::Valid && record.checksum.is_none() {
            record.checksum = Some(
                access_checksum(&record.consent.access).map_err(AppError::InternalError)?,
            );
        }

        let instance_id = record.instance_id.clone();
        self.save(record).await?;

        tracing::info!(
            consent_id = %consent_id,
            from = %previous,
            to = %status,
            "Consent status updated"
        );
        self.record(
            EventType::UpdateConsentStatus,
            EventOrigin::Tpp,
            consent_id,
            &instance_id,
            Some(json!({ "status": status })),
        )
        .await;
        Ok(())
    }

    pub async fn update_multilevel_sca(
        &self,
        consent_id: &str,
        multilevel: bool,
    ) -> Result<(), AppError> {
        let mut record = self.load(consent_id).await?;
        verify_checksum(&record, consent_id)?;

        record.consent.multilevel_sca_required = multilevel;
        let instance_id = record.instance_id.clone();
        self.save(record).await?;

        self.record(
            EventType::UpdateConsentMultilevelSca,
            EventOrigin::Tpp,
            consent_id,
            &instance_id,
            Some(json!({ "multilevelScaRequired": multilevel })),
        )
        .await;
        Ok(())
    }

    /// Close the older consents a new recurring consent replaces: same TPP,
    /// same PSUs, still RECEIVED or VALID. A one-off consent replaces nothing.
    pub async fn terminate_old_consents(&self, new_consent_id: &str) -> Result<bool, AppError> {
        let new_consent = self.load(new_consent_id).await?;
        if new_consent.consent.is_one_access_type() {
            return Ok(false);
        }
        if new_consent.consent.psu_id_data_list.is_empty() {
            return Ok(false);
        }

        let filter = RecordFilter {
            tpp_authorisation_number: Some(new_consent.tpp_authorisation_number.clone()),
            ..RecordFilter::for_instance(new_consent.instance_id.clone())
        };
        let candidates = self
            .store
            .find_consents(&filter)
            .await
            .map_err(AppError::DatabaseError)?;

        let old: Vec<ConsentRecord> = candidates
            .into_iter()
            .filter(|c| c.id != new_consent.id)
            .filter(|c| matches!(c.status(), ConsentStatus::Received | ConsentStatus::Valid))
            .filter(|c| same_psus(&c.consent.psu_id_data_list, &new_consent.consent.psu_id_data_list))
            .collect();

        if old.is_empty() {
            return Ok(false);
        }

        for mut record in old {
            let old_id = self.codec.encode(&record.id)?;
            record.set_status(ConsentStatus::TerminatedByTpp);
            self.save(record).await?;
            tracing::info!(consent_id = %old_id, replaced_by = %new_consent_id, "Old consent terminated");
            self.record(
                EventType::TerminateOldConsents,
                EventOrigin::Tpp,
                &old_id,
                &new_consent.instance_id,
                Some(json!({ "newConsentId": new_consent_id })),
            )
            .await;
        }
        Ok(true)
    }

    /// Revocation by the PSU owning the consent.
    pub async fn revoke_by_psu(
        &self,
        consent_id: &str,
        psu: &PsuIdData,
        instance_id: &str,
    ) -> Result<bool, AppError> {
        let Some(mut record) = self.find_owned(consent_id, psu, instance_id).await? else {
            return Ok(false);
        };
        if record.status().is_finalised_status() {
            return Ok(false);
        }

        record.set_status(ConsentStatus::RevokedByPsu);
        self.save(record).await?;

        self.record(EventType::RevokeConsent, EventOrigin::Psu, consent_id, instance_id, None)
            .await;
        Ok(true)
    }

    /// Terminate every open consent of a PSU. `true` when at least one was open.
    pub async fn close_all_by_psu(
        &self,
        psu: &PsuIdData,
        instance_id: &str,
    ) -> Result<bool, AppError> {
        if psu.is_empty() {
            return Ok(false);
        }

        let filter = RecordFilter {
            psu: Some(psu.clone()),
            ..RecordFilter::for_instance(instance_id)
        };
        let open: Vec<ConsentRecord> = self
            .store
            .find_consents(&filter)
            .await
            .map_err(AppError::DatabaseError)?
            .into_iter()
            .filter(|c| !c.status().is_finalised_status())
            .collect();

        let closed = !open.is_empty();
        for mut record in open {
            let consent_id = self.codec.encode(&record.id)?;
            record.set_status(ConsentStatus::TerminatedByAspsp);
            self.save(record).await?;
            self.record(
                EventType::UpdateConsentStatus,
                EventOrigin::Aspsp,
                &consent_id,
                instance_id,
                Some(json!({ "status": ConsentStatus::TerminatedByAspsp })),
            )
            .await;
        }
        Ok(closed)
    }

    /// The record behind an external id, expiring it first when its validity ran out.
    pub(crate) async fn load(&self, consent_id: &str) -> Result<ConsentRecord, AppError> {
        let internal_id = self
            .codec
            .decode(consent_id)
            .ok_or_else(|| unknown_consent(consent_id))?;

        let mut record = self
            .store
            .get_consent(&internal_id)
            .await
            .map_err(AppError::DatabaseError)?
            .ok_or_else(|| unknown_consent(consent_id))?;

        let today = Utc::now().date_naive();
        if record.consent.valid_until < today && !record.status().is_finalised_status() {
            record.set_status(ConsentStatus::Expired);
            self.save(record.clone()).await?;
            tracing::info!(consent_id = %consent_id, "Consent expired");
        }
        Ok(record)
    }

    pub(crate) async fn save(&self, record: ConsentRecord) -> Result<(), AppError> {
        self.store
            .save_consent(record)
            .await
            .map_err(AppError::DatabaseError)
    }

    pub(crate) fn to_external(&self, record: &ConsentRecord) -> Result<CmsConsent, AppError> {
        let mut consent = record.consent.clone();
        consent.id = self.codec.encode(&record.id)?;
        Ok(consent)
    }

    async fn find_owned(
        &self,
        consent_id: &str,
        psu: &PsuIdData,
        instance_id: &str,
    ) -> Result<Option<ConsentRecord>, AppError> {
        let record = match self.load(consent_id).await {
            Ok(record) => record,
            Err(AppError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let owned = record.instance_id == instance_id
            && record
                .consent
                .psu_id_data_list
                .iter()
                .any(|p| p.content_equals(psu));
        Ok(owned.then_some(record))
    }

    async fn record(
        &self,
        event_type: EventType,
        origin: EventOrigin,
        consent_id: &str,
        instance_id: &str,
        payload: Option<serde_json::Value>,
    ) {
        self.events
            .record(
                event_type,
                origin,
                EventSubject::Consent(consent_id.to_string()),
                instance_id,
                payload,
            )
            .await;
    }
}

fn unknown_consent(consent_id: &str) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Consent {} not found", consent_id))
}

fn ensure_not_finalised(record: &ConsentRecord) -> Result<(), AppError> {
    if record.status().is_finalised_status() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Consent is already {}",
            record.status()
        )));
    }
    Ok(())
}

/// A valid consent must still carry the access it was authorised for.
fn verify_checksum(record: &ConsentRecord, consent_id: &str) -> Result<(), AppError> {
    if record.status() != ConsentStatus::Valid {
        return Ok(());
    }

    let intact = verify_access(&record.consent.access, record.checksum.as_deref())
        .map_err(AppError::InternalError)?;
    if !intact {
        tracing::error!(consent_id = %record.id, "Consent checksum mismatch");
        return Err(AppError::ChecksumMismatch(consent_id.to_string()));
    }
    Ok(())
}

fn same_psus(a: &[PsuIdData], b: &[PsuIdData]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x.content_equals(y)))
}
