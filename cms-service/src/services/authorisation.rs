//! SCA authorisations of consents (AIS) and payments (PIS creation and
//! cancellation). Authorisation ids are plain UUIDs; parents are addressed by
//! their external ids.

use super::consent::ConsentService;
use super::events::{EventService, EventSubject};
use super::id_codec::IdCodec;
use super::payment::PaymentService;
use crate::models::{AuthorisationRecord, EventOrigin, EventType};
use crate::store::CmsStore;
use chrono::Utc;
use serde_json::json;
use service_core::cms::{
    AuthenticationObject, AuthorisationType, CmsAuthorisation, CreateAuthorisationRequest,
    CreateAuthorisationResponse, PsuIdData, ScaApproach, ScaStatus, UpdateAuthorisationRequest,
};
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

/// Internal id and instance of an authorisation's parent.
struct ParentRef {
    internal_id: String,
    external_id: String,
    instance_id: String,
}

#[derive(Clone)]
pub struct AuthorisationService {
    store: Arc<dyn CmsStore>,
    codec: IdCodec,
    consents: ConsentService,
    payments: PaymentService,
    events: EventService,
}

impl AuthorisationService {
    pub fn new(
        store: Arc<dyn CmsStore>,
        codec: IdCodec,
        consents: ConsentService,
        payments: PaymentService,
        events: EventService,
    ) -> Self {
        Self {
            store,
            codec,
            consents,
            payments,
            events,
        }
    }

    /// Open a new authorisation. Unfinished authorisations the same PSU left
    /// behind on this parent are marked FAILED.
    pub async fn create(
        &self,
        authorisation_type: AuthorisationType,
        parent_id: &str,
        request: CreateAuthorisationRequest,
    ) -> Result<CreateAuthorisationResponse, AppError> {
        let psu_data = request.psu_data.filter(|p| p.is_not_empty());
        let parent = self.resolve_parent(authorisation_type, parent_id, psu_data.as_ref()).await?;

        if let Some(psu) = &psu_data {
            self.close_previous(&parent, authorisation_type, psu).await?;
        }

        let authorisation = CmsAuthorisation {
            authorisation_id: Uuid::new_v4().to_string(),
            parent_id: parent.internal_id.clone(),
            authorisation_type,
            sca_status: request.sca_status,
            chosen_sca_approach: request.sca_approach,
            psu_data,
            available_sca_methods: Vec::new(),
            authentication_method_id: None,
            sca_authentication_data: None,
            creation_timestamp: Utc::now(),
        };
        let response = CreateAuthorisationResponse {
            authorisation_id: authorisation.authorisation_id.clone(),
            sca_status: authorisation.sca_status,
            sca_approach: authorisation.chosen_sca_approach,
        };

        self.store
            .insert_authorisation(AuthorisationRecord::new(authorisation))
            .await
            .map_err(AppError::DatabaseError)?;

        tracing::info!(
            authorisation_id = %response.authorisation_id,
            parent_id = %parent.external_id,
            authorisation_type = %authorisation_type,
            "Authorisation created"
        );
        self.record(
            EventType::StartAuthorisation,
            authorisation_type,
            &parent,
            Some(json!({ "authorisationId": response.authorisation_id })),
        )
        .await;

        Ok(response)
    }

    pub async fn get(&self, authorisation_id: &str) -> Result<CmsAuthorisation, AppError> {
        let record = self.load(authorisation_id).await?;
        self.to_external(record)
    }

    pub async fn get_ids(
        &self,
        authorisation_type: AuthorisationType,
        parent_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let parent = self.resolve_parent(authorisation_type, parent_id, None).await?;
        let records = self
            .store
            .find_authorisations(&parent.internal_id, authorisation_type)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(records.into_iter().map(|r| r.id).collect())
    }

    /// Store the outcome of an SCA stage.
    pub async fn update(
        &self,
        authorisation_id: &str,
        request: UpdateAuthorisationRequest,
    ) -> Result<CmsAuthorisation, AppError> {
        let mut record = self.load_open(authorisation_id).await?;

        if let Some(psu) = request.psu_data.filter(|p| p.is_not_empty()) {
            if let Some(stored) = &record.authorisation.psu_data {
                if !stored.content_equals(&psu) {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "PSU of authorisation {} cannot change",
                        authorisation_id
                    )));
                }
            } else {
                self.resolve_parent(
                    record.authorisation_type,
                    &self.codec.encode(&record.parent_id)?,
                    Some(&psu),
                )
                .await?;
                record.authorisation.psu_data = Some(psu);
            }
        }

        let previous = record.authorisation.sca_status;
        record.authorisation.sca_status = request.sca_status;
        if let Some(method) = request.authentication_method_id {
            record.authorisation.authentication_method_id = Some(method);
        }
        if let Some(data) = request.sca_authentication_data {
            record.authorisation.sca_authentication_data = Some(data);
        }
        if let Some(approach) = request.sca_approach {
            record.authorisation.chosen_sca_approach = approach;
        }

        let updated = self.save(record).await?;
        tracing::info!(
            authorisation_id = %authorisation_id,
            from = %previous,
            to = %updated.sca_status,
            "Authorisation updated"
        );
        self.record_for(
            EventType::UpdateAuthorisation,
            &updated,
            Some(json!({ "scaStatus": updated.sca_status })),
        )
        .await;
        Ok(updated)
    }

    pub async fn update_status(
        &self,
        authorisation_id: &str,
        status: ScaStatus,
    ) -> Result<(), AppError> {
        let mut record = self.load_open(authorisation_id).await?;
        record.authorisation.sca_status = status;
        let updated = self.save(record).await?;

        self.record_for(
            EventType::UpdateAuthorisationStatus,
            &updated,
            Some(json!({ "scaStatus": status })),
        )
        .await;
        Ok(())
    }

    /// Status change requested by the PSU through the PSU API. `false` when
    /// the authorisation does not belong to `parent_id` or is already closed.
    pub async fn update_status_by_psu(
        &self,
        authorisation_types: &[AuthorisationType],
        parent_id: &str,
        authorisation_id: &str,
        psu: &PsuIdData,
        status: ScaStatus,
    ) -> Result<bool, AppError> {
        let record = match self.load(authorisation_id).await {
            Ok(record) => record,
            Err(AppError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };

        let belongs = authorisation_types.contains(&record.authorisation_type)
            && self.codec.decode(parent_id).as_deref() == Some(record.parent_id.as_str());
        let same_psu = record
            .authorisation
            .psu_data
            .as_ref()
            .map_or(true, |stored| stored.content_equals(psu));
        if !belongs || !same_psu || record.authorisation.sca_status.is_finalised_status() {
            return Ok(false);
        }

        let mut record = record;
        record.authorisation.sca_status = status;
        let updated = self.save(record).await?;
        self.events
            .record(
                EventType::UpdateAuthorisationStatus,
                EventOrigin::Psu,
                self.subject(&updated),
                &self.instance_of(&updated).await?,
                Some(json!({ "authorisationId": authorisation_id, "scaStatus": status })),
            )
            .await;
        Ok(true)
    }

    pub async fn update_sca_approach(
        &self,
        authorisation_id: &str,
        approach: ScaApproach,
    ) -> Result<(), AppError> {
        let mut record = self.load_open(authorisation_id).await?;
        record.authorisation.chosen_sca_approach = approach;
        let updated = self.save(record).await?;

        self.record_for(
            EventType::UpdateScaApproach,
            &updated,
            Some(json!({ "scaApproach": approach })),
        )
        .await;
        Ok(())
    }

    pub async fn save_authentication_methods(
        &self,
        authorisation_id: &str,
        methods: Vec<AuthenticationObject>,
    ) -> Result<(), AppError> {
        let mut record = self.load_open(authorisation_id).await?;
        record.authorisation.available_sca_methods = methods;
        let updated = self.save(record).await?;

        self.record_for(EventType::SaveAuthenticationMethods, &updated, None)
            .await;
        Ok(())
    }

    /// Unknown methods are not decoupled.
    pub async fn is_authentication_method_decoupled(
        &self,
        authorisation_id: &str,
        authentication_method_id: &str,
    ) -> Result<bool, AppError> {
        let record = self.load(authorisation_id).await?;
        Ok(record
            .authorisation
            .available_sca_methods
            .iter()
            .any(|m| m.authentication_method_id == authentication_method_id && m.decoupled))
    }

    /// Check the parent exists and, when a PSU is given, add them to its PSU list.
    async fn resolve_parent(
        &self,
        authorisation_type: AuthorisationType,
        parent_id: &str,
        psu: Option<&PsuIdData>,
    ) -> Result<ParentRef, AppError> {
        match authorisation_type {
            AuthorisationType::Ais => {
                let mut record = self.consents.load(parent_id).await?;
                let parent = ParentRef {
                    internal_id: record.id.clone(),
                    external_id: parent_id.to_string(),
                    instance_id: record.instance_id.clone(),
                };
                if let Some(psu) = psu {
                    if !record.consent.psu_id_data_list.iter().any(|p| p.content_equals(psu)) {
                        record.consent.psu_id_data_list.push(psu.clone());
                        self.consents.save(record).await?;
                    }
                }
                Ok(parent)
            }
            AuthorisationType::PisCreation | AuthorisationType::PisCancellation => {
                let mut record = self.payments.load(parent_id).await?;
                let parent = ParentRef {
                    internal_id: record.id.clone(),
                    external_id: parent_id.to_string(),
                    instance_id: record.instance_id.clone(),
                };
                if let Some(psu) = psu {
                    if !record.payment.psu_data.iter().any(|p| p.content_equals(psu)) {
                        record.payment.psu_data.push(psu.clone());
                        self.payments.save(record).await?;
                    }
                }
                Ok(parent)
            }
        }
    }

    async fn close_previous(
        &self,
        parent: &ParentRef,
        authorisation_type: AuthorisationType,
        psu: &PsuIdData,
    ) -> Result<(), AppError> {
        let previous = self
            .store
            .find_authorisations(&parent.internal_id, authorisation_type)
            .await
            .map_err(AppError::DatabaseError)?;

        for mut record in previous {
            let same_psu = record
                .authorisation
                .psu_data
                .as_ref()
                .map_or(false, |p| p.content_equals(psu));
            if same_psu && record.authorisation.sca_status.is_not_finalised_status() {
                tracing::info!(authorisation_id = %record.id, "Closing superseded authorisation");
                record.authorisation.sca_status = ScaStatus::Failed;
                self.save(record).await?;
            }
        }
        Ok(())
    }

    async fn load(&self, authorisation_id: &str) -> Result<AuthorisationRecord, AppError> {
        self.store
            .get_authorisation(authorisation_id)
            .await
            .map_err(AppError::DatabaseError)?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!(
                    "Authorisation {} not found",
                    authorisation_id
                ))
            })
    }

    /// Finalised, failed and exempted authorisations take no more updates.
    async fn load_open(&self, authorisation_id: &str) -> Result<AuthorisationRecord, AppError> {
        let record = self.load(authorisation_id).await?;
        if record.authorisation.sca_status.is_finalised_status() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Authorisation {} is already {}",
                authorisation_id,
                record.authorisation.sca_status
            )));
        }
        Ok(record)
    }

    async fn save(&self, record: AuthorisationRecord) -> Result<CmsAuthorisation, AppError> {
        self.store
            .save_authorisation(record.clone())
            .await
            .map_err(AppError::DatabaseError)?;
        self.to_external(record)
    }

    fn to_external(&self, record: AuthorisationRecord) -> Result<CmsAuthorisation, AppError> {
        let mut authorisation = record.authorisation;
        authorisation.parent_id = self.codec.encode(&record.parent_id)?;
        Ok(authorisation)
    }

    fn subject(&self, authorisation: &CmsAuthorisation) -> EventSubject {
        match authorisation.authorisation_type {
            AuthorisationType::Ais => EventSubject::Consent(authorisation.parent_id.clone()),
            _ => EventSubject::Payment(authorisation.parent_id.clone()),
        }
    }

    async fn instance_of(&self, authorisation: &CmsAuthorisation) -> Result<String, AppError> {
        Ok(match authorisation.authorisation_type {
            AuthorisationType::Ais => self.consents.load(&authorisation.parent_id).await?.instance_id,
            _ => self.payments.load(&authorisation.parent_id).await?.instance_id,
        })
    }

    async fn record(
        &self,
        event_type: EventType,
        authorisation_type: AuthorisationType,
        parent: &ParentRef,
        payload: Option<serde_json::Value>,
    ) {
        let subject = match authorisation_type {
            AuthorisationType::Ais => EventSubject::Consent(parent.external_id.clone()),
            _ => EventSubject::Payment(parent.external_id.clone()),
        };
        self.events
            .record(event_type, EventOrigin::Tpp, subject, &parent.instance_id, payload)
            .await;
    }

    async fn record_for(
        &self,
        event_type: EventType,
        authorisation: &CmsAuthorisation,
        payload: Option<serde_json::Value>,
    ) {
        let instance_id = match self.instance_of(authorisation).await {
            Ok(instance_id) => instance_id,
            Err(e) => {
                tracing::warn!(error = %e, "Parent of authorisation not found for event");
                return;
            }
        };
        self.events
            .record(
                event_type,
                EventOrigin::Tpp,
                self.subject(authorisation),
                &instance_id,
                payload,
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::stop_list::TppStopListService;
    use crate::store::InMemoryStore;
    use secrecy::Secret;
    use service_core::cms::{CreatePaymentRequest, PaymentType, TppInfo};

    async fn setup() -> (AuthorisationService, String) {
        let store: Arc<dyn CmsStore> = Arc::new(InMemoryStore::new());
        let codec = IdCodec::new(&Secret::new("test-key".to_string())).unwrap();
        let events = EventService::new(store.clone());
        let stop_list = TppStopListService::new(store.clone(), events.clone());
        let consents =
            ConsentService::new(store.clone(), codec.clone(), events.clone(), stop_list.clone());
        let payments =
            PaymentService::new(store.clone(), codec.clone(), events.clone(), stop_list);

        let payment = payments
            .create(
                CreatePaymentRequest {
                    payment_type: PaymentType::Single,
                    payment_product: "sepa-credit-transfers".into(),
                    debtor_account: None,
                    creditor_account: None,
                    instructed_amount: None,
                    creditor_name: None,
                    remittance_information: None,
                    psu_data: None,
                    tpp_info: TppInfo {
                        authorisation_number: "PSDDE-1".into(),
                        ..Default::default()
                    },
                },
                "UNDEFINED",
            )
            .await
            .unwrap();

        (
            AuthorisationService::new(store, codec, consents, payments, events),
            payment.payment_id,
        )
    }

    fn start(psu: Option<&str>) -> CreateAuthorisationRequest {
        CreateAuthorisationRequest {
            psu_data: psu.map(PsuIdData::new),
            sca_approach: ScaApproach::Embedded,
            sca_status: ScaStatus::Received,
        }
    }

    #[tokio::test]
    async fn new_authorisation_of_the_same_psu_fails_the_open_one() {
        let (service, payment_id) = setup().await;
        let first = service
            .create(AuthorisationType::PisCreation, &payment_id, start(Some("psu-1")))
            .await
            .unwrap();
        let second = service
            .create(AuthorisationType::PisCreation, &payment_id, start(Some("psu-1")))
            .await
            .unwrap();

        assert_eq!(
            service.get(&first.authorisation_id).await.unwrap().sca_status,
            ScaStatus::Failed
        );
        assert_eq!(
            service
                .get_ids(AuthorisationType::PisCreation, &payment_id)
                .await
                .unwrap(),
            vec![first.authorisation_id, second.authorisation_id]
        );
        assert!(service
            .get_ids(AuthorisationType::PisCancellation, &payment_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn parent_id_is_returned_in_external_form() {
        let (service, payment_id) = setup().await;
        let created = service
            .create(AuthorisationType::PisCreation, &payment_id, start(None))
            .await
            .unwrap();

        let authorisation = service.get(&created.authorisation_id).await.unwrap();
        assert_eq!(authorisation.parent_id, payment_id);
        assert!(authorisation.psu_data.is_none());
    }

    #[tokio::test]
    async fn finalised_authorisation_takes_no_updates() {
        let (service, payment_id) = setup().await;
        let created = service
            .create(AuthorisationType::PisCreation, &payment_id, start(Some("psu-1")))
            .await
            .unwrap();
        service
            .update_status(&created.authorisation_id, ScaStatus::Finalised)
            .await
            .unwrap();

        assert!(matches!(
            service
                .update_sca_approach(&created.authorisation_id, ScaApproach::Decoupled)
                .await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn decoupled_flag_follows_the_saved_methods() {
        let (service, payment_id) = setup().await;
        let created = service
            .create(AuthorisationType::PisCreation, &payment_id, start(Some("psu-1")))
            .await
            .unwrap();
        service
            .save_authentication_methods(
                &created.authorisation_id,
                vec![AuthenticationObject {
                    authentication_type: "PUSH_OTP".into(),
                    authentication_version: None,
                    authentication_method_id: "push".into(),
                    name: None,
                    explanation: None,
                    decoupled: true,
                }],
            )
            .await
            .unwrap();

        assert!(service
            .is_authentication_method_decoupled(&created.authorisation_id, "push")
            .await
            .unwrap());
        assert!(!service
            .is_authentication_method_decoupled(&created.authorisation_id, "sms")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_parent_is_not_found() {
        let (service, _) = setup().await;
        assert!(matches!(
            service
                .create(AuthorisationType::Ais, "forged_=_id", start(None))
                .await,
            Err(AppError::NotFound(_))
        ));
    }
}
