//! Authorisation sub-resources of payments, payment cancellations and consents.

use crate::authorisation::{
    ServiceKind, StageContext, StageDependencies, StageKey, StageRegistry, UpdatePsuDataRequest,
    UpdatePsuDataResponse,
};
use crate::error::{ErrorHolder, ErrorType, MessageErrorCode, ServiceType};
use crate::services::metrics::{record_stage_error, record_stage_transition};
use service_core::cms::{
    CmsAuthorisation, CmsError, CmsPayment, CreateAuthorisationRequest, PaymentType, PsuIdData,
    ScaApproach, ScaStatus, UpdateAuthorisationRequest,
};
use std::sync::Arc;

/// Payment addressed by `/{payment-service}/{payment-product}/{payment-id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTarget {
    pub payment_type: PaymentType,
    pub payment_product: String,
    pub payment_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parent {
    Payment(PaymentTarget),
    Consent(String),
}

impl Parent {
    pub fn id(&self) -> &str {
        match self {
            Parent::Payment(target) => &target.payment_id,
            Parent::Consent(consent_id) => consent_id,
        }
    }
}

struct ParentRecord {
    /// Only set for payments; the payment stages work on it.
    payment: Option<CmsPayment>,
    finalised: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedAuthorisation {
    pub authorisation_id: String,
    pub sca_status: ScaStatus,
    pub sca_approach: ScaApproach,
}

#[derive(Clone)]
pub struct AuthorisationService {
    deps: StageDependencies,
    registry: Arc<StageRegistry>,
    default_approach: ScaApproach,
}

impl AuthorisationService {
    pub fn new(deps: StageDependencies, default_approach: ScaApproach) -> Self {
        let registry = Arc::new(StageRegistry::new(deps.clone()));
        Self {
            deps,
            registry,
            default_approach,
        }
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Start a new authorisation. PSU data sent along identifies the PSU right away,
    /// except for redirect where the ASPSP identifies the PSU itself.
    pub async fn create_authorisation(
        &self,
        kind: ServiceKind,
        parent: &Parent,
        psu_data: PsuIdData,
    ) -> Result<CreatedAuthorisation, ErrorHolder> {
        let service_type = kind.service_type();
        let record = self.load_parent(parent).await?;
        if record.finalised {
            let code = match kind {
                ServiceKind::PisCancellation => MessageErrorCode::CancellationInvalid,
                _ => MessageErrorCode::StatusInvalid,
            };
            tracing::info!(parent_id = %parent.id(), kind = %kind, "Parent is already finalised");
            return Err(ErrorHolder::new(
                ErrorType::from_code(service_type, code),
                code,
            ));
        }

        let approach = self.default_approach;
        let identified = psu_data.is_not_empty() && approach != ScaApproach::Redirect;
        let request = CreateAuthorisationRequest {
            psu_data: psu_data.is_not_empty().then_some(psu_data),
            sca_approach: approach,
            sca_status: if identified {
                ScaStatus::PsuIdentified
            } else {
                ScaStatus::Received
            },
        };

        let created = self
            .deps
            .cms
            .create_authorisation(parent.id(), kind.authorisation_type(), &request)
            .await
            .into_result()
            .map_err(|e| {
                tracing::error!(parent_id = %parent.id(), kind = %kind, cms_error = ?e, "Authorisation could not be created");
                ErrorHolder::internal(service_type)
            })?;

        tracing::info!(
            parent_id = %parent.id(),
            authorisation_id = %created.authorisation_id,
            kind = %kind,
            sca_approach = %created.sca_approach,
            sca_status = %created.sca_status,
            "Authorisation created"
        );

        Ok(CreatedAuthorisation {
            authorisation_id: created.authorisation_id,
            sca_status: created.sca_status,
            sca_approach: created.sca_approach,
        })
    }

    /// Run the stage registered for the authorisation's current approach and
    /// status, then store the outcome.
    pub async fn update_psu_data(
        &self,
        kind: ServiceKind,
        parent: &Parent,
        request: UpdatePsuDataRequest,
    ) -> Result<UpdatePsuDataResponse, ErrorHolder> {
        let service_type = kind.service_type();
        let payment = self.load_parent(parent).await?.payment;
        let authorisation = self
            .load_authorisation(kind, parent, &request.authorisation_id)
            .await?;

        if let Some(stored) = authorisation.psu_data.as_ref() {
            if request.psu_data.is_not_empty()
                && stored.is_not_empty()
                && !stored.content_equals(&request.psu_data)
            {
                tracing::info!(
                    authorisation_id = %authorisation.authorisation_id,
                    "PSU in request differs from PSU of authorisation"
                );
                return Err(ErrorHolder::new(
                    ErrorType::from_code(service_type, MessageErrorCode::PsuCredentialsInvalid),
                    MessageErrorCode::PsuCredentialsInvalid,
                ));
            }
        }

        let key = StageKey::new(
            kind,
            authorisation.chosen_sca_approach,
            authorisation.sca_status,
        );
        let stage = self
            .registry
            .resolve(key)
            .ok_or_else(|| ErrorHolder::internal(service_type))?;

        tracing::info!(
            authorisation_id = %authorisation.authorisation_id,
            kind = %kind,
            sca_approach = %key.approach,
            sca_status = %key.status,
            stage = stage.name(),
            "Applying SCA stage"
        );

        let from = authorisation.sca_status;
        let ctx = StageContext {
            kind,
            request,
            authorisation,
            payment,
        };
        let response = stage.apply(&ctx).await;

        if let Some(error) = response.error.clone() {
            tracing::info!(
                authorisation_id = %ctx.request.authorisation_id,
                error = %error,
                "SCA stage failed"
            );
            record_stage_error(kind, from, error.error_type);
            return Err(error);
        }

        self.store_stage_result(&ctx, &response).await;
        record_stage_transition(kind, from, response.sca_status);

        Ok(response)
    }

    pub async fn get_sca_status(
        &self,
        kind: ServiceKind,
        parent: &Parent,
        authorisation_id: &str,
    ) -> Result<ScaStatus, ErrorHolder> {
        self.load_parent(parent).await?;
        let authorisation = self.load_authorisation(kind, parent, authorisation_id).await?;
        Ok(authorisation.sca_status)
    }

    pub async fn get_authorisation_ids(
        &self,
        kind: ServiceKind,
        parent: &Parent,
    ) -> Result<Vec<String>, ErrorHolder> {
        self.load_parent(parent).await?;
        self.deps
            .cms
            .get_authorisation_ids(parent.id(), kind.authorisation_type())
            .await
            .into_result()
            .map_err(|_| ErrorHolder::internal(kind.service_type()))
    }

    async fn store_stage_result(&self, ctx: &StageContext, response: &UpdatePsuDataResponse) {
        let update = UpdateAuthorisationRequest {
            sca_status: response.sca_status,
            psu_data: response.psu_data.clone(),
            authentication_method_id: response
                .chosen_sca_method
                .as_ref()
                .map(|m| m.authentication_method_id.clone())
                .or_else(|| ctx.request.authentication_method_id.clone()),
            sca_authentication_data: ctx.request.sca_authentication_data.clone(),
            sca_approach: None,
        };

        let stored = self
            .deps
            .cms
            .update_authorisation(&ctx.request.authorisation_id, &update)
            .await;
        if stored.has_error() {
            tracing::warn!(
                authorisation_id = %ctx.request.authorisation_id,
                cms_error = ?stored.error(),
                "Could not store SCA stage result"
            );
        }
    }

    /// Check the parent exists and is the one addressed by the path.
    async fn load_parent(&self, parent: &Parent) -> Result<ParentRecord, ErrorHolder> {
        match parent {
            Parent::Payment(target) => {
                let payment = self
                    .deps
                    .cms
                    .get_payment(&target.payment_id)
                    .await
                    .into_result()
                    .map_err(|e| unknown_resource(ServiceType::Pis, e))?;

                if payment.payment_type != target.payment_type {
                    return Err(ErrorHolder::new(
                        ErrorType::PIS_404,
                        MessageErrorCode::ResourceUnknown404,
                    ));
                }
                if payment.payment_product != target.payment_product {
                    return Err(ErrorHolder::new(
                        ErrorType::PIS_404,
                        MessageErrorCode::ProductUnknown,
                    ));
                }
                Ok(ParentRecord {
                    finalised: payment.transaction_status.is_finalised_status(),
                    payment: Some(payment),
                })
            }
            Parent::Consent(consent_id) => {
                let consent = self
                    .deps
                    .cms
                    .get_consent(consent_id)
                    .await
                    .into_result()
                    .map_err(|e| match e {
                        CmsError::LogicalError => ErrorHolder::new(
                            ErrorType::AIS_403,
                            MessageErrorCode::ConsentUnknown403,
                        ),
                        _ => ErrorHolder::internal(ServiceType::Ais),
                    })?;

                Ok(ParentRecord {
                    finalised: consent.consent_status.is_finalised_status(),
                    payment: None,
                })
            }
        }
    }

    async fn load_authorisation(
        &self,
        kind: ServiceKind,
        parent: &Parent,
        authorisation_id: &str,
    ) -> Result<CmsAuthorisation, ErrorHolder> {
        let service_type = kind.service_type();
        let authorisation = self
            .deps
            .cms
            .get_authorisation(authorisation_id)
            .await
            .into_result()
            .map_err(|e| unknown_resource(service_type, e))?;

        if authorisation.parent_id != parent.id()
            || authorisation.authorisation_type != kind.authorisation_type()
        {
            return Err(ErrorHolder::with_text(
                ErrorType::from_code(service_type, MessageErrorCode::ResourceUnknown404),
                MessageErrorCode::ResourceUnknown404,
                "Authorisation not found for the addressed resource",
            ));
        }

        Ok(authorisation)
    }
}

fn unknown_resource(service_type: ServiceType, error: CmsError) -> ErrorHolder {
    match error {
        CmsError::LogicalError => ErrorHolder::new(
            ErrorType::from_code(service_type, MessageErrorCode::ResourceUnknown404),
            MessageErrorCode::ResourceUnknown404,
        ),
        _ => ErrorHolder::internal(service_type),
    }
}
