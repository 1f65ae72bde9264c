//! SCA authorisation stage dispatcher.
//!
//! Every (service kind, SCA approach, SCA status) triple maps to exactly one
//! [`ScaStage`]. A stage validates the PSU-data update, calls the SPI and the
//! CMS, and returns the next status. Stages never retry and never roll back;
//! the first failure short-circuits into an [`ErrorHolder`].

pub mod ais;
pub mod common;
pub mod decoupled;
pub mod pis_cancellation;
pub mod pis_initiation;
pub mod registry;

use crate::cms::CmsGateway;
use crate::error::{ErrorHolder, ErrorType, MessageErrorCode, ServiceType};
use crate::spi::{AisConsentSpi, PaymentAuthorisationSpi, PaymentCancellationSpi, PaymentSpi};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use service_core::cms::{
    AuthenticationObject, AuthorisationType, ChallengeData, CmsAuthorisation, CmsPayment,
    PsuIdData, ScaApproach, ScaStatus,
};
use std::fmt;
use std::sync::Arc;

pub use registry::StageRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Ais,
    PisInitiation,
    PisCancellation,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [
        ServiceKind::Ais,
        ServiceKind::PisInitiation,
        ServiceKind::PisCancellation,
    ];

    pub fn service_type(&self) -> ServiceType {
        match self {
            ServiceKind::Ais => ServiceType::Ais,
            ServiceKind::PisInitiation | ServiceKind::PisCancellation => ServiceType::Pis,
        }
    }

    pub fn authorisation_type(&self) -> AuthorisationType {
        match self {
            ServiceKind::Ais => AuthorisationType::Ais,
            ServiceKind::PisInitiation => AuthorisationType::PisCreation,
            ServiceKind::PisCancellation => AuthorisationType::PisCancellation,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Ais => "ais",
            ServiceKind::PisInitiation => "pis_initiation",
            ServiceKind::PisCancellation => "pis_cancellation",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageKey {
    pub kind: ServiceKind,
    pub approach: ScaApproach,
    pub status: ScaStatus,
}

impl StageKey {
    pub fn new(kind: ServiceKind, approach: ScaApproach, status: ScaStatus) -> Self {
        Self {
            kind,
            approach,
            status,
        }
    }

    /// Every key the registry must answer for.
    pub fn all() -> impl Iterator<Item = StageKey> {
        ServiceKind::ALL.into_iter().flat_map(|kind| {
            ScaApproach::ALL.into_iter().flat_map(move |approach| {
                ScaStatus::ALL
                    .into_iter()
                    .map(move |status| StageKey::new(kind, approach, status))
            })
        })
    }
}

/// A PSU-data update as submitted by the TPP.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePsuDataRequest {
    pub parent_id: String,
    pub authorisation_id: String,
    pub psu_data: PsuIdData,
    pub password: Option<String>,
    pub authentication_method_id: Option<String>,
    pub sca_authentication_data: Option<String>,
    pub request_id: Option<String>,
}

impl UpdatePsuDataRequest {
    /// An update that carries nothing but the PSU identity.
    pub fn is_update_psu_identification(&self) -> bool {
        self.password.is_none()
            && self.authentication_method_id.is_none()
            && self.sca_authentication_data.is_none()
    }
}

/// Result of one stage. `error` is set when the stage failed; the authorisation
/// is then left as it was unless the stage itself marked it FAILED.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePsuDataResponse {
    pub sca_status: ScaStatus,
    pub parent_id: String,
    pub authorisation_id: String,
    pub psu_data: Option<PsuIdData>,
    pub available_sca_methods: Vec<AuthenticationObject>,
    pub chosen_sca_method: Option<AuthenticationObject>,
    pub challenge_data: Option<ChallengeData>,
    pub psu_message: Option<String>,
    pub error: Option<ErrorHolder>,
}

impl UpdatePsuDataResponse {
    pub fn new(sca_status: ScaStatus, ctx: &StageContext, psu_data: Option<PsuIdData>) -> Self {
        Self {
            sca_status,
            parent_id: ctx.request.parent_id.clone(),
            authorisation_id: ctx.request.authorisation_id.clone(),
            psu_data,
            available_sca_methods: Vec::new(),
            chosen_sca_method: None,
            challenge_data: None,
            psu_message: None,
            error: None,
        }
    }

    pub fn failed(error: ErrorHolder, ctx: &StageContext) -> Self {
        Self {
            error: Some(error),
            ..Self::new(ScaStatus::Failed, ctx, None)
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Everything a stage sees: the request, the stored authorisation and, for
/// payment flows, the payment it belongs to.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub kind: ServiceKind,
    pub request: UpdatePsuDataRequest,
    pub authorisation: CmsAuthorisation,
    pub payment: Option<CmsPayment>,
}

impl StageContext {
    pub fn service_type(&self) -> ServiceType {
        self.kind.service_type()
    }

    pub fn error(&self, error_type: ErrorType, code: MessageErrorCode) -> UpdatePsuDataResponse {
        UpdatePsuDataResponse::failed(ErrorHolder::new(error_type, code), self)
    }

    pub fn payment(&self) -> Result<&CmsPayment, UpdatePsuDataResponse> {
        self.payment.as_ref().ok_or_else(|| {
            self.error(ErrorType::PIS_404, MessageErrorCode::ResourceUnknown404)
        })
    }
}

/// Collaborators shared by all stages.
#[derive(Clone)]
pub struct StageDependencies {
    pub cms: Arc<dyn CmsGateway>,
    pub payment_spi: Arc<dyn PaymentSpi>,
    pub payment_authorisation_spi: Arc<dyn PaymentAuthorisationSpi>,
    pub payment_cancellation_spi: Arc<dyn PaymentCancellationSpi>,
    pub ais_consent_spi: Arc<dyn AisConsentSpi>,
    pub sca_required_for_one_time_available_accounts: bool,
}

#[async_trait]
pub trait ScaStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, ctx: &StageContext) -> UpdatePsuDataResponse;
}
