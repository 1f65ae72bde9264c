//! Service Provider Interface: the ports an ASPSP implements to plug its
//! core banking into the SCA flows.

pub mod mapper;
pub mod mock;

use crate::error::{MessageErrorCode, TppMessage};
use async_trait::async_trait;
use service_core::cms::{
    AuthenticationObject, ChallengeData, CmsConsent, CmsPayment, ConsentStatus, PsuIdData,
    TppInfo, TransactionStatus,
};

pub use mapper::map_spi_errors;
pub use mock::MockAspspSpi;

/// Result of an SPI call. Unlike a plain `Result`, a failed call may still
/// carry a payload (e.g. an attempt failure on TAN verification).
#[derive(Debug, Clone, PartialEq)]
pub struct SpiResponse<T> {
    pub payload: Option<T>,
    pub errors: Vec<TppMessage>,
}

impl<T> SpiResponse<T> {
    pub fn success(payload: T) -> Self {
        Self {
            payload: Some(payload),
            errors: Vec::new(),
        }
    }

    pub fn error(code: MessageErrorCode) -> Self {
        Self {
            payload: None,
            errors: vec![TppMessage::error(code)],
        }
    }

    pub fn error_with_payload(payload: T, errors: Vec<TppMessage>) -> Self {
        Self {
            payload: Some(payload),
            errors,
        }
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty() || self.payload.is_none()
    }

    pub fn first_error_code(&self) -> Option<MessageErrorCode> {
        self.errors.first().map(|m| m.code)
    }
}

/// Per-request data handed to every SPI call.
#[derive(Debug, Clone, PartialEq)]
pub struct SpiContextData {
    pub psu_data: PsuIdData,
    pub tpp_info: TppInfo,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiAuthorisationStatus {
    Success,
    Failure,
    AttemptFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpiPsuAuthorisationResponse {
    pub sca_exempted: bool,
    pub status: SpiAuthorisationStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpiAvailableScaMethodsResponse {
    pub sca_exempted: bool,
    pub available_sca_methods: Vec<AuthenticationObject>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpiAuthorizationCodeResult {
    pub sca_exempted: bool,
    pub selected_sca_method: Option<AuthenticationObject>,
    pub challenge_data: Option<ChallengeData>,
}

impl SpiAuthorizationCodeResult {
    pub fn is_empty(&self) -> bool {
        self.selected_sca_method.is_none() && self.challenge_data.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpiPaymentExecutionResponse {
    pub transaction_status: TransactionStatus,
    pub authorisation_status: SpiAuthorisationStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpiVerifyScaAuthorisationResponse {
    pub consent_status: ConsentStatus,
    pub authorisation_status: SpiAuthorisationStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpiAuthorisationDecoupledScaResponse {
    pub psu_message: String,
}

/// TAN submitted by the PSU for a given authorisation.
#[derive(Debug, Clone, PartialEq)]
pub struct SpiScaConfirmation {
    pub parent_id: String,
    pub authorisation_id: String,
    pub psu_data: PsuIdData,
    pub tan: String,
}

#[async_trait]
pub trait PaymentSpi: Send + Sync {
    async fn execute_payment_without_sca(
        &self,
        ctx: &SpiContextData,
        payment: &CmsPayment,
    ) -> SpiResponse<SpiPaymentExecutionResponse>;

    async fn verify_sca_authorisation_and_execute_payment(
        &self,
        ctx: &SpiContextData,
        confirmation: &SpiScaConfirmation,
        payment: &CmsPayment,
    ) -> SpiResponse<SpiPaymentExecutionResponse>;
}

#[async_trait]
pub trait PaymentAuthorisationSpi: Send + Sync {
    async fn authorise_psu(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        psu_login: &PsuIdData,
        password: &str,
        payment: &CmsPayment,
    ) -> SpiResponse<SpiPsuAuthorisationResponse>;

    async fn request_available_sca_methods(
        &self,
        ctx: &SpiContextData,
        payment: &CmsPayment,
    ) -> SpiResponse<SpiAvailableScaMethodsResponse>;

    async fn request_authorisation_code(
        &self,
        ctx: &SpiContextData,
        authentication_method_id: &str,
        payment: &CmsPayment,
    ) -> SpiResponse<SpiAuthorizationCodeResult>;

    async fn start_sca_decoupled(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        authentication_method_id: Option<&str>,
        payment: &CmsPayment,
    ) -> SpiResponse<SpiAuthorisationDecoupledScaResponse>;
}

#[async_trait]
pub trait PaymentCancellationSpi: Send + Sync {
    async fn authorise_psu(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        psu_login: &PsuIdData,
        password: &str,
        payment: &CmsPayment,
    ) -> SpiResponse<SpiPsuAuthorisationResponse>;

    async fn request_available_sca_methods(
        &self,
        ctx: &SpiContextData,
        payment: &CmsPayment,
    ) -> SpiResponse<SpiAvailableScaMethodsResponse>;

    async fn request_authorisation_code(
        &self,
        ctx: &SpiContextData,
        authentication_method_id: &str,
        payment: &CmsPayment,
    ) -> SpiResponse<SpiAuthorizationCodeResult>;

    async fn start_sca_decoupled(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        authentication_method_id: Option<&str>,
        payment: &CmsPayment,
    ) -> SpiResponse<SpiAuthorisationDecoupledScaResponse>;

    async fn cancel_payment_without_sca(
        &self,
        ctx: &SpiContextData,
        payment: &CmsPayment,
    ) -> SpiResponse<()>;

    async fn verify_sca_authorisation_and_cancel_payment(
        &self,
        ctx: &SpiContextData,
        confirmation: &SpiScaConfirmation,
        payment: &CmsPayment,
    ) -> SpiResponse<()>;
}

#[async_trait]
pub trait AisConsentSpi: Send + Sync {
    async fn authorise_psu(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        psu_login: &PsuIdData,
        password: &str,
        consent: &CmsConsent,
    ) -> SpiResponse<SpiPsuAuthorisationResponse>;

    async fn request_available_sca_methods(
        &self,
        ctx: &SpiContextData,
        consent: &CmsConsent,
    ) -> SpiResponse<SpiAvailableScaMethodsResponse>;

    async fn request_authorisation_code(
        &self,
        ctx: &SpiContextData,
        authentication_method_id: &str,
        consent: &CmsConsent,
    ) -> SpiResponse<SpiAuthorizationCodeResult>;

    async fn start_sca_decoupled(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        authentication_method_id: Option<&str>,
        consent: &CmsConsent,
    ) -> SpiResponse<SpiAuthorisationDecoupledScaResponse>;

    async fn verify_sca_authorisation(
        &self,
        ctx: &SpiContextData,
        confirmation: &SpiScaConfirmation,
        consent: &CmsConsent,
    ) -> SpiResponse<SpiVerifyScaAuthorisationResponse>;
}
