//! In-process ASPSP used for development and tests.
//!
//! The mock accepts one password and one TAN for every PSU, offers a fixed set
//! of SCA methods and executes payments immediately.

use super::*;
use crate::error::MessageErrorCode;

pub const MOCK_PSU_PASSWORD: &str = "12345";
pub const MOCK_TAN: &str = "123456";
pub const DECOUPLED_PSU_MESSAGE: &str = "Please use your BankApp for transaction Authorisation";

#[derive(Debug, Clone)]
pub struct MockAspspSpi {
    password: String,
    tan: String,
    sca_methods: Vec<AuthenticationObject>,
    sca_exempted: bool,
}

impl Default for MockAspspSpi {
    fn default() -> Self {
        Self {
            password: MOCK_PSU_PASSWORD.to_string(),
            tan: MOCK_TAN.to_string(),
            sca_methods: vec![
                sca_method("SMS_OTP", "sms", "SMS OTP on phone +49 160 xxxxx 28", false),
                sca_method("PUSH_OTP", "push", "Push notification to BankApp", true),
            ],
            sca_exempted: false,
        }
    }
}

fn sca_method(kind: &str, id: &str, name: &str, decoupled: bool) -> AuthenticationObject {
    AuthenticationObject {
        authentication_type: kind.to_string(),
        authentication_version: None,
        authentication_method_id: id.to_string(),
        name: Some(name.to_string()),
        explanation: None,
        decoupled,
    }
}

impl MockAspspSpi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sca_methods(mut self, sca_methods: Vec<AuthenticationObject>) -> Self {
        self.sca_methods = sca_methods;
        self
    }

    /// Report every PSU login as exempted from SCA.
    pub fn with_sca_exemption(mut self, sca_exempted: bool) -> Self {
        self.sca_exempted = sca_exempted;
        self
    }

    fn authorise(&self, psu_login: &PsuIdData, password: &str) -> SpiResponse<SpiPsuAuthorisationResponse> {
        if psu_login.is_empty() {
            return SpiResponse::error(MessageErrorCode::PsuCredentialsInvalid);
        }

        let status = if password == self.password {
            SpiAuthorisationStatus::Success
        } else {
            SpiAuthorisationStatus::Failure
        };
        tracing::info!(psu_id = ?psu_login.psu_id, status = ?status, "Mock ASPSP authorised PSU");

        SpiResponse::success(SpiPsuAuthorisationResponse {
            sca_exempted: self.sca_exempted && status == SpiAuthorisationStatus::Success,
            status,
        })
    }

    fn available_methods(&self) -> SpiResponse<SpiAvailableScaMethodsResponse> {
        SpiResponse::success(SpiAvailableScaMethodsResponse {
            sca_exempted: false,
            available_sca_methods: self.sca_methods.clone(),
        })
    }

    fn authorisation_code(&self, authentication_method_id: &str) -> SpiResponse<SpiAuthorizationCodeResult> {
        let Some(method) = self
            .sca_methods
            .iter()
            .find(|m| m.authentication_method_id == authentication_method_id)
        else {
            return SpiResponse::error(MessageErrorCode::ScaMethodUnknown);
        };

        tracing::info!(authentication_method_id, "Mock ASPSP sent authorisation code");

        SpiResponse::success(SpiAuthorizationCodeResult {
            sca_exempted: false,
            selected_sca_method: Some(method.clone()),
            challenge_data: Some(ChallengeData {
                otp_max_length: Some(6),
                otp_format: Some("integer".to_string()),
                additional_information: Some(format!(
                    "Enter the TAN sent via {}",
                    method.authentication_type
                )),
                ..ChallengeData::default()
            }),
        })
    }

    fn decoupled(&self, authorisation_id: &str) -> SpiResponse<SpiAuthorisationDecoupledScaResponse> {
        tracing::info!(authorisation_id, "Mock ASPSP started decoupled SCA");

        SpiResponse::success(SpiAuthorisationDecoupledScaResponse {
            psu_message: DECOUPLED_PSU_MESSAGE.to_string(),
        })
    }

    fn tan_matches(&self, confirmation: &SpiScaConfirmation) -> bool {
        confirmation.tan == self.tan
    }
}

fn attempt_failure() -> Vec<TppMessage> {
    vec![TppMessage::error(MessageErrorCode::PsuCredentialsInvalid)]
}

#[async_trait]
impl PaymentSpi for MockAspspSpi {
    async fn execute_payment_without_sca(
        &self,
        _ctx: &SpiContextData,
        payment: &CmsPayment,
    ) -> SpiResponse<SpiPaymentExecutionResponse> {
        tracing::info!(payment_id = %payment.payment_id, "Mock ASPSP executed payment without SCA");

        SpiResponse::success(SpiPaymentExecutionResponse {
            transaction_status: TransactionStatus::Acsp,
            authorisation_status: SpiAuthorisationStatus::Success,
        })
    }

    async fn verify_sca_authorisation_and_execute_payment(
        &self,
        _ctx: &SpiContextData,
        confirmation: &SpiScaConfirmation,
        payment: &CmsPayment,
    ) -> SpiResponse<SpiPaymentExecutionResponse> {
        if !self.tan_matches(confirmation) {
            return SpiResponse::error_with_payload(
                SpiPaymentExecutionResponse {
                    transaction_status: payment.transaction_status,
                    authorisation_status: SpiAuthorisationStatus::AttemptFailure,
                },
                attempt_failure(),
            );
        }

        tracing::info!(payment_id = %payment.payment_id, "Mock ASPSP executed payment");

        SpiResponse::success(SpiPaymentExecutionResponse {
            transaction_status: TransactionStatus::Acsp,
            authorisation_status: SpiAuthorisationStatus::Success,
        })
    }
}

#[async_trait]
impl PaymentAuthorisationSpi for MockAspspSpi {
    async fn authorise_psu(
        &self,
        _ctx: &SpiContextData,
        _authorisation_id: &str,
        psu_login: &PsuIdData,
        password: &str,
        _payment: &CmsPayment,
    ) -> SpiResponse<SpiPsuAuthorisationResponse> {
        self.authorise(psu_login, password)
    }

    async fn request_available_sca_methods(
        &self,
        _ctx: &SpiContextData,
        _payment: &CmsPayment,
    ) -> SpiResponse<SpiAvailableScaMethodsResponse> {
        self.available_methods()
    }

    async fn request_authorisation_code(
        &self,
        _ctx: &SpiContextData,
        authentication_method_id: &str,
        _payment: &CmsPayment,
    ) -> SpiResponse<SpiAuthorizationCodeResult> {
        self.authorisation_code(authentication_method_id)
    }

    async fn start_sca_decoupled(
        &self,
        _ctx: &SpiContextData,
        authorisation_id: &str,
        _authentication_method_id: Option<&str>,
        _payment: &CmsPayment,
    ) -> SpiResponse<SpiAuthorisationDecoupledScaResponse> {
        self.decoupled(authorisation_id)
    }
}

#[async_trait]
impl PaymentCancellationSpi for MockAspspSpi {
    async fn authorise_psu(
        &self,
        _ctx: &SpiContextData,
        _authorisation_id: &str,
        psu_login: &PsuIdData,
        password: &str,
        _payment: &CmsPayment,
    ) -> SpiResponse<SpiPsuAuthorisationResponse> {
        self.authorise(psu_login, password)
    }

    async fn request_available_sca_methods(
        &self,
        _ctx: &SpiContextData,
        _payment: &CmsPayment,
    ) -> SpiResponse<SpiAvailableScaMethodsResponse> {
        self.available_methods()
    }

    async fn request_authorisation_code(
        &self,
        _ctx: &SpiContextData,
        authentication_method_id: &str,
        _payment: &CmsPayment,
    ) -> SpiResponse<SpiAuthorizationCodeResult> {
        self.authorisation_code(authentication_method_id)
    }

    async fn start_sca_decoupled(
        &self,
        _ctx: &SpiContextData,
        authorisation_id: &str,
        _authentication_method_id: Option<&str>,
        _payment: &CmsPayment,
    ) -> SpiResponse<SpiAuthorisationDecoupledScaResponse> {
        self.decoupled(authorisation_id)
    }

    async fn cancel_payment_without_sca(
        &self,
        _ctx: &SpiContextData,
        payment: &CmsPayment,
    ) -> SpiResponse<()> {
        tracing::info!(payment_id = %payment.payment_id, "Mock ASPSP cancelled payment without SCA");
        SpiResponse::success(())
    }

    async fn verify_sca_authorisation_and_cancel_payment(
        &self,
        _ctx: &SpiContextData,
        confirmation: &SpiScaConfirmation,
        payment: &CmsPayment,
    ) -> SpiResponse<()> {
        if !self.tan_matches(confirmation) {
            return SpiResponse::error(MessageErrorCode::PsuCredentialsInvalid);
        }

        tracing::info!(payment_id = %payment.payment_id, "Mock ASPSP cancelled payment");
        SpiResponse::success(())
    }
}

#[async_trait]
impl AisConsentSpi for MockAspspSpi {
    async fn authorise_psu(
        &self,
        _ctx: &SpiContextData,
        _authorisation_id: &str,
        psu_login: &PsuIdData,
        password: &str,
        _consent: &CmsConsent,
    ) -> SpiResponse<SpiPsuAuthorisationResponse> {
        self.authorise(psu_login, password)
    }

    async fn request_available_sca_methods(
        &self,
        _ctx: &SpiContextData,
        _consent: &CmsConsent,
    ) -> SpiResponse<SpiAvailableScaMethodsResponse> {
        self.available_methods()
    }

    async fn request_authorisation_code(
        &self,
        _ctx: &SpiContextData,
        authentication_method_id: &str,
        _consent: &CmsConsent,
    ) -> SpiResponse<SpiAuthorizationCodeResult> {
        self.authorisation_code(authentication_method_id)
    }

    async fn start_sca_decoupled(
        &self,
        _ctx: &SpiContextData,
        authorisation_id: &str,
        _authentication_method_id: Option<&str>,
        _consent: &CmsConsent,
    ) -> SpiResponse<SpiAuthorisationDecoupledScaResponse> {
        self.decoupled(authorisation_id)
    }

    async fn verify_sca_authorisation(
        &self,
        _ctx: &SpiContextData,
        confirmation: &SpiScaConfirmation,
        consent: &CmsConsent,
    ) -> SpiResponse<SpiVerifyScaAuthorisationResponse> {
        if !self.tan_matches(confirmation) {
            return SpiResponse::error_with_payload(
                SpiVerifyScaAuthorisationResponse {
                    consent_status: consent.consent_status,
                    authorisation_status: SpiAuthorisationStatus::AttemptFailure,
                },
                attempt_failure(),
            );
        }

        SpiResponse::success(SpiVerifyScaAuthorisationResponse {
            consent_status: ConsentStatus::Valid,
            authorisation_status: SpiAuthorisationStatus::Success,
        })
    }
}
