//! The XS2A view of the CMS. Production wires in [`CmsClient`]; tests swap in
//! an in-memory store.

use async_trait::async_trait;
use service_core::cms::{
    AuthenticationObject, AuthorisationType, CmsAuthorisation, CmsClient, CmsConsent, CmsPayment,
    CmsResponse, ConsentStatus, CreateAuthorisationRequest, CreateAuthorisationResponse,
    PsuIdData, ScaApproach, ScaStatus, TransactionStatus, UpdateAuthorisationRequest,
};

#[async_trait]
pub trait CmsGateway: Send + Sync {
    async fn get_consent(&self, consent_id: &str) -> CmsResponse<CmsConsent>;

    async fn update_consent_status(&self, consent_id: &str, status: ConsentStatus)
        -> CmsResponse<()>;

    async fn update_consent_multilevel_sca(&self, consent_id: &str, multilevel: bool)
        -> CmsResponse<()>;

    async fn terminate_old_consents(&self, consent_id: &str) -> CmsResponse<bool>;

    async fn get_payment(&self, payment_id: &str) -> CmsResponse<CmsPayment>;

    async fn update_payment_status(
        &self,
        payment_id: &str,
        status: TransactionStatus,
    ) -> CmsResponse<()>;

    async fn update_payment_multilevel_sca(&self, payment_id: &str, multilevel: bool)
        -> CmsResponse<()>;

    async fn get_payment_psu_data(&self, payment_id: &str) -> CmsResponse<Vec<PsuIdData>>;

    async fn create_authorisation(
        &self,
        parent_id: &str,
        authorisation_type: AuthorisationType,
        request: &CreateAuthorisationRequest,
    ) -> CmsResponse<CreateAuthorisationResponse>;

    async fn get_authorisation_ids(
        &self,
        parent_id: &str,
        authorisation_type: AuthorisationType,
    ) -> CmsResponse<Vec<String>>;

    async fn get_authorisation(&self, authorisation_id: &str) -> CmsResponse<CmsAuthorisation>;

    async fn update_authorisation(
        &self,
        authorisation_id: &str,
        request: &UpdateAuthorisationRequest,
    ) -> CmsResponse<CmsAuthorisation>;

    async fn update_authorisation_status(
        &self,
        authorisation_id: &str,
        status: ScaStatus,
    ) -> CmsResponse<()>;

    async fn update_sca_approach(&self, authorisation_id: &str, approach: ScaApproach)
        -> CmsResponse<()>;

    async fn save_authentication_methods(
        &self,
        authorisation_id: &str,
        methods: &[AuthenticationObject],
    ) -> CmsResponse<()>;

    async fn is_authentication_method_decoupled(
        &self,
        authorisation_id: &str,
        authentication_method_id: &str,
    ) -> CmsResponse<bool>;
}

#[async_trait]
impl CmsGateway for CmsClient {
    async fn get_consent(&self, consent_id: &str) -> CmsResponse<CmsConsent> {
        CmsClient::get_consent(self, consent_id).await
    }

    async fn update_consent_status(
        &self,
        consent_id: &str,
        status: ConsentStatus,
    ) -> CmsResponse<()> {
        CmsClient::update_consent_status(self, consent_id, status).await
    }

    async fn update_consent_multilevel_sca(
        &self,
        consent_id: &str,
        multilevel: bool,
    ) -> CmsResponse<()> {
        CmsClient::update_consent_multilevel_sca(self, consent_id, multilevel).await
    }

    async fn terminate_old_consents(&self, consent_id: &str) -> CmsResponse<bool> {
        CmsClient::terminate_old_consents(self, consent_id).await
    }

    async fn get_payment(&self, payment_id: &str) -> CmsResponse<CmsPayment> {
        CmsClient::get_payment(self, payment_id).await
    }

    async fn update_payment_status(
        &self,
        payment_id: &str,
        status: TransactionStatus,
    ) -> CmsResponse<()> {
        CmsClient::update_payment_status(self, payment_id, status).await
    }

    async fn update_payment_multilevel_sca(
        &self,
        payment_id: &str,
        multilevel: bool,
    ) -> CmsResponse<()> {
        CmsClient::update_payment_multilevel_sca(self, payment_id, multilevel).await
    }

    async fn get_payment_psu_data(&self, payment_id: &str) -> CmsResponse<Vec<PsuIdData>> {
        CmsClient::get_payment_psu_data(self, payment_id).await
    }

    async fn create_authorisation(
        &self,
        parent_id: &str,
        authorisation_type: AuthorisationType,
        request: &CreateAuthorisationRequest,
    ) -> CmsResponse<CreateAuthorisationResponse> {
        CmsClient::create_authorisation(self, parent_id, authorisation_type, request).await
    }

    async fn get_authorisation_ids(
        &self,
        parent_id: &str,
        authorisation_type: AuthorisationType,
    ) -> CmsResponse<Vec<String>> {
        CmsClient::get_authorisation_ids(self, parent_id, authorisation_type).await
    }

    async fn get_authorisation(&self, authorisation_id: &str) -> CmsResponse<CmsAuthorisation> {
        CmsClient::get_authorisation(self, authorisation_id).await
    }

    async fn update_authorisation(
        &self,
        authorisation_id: &str,
        request: &UpdateAuthorisationRequest,
    ) -> CmsResponse<CmsAuthorisation> {
        CmsClient::update_authorisation(self, authorisation_id, request).await
    }

    async fn update_authorisation_status(
        &self,
        authorisation_id: &str,
        status: ScaStatus,
    ) -> CmsResponse<()> {
        CmsClient::update_authorisation_status(self, authorisation_id, status).await
    }

    async fn update_sca_approach(
        &self,
        authorisation_id: &str,
        approach: ScaApproach,
    ) -> CmsResponse<()> {
        CmsClient::update_sca_approach(self, authorisation_id, approach).await
    }

    async fn save_authentication_methods(
        &self,
        authorisation_id: &str,
        methods: &[AuthenticationObject],
    ) -> CmsResponse<()> {
        CmsClient::save_authentication_methods(self, authorisation_id, methods).await
    }

    async fn is_authentication_method_decoupled(
        &self,
        authorisation_id: &str,
        authentication_method_id: &str,
    ) -> CmsResponse<bool> {
        CmsClient::is_authentication_method_decoupled(self, authorisation_id, authentication_method_id)
            .await
    }
}
