//! HTTP client for the XS2A-facing CMS API (`/api/v1/...`).
//!
//! Every method returns a [`CmsResponse`]; transport failures, timeouts and
//! unreadable bodies become [`CmsError::TechnicalError`]. Nothing is retried.

use super::model::*;
use super::response::{CmsError, CmsResponse, CHECKSUM_ERROR_MARKER};
use crate::error::{AppError, ErrorResponse};
use crate::observability::{TracedClientExt, TracedRequest};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct CmsClient {
    client: Client,
    base_url: Url,
}

impl CmsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;

        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid CMS url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "CMS url {} cannot carry a path",
                base_url
            )));
        }

        Ok(Self { client, base_url })
    }

    /// `{base}/api/v1/{segments...}` with every segment percent-encoded, so an
    /// id holding `/` or `?` stays one segment. Dot segments have no encoded
    /// form in a URL path and are refused.
    fn url(&self, segments: &[&str]) -> Result<String, CmsError> {
        if segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
            tracing::warn!(?segments, "Id cannot be addressed on the CMS");
            return Err(CmsError::LogicalError);
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CmsError::TechnicalError)?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url.to_string())
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<TracedRequest, CmsError> {
        let url = self.url(segments)?;
        let request = if method == Method::POST {
            self.client.traced_post(&url)
        } else if method == Method::PUT {
            self.client.traced_put(&url)
        } else if method == Method::DELETE {
            self.client.traced_delete(&url)
        } else {
            self.client.traced_get(&url)
        };
        Ok(request)
    }

    // Consents

    pub async fn create_consent(
        &self,
        request: &CreateConsentRequest,
    ) -> CmsResponse<CreateConsentResponse> {
        let req = self
            .request(Method::POST, &["ais", "consent"])
            .map(|r| r.json(request));
        self.fetch(req, "create_consent").await
    }

    pub async fn get_consent(&self, consent_id: &str) -> CmsResponse<CmsConsent> {
        let req = self.request(Method::GET, &["ais", "consent", consent_id]);
        self.fetch(req, "get_consent").await
    }

    pub async fn get_consent_status(&self, consent_id: &str) -> CmsResponse<ConsentStatus> {
        let req = self.request(Method::GET, &["ais", "consent", consent_id, "status"]);
        self.fetch::<ConsentStatusResponse>(req, "get_consent_status")
            .await
            .map(|r| r.consent_status)
    }

    pub async fn update_consent_status(
        &self,
        consent_id: &str,
        status: ConsentStatus,
    ) -> CmsResponse<()> {
        let status = wire_name(&status);
        let req = self.request(
            Method::PUT,
            &["ais", "consent", consent_id, "status", status.as_str()],
        );
        self.execute(req, "update_consent_status").await
    }

    pub async fn update_consent_multilevel_sca(
        &self,
        consent_id: &str,
        multilevel: bool,
    ) -> CmsResponse<()> {
        let req = self
            .request(Method::PUT, &["ais", "consent", consent_id, "multilevel-sca"])
            .map(|r| r.query(&[("multilevel-sca", multilevel)]));
        self.execute(req, "update_consent_multilevel_sca").await
    }

    pub async fn terminate_old_consents(&self, consent_id: &str) -> CmsResponse<bool> {
        let req = self.request(Method::DELETE, &["ais", "consent", consent_id, "old-consents"]);
        self.fetch(req, "terminate_old_consents").await
    }

    // Payments

    pub async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> CmsResponse<CreatePaymentResponse> {
        let req = self
            .request(Method::POST, &["pis", "common-payments"])
            .map(|r| r.json(request));
        self.fetch(req, "create_payment").await
    }

    pub async fn get_payment(&self, payment_id: &str) -> CmsResponse<CmsPayment> {
        let req = self.request(Method::GET, &["pis", "common-payments", payment_id]);
        self.fetch(req, "get_payment").await
    }

    pub async fn update_payment_status(
        &self,
        payment_id: &str,
        status: TransactionStatus,
    ) -> CmsResponse<()> {
        let status = wire_name(&status);
        let req = self.request(
            Method::PUT,
            &["pis", "common-payments", payment_id, "status", status.as_str()],
        );
        self.execute(req, "update_payment_status").await
    }

    pub async fn update_payment_multilevel_sca(
        &self,
        payment_id: &str,
        multilevel: bool,
    ) -> CmsResponse<()> {
        let req = self
            .request(Method::PUT, &["pis", "common-payments", payment_id, "multilevel-sca"])
            .map(|r| r.query(&[("multilevel-sca", multilevel)]));
        self.execute(req, "update_payment_multilevel_sca").await
    }

    pub async fn get_payment_psu_data(&self, payment_id: &str) -> CmsResponse<Vec<PsuIdData>> {
        let req = self.request(
            Method::GET,
            &["pis", "common-payments", payment_id, "authorisation", "psus"],
        );
        self.fetch(req, "get_payment_psu_data").await
    }

    // Authorisations

    pub async fn create_authorisation(
        &self,
        parent_id: &str,
        authorisation_type: AuthorisationType,
        request: &CreateAuthorisationRequest,
    ) -> CmsResponse<CreateAuthorisationResponse> {
        let authorisation_type = wire_name(&authorisation_type);
        let req = self
            .request(Method::POST, &[authorisation_type.as_str(), parent_id, "authorisations"])
            .map(|r| r.json(request));
        self.fetch(req, "create_authorisation").await
    }

    pub async fn get_authorisation_ids(
        &self,
        parent_id: &str,
        authorisation_type: AuthorisationType,
    ) -> CmsResponse<Vec<String>> {
        let authorisation_type = wire_name(&authorisation_type);
        let req = self.request(
            Method::GET,
            &[authorisation_type.as_str(), parent_id, "authorisations"],
        );
        self.fetch::<AuthorisationIdsResponse>(req, "get_authorisation_ids")
            .await
            .map(|r| r.authorisation_ids)
    }

    pub async fn get_authorisation(&self, authorisation_id: &str) -> CmsResponse<CmsAuthorisation> {
        let req = self.request(Method::GET, &["authorisations", authorisation_id]);
        self.fetch(req, "get_authorisation").await
    }

    pub async fn update_authorisation(
        &self,
        authorisation_id: &str,
        request: &UpdateAuthorisationRequest,
    ) -> CmsResponse<CmsAuthorisation> {
        let req = self
            .request(Method::PUT, &["authorisations", authorisation_id])
            .map(|r| r.json(request));
        self.fetch(req, "update_authorisation").await
    }

    pub async fn update_authorisation_status(
        &self,
        authorisation_id: &str,
        status: ScaStatus,
    ) -> CmsResponse<()> {
        let status = wire_name(&status);
        let req = self.request(
            Method::PUT,
            &["authorisations", authorisation_id, "status", status.as_str()],
        );
        self.execute(req, "update_authorisation_status").await
    }

    pub async fn update_sca_approach(
        &self,
        authorisation_id: &str,
        approach: ScaApproach,
    ) -> CmsResponse<()> {
        let approach = wire_name(&approach);
        let req = self.request(
            Method::PUT,
            &["authorisations", authorisation_id, "sca-approach", approach.as_str()],
        );
        self.execute(req, "update_sca_approach").await
    }

    pub async fn save_authentication_methods(
        &self,
        authorisation_id: &str,
        methods: &[AuthenticationObject],
    ) -> CmsResponse<()> {
        let req = self
            .request(
                Method::POST,
                &["authorisations", authorisation_id, "authentication-methods"],
            )
            .map(|r| r.json(methods));
        self.execute(req, "save_authentication_methods").await
    }

    pub async fn is_authentication_method_decoupled(
        &self,
        authorisation_id: &str,
        authentication_method_id: &str,
    ) -> CmsResponse<bool> {
        let req = self.request(
            Method::GET,
            &[
                "authorisations",
                authorisation_id,
                "authentication-methods",
                authentication_method_id,
            ],
        );
        self.fetch::<DecoupledMethodResponse>(req, "is_authentication_method_decoupled")
            .await
            .map(|r| r.decoupled)
    }

    /// Send and decode a JSON payload.
    async fn fetch<T: DeserializeOwned>(
        &self,
        req: Result<TracedRequest, CmsError>,
        operation: &str,
    ) -> CmsResponse<T> {
        let response = match self.send(req, operation).await {
            Ok(response) => response,
            Err(e) => return CmsResponse::Failure(e),
        };

        match response.json::<T>().await {
            Ok(payload) => CmsResponse::Success(payload),
            Err(e) => {
                tracing::warn!(operation, error = %e, "Unreadable CMS response body");
                CmsResponse::Failure(CmsError::TechnicalError)
            }
        }
    }

    /// Send and ignore the body of a successful response.
    async fn execute(&self, req: Result<TracedRequest, CmsError>, operation: &str) -> CmsResponse<()> {
        self.send(req, operation).await.map(|_| ()).into()
    }

    async fn send(
        &self,
        req: Result<TracedRequest, CmsError>,
        operation: &str,
    ) -> Result<reqwest::Response, CmsError> {
        let response = req?.send().await.map_err(|e| {
            tracing::error!(operation, error = %e, "CMS request failed");
            CmsError::TechnicalError
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = response.json::<ErrorResponse>().await.ok().and_then(|b| b.code);
        let error = classify(status, code.as_deref());
        tracing::warn!(
            operation,
            status = status.as_u16(),
            cms_error = ?error,
            "CMS rejected request"
        );
        Err(error)
    }
}

fn classify(status: StatusCode, code: Option<&str>) -> CmsError {
    if code == Some(CHECKSUM_ERROR_MARKER) {
        CmsError::ChecksumError
    } else if status.is_client_error() {
        CmsError::LogicalError
    } else {
        CmsError::TechnicalError
    }
}
