#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use reqwest::Response;
use serde_json::Value;
use service_core::cms::{
    AccountAccess, AisConsentRequestType, AuthenticationObject, AuthorisationType,
    CmsAuthorisation, CmsConsent, CmsError, CmsPayment, CmsResponse, ConsentStatus,
    CreateAuthorisationRequest, CreateAuthorisationResponse, PaymentType, PsuIdData, ScaApproach,
    ScaStatus, TppInfo, TransactionStatus, UpdateAuthorisationRequest,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;
use xs2a_service::authorisation::StageDependencies;
use xs2a_service::cms::CmsGateway;
use xs2a_service::config::Xs2aConfig;
use xs2a_service::spi::MockAspspSpi;
use xs2a_service::Application;

pub const TEST_PSU_ID: &str = "PSU-Test";
pub const TEST_PAYMENT_PRODUCT: &str = "sepa-credit-transfers";

/// CMS kept in memory so the XS2A flows can be driven without a running CMS.
#[derive(Default)]
pub struct InMemoryCms {
    pub consents: DashMap<String, CmsConsent>,
    pub payments: DashMap<String, CmsPayment>,
    pub authorisations: DashMap<String, CmsAuthorisation>,
    /// When set, PSU lookups of a payment fail as if the CMS were down.
    pub psu_lookup_down: AtomicBool,
}

impl InMemoryCms {
    pub fn seed_payment(&self, payment_type: PaymentType) -> String {
        let payment_id = Uuid::new_v4().to_string();
        self.payments.insert(
            payment_id.clone(),
            CmsPayment {
                payment_id: payment_id.clone(),
                payment_type,
                payment_product: TEST_PAYMENT_PRODUCT.to_string(),
                transaction_status: TransactionStatus::Rcvd,
                debtor_account: None,
                creditor_account: None,
                instructed_amount: None,
                creditor_name: Some("Merchant".to_string()),
                remittance_information: None,
                psu_data: vec![PsuIdData::new(TEST_PSU_ID)],
                tpp_info: tpp_info(),
                multilevel_sca_required: false,
                creation_timestamp: Utc::now(),
                status_change_timestamp: None,
                instance_id: "UNDEFINED".to_string(),
            },
        );
        payment_id
    }

    pub fn seed_consent(&self, request_type: AisConsentRequestType, recurring: bool) -> String {
        let consent_id = Uuid::new_v4().to_string();
        self.consents.insert(
            consent_id.clone(),
            CmsConsent {
                id: consent_id.clone(),
                access: AccountAccess::default(),
                request_type,
                recurring_indicator: recurring,
                valid_until: (Utc::now() + ChronoDuration::days(90)).date_naive(),
                frequency_per_day: 4,
                last_action_date: None,
                consent_status: ConsentStatus::Received,
                with_balance: false,
                tpp_redirect_preferred: false,
                psu_id_data_list: vec![PsuIdData::new(TEST_PSU_ID)],
                tpp_info: tpp_info(),
                multilevel_sca_required: false,
                creation_timestamp: Utc::now(),
                status_change_timestamp: None,
                instance_id: "UNDEFINED".to_string(),
            },
        );
        consent_id
    }

    pub fn payment_status(&self, payment_id: &str) -> Option<TransactionStatus> {
        self.payments.get(payment_id).map(|p| p.transaction_status)
    }

    pub fn consent_status(&self, consent_id: &str) -> Option<ConsentStatus> {
        self.consents.get(consent_id).map(|c| c.consent_status)
    }

    pub fn authorisation(&self, authorisation_id: &str) -> Option<CmsAuthorisation> {
        self.authorisations.get(authorisation_id).map(|a| a.clone())
    }
}

fn tpp_info() -> TppInfo {
    TppInfo {
        authorisation_number: "PSDDE-FAKENCA-87B2AC".to_string(),
        tpp_name: Some("Test TPP".to_string()),
        tpp_roles: vec!["PISP".to_string(), "AISP".to_string()],
    }
}

fn unknown<T>() -> CmsResponse<T> {
    CmsResponse::Failure(CmsError::LogicalError)
}

#[async_trait]
impl CmsGateway for InMemoryCms {
    async fn get_consent(&self, consent_id: &str) -> CmsResponse<CmsConsent> {
        match self.consents.get(consent_id) {
            Some(consent) => CmsResponse::Success(consent.clone()),
            None => unknown(),
        }
    }

    async fn update_consent_status(&self, consent_id: &str, status: ConsentStatus) -> CmsResponse<()> {
        match self.consents.get_mut(consent_id) {
            Some(mut consent) => {
                consent.consent_status = status;
                consent.status_change_timestamp = Some(Utc::now());
                CmsResponse::Success(())
            }
            None => unknown(),
        }
    }

    async fn update_consent_multilevel_sca(&self, consent_id: &str, multilevel: bool) -> CmsResponse<()> {
        match self.consents.get_mut(consent_id) {
            Some(mut consent) => {
                consent.multilevel_sca_required = multilevel;
                CmsResponse::Success(())
            }
            None => unknown(),
        }
    }

    async fn terminate_old_consents(&self, consent_id: &str) -> CmsResponse<bool> {
        CmsResponse::Success(self.consents.contains_key(consent_id))
    }

    async fn get_payment(&self, payment_id: &str) -> CmsResponse<CmsPayment> {
        match self.payments.get(payment_id) {
            Some(payment) => CmsResponse::Success(payment.clone()),
            None => unknown(),
        }
    }

    async fn update_payment_status(&self, payment_id: &str, status: TransactionStatus) -> CmsResponse<()> {
        match self.payments.get_mut(payment_id) {
            Some(mut payment) => {
                payment.transaction_status = status;
                payment.status_change_timestamp = Some(Utc::now());
                CmsResponse::Success(())
            }
            None => unknown(),
        }
    }

    async fn update_payment_multilevel_sca(&self, payment_id: &str, multilevel: bool) -> CmsResponse<()> {
        match self.payments.get_mut(payment_id) {
            Some(mut payment) => {
                payment.multilevel_sca_required = multilevel;
                CmsResponse::Success(())
            }
            None => unknown(),
        }
    }

    async fn get_payment_psu_data(&self, payment_id: &str) -> CmsResponse<Vec<PsuIdData>> {
        if self.psu_lookup_down.load(Ordering::SeqCst) {
            return CmsResponse::Failure(CmsError::TechnicalError);
        }
        match self.payments.get(payment_id) {
            Some(payment) => CmsResponse::Success(payment.psu_data.clone()),
            None => unknown(),
        }
    }

    async fn create_authorisation(
        &self,
        parent_id: &str,
        authorisation_type: AuthorisationType,
        request: &CreateAuthorisationRequest,
    ) -> CmsResponse<CreateAuthorisationResponse> {
        let authorisation_id = Uuid::new_v4().to_string();
        self.authorisations.insert(
            authorisation_id.clone(),
            CmsAuthorisation {
                authorisation_id: authorisation_id.clone(),
                parent_id: parent_id.to_string(),
                authorisation_type,
                sca_status: request.sca_status,
                chosen_sca_approach: request.sca_approach,
                psu_data: request.psu_data.clone(),
                available_sca_methods: Vec::new(),
                authentication_method_id: None,
                sca_authentication_data: None,
                creation_timestamp: Utc::now(),
            },
        );

        CmsResponse::Success(CreateAuthorisationResponse {
            authorisation_id,
            sca_status: request.sca_status,
            sca_approach: request.sca_approach,
        })
    }

    async fn get_authorisation_ids(
        &self,
        parent_id: &str,
        authorisation_type: AuthorisationType,
    ) -> CmsResponse<Vec<String>> {
        let mut authorisations: Vec<CmsAuthorisation> = self
            .authorisations
            .iter()
            .filter(|a| a.parent_id == parent_id && a.authorisation_type == authorisation_type)
            .map(|a| a.clone())
            .collect();
        authorisations.sort_by_key(|a| a.creation_timestamp);

        CmsResponse::Success(authorisations.into_iter().map(|a| a.authorisation_id).collect())
    }

    async fn get_authorisation(&self, authorisation_id: &str) -> CmsResponse<CmsAuthorisation> {
        match self.authorisations.get(authorisation_id) {
            Some(authorisation) => CmsResponse::Success(authorisation.clone()),
            None => unknown(),
        }
    }

    async fn update_authorisation(
        &self,
        authorisation_id: &str,
        request: &UpdateAuthorisationRequest,
    ) -> CmsResponse<CmsAuthorisation> {
        match self.authorisations.get_mut(authorisation_id) {
            Some(mut authorisation) => {
                authorisation.sca_status = request.sca_status;
                if let Some(psu_data) = request.psu_data.clone() {
                    authorisation.psu_data = Some(psu_data);
                }
                if let Some(method_id) = request.authentication_method_id.clone() {
                    authorisation.authentication_method_id = Some(method_id);
                }
                if let Some(tan) = request.sca_authentication_data.clone() {
                    authorisation.sca_authentication_data = Some(tan);
                }
                if let Some(approach) = request.sca_approach {
                    authorisation.chosen_sca_approach = approach;
                }
                CmsResponse::Success(authorisation.clone())
            }
            None => unknown(),
        }
    }

    async fn update_authorisation_status(&self, authorisation_id: &str, status: ScaStatus) -> CmsResponse<()> {
        match self.authorisations.get_mut(authorisation_id) {
            Some(mut authorisation) => {
                authorisation.sca_status = status;
                CmsResponse::Success(())
            }
            None => unknown(),
        }
    }

    async fn update_sca_approach(&self, authorisation_id: &str, approach: ScaApproach) -> CmsResponse<()> {
        match self.authorisations.get_mut(authorisation_id) {
            Some(mut authorisation) => {
                authorisation.chosen_sca_approach = approach;
                CmsResponse::Success(())
            }
            None => unknown(),
        }
    }

    async fn save_authentication_methods(
        &self,
        authorisation_id: &str,
        methods: &[AuthenticationObject],
    ) -> CmsResponse<()> {
        match self.authorisations.get_mut(authorisation_id) {
            Some(mut authorisation) => {
                authorisation.available_sca_methods = methods.to_vec();
                CmsResponse::Success(())
            }
            None => unknown(),
        }
    }

    async fn is_authentication_method_decoupled(
        &self,
        authorisation_id: &str,
        authentication_method_id: &str,
    ) -> CmsResponse<bool> {
        let decoupled = self.authorisations.get(authorisation_id).and_then(|a| {
            a.available_sca_methods
                .iter()
                .find(|m| m.authentication_method_id == authentication_method_id)
                .map(|m| m.decoupled)
        });

        match decoupled {
            Some(decoupled) => CmsResponse::Success(decoupled),
            None => unknown(),
        }
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub cms: Arc<InMemoryCms>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(MockAspspSpi::new(), |_| {}).await
    }

    pub async fn spawn_with(spi: MockAspspSpi, configure: impl FnOnce(&mut Xs2aConfig)) -> Self {
        let mut config = Xs2aConfig::load().expect("Failed to load configuration");
        config.common.port = 0; // Random port for testing
        configure(&mut config);

        let cms = Arc::new(InMemoryCms::default());
        let spi = Arc::new(spi);
        let deps = StageDependencies {
            cms: cms.clone(),
            payment_spi: spi.clone(),
            payment_authorisation_spi: spi.clone(),
            payment_cancellation_spi: spi.clone(),
            ais_consent_spi: spi,
            sca_required_for_one_time_available_accounts: config
                .sca
                .sca_required_for_one_time_available_accounts,
        };

        let app = Application::build_with_dependencies(config, deps)
            .await
            .expect("Failed to build test application");
        let (address, port) = run(app).await;

        TestApp {
            address,
            port,
            cms,
            client: reqwest::Client::new(),
        }
    }

    pub async fn post(&self, path: &str, psu_id: Option<&str>) -> Response {
        let mut request = self.client.post(format!("{}{}", self.address, path));
        if let Some(psu_id) = psu_id {
            request = request.header("PSU-ID", psu_id);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, psu_id: Option<&str>, body: Option<Value>) -> Response {
        let mut request = self.client.put(format!("{}{}", self.address, path));
        if let Some(psu_id) = psu_id {
            request = request.header("PSU-ID", psu_id);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        request.send().await.expect("Failed to execute request")
    }

    /// PUT a raw JSON body as-is, well-formed or not.
    pub async fn put_raw(&self, path: &str, psu_id: Option<&str>, body: &'static str) -> Response {
        let mut request = self
            .client
            .put(format!("{}{}", self.address, path))
            .header("content-type", "application/json")
            .body(body);
        if let Some(psu_id) = psu_id {
            request = request.header("PSU-ID", psu_id);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// POST then return `(authorisation path, response body)`.
    pub async fn start_authorisation(&self, collection_path: &str, psu_id: Option<&str>) -> (String, Value) {
        let response = self.post(collection_path, psu_id).await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.expect("Failed to parse JSON");
        let authorisation_id = body["authorisationId"]
            .as_str()
            .expect("Missing authorisationId")
            .to_string();

        (format!("{}/{}", collection_path, authorisation_id), body)
    }
}

/// Build against a real CMS endpoint (a wiremock server in tests).
pub async fn spawn_against_cms(cms_base_url: &str) -> (String, u16) {
    let mut config = Xs2aConfig::load().expect("Failed to load configuration");
    config.common.port = 0;
    config.cms.base_url = cms_base_url.to_string();
    config.cms.timeout_ms = 2_000;

    let app = Application::build(config)
        .await
        .expect("Failed to build test application");
    run(app).await
}

async fn run(app: Application) -> (String, u16) {
    let port = app.port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    // Wait for HTTP server to be ready by polling health endpoint
    let client = reqwest::Client::new();
    let health_url = format!("{}/health", address);
    for _ in 0..50 {
        if client.get(&health_url).send().await.is_ok() {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }

    (address, port)
}

pub fn password_body(password: &str) -> Value {
    serde_json::json!({ "psuData": { "password": password } })
}

pub fn method_body(authentication_method_id: &str) -> Value {
    serde_json::json!({ "authenticationMethodId": authentication_method_id })
}

pub fn tan_body(tan: &str) -> Value {
    serde_json::json!({ "scaAuthenticationData": tan })
}
