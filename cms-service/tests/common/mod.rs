#![allow(dead_code)]

use chrono::{Duration, Utc};
use cms_service::config::CmsConfig;
use cms_service::store::InMemoryStore;
use cms_service::Application;
use reqwest::Response;
use service_core::cms::{
    AccountAccess, AccountReference, AisConsentRequestType, CmsClient, CreateConsentRequest,
    CreatePaymentRequest, PaymentType, PsuIdData, TppInfo,
};
use std::sync::Arc;

pub const TEST_TPP: &str = "PSDDE-FAKENCA-87B2AC";
pub const TEST_PSU_ID: &str = "anton.brueckner";
pub const TEST_ACCOUNT_ID: &str = "11111-999999999";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: Arc<InMemoryStore>,
    pub client: reqwest::Client,
    /// The XS2A-side client, pointed at this CMS.
    pub cms: CmsClient,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(configure: impl FnOnce(&mut CmsConfig)) -> Self {
        let mut config = CmsConfig::load().expect("Failed to load configuration");
        config.common.port = 0; // Random port for testing
        configure(&mut config);

        let store = Arc::new(InMemoryStore::new());
        let app = Application::build_with_store(config, store.clone())
            .await
            .expect("Failed to build test application");

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

        let cms = CmsClient::new(&address, std::time::Duration::from_secs(5))
            .expect("Failed to create CMS client");

        TestApp {
            address,
            port,
            store,
            client,
            cms,
        }
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut request = self.client.get(format!("{}{}", self.address, path));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn put_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut request = self.client.put(format!("{}{}", self.address, path));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn delete_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut request = self.client.delete(format!("{}{}", self.address, path));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn create_consent(&self, psu_id: &str, recurring: bool) -> String {
        self.cms
            .create_consent(&consent_request(psu_id, recurring))
            .await
            .into_result()
            .expect("Failed to create consent")
            .consent_id
    }

    pub async fn create_payment(&self, psu_id: &str) -> String {
        self.cms
            .create_payment(&payment_request(psu_id))
            .await
            .into_result()
            .expect("Failed to create payment")
            .payment_id
    }
}

pub fn tpp_info() -> TppInfo {
    TppInfo {
        authorisation_number: TEST_TPP.to_string(),
        tpp_name: Some("Fake TPP".to_string()),
        tpp_roles: vec!["PISP".to_string(), "AISP".to_string()],
    }
}

pub fn account(aspsp_account_id: &str) -> AccountReference {
    AccountReference {
        iban: Some("DE89370400440532013000".to_string()),
        currency: Some("EUR".to_string()),
        aspsp_account_id: Some(aspsp_account_id.to_string()),
        ..Default::default()
    }
}

pub fn consent_request(psu_id: &str, recurring: bool) -> CreateConsentRequest {
    CreateConsentRequest {
        access: AccountAccess {
            accounts: vec![account(TEST_ACCOUNT_ID)],
            ..Default::default()
        },
        request_type: AisConsentRequestType::DedicatedAccounts,
        recurring_indicator: recurring,
        valid_until: (Utc::now() + Duration::days(90)).date_naive(),
        frequency_per_day: 4,
        with_balance: false,
        tpp_redirect_preferred: false,
        psu_data: Some(PsuIdData::new(psu_id)),
        tpp_info: tpp_info(),
    }
}

pub fn payment_request(psu_id: &str) -> CreatePaymentRequest {
    CreatePaymentRequest {
        payment_type: PaymentType::Single,
        payment_product: "sepa-credit-transfers".to_string(),
        debtor_account: Some(account(TEST_ACCOUNT_ID)),
        creditor_account: None,
        instructed_amount: None,
        creditor_name: Some("Merchant".to_string()),
        remittance_information: None,
        psu_data: Some(PsuIdData::new(psu_id)),
        tpp_info: tpp_info(),
    }
}
