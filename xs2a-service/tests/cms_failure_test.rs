mod common;

use common::{spawn_against_cms, TEST_PAYMENT_PRODUCT, TEST_PSU_ID};
use serde_json::Value;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn cms_outage_is_reported_as_internal_error() {
    let cms = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pis/common-payments/p-1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&cms)
        .await;
    let (address, _) = spawn_against_cms(&cms.uri()).await;

    let response = reqwest::Client::new()
        .post(format!(
            "{}/v1/payments/{}/p-1/authorisations",
            address, TEST_PAYMENT_PRODUCT
        ))
        .header("PSU-ID", TEST_PSU_ID)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["tppMessages"][0]["code"], "INTERNAL_SERVER_ERROR");
}

#[tokio::test]
async fn unknown_consent_in_cms_is_forbidden() {
    let cms = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/ais/consent/c-1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&cms)
        .await;
    let (address, _) = spawn_against_cms(&cms.uri()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/v1/consents/c-1/authorisations", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn request_id_reaches_the_cms() {
    let cms = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pis/common-payments/p-2"))
        .and(header("x-request-id", "7f1a3c5e-0b7d-4d0e-9f55-3a6b2c1d0e9f"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&cms)
        .await;
    let (address, _) = spawn_against_cms(&cms.uri()).await;

    let response = reqwest::Client::new()
        .post(format!(
            "{}/v1/payments/{}/p-2/authorisations",
            address, TEST_PAYMENT_PRODUCT
        ))
        .header("X-Request-ID", "7f1a3c5e-0b7d-4d0e-9f55-3a6b2c1d0e9f")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}
