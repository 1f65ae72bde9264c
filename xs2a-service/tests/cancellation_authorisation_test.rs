mod common;

use common::{method_body, password_body, tan_body, TestApp, TEST_PAYMENT_PRODUCT, TEST_PSU_ID};
use serde_json::Value;
use service_core::cms::{PaymentType, ScaApproach, TransactionStatus};
use std::sync::atomic::Ordering;
use xs2a_service::spi::mock::{DECOUPLED_PSU_MESSAGE, MOCK_PSU_PASSWORD, MOCK_TAN};
use xs2a_service::spi::MockAspspSpi;

fn cancellations_path(payment_id: &str) -> String {
    format!(
        "/v1/payments/{}/{}/cancellation-authorisations",
        TEST_PAYMENT_PRODUCT, payment_id
    )
}

async fn body(response: reqwest::Response) -> Value {
    response.json().await.expect("Failed to parse JSON")
}

#[tokio::test]
async fn embedded_cancellation_cancels_the_payment() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let (path, created) = app
        .start_authorisation(&cancellations_path(&payment_id), Some(TEST_PSU_ID))
        .await;
    assert_eq!(created["scaStatus"], "psuIdentified");

    let authenticated = body(
        app.put(&path, Some(TEST_PSU_ID), Some(password_body(MOCK_PSU_PASSWORD)))
            .await,
    )
    .await;
    assert_eq!(authenticated["scaStatus"], "psuAuthenticated");

    let selected = body(app.put(&path, Some(TEST_PSU_ID), Some(method_body("sms"))).await).await;
    assert_eq!(selected["scaStatus"], "scaMethodSelected");

    let response = app.put(&path, Some(TEST_PSU_ID), Some(tan_body(MOCK_TAN))).await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(body(response).await["scaStatus"], "finalised");
    assert_eq!(app.cms.payment_status(&payment_id), Some(TransactionStatus::Canc));

    // the cancellation stays readable once the payment is cancelled
    assert_eq!(body(app.get(&path).await).await["scaStatus"], "finalised");
    let ids = body(app.get(&cancellations_path(&payment_id)).await).await;
    assert_eq!(ids["cancellationIds"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn wrong_tan_does_not_cancel() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let (path, _) = app
        .start_authorisation(&cancellations_path(&payment_id), Some(TEST_PSU_ID))
        .await;
    app.put(&path, Some(TEST_PSU_ID), Some(password_body(MOCK_PSU_PASSWORD)))
        .await;
    app.put(&path, Some(TEST_PSU_ID), Some(method_body("sms"))).await;

    let response = app.put(&path, Some(TEST_PSU_ID), Some(tan_body("111111"))).await;

    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(
        body(response).await["tppMessages"][0]["code"],
        "PSU_CREDENTIALS_INVALID"
    );
    assert_eq!(app.cms.payment_status(&payment_id), Some(TransactionStatus::Rcvd));
}

#[tokio::test]
async fn wrong_password_is_reported() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let (path, _) = app
        .start_authorisation(&cancellations_path(&payment_id), Some(TEST_PSU_ID))
        .await;

    let response = app
        .put(&path, Some(TEST_PSU_ID), Some(password_body("nope")))
        .await;

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn finalised_payment_cannot_be_cancelled() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    if let Some(mut payment) = app.cms.payments.get_mut(&payment_id) {
        payment.transaction_status = TransactionStatus::Accc;
    }

    let response = app
        .post(&cancellations_path(&payment_id), Some(TEST_PSU_ID))
        .await;

    assert_eq!(response.status().as_u16(), 405);
    assert_eq!(
        body(response).await["tppMessages"][0]["code"],
        "CANCELLATION_INVALID"
    );
}

#[tokio::test]
async fn psu_outside_the_payment_cannot_cancel_it() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let (path, created) = app
        .start_authorisation(&cancellations_path(&payment_id), None)
        .await;
    assert_eq!(created["scaStatus"], "received");

    let response = app.put(&path, Some("someone.else"), None).await;

    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(
        body(response).await["tppMessages"][0]["code"],
        "PSU_CREDENTIALS_INVALID"
    );
    assert_eq!(body(app.get(&path).await).await["scaStatus"], "received");

    let response = app.put(&path, Some(TEST_PSU_ID), None).await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(body(response).await["scaStatus"], "psuIdentified");
}

#[tokio::test]
async fn cms_failure_during_identification_is_internal() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let (path, _) = app
        .start_authorisation(&cancellations_path(&payment_id), None)
        .await;
    app.cms.psu_lookup_down.store(true, Ordering::SeqCst);

    let response = app.put(&path, Some(TEST_PSU_ID), None).await;

    assert_eq!(response.status().as_u16(), 500);
    assert_eq!(
        body(response).await["tppMessages"][0]["code"],
        "INTERNAL_SERVER_ERROR"
    );
}

#[tokio::test]
async fn decoupled_cancellation_waits_for_the_bank_app() {
    let app = TestApp::spawn_with(MockAspspSpi::new(), |config| {
        config.sca.default_approach = ScaApproach::Decoupled;
    })
    .await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let (path, created) = app
        .start_authorisation(&cancellations_path(&payment_id), Some(TEST_PSU_ID))
        .await;
    assert_eq!(created["scaStatus"], "psuIdentified");

    let response = app
        .put(&path, Some(TEST_PSU_ID), Some(password_body(MOCK_PSU_PASSWORD)))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let started = body(response).await;
    assert_eq!(started["scaStatus"], "scaMethodSelected");
    assert_eq!(started["psuMessage"], DECOUPLED_PSU_MESSAGE);
    assert_eq!(app.cms.payment_status(&payment_id), Some(TransactionStatus::Rcvd));
}
