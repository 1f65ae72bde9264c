mod common;

use common::{
    method_body, password_body, tan_body, TestApp, TEST_PAYMENT_PRODUCT, TEST_PSU_ID,
};
use serde_json::Value;
use service_core::cms::{AuthenticationObject, PaymentType, ScaApproach, TransactionStatus};
use xs2a_service::spi::mock::{DECOUPLED_PSU_MESSAGE, MOCK_PSU_PASSWORD, MOCK_TAN};
use xs2a_service::spi::MockAspspSpi;

fn authorisations_path(payment_type: PaymentType, payment_id: &str) -> String {
    format!(
        "/v1/{}/{}/{}/authorisations",
        payment_type.service(),
        TEST_PAYMENT_PRODUCT,
        payment_id
    )
}

async fn body(response: reqwest::Response) -> Value {
    response.json().await.expect("Failed to parse JSON")
}

#[tokio::test]
async fn embedded_flow_with_several_methods_executes_the_payment() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let collection = authorisations_path(PaymentType::Single, &payment_id);

    let (path, created) = app.start_authorisation(&collection, Some(TEST_PSU_ID)).await;
    assert_eq!(created["scaStatus"], "psuIdentified");
    assert_eq!(created["_links"]["updatePsuAuthentication"]["href"], path);

    let response = app
        .put(&path, Some(TEST_PSU_ID), Some(password_body(MOCK_PSU_PASSWORD)))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let authenticated = body(response).await;
    assert_eq!(authenticated["scaStatus"], "psuAuthenticated");
    assert_eq!(authenticated["scaMethods"].as_array().map(Vec::len), Some(2));
    assert_eq!(authenticated["_links"]["selectAuthenticationMethod"]["href"], path);

    let response = app.put(&path, Some(TEST_PSU_ID), Some(method_body("sms"))).await;
    assert_eq!(response.status().as_u16(), 200);
    let selected = body(response).await;
    assert_eq!(selected["scaStatus"], "scaMethodSelected");
    assert_eq!(selected["chosenScaMethod"]["authenticationMethodId"], "sms");
    assert_eq!(selected["challengeData"]["otpMaxLength"], 6);
    assert_eq!(selected["_links"]["authoriseTransaction"]["href"], path);

    let response = app.put(&path, Some(TEST_PSU_ID), Some(tan_body(MOCK_TAN))).await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(body(response).await["scaStatus"], "finalised");

    assert_eq!(app.cms.payment_status(&payment_id), Some(TransactionStatus::Acsp));
    let status = body(app.get(&path).await).await;
    assert_eq!(status["scaStatus"], "finalised");
}

#[tokio::test]
async fn choosing_a_decoupled_method_switches_the_approach() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let collection = authorisations_path(PaymentType::Single, &payment_id);
    let (path, _) = app.start_authorisation(&collection, Some(TEST_PSU_ID)).await;

    app.put(&path, Some(TEST_PSU_ID), Some(password_body(MOCK_PSU_PASSWORD)))
        .await;
    let response = app.put(&path, Some(TEST_PSU_ID), Some(method_body("push"))).await;

    assert_eq!(response.status().as_u16(), 200);
    let selected = body(response).await;
    assert_eq!(selected["scaStatus"], "scaMethodSelected");
    assert_eq!(selected["psuMessage"], DECOUPLED_PSU_MESSAGE);
    assert!(selected["_links"].get("authoriseTransaction").is_none());

    let authorisation_id = selected["authorisationId"].as_str().unwrap();
    let stored = app.cms.authorisation(authorisation_id).unwrap();
    assert_eq!(stored.chosen_sca_approach, ScaApproach::Decoupled);
    assert_eq!(stored.authentication_method_id.as_deref(), Some("push"));
}

#[tokio::test]
async fn single_method_is_selected_without_asking_the_psu() {
    let sms = AuthenticationObject {
        authentication_type: "SMS_OTP".to_string(),
        authentication_version: None,
        authentication_method_id: "sms".to_string(),
        name: None,
        explanation: None,
        decoupled: false,
    };
    let app = TestApp::spawn_with(MockAspspSpi::new().with_sca_methods(vec![sms]), |_| {}).await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let collection = authorisations_path(PaymentType::Single, &payment_id);
    let (path, _) = app.start_authorisation(&collection, Some(TEST_PSU_ID)).await;

    let response = app
        .put(&path, Some(TEST_PSU_ID), Some(password_body(MOCK_PSU_PASSWORD)))
        .await;

    let selected = body(response).await;
    assert_eq!(selected["scaStatus"], "scaMethodSelected");
    assert_eq!(selected["chosenScaMethod"]["authenticationType"], "SMS_OTP");
}

#[tokio::test]
async fn wrong_password_fails_the_authorisation_for_good() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let collection = authorisations_path(PaymentType::Single, &payment_id);
    let (path, _) = app.start_authorisation(&collection, Some(TEST_PSU_ID)).await;

    let response = app
        .put(&path, Some(TEST_PSU_ID), Some(password_body("wrong")))
        .await;
    assert_eq!(response.status().as_u16(), 401);
    let error = body(response).await;
    assert_eq!(error["tppMessages"][0]["code"], "PSU_CREDENTIALS_INVALID");
    assert_eq!(error["tppMessages"][0]["category"], "ERROR");

    assert_eq!(body(app.get(&path).await).await["scaStatus"], "failed");

    let response = app
        .put(&path, Some(TEST_PSU_ID), Some(password_body(MOCK_PSU_PASSWORD)))
        .await;
    assert_eq!(response.status().as_u16(), 409);
    assert_eq!(body(response).await["tppMessages"][0]["code"], "STATUS_INVALID");
}

#[tokio::test]
async fn wrong_tan_leaves_room_for_another_attempt() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Bulk);
    let collection = authorisations_path(PaymentType::Bulk, &payment_id);
    let (path, _) = app.start_authorisation(&collection, Some(TEST_PSU_ID)).await;
    app.put(&path, Some(TEST_PSU_ID), Some(password_body(MOCK_PSU_PASSWORD)))
        .await;
    app.put(&path, Some(TEST_PSU_ID), Some(method_body("sms"))).await;

    let response = app.put(&path, Some(TEST_PSU_ID), Some(tan_body("000000"))).await;
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(body(app.get(&path).await).await["scaStatus"], "scaMethodSelected");
    assert_eq!(app.cms.payment_status(&payment_id), Some(TransactionStatus::Rcvd));

    let response = app.put(&path, Some(TEST_PSU_ID), Some(tan_body(MOCK_TAN))).await;
    assert_eq!(body(response).await["scaStatus"], "finalised");
}

#[tokio::test]
async fn sca_exemption_executes_the_payment_at_login() {
    let app = TestApp::spawn_with(MockAspspSpi::new().with_sca_exemption(true), |_| {}).await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let collection = authorisations_path(PaymentType::Single, &payment_id);
    let (path, _) = app.start_authorisation(&collection, Some(TEST_PSU_ID)).await;

    let response = app
        .put(&path, Some(TEST_PSU_ID), Some(password_body(MOCK_PSU_PASSWORD)))
        .await;

    assert_eq!(body(response).await["scaStatus"], "exempted");
    assert_eq!(app.cms.payment_status(&payment_id), Some(TransactionStatus::Acsp));
}

#[tokio::test]
async fn periodic_payments_are_never_exempted() {
    let app = TestApp::spawn_with(MockAspspSpi::new().with_sca_exemption(true), |_| {}).await;
    let payment_id = app.cms.seed_payment(PaymentType::Periodic);
    let collection = authorisations_path(PaymentType::Periodic, &payment_id);
    let (path, _) = app.start_authorisation(&collection, Some(TEST_PSU_ID)).await;

    let response = app
        .put(&path, Some(TEST_PSU_ID), Some(password_body(MOCK_PSU_PASSWORD)))
        .await;

    assert_eq!(body(response).await["scaStatus"], "psuAuthenticated");
    assert_eq!(app.cms.payment_status(&payment_id), Some(TransactionStatus::Rcvd));
}

#[tokio::test]
async fn psu_can_be_identified_after_the_start() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let collection = authorisations_path(PaymentType::Single, &payment_id);
    let (path, created) = app.start_authorisation(&collection, None).await;
    assert_eq!(created["scaStatus"], "received");

    let response = app.put(&path, None, None).await;
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(body(response).await["tppMessages"][0]["code"], "FORMAT_ERROR");

    let response = app.put(&path, Some(TEST_PSU_ID), None).await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(body(response).await["scaStatus"], "psuIdentified");
}

#[tokio::test]
async fn another_psu_cannot_take_over_the_authorisation() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let collection = authorisations_path(PaymentType::Single, &payment_id);
    let (path, _) = app.start_authorisation(&collection, Some(TEST_PSU_ID)).await;

    let response = app
        .put(&path, Some("someone-else"), Some(password_body(MOCK_PSU_PASSWORD)))
        .await;

    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(body(app.get(&path).await).await["scaStatus"], "psuIdentified");
}

#[tokio::test]
async fn unknown_payment_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post(&authorisations_path(PaymentType::Single, "unknown"), Some(TEST_PSU_ID))
        .await;

    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(body(response).await["tppMessages"][0]["code"], "RESOURCE_UNKNOWN");
}

#[tokio::test]
async fn payment_service_in_the_path_must_match_the_payment() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);

    let response = app
        .post(&authorisations_path(PaymentType::Periodic, &payment_id), Some(TEST_PSU_ID))
        .await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn authorisation_of_another_payment_is_unknown() {
    let app = TestApp::spawn().await;
    let first = app.cms.seed_payment(PaymentType::Single);
    let second = app.cms.seed_payment(PaymentType::Single);
    let (path, created) = app
        .start_authorisation(&authorisations_path(PaymentType::Single, &first), Some(TEST_PSU_ID))
        .await;
    assert!(path.contains(&first));

    let foreign = format!(
        "{}/{}",
        authorisations_path(PaymentType::Single, &second),
        created["authorisationId"].as_str().unwrap()
    );
    let response = app.get(&foreign).await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn authorisation_ids_are_listed_per_sub_resource() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let collection = authorisations_path(PaymentType::Single, &payment_id);
    app.start_authorisation(&collection, Some(TEST_PSU_ID)).await;
    app.start_authorisation(&collection, Some(TEST_PSU_ID)).await;

    let ids = body(app.get(&collection).await).await;
    assert_eq!(ids["authorisationIds"].as_array().map(Vec::len), Some(2));

    let cancellations = collection.replace("/authorisations", "/cancellation-authorisations");
    let ids = body(app.get(&cancellations).await).await;
    assert_eq!(ids["cancellationIds"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn malformed_update_body_is_a_format_error() {
    let app = TestApp::spawn().await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let collection = authorisations_path(PaymentType::Single, &payment_id);
    let (path, _) = app.start_authorisation(&collection, None).await;

    let response = app
        .put_raw(&path, Some(TEST_PSU_ID), r#"{"psuData": {"password": "#)
        .await;

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(body(response).await["tppMessages"][0]["code"], "FORMAT_ERROR");
    assert_eq!(body(app.get(&path).await).await["scaStatus"], "received");
}

#[tokio::test]
async fn decoupled_approach_starts_sca_in_the_bank_app() {
    let app = TestApp::spawn_with(MockAspspSpi::new(), |config| {
        config.sca.default_approach = ScaApproach::Decoupled;
    })
    .await;
    let payment_id = app.cms.seed_payment(PaymentType::Single);
    let collection = authorisations_path(PaymentType::Single, &payment_id);
    let (path, created) = app.start_authorisation(&collection, Some(TEST_PSU_ID)).await;
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
