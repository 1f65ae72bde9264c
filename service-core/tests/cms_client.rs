use service_core::cms::{
    CmsClient, CmsError, CmsResponse, ConsentStatus, ScaStatus, TransactionStatus,
};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> CmsClient {
    CmsClient::new(server.uri(), Duration::from_millis(500)).unwrap()
}

#[tokio::test]
async fn authorisation_is_decoded_from_cms_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/authorisations/auth-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "authorisationId": "auth-1",
            "parentId": "payment-1",
            "authorisationType": "PIS_CREATION",
            "scaStatus": "PSUIDENTIFIED",
            "chosenScaApproach": "EMBEDDED",
            "psuData": { "psuId": "anton.brueckner" },
            "creationTimestamp": "2026-01-10T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let response = client_for(&server).get_authorisation("auth-1").await;

    let authorisation = response.into_result().unwrap();
    assert_eq!(authorisation.sca_status, ScaStatus::PsuIdentified);
    assert_eq!(
        authorisation.psu_data.unwrap().psu_id.as_deref(),
        Some("anton.brueckner")
    );
}

#[tokio::test]
async fn status_updates_use_wire_names_in_the_path() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/pis/common-payments/p-1/status/PATC"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/ais/consent/c-1/status/PARTIALLY_AUTHORISED"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);

    assert!(client
        .update_payment_status("p-1", TransactionStatus::Patc)
        .await
        .is_successful());
    assert!(client
        .update_consent_status("c-1", ConsentStatus::PartiallyAuthorised)
        .await
        .is_successful());
}

#[tokio::test]
async fn multilevel_flag_is_sent_as_query_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/ais/consent/c-1/multilevel-sca"))
        .and(query_param("multilevel-sca", "true"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server)
        .update_consent_multilevel_sca("c-1", true)
        .await;

    assert!(response.is_successful());
}

#[tokio::test]
async fn unknown_resource_is_a_logical_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/ais/consent/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": "Consent missing not found",
                "code": "NOT_FOUND"
            })),
        )
        .mount(&server)
        .await;

    let response = client_for(&server).get_consent("missing").await;

    assert_eq!(response.error(), Some(CmsError::LogicalError));
}

#[tokio::test]
async fn checksum_violation_is_reported_as_checksum_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/ais/consent/c-1/status/VALID"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(serde_json::json!({
                    "error": "Consent checksum mismatch",
                    "code": "CHECKSUM_ERROR"
                })),
        )
        .mount(&server)
        .await;

    let response = client_for(&server)
        .update_consent_status("c-1", ConsentStatus::Valid)
        .await;

    assert_eq!(response, CmsResponse::Failure(CmsError::ChecksumError));
}

#[tokio::test]
async fn server_failure_collapses_into_technical_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/authorisations/auth-1/authentication-methods/sms"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let response = client_for(&server)
        .is_authentication_method_decoupled("auth-1", "sms")
        .await;

    assert_eq!(response.error(), Some(CmsError::TechnicalError));
}

#[tokio::test]
async fn malformed_body_collapses_into_technical_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pis/common-payments/p-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let response = client_for(&server).get_payment("p-1").await;

    assert_eq!(response.error(), Some(CmsError::TechnicalError));
}

#[tokio::test]
async fn timeout_collapses_into_technical_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/authorisations/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let response = client_for(&server).get_authorisation("slow").await;

    assert_eq!(response.error(), Some(CmsError::TechnicalError));
}

#[tokio::test]
async fn unreachable_cms_collapses_into_technical_error() {
    let client = CmsClient::new("http://127.0.0.1:1", Duration::from_millis(200)).unwrap();

    let response = client.terminate_old_consents("c-1").await;

    assert_eq!(response.error(), Some(CmsError::TechnicalError));
}

#[tokio::test]
async fn request_id_of_the_current_task_is_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/ais/consent/c-1/status"))
        .and(header("x-request-id", "req-7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "consentStatus": "RECEIVED" })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = service_core::observability::with_request_id("req-7".to_string(), async {
        client.get_consent_status("c-1").await
    })
    .await;

    assert_eq!(response, CmsResponse::Success(ConsentStatus::Received));
}

#[tokio::test]
async fn ids_with_path_characters_stay_in_their_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/ais/consent/c-1%2Fstatus%2FVALID"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": "Consent not found",
            "code": "NOT_FOUND"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);

    assert_eq!(
        client.get_consent("c-1/status/VALID").await.error(),
        Some(CmsError::LogicalError)
    );
    // Dot segments never leave the client
    assert_eq!(
        client.get_authorisation("..").await.error(),
        Some(CmsError::LogicalError)
    );
}
