mod common;

use common::{TestApp, TEST_PSU_ID};
use reqwest::StatusCode;
use service_core::cms::{
    AuthorisationType, ConsentStatus, CreateAuthorisationRequest, PsuIdData, ScaApproach,
    ScaStatus,
};

async fn start_authorisation(
    app: &TestApp,
    parent_id: &str,
    authorisation_type: AuthorisationType,
    psu_id: &str,
) -> String {
    app.cms
        .create_authorisation(
            parent_id,
            authorisation_type,
            &CreateAuthorisationRequest {
                psu_data: Some(PsuIdData::new(psu_id)),
                sca_approach: ScaApproach::Redirect,
                sca_status: ScaStatus::Started,
            },
        )
        .await
        .into_result()
        .expect("Failed to create authorisation")
        .authorisation_id
}

#[tokio::test]
async fn psu_revokes_own_consent_once() {
    let app = TestApp::spawn().await;
    let consent_id = app.create_consent(TEST_PSU_ID, true).await;
    let path = format!("/psu-api/v1/ais/consent/{}/revoke-consent", consent_id);

    let response = app.put_with_headers(&path, &[("psu-id", "someone.else")]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.json::<bool>().await.expect("Failed to parse JSON"));

    let response = app.put_with_headers(&path, &[("psu-id", TEST_PSU_ID)]).await;
    assert!(response.json::<bool>().await.expect("Failed to parse JSON"));
    assert_eq!(
        app.cms.get_consent_status(&consent_id).await.into_result(),
        Ok(ConsentStatus::RevokedByPsu)
    );

    let response = app.put_with_headers(&path, &[("psu-id", TEST_PSU_ID)]).await;
    assert!(!response.json::<bool>().await.expect("Failed to parse JSON"));
}

#[tokio::test]
async fn revoke_requires_the_psu_header() {
    let app = TestApp::spawn().await;
    let consent_id = app.create_consent(TEST_PSU_ID, true).await;

    let response = app
        .put_with_headers(
            &format!("/psu-api/v1/ais/consent/{}/revoke-consent", consent_id),
            &[],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn psu_updates_consent_authorisation_status() {
    let app = TestApp::spawn().await;
    let consent_id = app.create_consent(TEST_PSU_ID, true).await;
    let authorisation_id =
        start_authorisation(&app, &consent_id, AuthorisationType::Ais, TEST_PSU_ID).await;
    let path = format!(
        "/psu-api/v1/ais/consent/{}/authorisation/{}/status/PSUAUTHENTICATED",
        consent_id, authorisation_id
    );

    let response = app.put_with_headers(&path, &[("psu-id", "someone.else")]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!response.json::<bool>().await.expect("Failed to parse JSON"));

    let response = app.put_with_headers(&path, &[("psu-id", TEST_PSU_ID)]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.json::<bool>().await.expect("Failed to parse JSON"));

    let authorisation = app
        .cms
        .get_authorisation(&authorisation_id)
        .await
        .into_result()
        .unwrap();
    assert_eq!(authorisation.sca_status, ScaStatus::PsuAuthenticated);
}

#[tokio::test]
async fn psu_updates_payment_authorisations_of_both_kinds() {
    let app = TestApp::spawn().await;
    let payment_id = app.create_payment(TEST_PSU_ID).await;
    let creation =
        start_authorisation(&app, &payment_id, AuthorisationType::PisCreation, TEST_PSU_ID).await;
    let cancellation = start_authorisation(
        &app,
        &payment_id,
        AuthorisationType::PisCancellation,
        TEST_PSU_ID,
    )
    .await;

    for authorisation_id in [&creation, &cancellation] {
        let response = app
            .put_with_headers(
                &format!(
                    "/psu-api/v1/payment/{}/authorisation/{}/status/FINALISED",
                    payment_id, authorisation_id
                ),
                &[("psu-id", TEST_PSU_ID)],
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Finalised authorisations stay as they are
    let response = app
        .put_with_headers(
            &format!(
                "/psu-api/v1/payment/{}/authorisation/{}/status/FAILED",
                payment_id, creation
            ),
            &[("psu-id", TEST_PSU_ID)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn authorisation_must_belong_to_the_addressed_parent() {
    let app = TestApp::spawn().await;
    let consent_id = app.create_consent(TEST_PSU_ID, true).await;
    let other_consent_id = app.create_consent("other.psu", true).await;
    let authorisation_id =
        start_authorisation(&app, &consent_id, AuthorisationType::Ais, TEST_PSU_ID).await;

    let response = app
        .put_with_headers(
            &format!(
                "/psu-api/v1/ais/consent/{}/authorisation/{}/status/FAILED",
                other_consent_id, authorisation_id
            ),
            &[("psu-id", TEST_PSU_ID)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Payment route does not reach consent authorisations
    let response = app
        .put_with_headers(
            &format!(
                "/psu-api/v1/payment/{}/authorisation/{}/status/FAILED",
                consent_id, authorisation_id
            ),
            &[("psu-id", TEST_PSU_ID)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
