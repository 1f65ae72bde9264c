//! Authorisation sub-resources of an account information consent.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    authorisation::ServiceKind,
    dtos::{
        AuthorisationsResponse, Links, ScaStatusResponse, StartScaProcessResponse,
        UpdatePsuAuthenticationResponse,
    },
    error::{ErrorHolder, ServiceType},
    handlers::{parse_psu_data_body, psu_data_request},
    middleware::PsuContext,
    services::Parent,
    startup::AppState,
};

fn authorisation_path(consent_id: &str, authorisation_id: &str) -> String {
    format!("/v1/consents/{}/authorisations/{}", consent_id, authorisation_id)
}

pub async fn start_authorisation(
    State(state): State<AppState>,
    psu: PsuContext,
    Path(consent_id): Path<String>,
) -> Result<(StatusCode, Json<StartScaProcessResponse>), ErrorHolder> {
    tracing::info!(consent_id = %consent_id, "Starting consent authorisation");

    let created = state
        .service
        .create_authorisation(ServiceKind::Ais, &Parent::Consent(consent_id.clone()), psu.psu_data)
        .await?;

    let self_path = authorisation_path(&consent_id, &created.authorisation_id);

    Ok((
        StatusCode::CREATED,
        Json(StartScaProcessResponse {
            sca_status: created.sca_status.value(),
            links: Links::for_status(&self_path, created.sca_status, false),
            authorisation_id: created.authorisation_id,
        }),
    ))
}

pub async fn update_psu_data(
    State(state): State<AppState>,
    psu: PsuContext,
    Path((consent_id, authorisation_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<UpdatePsuAuthenticationResponse>, ErrorHolder> {
    let body = parse_psu_data_body(&body, ServiceType::Ais)?;

    tracing::info!(
        consent_id = %consent_id,
        authorisation_id = %authorisation_id,
        "Updating PSU data"
    );

    let parent = Parent::Consent(consent_id.clone());
    let self_path = authorisation_path(&consent_id, &authorisation_id);
    let request = psu_data_request(consent_id, authorisation_id, psu, body);

    let response = state
        .service
        .update_psu_data(ServiceKind::Ais, &parent, request)
        .await?;

    Ok(Json(UpdatePsuAuthenticationResponse::from_stage(
        response, &self_path,
    )))
}

pub async fn get_authorisation_ids(
    State(state): State<AppState>,
    Path(consent_id): Path<String>,
) -> Result<Json<AuthorisationsResponse>, ErrorHolder> {
    let authorisation_ids = state
        .service
        .get_authorisation_ids(ServiceKind::Ais, &Parent::Consent(consent_id))
        .await?;

    Ok(Json(AuthorisationsResponse { authorisation_ids }))
}

pub async fn get_sca_status(
    State(state): State<AppState>,
    Path((consent_id, authorisation_id)): Path<(String, String)>,
) -> Result<Json<ScaStatusResponse>, ErrorHolder> {
    let status = state
        .service
        .get_sca_status(ServiceKind::Ais, &Parent::Consent(consent_id), &authorisation_id)
        .await?;

    Ok(Json(ScaStatusResponse {
        sca_status: status.value(),
    }))
}
