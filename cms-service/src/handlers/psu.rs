//! PSU-facing API, used by the ASPSP's online banking on behalf of a PSU.

use super::bool_response;
use crate::middleware::{InstanceId, PsuHeaders};
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::cms::{AuthorisationType, PsuIdData, ScaStatus};
use service_core::error::AppError;

fn required_psu(psu: Option<PsuIdData>) -> Result<PsuIdData, AppError> {
    psu.filter(|p| p.is_not_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("psu-id header is required")))
}

#[tracing::instrument(skip(state, psu))]
pub async fn update_consent_authorisation_status(
    State(state): State<AppState>,
    Path((consent_id, authorisation_id, status)): Path<(String, String, ScaStatus)>,
    PsuHeaders(psu): PsuHeaders,
) -> Result<impl IntoResponse, AppError> {
    let psu = required_psu(psu)?;
    let updated = state
        .services
        .authorisations
        .update_status_by_psu(&[AuthorisationType::Ais], &consent_id, &authorisation_id, &psu, status)
        .await?;
    Ok(bool_response(updated))
}

#[tracing::instrument(skip(state, psu))]
pub async fn update_payment_authorisation_status(
    State(state): State<AppState>,
    Path((payment_id, authorisation_id, status)): Path<(String, String, ScaStatus)>,
    PsuHeaders(psu): PsuHeaders,
) -> Result<impl IntoResponse, AppError> {
    let psu = required_psu(psu)?;
    let updated = state
        .services
        .authorisations
        .update_status_by_psu(
            &[AuthorisationType::PisCreation, AuthorisationType::PisCancellation],
            &payment_id,
            &authorisation_id,
            &psu,
            status,
        )
        .await?;
    Ok(bool_response(updated))
}

#[tracing::instrument(skip(state, psu))]
pub async fn revoke_consent(
    State(state): State<AppState>,
    Path(consent_id): Path<String>,
    PsuHeaders(psu): PsuHeaders,
    InstanceId(instance_id): InstanceId,
) -> Result<impl IntoResponse, AppError> {
    let psu = required_psu(psu)?;
    let revoked = state
        .services
        .consents
        .revoke_by_psu(&consent_id, &psu, &instance_id)
        .await?;
    Ok(Json(revoked))
}
