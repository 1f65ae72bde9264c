use crate::dtos::MultilevelScaQuery;
use crate::middleware::InstanceId;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::cms::{ConsentStatus, ConsentStatusResponse, CreateConsentRequest};
use service_core::error::AppError;

#[tracing::instrument(skip(state, request), fields(tpp = %request.tpp_info.authorisation_number))]
pub async fn create_consent(
    State(state): State<AppState>,
    InstanceId(instance_id): InstanceId,
    Json(request): Json<CreateConsentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.services.consents.create(request, &instance_id).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_consent(
    State(state): State<AppState>,
    Path(consent_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let consent = state.services.consents.get(&consent_id).await?;
    Ok(Json(consent))
}

pub async fn get_consent_status(
    State(state): State<AppState>,
    Path(consent_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let consent_status = state.services.consents.get_status(&consent_id).await?;
    Ok(Json(ConsentStatusResponse { consent_status }))
}

#[tracing::instrument(skip(state))]
pub async fn update_consent_status(
    State(state): State<AppState>,
    Path((consent_id, status)): Path<(String, ConsentStatus)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .services
        .consents
        .update_status(&consent_id, status)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn update_multilevel_sca(
    State(state): State<AppState>,
    Path(consent_id): Path<String>,
    Query(query): Query<MultilevelScaQuery>,
) -> Result<impl IntoResponse, AppError> {
    state
        .services
        .consents
        .update_multilevel_sca(&consent_id, query.multilevel_sca)
        .await?;
    Ok(StatusCode::OK)
}

#[tracing::instrument(skip(state))]
pub async fn terminate_old_consents(
    State(state): State<AppState>,
    Path(consent_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let terminated = state
        .services
        .consents
        .terminate_old_consents(&consent_id)
        .await?;
    Ok(Json(terminated))
}
