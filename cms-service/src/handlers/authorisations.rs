use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use service_core::cms::{
    AuthenticationObject, AuthorisationIdsResponse, AuthorisationType,
    CreateAuthorisationRequest, DecoupledMethodResponse, ScaApproach, ScaStatus,
    UpdateAuthorisationRequest,
};
use service_core::error::AppError;

#[tracing::instrument(skip(state, request))]
pub async fn create_authorisation(
    State(state): State<AppState>,
    Extension(authorisation_type): Extension<AuthorisationType>,
    Path(parent_id): Path<String>,
    Json(request): Json<CreateAuthorisationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state
        .services
        .authorisations
        .create(authorisation_type, &parent_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_authorisation_ids(
    State(state): State<AppState>,
    Extension(authorisation_type): Extension<AuthorisationType>,
    Path(parent_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let authorisation_ids = state
        .services
        .authorisations
        .get_ids(authorisation_type, &parent_id)
        .await?;
    Ok(Json(AuthorisationIdsResponse { authorisation_ids }))
}

pub async fn get_authorisation(
    State(state): State<AppState>,
    Path(authorisation_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let authorisation = state.services.authorisations.get(&authorisation_id).await?;
    Ok(Json(authorisation))
}

#[tracing::instrument(skip(state, request), fields(sca_status = %request.sca_status))]
pub async fn update_authorisation(
    State(state): State<AppState>,
    Path(authorisation_id): Path<String>,
    Json(request): Json<UpdateAuthorisationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let authorisation = state
        .services
        .authorisations
        .update(&authorisation_id, request)
        .await?;
    Ok(Json(authorisation))
}

pub async fn update_authorisation_status(
    State(state): State<AppState>,
    Path((authorisation_id, status)): Path<(String, ScaStatus)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .services
        .authorisations
        .update_status(&authorisation_id, status)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn update_sca_approach(
    State(state): State<AppState>,
    Path((authorisation_id, approach)): Path<(String, ScaApproach)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .services
        .authorisations
        .update_sca_approach(&authorisation_id, approach)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn save_authentication_methods(
    State(state): State<AppState>,
    Path(authorisation_id): Path<String>,
    Json(methods): Json<Vec<AuthenticationObject>>,
) -> Result<impl IntoResponse, AppError> {
    state
        .services
        .authorisations
        .save_authentication_methods(&authorisation_id, methods)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn is_authentication_method_decoupled(
    State(state): State<AppState>,
    Path((authorisation_id, authentication_method_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let decoupled = state
        .services
        .authorisations
        .is_authentication_method_decoupled(&authorisation_id, &authentication_method_id)
        .await?;
    Ok(Json(DecoupledMethodResponse { decoupled }))
}
