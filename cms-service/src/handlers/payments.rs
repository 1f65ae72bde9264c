use crate::dtos::MultilevelScaQuery;
use crate::middleware::InstanceId;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::cms::{CreatePaymentRequest, TransactionStatus};
use service_core::error::AppError;

#[tracing::instrument(skip(state, request), fields(tpp = %request.tpp_info.authorisation_number))]
pub async fn create_payment(
    State(state): State<AppState>,
    InstanceId(instance_id): InstanceId,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.services.payments.create(request, &instance_id).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let payment = state.services.payments.get(&payment_id).await?;
    Ok(Json(payment))
}

#[tracing::instrument(skip(state))]
pub async fn update_payment_status(
    State(state): State<AppState>,
    Path((payment_id, status)): Path<(String, TransactionStatus)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .services
        .payments
        .update_status(&payment_id, status)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn update_multilevel_sca(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    Query(query): Query<MultilevelScaQuery>,
) -> Result<impl IntoResponse, AppError> {
    state
        .services
        .payments
        .update_multilevel_sca(&payment_id, query.multilevel_sca)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn get_psu_data(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let psus = state.services.payments.get_psu_data(&payment_id).await?;
    Ok(Json(psus))
}
