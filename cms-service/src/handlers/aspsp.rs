//! Back-office API of the ASPSP: exports, payment status, TPP stop list,
//! PSU-wide consent closing and the event log.

use super::bool_response;
use crate::dtos::{DateRangeQuery, EventResponse};
use crate::middleware::{InstanceId, PageHeaders, PsuHeaders, TppAuthorisationNumber};
use crate::models::EventFilter;
use crate::services::ExportCriteria;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use service_core::cms::TransactionStatus;
use service_core::error::AppError;

pub const LOCK_PERIOD_HEADER: &str = "lock-period";
pub const START_DATE_HEADER: &str = "start-date";
pub const END_DATE_HEADER: &str = "end-date";

fn criteria(range: DateRangeQuery, instance_id: String, page: PageHeaders) -> ExportCriteria {
    ExportCriteria {
        start_date: range.start_date,
        end_date: range.end_date,
        instance_id,
        page: page.0,
    }
}

// Exports

pub async fn consents_by_tpp(
    State(state): State<AppState>,
    Path(tpp_id): Path<String>,
    Query(range): Query<DateRangeQuery>,
    PsuHeaders(psu): PsuHeaders,
    InstanceId(instance_id): InstanceId,
    page: PageHeaders,
) -> Result<impl IntoResponse, AppError> {
    let consents = state
        .services
        .exports
        .consents_by_tpp(&tpp_id, psu, &criteria(range, instance_id, page))
        .await?;
    Ok(Json(consents))
}

pub async fn consents_by_psu(
    State(state): State<AppState>,
    Query(range): Query<DateRangeQuery>,
    PsuHeaders(psu): PsuHeaders,
    InstanceId(instance_id): InstanceId,
    page: PageHeaders,
) -> Result<impl IntoResponse, AppError> {
    let consents = state
        .services
        .exports
        .consents_by_psu(psu, &criteria(range, instance_id, page))
        .await?;
    Ok(Json(consents))
}

pub async fn consents_by_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    Query(range): Query<DateRangeQuery>,
    InstanceId(instance_id): InstanceId,
    page: PageHeaders,
) -> Result<impl IntoResponse, AppError> {
    let consents = state
        .services
        .exports
        .consents_by_account(&account_id, &criteria(range, instance_id, page))
        .await?;
    Ok(Json(consents))
}

pub async fn payments_by_tpp(
    State(state): State<AppState>,
    Path(tpp_id): Path<String>,
    Query(range): Query<DateRangeQuery>,
    PsuHeaders(psu): PsuHeaders,
    InstanceId(instance_id): InstanceId,
    page: PageHeaders,
) -> Result<impl IntoResponse, AppError> {
    let payments = state
        .services
        .exports
        .payments_by_tpp(&tpp_id, psu, &criteria(range, instance_id, page))
        .await?;
    Ok(Json(payments))
}

pub async fn payments_by_psu(
    State(state): State<AppState>,
    Query(range): Query<DateRangeQuery>,
    PsuHeaders(psu): PsuHeaders,
    InstanceId(instance_id): InstanceId,
    page: PageHeaders,
) -> Result<impl IntoResponse, AppError> {
    let payments = state
        .services
        .exports
        .payments_by_psu(psu, &criteria(range, instance_id, page))
        .await?;
    Ok(Json(payments))
}

pub async fn payments_by_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    Query(range): Query<DateRangeQuery>,
    InstanceId(instance_id): InstanceId,
    page: PageHeaders,
) -> Result<impl IntoResponse, AppError> {
    let payments = state
        .services
        .exports
        .payments_by_account(&account_id, &criteria(range, instance_id, page))
        .await?;
    Ok(Json(payments))
}

// Payment status

#[tracing::instrument(skip(state))]
pub async fn update_payment_status(
    State(state): State<AppState>,
    Path((payment_id, status)): Path<(String, TransactionStatus)>,
    InstanceId(instance_id): InstanceId,
) -> Result<impl IntoResponse, AppError> {
    let updated = state
        .services
        .payments
        .update_status_by_aspsp(&payment_id, status, &instance_id)
        .await?;
    Ok(bool_response(updated))
}

// PSU consents

#[tracing::instrument(skip(state, psu))]
pub async fn close_all_consents(
    State(state): State<AppState>,
    PsuHeaders(psu): PsuHeaders,
    InstanceId(instance_id): InstanceId,
) -> Result<impl IntoResponse, AppError> {
    let Some(psu) = psu else {
        return Err(AppError::BadRequest(anyhow::anyhow!("PSU headers are required")));
    };
    let closed = state
        .services
        .consents
        .close_all_by_psu(&psu, &instance_id)
        .await?;
    Ok(Json(closed))
}

// TPP stop list

pub async fn get_stop_list_record(
    State(state): State<AppState>,
    TppAuthorisationNumber(tpp): TppAuthorisationNumber,
    InstanceId(instance_id): InstanceId,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .services
        .stop_list
        .get_record(&tpp, &instance_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("TPP {} is not on the stop list", tpp)))?;
    Ok(Json(record))
}

#[tracing::instrument(skip(state, headers))]
pub async fn block_tpp(
    State(state): State<AppState>,
    TppAuthorisationNumber(tpp): TppAuthorisationNumber,
    InstanceId(instance_id): InstanceId,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let lock_period = headers
        .get(LOCK_PERIOD_HEADER)
        .map(|v| {
            v.to_str()
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok())
                .map(|ms| Duration::milliseconds(i64::from(ms)))
                .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid lock-period header")))
        })
        .transpose()?;

    let blocked = state
        .services
        .stop_list
        .block(&tpp, &instance_id, lock_period)
        .await?;
    Ok(Json(blocked))
}

#[tracing::instrument(skip(state))]
pub async fn unblock_tpp(
    State(state): State<AppState>,
    TppAuthorisationNumber(tpp): TppAuthorisationNumber,
    InstanceId(instance_id): InstanceId,
) -> Result<impl IntoResponse, AppError> {
    let unblocked = state.services.stop_list.unblock(&tpp, &instance_id).await?;
    Ok(Json(unblocked))
}

// Events

fn timestamp_header(headers: &HeaderMap, name: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .ok()
                .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
                .map(|t| t.with_timezone(&Utc))
                .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid {} header", name)))
        })
        .transpose()
}

async fn find_events(
    state: &AppState,
    headers: &HeaderMap,
    instance_id: String,
    consent_id: Option<String>,
    payment_id: Option<String>,
) -> Result<Json<Vec<EventResponse>>, AppError> {
    let filter = EventFilter {
        instance_id,
        from: timestamp_header(headers, START_DATE_HEADER)?,
        to: timestamp_header(headers, END_DATE_HEADER)?,
        consent_id,
        payment_id,
    };
    let events = state.services.events.find(&filter).await?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

pub async fn get_events(
    State(state): State<AppState>,
    InstanceId(instance_id): InstanceId,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    find_events(&state, &headers, instance_id, None, None).await
}

pub async fn get_consent_events(
    State(state): State<AppState>,
    Path(consent_id): Path<String>,
    InstanceId(instance_id): InstanceId,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    find_events(&state, &headers, instance_id, Some(consent_id), None).await
}

pub async fn get_payment_events(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    InstanceId(instance_id): InstanceId,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    find_events(&state, &headers, instance_id, None, Some(payment_id)).await
}
