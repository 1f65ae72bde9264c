//! Authorisation and cancellation-authorisation sub-resources of a payment.
//!
//! The payment service (`payments`, `periodic-payments`, `bulk-payments`) is
//! fixed per router and arrives as an [`Extension`].

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use service_core::cms::PaymentType;

use crate::{
    authorisation::ServiceKind,
    dtos::{
        AuthorisationsResponse, CancellationsResponse, Links, ScaStatusResponse,
        StartScaProcessResponse, UpdatePsuAuthenticationRequest, UpdatePsuAuthenticationResponse,
    },
    error::{ErrorHolder, ServiceType},
    handlers::{parse_psu_data_body, psu_data_request},
    middleware::PsuContext,
    services::{Parent, PaymentTarget},
    startup::AppState,
};

#[derive(Debug, Deserialize)]
pub struct PaymentPath {
    pub payment_product: String,
    pub payment_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentAuthorisationPath {
    pub payment_product: String,
    pub payment_id: String,
    pub authorisation_id: String,
}

fn parent(payment_type: PaymentType, payment_product: &str, payment_id: &str) -> Parent {
    Parent::Payment(PaymentTarget {
        payment_type,
        payment_product: payment_product.to_string(),
        payment_id: payment_id.to_string(),
    })
}

fn sub_resource(kind: ServiceKind) -> &'static str {
    match kind {
        ServiceKind::PisCancellation => "cancellation-authorisations",
        _ => "authorisations",
    }
}

fn authorisation_path(
    kind: ServiceKind,
    payment_type: PaymentType,
    payment_product: &str,
    payment_id: &str,
    authorisation_id: &str,
) -> String {
    format!(
        "/v1/{}/{}/{}/{}/{}",
        payment_type.service(),
        payment_product,
        payment_id,
        sub_resource(kind),
        authorisation_id
    )
}

async fn start(
    state: AppState,
    kind: ServiceKind,
    payment_type: PaymentType,
    psu: PsuContext,
    path: PaymentPath,
) -> Result<(StatusCode, Json<StartScaProcessResponse>), ErrorHolder> {
    tracing::info!(
        payment_id = %path.payment_id,
        payment_service = payment_type.service(),
        kind = %kind,
        "Starting payment authorisation"
    );

    let parent = parent(payment_type, &path.payment_product, &path.payment_id);
    let created = state
        .service
        .create_authorisation(kind, &parent, psu.psu_data)
        .await?;

    let self_path = authorisation_path(
        kind,
        payment_type,
        &path.payment_product,
        &path.payment_id,
        &created.authorisation_id,
    );

    Ok((
        StatusCode::CREATED,
        Json(StartScaProcessResponse {
            sca_status: created.sca_status.value(),
            links: Links::for_status(&self_path, created.sca_status, false),
            authorisation_id: created.authorisation_id,
        }),
    ))
}

async fn update(
    state: AppState,
    kind: ServiceKind,
    payment_type: PaymentType,
    psu: PsuContext,
    path: PaymentAuthorisationPath,
    body: Option<UpdatePsuAuthenticationRequest>,
) -> Result<Json<UpdatePsuAuthenticationResponse>, ErrorHolder> {
    tracing::info!(
        payment_id = %path.payment_id,
        authorisation_id = %path.authorisation_id,
        kind = %kind,
        "Updating PSU data"
    );

    let parent = parent(payment_type, &path.payment_product, &path.payment_id);
    let self_path = authorisation_path(
        kind,
        payment_type,
        &path.payment_product,
        &path.payment_id,
        &path.authorisation_id,
    );
    let request = psu_data_request(path.payment_id, path.authorisation_id, psu, body);

    let response = state.service.update_psu_data(kind, &parent, request).await?;

    Ok(Json(UpdatePsuAuthenticationResponse::from_stage(
        response, &self_path,
    )))
}

async fn sca_status(
    state: AppState,
    kind: ServiceKind,
    payment_type: PaymentType,
    path: PaymentAuthorisationPath,
) -> Result<Json<ScaStatusResponse>, ErrorHolder> {
    let parent = parent(payment_type, &path.payment_product, &path.payment_id);
    let status = state
        .service
        .get_sca_status(kind, &parent, &path.authorisation_id)
        .await?;

    Ok(Json(ScaStatusResponse {
        sca_status: status.value(),
    }))
}

pub async fn start_authorisation(
    State(state): State<AppState>,
    Extension(payment_type): Extension<PaymentType>,
    psu: PsuContext,
    Path(path): Path<PaymentPath>,
) -> Result<(StatusCode, Json<StartScaProcessResponse>), ErrorHolder> {
    start(state, ServiceKind::PisInitiation, payment_type, psu, path).await
}

pub async fn start_cancellation_authorisation(
    State(state): State<AppState>,
    Extension(payment_type): Extension<PaymentType>,
    psu: PsuContext,
    Path(path): Path<PaymentPath>,
) -> Result<(StatusCode, Json<StartScaProcessResponse>), ErrorHolder> {
    start(state, ServiceKind::PisCancellation, payment_type, psu, path).await
}

pub async fn update_psu_data(
    State(state): State<AppState>,
    Extension(payment_type): Extension<PaymentType>,
    psu: PsuContext,
    Path(path): Path<PaymentAuthorisationPath>,
    body: Bytes,
) -> Result<Json<UpdatePsuAuthenticationResponse>, ErrorHolder> {
    let body = parse_psu_data_body(&body, ServiceType::Pis)?;
    update(state, ServiceKind::PisInitiation, payment_type, psu, path, body).await
}

pub async fn update_cancellation_psu_data(
    State(state): State<AppState>,
    Extension(payment_type): Extension<PaymentType>,
    psu: PsuContext,
    Path(path): Path<PaymentAuthorisationPath>,
    body: Bytes,
) -> Result<Json<UpdatePsuAuthenticationResponse>, ErrorHolder> {
    let body = parse_psu_data_body(&body, ServiceType::Pis)?;
    update(state, ServiceKind::PisCancellation, payment_type, psu, path, body).await
}

pub async fn get_authorisation_ids(
    State(state): State<AppState>,
    Extension(payment_type): Extension<PaymentType>,
    Path(path): Path<PaymentPath>,
) -> Result<Json<AuthorisationsResponse>, ErrorHolder> {
    let parent = parent(payment_type, &path.payment_product, &path.payment_id);
    let authorisation_ids = state
        .service
        .get_authorisation_ids(ServiceKind::PisInitiation, &parent)
        .await?;

    Ok(Json(AuthorisationsResponse { authorisation_ids }))
}

pub async fn get_cancellation_ids(
    State(state): State<AppState>,
    Extension(payment_type): Extension<PaymentType>,
    Path(path): Path<PaymentPath>,
) -> Result<Json<CancellationsResponse>, ErrorHolder> {
    let parent = parent(payment_type, &path.payment_product, &path.payment_id);
    let cancellation_ids = state
        .service
        .get_authorisation_ids(ServiceKind::PisCancellation, &parent)
        .await?;

    Ok(Json(CancellationsResponse { cancellation_ids }))
}

pub async fn get_sca_status(
    State(state): State<AppState>,
    Extension(payment_type): Extension<PaymentType>,
    Path(path): Path<PaymentAuthorisationPath>,
) -> Result<Json<ScaStatusResponse>, ErrorHolder> {
    sca_status(state, ServiceKind::PisInitiation, payment_type, path).await
}

pub async fn get_cancellation_sca_status(
    State(state): State<AppState>,
    Extension(payment_type): Extension<PaymentType>,
    Path(path): Path<PaymentAuthorisationPath>,
) -> Result<Json<ScaStatusResponse>, ErrorHolder> {
    sca_status(state, ServiceKind::PisCancellation, payment_type, path).await
}
