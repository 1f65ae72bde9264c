//! Decoupled SCA: the ASPSP contacts the PSU out of band (e.g. a banking app)
//! and the TPP only learns a message to show.

use super::common::{spi_context, take_payload};
use super::{StageContext, StageDependencies, UpdatePsuDataResponse};
use crate::spi::{SpiAuthorisationDecoupledScaResponse, SpiResponse};
use service_core::cms::{AuthenticationObject, CmsConsent, CmsPayment, PsuIdData, ScaStatus};

pub async fn start_payment_initiation(
    deps: &StageDependencies,
    ctx: &StageContext,
    payment: &CmsPayment,
    psu_data: PsuIdData,
    method: Option<AuthenticationObject>,
) -> UpdatePsuDataResponse {
    let spi_ctx = spi_context(ctx, &psu_data, &payment.tpp_info);
    let response = deps
        .payment_authorisation_spi
        .start_sca_decoupled(
            &spi_ctx,
            &ctx.request.authorisation_id,
            method_id(&method),
            payment,
        )
        .await;

    started(response, ctx, psu_data, method)
}

pub async fn start_payment_cancellation(
    deps: &StageDependencies,
    ctx: &StageContext,
    payment: &CmsPayment,
    psu_data: PsuIdData,
    method: Option<AuthenticationObject>,
) -> UpdatePsuDataResponse {
    let spi_ctx = spi_context(ctx, &psu_data, &payment.tpp_info);
    let response = deps
        .payment_cancellation_spi
        .start_sca_decoupled(
            &spi_ctx,
            &ctx.request.authorisation_id,
            method_id(&method),
            payment,
        )
        .await;

    started(response, ctx, psu_data, method)
}

pub async fn start_consent(
    deps: &StageDependencies,
    ctx: &StageContext,
    consent: &CmsConsent,
    psu_data: PsuIdData,
    method: Option<AuthenticationObject>,
) -> UpdatePsuDataResponse {
    let spi_ctx = spi_context(ctx, &psu_data, &consent.tpp_info);
    let response = deps
        .ais_consent_spi
        .start_sca_decoupled(
            &spi_ctx,
            &ctx.request.authorisation_id,
            method_id(&method),
            consent,
        )
        .await;

    started(response, ctx, psu_data, method)
}

fn method_id(method: &Option<AuthenticationObject>) -> Option<&str> {
    method.as_ref().map(|m| m.authentication_method_id.as_str())
}

fn started(
    response: SpiResponse<SpiAuthorisationDecoupledScaResponse>,
    ctx: &StageContext,
    psu_data: PsuIdData,
    method: Option<AuthenticationObject>,
) -> UpdatePsuDataResponse {
    let decoupled = match take_payload(response, ctx) {
        Ok(decoupled) => decoupled,
        Err(failed) => return failed,
    };

    tracing::info!(
        authorisation_id = %ctx.request.authorisation_id,
        kind = %ctx.kind,
        "Decoupled SCA started"
    );

    UpdatePsuDataResponse {
        chosen_sca_method: method,
        psu_message: Some(decoupled.psu_message),
        ..UpdatePsuDataResponse::new(ScaStatus::ScaMethodSelected, ctx, Some(psu_data))
    }
}
