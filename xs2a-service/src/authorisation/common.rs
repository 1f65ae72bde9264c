//! Helpers shared by the stage implementations.

use super::{StageContext, StageDependencies, UpdatePsuDataResponse};
use crate::error::{ErrorHolder, ServiceType};
use crate::spi::{map_spi_errors, SpiContextData, SpiResponse};
use service_core::cms::{
    AuthenticationObject, CmsAuthorisation, CmsPayment, PaymentType, PsuIdData, ScaApproach,
    ScaStatus, TppInfo, TransactionStatus,
};

/// PSU data from the request when present, otherwise the PSU already stored
/// on the authorisation.
pub fn extract_psu_data(request_psu: &PsuIdData, authorisation: &CmsAuthorisation) -> PsuIdData {
    if request_psu.is_not_empty() {
        return request_psu.clone();
    }
    authorisation.psu_data.clone().unwrap_or_default()
}

pub fn spi_context(ctx: &StageContext, psu_data: &PsuIdData, tpp_info: &TppInfo) -> SpiContextData {
    SpiContextData {
        psu_data: psu_data.clone(),
        tpp_info: tpp_info.clone(),
        request_id: ctx.request.request_id.clone(),
    }
}

/// Periodic payments always need SCA, whatever the ASPSP reports.
pub fn is_sca_exempted(sca_exempted: bool, payment: &CmsPayment) -> bool {
    sca_exempted && payment.payment_type != PaymentType::Periodic
}

pub fn spi_error<T>(response: &SpiResponse<T>, service_type: ServiceType) -> ErrorHolder {
    map_spi_errors(&response.errors, service_type)
}

/// Unwraps a successful SPI payload or produces the mapped failure response.
pub fn take_payload<T>(
    response: SpiResponse<T>,
    ctx: &StageContext,
) -> Result<T, UpdatePsuDataResponse> {
    if response.has_error() {
        return Err(UpdatePsuDataResponse::failed(
            spi_error(&response, ctx.service_type()),
            ctx,
        ));
    }
    response
        .payload
        .ok_or_else(|| UpdatePsuDataResponse::failed(ErrorHolder::internal(ctx.service_type()), ctx))
}

pub async fn mark_authorisation_failed(deps: &StageDependencies, ctx: &StageContext) {
    let authorisation_id = &ctx.request.authorisation_id;
    let response = deps
        .cms
        .update_authorisation_status(authorisation_id, ScaStatus::Failed)
        .await;

    if response.has_error() {
        tracing::warn!(
            authorisation_id = %authorisation_id,
            cms_error = ?response.error(),
            "Could not mark authorisation as failed"
        );
    }
}

pub async fn switch_to_decoupled(deps: &StageDependencies, ctx: &StageContext) {
    let authorisation_id = &ctx.request.authorisation_id;
    let response = deps
        .cms
        .update_sca_approach(authorisation_id, ScaApproach::Decoupled)
        .await;

    if response.has_error() {
        tracing::warn!(
            authorisation_id = %authorisation_id,
            cms_error = ?response.error(),
            "Could not switch authorisation to decoupled approach"
        );
    }
}

pub async fn save_sca_methods(
    deps: &StageDependencies,
    ctx: &StageContext,
    methods: &[AuthenticationObject],
) {
    let authorisation_id = &ctx.request.authorisation_id;
    let response = deps
        .cms
        .save_authentication_methods(authorisation_id, methods)
        .await;

    if response.has_error() {
        tracing::warn!(
            authorisation_id = %authorisation_id,
            cms_error = ?response.error(),
            "Could not save available SCA methods"
        );
    }
}

/// The method with `authentication_method_id` among those offered earlier in this authorisation.
pub fn stored_method(ctx: &StageContext, authentication_method_id: &str) -> Option<AuthenticationObject> {
    ctx.authorisation
        .available_sca_methods
        .iter()
        .find(|m| m.authentication_method_id == authentication_method_id)
        .cloned()
}

/// CMS failures are treated as "not decoupled".
pub async fn is_method_decoupled(
    deps: &StageDependencies,
    ctx: &StageContext,
    authentication_method_id: &str,
) -> bool {
    deps.cms
        .is_authentication_method_decoupled(&ctx.request.authorisation_id, authentication_method_id)
        .await
        .into_payload()
        .unwrap_or(false)
}

/// Persist a payment status reported by the ASPSP, flagging multilevel SCA on PATC.
pub async fn store_transaction_status(
    deps: &StageDependencies,
    payment_id: &str,
    status: TransactionStatus,
) {
    if status == TransactionStatus::Patc {
        let response = deps.cms.update_payment_multilevel_sca(payment_id, true).await;
        if response.has_error() {
            tracing::warn!(payment_id, cms_error = ?response.error(), "Could not flag multilevel SCA");
        }
    }

    let response = deps.cms.update_payment_status(payment_id, status).await;
    if response.has_error() {
        tracing::warn!(payment_id, status = %status, cms_error = ?response.error(), "Could not update payment status");
    }
}

/// Execute the payment straight away and report `result_status` (FINALISED, or
/// EXEMPTED when the ASPSP waived SCA).
pub async fn execute_payment_without_sca(
    deps: &StageDependencies,
    ctx: &StageContext,
    payment: &CmsPayment,
    psu_data: PsuIdData,
    result_status: ScaStatus,
) -> UpdatePsuDataResponse {
    let spi_ctx = spi_context(ctx, &psu_data, &payment.tpp_info);
    let response = deps
        .payment_spi
        .execute_payment_without_sca(&spi_ctx, payment)
        .await;

    let execution = match take_payload(response, ctx) {
        Ok(execution) => execution,
        Err(failed) => return failed,
    };

    tracing::info!(
        payment_id = %payment.payment_id,
        transaction_status = %execution.transaction_status,
        result_status = %result_status,
        "Payment executed without SCA"
    );

    store_transaction_status(deps, &payment.payment_id, execution.transaction_status).await;

    UpdatePsuDataResponse::new(result_status, ctx, Some(psu_data))
}
