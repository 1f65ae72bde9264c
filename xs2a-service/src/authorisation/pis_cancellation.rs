//! Stages of a payment cancellation authorisation (PIS_CANCELLATION).

use super::common::{
    extract_psu_data, is_method_decoupled, save_sca_methods, spi_context, spi_error,
    stored_method, switch_to_decoupled, take_payload,
};
use super::decoupled;
use super::{ScaStage, StageContext, StageDependencies, UpdatePsuDataResponse};
use crate::error::{ErrorHolder, ErrorType, MessageErrorCode, ServiceType};
use crate::spi::{SpiAuthorisationStatus, SpiScaConfirmation};
use async_trait::async_trait;
use service_core::cms::{CmsPayment, PsuIdData, ScaApproach, ScaStatus, TransactionStatus};

pub struct ReceivedStage {
    deps: StageDependencies,
}

impl ReceivedStage {
    pub fn new(deps: StageDependencies) -> Self {
        Self { deps }
    }

    /// Only a PSU already linked to the payment may cancel it.
    async fn apply_identification(
        &self,
        ctx: &StageContext,
        payment: &CmsPayment,
    ) -> UpdatePsuDataResponse {
        let psu_data = &ctx.request.psu_data;
        if psu_data.is_empty() {
            return ctx.error(ErrorType::PIS_400, MessageErrorCode::FormatErrorNoPsu);
        }

        let payment_psus = match self
            .deps
            .cms
            .get_payment_psu_data(&payment.payment_id)
            .await
            .into_result()
        {
            Ok(psus) => psus,
            Err(e) => {
                tracing::error!(
                    payment_id = %payment.payment_id,
                    cms_error = ?e,
                    "PSUs of the payment could not be read"
                );
                return UpdatePsuDataResponse::failed(
                    ErrorHolder::internal(ServiceType::Pis),
                    ctx,
                );
            }
        };

        if !payment_psus.iter().any(|psu| psu.content_equals(psu_data)) {
            tracing::info!(
                payment_id = %payment.payment_id,
                psu_id = ?psu_data.psu_id,
                "PSU is not linked to the payment"
            );
            return ctx.error(ErrorType::PIS_401, MessageErrorCode::PsuCredentialsInvalid);
        }

        UpdatePsuDataResponse::new(ScaStatus::PsuIdentified, ctx, Some(psu_data.clone()))
    }

    async fn apply_authorisation(
        &self,
        ctx: &StageContext,
        payment: &CmsPayment,
    ) -> UpdatePsuDataResponse {
        let deps = &self.deps;
        let psu_data = extract_psu_data(&ctx.request.psu_data, &ctx.authorisation);
        let spi_ctx = spi_context(ctx, &psu_data, &payment.tpp_info);
        let password = ctx.request.password.as_deref().unwrap_or_default();

        let login = deps
            .payment_cancellation_spi
            .authorise_psu(
                &spi_ctx,
                &ctx.request.authorisation_id,
                &psu_data,
                password,
                payment,
            )
            .await;
        let login_failed = login.has_error()
            || login.payload.as_ref().map(|l| l.status) == Some(SpiAuthorisationStatus::Failure);
        if login_failed {
            return ctx.error(ErrorType::PIS_401, MessageErrorCode::PsuCredentialsInvalid);
        }

        if ctx.authorisation.chosen_sca_approach == ScaApproach::Decoupled {
            return decoupled::start_payment_cancellation(deps, ctx, payment, psu_data, None)
                .await;
        }

        let response = deps
            .payment_cancellation_spi
            .request_available_sca_methods(&spi_ctx, payment)
            .await;
        let methods = match take_payload(response, ctx) {
            Ok(available) => available.available_sca_methods,
            Err(failed) => return failed,
        };

        match methods.len() {
            0 => self.cancel_without_sca(ctx, payment, psu_data).await,
            1 => {
                save_sca_methods(deps, ctx, &methods).await;
                let method = methods[0].clone();

                if method.decoupled {
                    switch_to_decoupled(deps, ctx).await;
                    return decoupled::start_payment_cancellation(
                        deps,
                        ctx,
                        payment,
                        psu_data,
                        Some(method),
                    )
                    .await;
                }

                let response = deps
                    .payment_cancellation_spi
                    .request_authorisation_code(&spi_ctx, &method.authentication_method_id, payment)
                    .await;
                let code = match take_payload(response, ctx) {
                    Ok(code) => code,
                    Err(failed) => return failed,
                };

                UpdatePsuDataResponse {
                    chosen_sca_method: Some(code.selected_sca_method.unwrap_or(method)),
                    challenge_data: code.challenge_data,
                    ..UpdatePsuDataResponse::new(ScaStatus::ScaMethodSelected, ctx, Some(psu_data))
                }
            }
            _ => {
                save_sca_methods(deps, ctx, &methods).await;
                UpdatePsuDataResponse {
                    available_sca_methods: methods,
                    ..UpdatePsuDataResponse::new(ScaStatus::PsuAuthenticated, ctx, Some(psu_data))
                }
            }
        }
    }

    async fn cancel_without_sca(
        &self,
        ctx: &StageContext,
        payment: &CmsPayment,
        psu_data: PsuIdData,
    ) -> UpdatePsuDataResponse {
        let spi_ctx = spi_context(ctx, &psu_data, &payment.tpp_info);
        let response = self
            .deps
            .payment_cancellation_spi
            .cancel_payment_without_sca(&spi_ctx, payment)
            .await;
        if let Err(failed) = take_payload(response, ctx) {
            return failed;
        }

        mark_cancelled(&self.deps, payment).await;
        UpdatePsuDataResponse::new(ScaStatus::Finalised, ctx, Some(psu_data))
    }
}

#[async_trait]
impl ScaStage for ReceivedStage {
    fn name(&self) -> &'static str {
        "pis_cancellation_received"
    }

    async fn apply(&self, ctx: &StageContext) -> UpdatePsuDataResponse {
        let payment = match ctx.payment() {
            Ok(payment) => payment,
            Err(failed) => return failed,
        };

        let identification = ctx.request.is_update_psu_identification()
            && ctx.authorisation.chosen_sca_approach != ScaApproach::Decoupled;
        if identification {
            return self.apply_identification(ctx, payment).await;
        }
        self.apply_authorisation(ctx, payment).await
    }
}

pub struct PsuAuthenticatedStage {
    deps: StageDependencies,
}

impl PsuAuthenticatedStage {
    pub fn new(deps: StageDependencies) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl ScaStage for PsuAuthenticatedStage {
    fn name(&self) -> &'static str {
        "pis_cancellation_psu_authenticated"
    }

    async fn apply(&self, ctx: &StageContext) -> UpdatePsuDataResponse {
        let deps = &self.deps;
        let payment = match ctx.payment() {
            Ok(payment) => payment,
            Err(failed) => return failed,
        };
        let Some(method_id) = ctx.request.authentication_method_id.clone() else {
            return ctx.error(ErrorType::PIS_400, MessageErrorCode::ScaMethodUnknown);
        };
        let psu_data = extract_psu_data(&ctx.request.psu_data, &ctx.authorisation);

        if is_method_decoupled(deps, ctx, &method_id).await {
            switch_to_decoupled(deps, ctx).await;
            let method = stored_method(ctx, &method_id);
            return decoupled::start_payment_cancellation(deps, ctx, payment, psu_data, method)
                .await;
        }

        let spi_ctx = spi_context(ctx, &psu_data, &payment.tpp_info);
        let response = deps
            .payment_cancellation_spi
            .request_authorisation_code(&spi_ctx, &method_id, payment)
            .await;
        let code = match take_payload(response, ctx) {
            Ok(code) => code,
            Err(failed) => return failed,
        };

        if code.is_empty() {
            return ctx.error(ErrorType::PIS_400, MessageErrorCode::ScaMethodUnknown);
        }

        UpdatePsuDataResponse {
            chosen_sca_method: code
                .selected_sca_method
                .or_else(|| stored_method(ctx, &method_id)),
            challenge_data: code.challenge_data,
            ..UpdatePsuDataResponse::new(ScaStatus::ScaMethodSelected, ctx, Some(psu_data))
        }
    }
}

pub struct ScaMethodSelectedStage {
    deps: StageDependencies,
}

impl ScaMethodSelectedStage {
    pub fn new(deps: StageDependencies) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl ScaStage for ScaMethodSelectedStage {
    fn name(&self) -> &'static str {
        "pis_cancellation_sca_method_selected"
    }

    async fn apply(&self, ctx: &StageContext) -> UpdatePsuDataResponse {
        let payment = match ctx.payment() {
            Ok(payment) => payment,
            Err(failed) => return failed,
        };
        let Some(tan) = ctx.request.sca_authentication_data.clone() else {
            return ctx.error(ErrorType::PIS_400, MessageErrorCode::FormatError);
        };
        let psu_data = extract_psu_data(&ctx.request.psu_data, &ctx.authorisation);

        let confirmation = SpiScaConfirmation {
            parent_id: payment.payment_id.clone(),
            authorisation_id: ctx.request.authorisation_id.clone(),
            psu_data: psu_data.clone(),
            tan,
        };
        let spi_ctx = spi_context(ctx, &psu_data, &payment.tpp_info);
        let response = self
            .deps
            .payment_cancellation_spi
            .verify_sca_authorisation_and_cancel_payment(&spi_ctx, &confirmation, payment)
            .await;

        if response.has_error() {
            return UpdatePsuDataResponse::failed(spi_error(&response, ctx.service_type()), ctx);
        }

        mark_cancelled(&self.deps, payment).await;
        UpdatePsuDataResponse::new(ScaStatus::Finalised, ctx, Some(psu_data))
    }
}

async fn mark_cancelled(deps: &StageDependencies, payment: &CmsPayment) {
    tracing::info!(payment_id = %payment.payment_id, "Payment cancelled");

    let response = deps
        .cms
        .update_payment_status(&payment.payment_id, TransactionStatus::Canc)
        .await;
    if response.has_error() {
        tracing::warn!(
            payment_id = %payment.payment_id,
            cms_error = ?response.error(),
            "Could not store cancelled payment status"
        );
    }
}
