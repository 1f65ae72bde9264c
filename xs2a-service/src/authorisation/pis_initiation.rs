//! Stages of a payment initiation authorisation (PIS_CREATION).

use super::common::{
    execute_payment_without_sca, extract_psu_data, is_method_decoupled, is_sca_exempted,
    mark_authorisation_failed, save_sca_methods, spi_context, spi_error, store_transaction_status,
    stored_method, switch_to_decoupled, take_payload,
};
use super::decoupled;
use super::{ScaStage, StageContext, StageDependencies, UpdatePsuDataResponse};
use crate::error::{ErrorType, MessageErrorCode};
use crate::spi::{SpiAuthorisationStatus, SpiAuthorizationCodeResult, SpiScaConfirmation};
use async_trait::async_trait;
use service_core::cms::{AuthenticationObject, CmsPayment, PsuIdData, ScaApproach, ScaStatus};

/// RECEIVED and PSUIDENTIFIED: identify the PSU, then log them in and pick an SCA method.
pub struct ReceivedStage {
    deps: StageDependencies,
}

impl ReceivedStage {
    pub fn new(deps: StageDependencies) -> Self {
        Self { deps }
    }

    fn apply_identification(&self, ctx: &StageContext) -> UpdatePsuDataResponse {
        let psu_data = &ctx.request.psu_data;
        if psu_data.is_empty() {
            return ctx.error(ErrorType::PIS_400, MessageErrorCode::FormatErrorNoPsu);
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

        let response = deps
            .payment_authorisation_spi
            .authorise_psu(
                &spi_ctx,
                &ctx.request.authorisation_id,
                &psu_data,
                password,
                payment,
            )
            .await;
        let login = match take_payload(response, ctx) {
            Ok(login) => login,
            Err(failed) => return failed,
        };

        if login.status == SpiAuthorisationStatus::Failure {
            tracing::info!(
                payment_id = %payment.payment_id,
                authorisation_id = %ctx.request.authorisation_id,
                "PSU login failed"
            );
            mark_authorisation_failed(deps, ctx).await;
            return ctx.error(ErrorType::PIS_401, MessageErrorCode::PsuCredentialsInvalid);
        }

        if is_sca_exempted(login.sca_exempted, payment) {
            return execute_payment_without_sca(deps, ctx, payment, psu_data, ScaStatus::Exempted)
                .await;
        }

        if ctx.authorisation.chosen_sca_approach == ScaApproach::Decoupled {
            return decoupled::start_payment_initiation(deps, ctx, payment, psu_data, None).await;
        }

        let response = deps
            .payment_authorisation_spi
            .request_available_sca_methods(&spi_ctx, payment)
            .await;
        let available = match take_payload(response, ctx) {
            Ok(available) => available,
            Err(failed) => return failed,
        };

        if is_sca_exempted(available.sca_exempted, payment) {
            return execute_payment_without_sca(deps, ctx, payment, psu_data, ScaStatus::Exempted)
                .await;
        }

        let methods = available.available_sca_methods;
        match methods.len() {
            0 => {
                execute_payment_without_sca(deps, ctx, payment, psu_data, ScaStatus::Finalised)
                    .await
            }
            1 => {
                save_sca_methods(deps, ctx, &methods).await;
                let method = methods[0].clone();

                if method.decoupled {
                    switch_to_decoupled(deps, ctx).await;
                    return decoupled::start_payment_initiation(
                        deps,
                        ctx,
                        payment,
                        psu_data,
                        Some(method),
                    )
                    .await;
                }

                let response = deps
                    .payment_authorisation_spi
                    .request_authorisation_code(&spi_ctx, &method.authentication_method_id, payment)
                    .await;
                let code = match take_payload(response, ctx) {
                    Ok(code) => code,
                    Err(failed) => return failed,
                };

                if is_sca_exempted(code.sca_exempted, payment) {
                    return execute_payment_without_sca(
                        deps,
                        ctx,
                        payment,
                        psu_data,
                        ScaStatus::Exempted,
                    )
                    .await;
                }

                method_selected(ctx, psu_data, code, method)
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
}

#[async_trait]
impl ScaStage for ReceivedStage {
    fn name(&self) -> &'static str {
        "pis_received"
    }

    async fn apply(&self, ctx: &StageContext) -> UpdatePsuDataResponse {
        let payment = match ctx.payment() {
            Ok(payment) => payment,
            Err(failed) => return failed,
        };

        if ctx.request.is_update_psu_identification() {
            return self.apply_identification(ctx);
        }
        self.apply_authorisation(ctx, payment).await
    }
}

/// PSUAUTHENTICATED: the PSU picked one of several SCA methods.
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
        "pis_psu_authenticated"
    }

    async fn apply(&self, ctx: &StageContext) -> UpdatePsuDataResponse {
        let deps = &self.deps;
        let payment = match ctx.payment() {
            Ok(payment) => payment,
            Err(failed) => return failed,
        };
        let Some(method_id) = ctx.request.authentication_method_id.clone() else {
            return ctx.error(ErrorType::PIS_400, MessageErrorCode::FormatError);
        };
        let psu_data = extract_psu_data(&ctx.request.psu_data, &ctx.authorisation);

        if is_method_decoupled(deps, ctx, &method_id).await {
            switch_to_decoupled(deps, ctx).await;
            let method = stored_method(ctx, &method_id);
            return decoupled::start_payment_initiation(deps, ctx, payment, psu_data, method)
                .await;
        }

        let spi_ctx = spi_context(ctx, &psu_data, &payment.tpp_info);
        let response = deps
            .payment_authorisation_spi
            .request_authorisation_code(&spi_ctx, &method_id, payment)
            .await;

        if response.has_error() {
            if response.first_error_code() == Some(MessageErrorCode::PsuCredentialsInvalid) {
                mark_authorisation_failed(deps, ctx).await;
            }
            return UpdatePsuDataResponse::failed(spi_error(&response, ctx.service_type()), ctx);
        }
        let code = match take_payload(response, ctx) {
            Ok(code) => code,
            Err(failed) => return failed,
        };

        if is_sca_exempted(code.sca_exempted, payment) {
            return execute_payment_without_sca(deps, ctx, payment, psu_data, ScaStatus::Exempted)
                .await;
        }

        if code.is_empty() {
            return ctx.error(ErrorType::PIS_400, MessageErrorCode::FormatError);
        }

        let method = code
            .selected_sca_method
            .clone()
            .or_else(|| stored_method(ctx, &method_id));
        method_selected_with(ctx, psu_data, code, method)
    }
}

/// SCAMETHODSELECTED: verify the TAN and execute the payment.
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
        "pis_sca_method_selected"
    }

    async fn apply(&self, ctx: &StageContext) -> UpdatePsuDataResponse {
        let deps = &self.deps;
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
        let response = deps
            .payment_spi
            .verify_sca_authorisation_and_execute_payment(&spi_ctx, &confirmation, payment)
            .await;

        if response.has_error() {
            let error = spi_error(&response, ctx.service_type());
            let attempt_failure = response.payload.as_ref().map(|p| p.authorisation_status)
                == Some(SpiAuthorisationStatus::AttemptFailure);

            if attempt_failure {
                tracing::info!(
                    payment_id = %payment.payment_id,
                    authorisation_id = %ctx.request.authorisation_id,
                    "TAN rejected, PSU may retry"
                );
                return UpdatePsuDataResponse {
                    sca_status: ctx.authorisation.sca_status,
                    ..UpdatePsuDataResponse::failed(error, ctx)
                };
            }

            if error.first_error_code() == Some(MessageErrorCode::PsuCredentialsInvalid) {
                mark_authorisation_failed(deps, ctx).await;
            }
            return UpdatePsuDataResponse::failed(error, ctx);
        }

        let execution = match take_payload(response, ctx) {
            Ok(execution) => execution,
            Err(failed) => return failed,
        };

        tracing::info!(
            payment_id = %payment.payment_id,
            transaction_status = %execution.transaction_status,
            "Payment executed after SCA"
        );
        store_transaction_status(deps, &payment.payment_id, execution.transaction_status).await;

        UpdatePsuDataResponse::new(ScaStatus::Finalised, ctx, Some(psu_data))
    }
}

fn method_selected(
    ctx: &StageContext,
    psu_data: PsuIdData,
    code: SpiAuthorizationCodeResult,
    method: AuthenticationObject,
) -> UpdatePsuDataResponse {
    let selected = code.selected_sca_method.clone().unwrap_or(method);
    method_selected_with(ctx, psu_data, code, Some(selected))
}

fn method_selected_with(
    ctx: &StageContext,
    psu_data: PsuIdData,
    code: SpiAuthorizationCodeResult,
    method: Option<AuthenticationObject>,
) -> UpdatePsuDataResponse {
    UpdatePsuDataResponse {
        chosen_sca_method: method,
        challenge_data: code.challenge_data,
        ..UpdatePsuDataResponse::new(ScaStatus::ScaMethodSelected, ctx, Some(psu_data))
    }
}
