//! Stages of an account information consent authorisation (AIS).

use super::common::{
    extract_psu_data, is_method_decoupled, mark_authorisation_failed, save_sca_methods,
    spi_context, spi_error, stored_method, switch_to_decoupled, take_payload,
};
use super::decoupled;
use super::{ScaStage, StageContext, StageDependencies, UpdatePsuDataResponse};
use crate::error::{ErrorHolder, ErrorType, MessageErrorCode};
use crate::spi::{SpiAuthorisationStatus, SpiScaConfirmation};
use async_trait::async_trait;
use service_core::cms::{
    AisConsentRequestType, CmsConsent, ConsentStatus, ScaApproach, ScaStatus,
};

async fn load_consent(
    deps: &StageDependencies,
    ctx: &StageContext,
) -> Result<CmsConsent, UpdatePsuDataResponse> {
    deps.cms
        .get_consent(&ctx.request.parent_id)
        .await
        .into_payload()
        .ok_or_else(|| ctx.error(ErrorType::AIS_400, MessageErrorCode::ConsentUnknown400))
}

async fn update_consent_status(deps: &StageDependencies, consent_id: &str, status: ConsentStatus) {
    let response = deps.cms.update_consent_status(consent_id, status).await;
    if response.has_error() {
        tracing::warn!(
            consent_id,
            status = %status,
            cms_error = ?response.error(),
            "Could not update consent status"
        );
    }
}

pub struct ReceivedStage {
    deps: StageDependencies,
    decoupled: bool,
}

impl ReceivedStage {
    pub fn new(deps: StageDependencies) -> Self {
        Self {
            deps,
            decoupled: false,
        }
    }

    pub fn decoupled(deps: StageDependencies) -> Self {
        Self {
            deps,
            decoupled: true,
        }
    }

    fn apply_identification(&self, ctx: &StageContext) -> UpdatePsuDataResponse {
        let psu_data = &ctx.request.psu_data;
        if psu_data.is_empty() {
            if self.decoupled {
                return UpdatePsuDataResponse::failed(
                    ErrorHolder::with_text(
                        ErrorType::AIS_400,
                        MessageErrorCode::FormatError,
                        "Please provide the PSU identification data",
                    ),
                    ctx,
                );
            }
            return ctx.error(ErrorType::AIS_400, MessageErrorCode::FormatErrorNoPsu);
        }

        UpdatePsuDataResponse::new(ScaStatus::PsuIdentified, ctx, Some(psu_data.clone()))
    }

    /// Logging in is enough for a one-off consent that only lists the available accounts.
    fn is_one_factor_authorisation(&self, consent: &CmsConsent) -> bool {
        consent.request_type == AisConsentRequestType::AllAvailableAccounts
            && consent.is_one_access_type()
            && !self.deps.sca_required_for_one_time_available_accounts
            && !consent.multilevel_sca_required
    }

    async fn apply_authorisation(&self, ctx: &StageContext) -> UpdatePsuDataResponse {
        let deps = &self.deps;
        let consent = match load_consent(deps, ctx).await {
            Ok(consent) => consent,
            Err(failed) => return failed,
        };
        let psu_data = extract_psu_data(&ctx.request.psu_data, &ctx.authorisation);
        let spi_ctx = spi_context(ctx, &psu_data, &consent.tpp_info);
        let password = ctx.request.password.as_deref().unwrap_or_default();

        let response = deps
            .ais_consent_spi
            .authorise_psu(
                &spi_ctx,
                &ctx.request.authorisation_id,
                &psu_data,
                password,
                &consent,
            )
            .await;
        let login = match take_payload(response, ctx) {
            Ok(login) => login,
            Err(failed) => return failed,
        };

        if login.status == SpiAuthorisationStatus::Failure {
            tracing::info!(
                consent_id = %consent.id,
                authorisation_id = %ctx.request.authorisation_id,
                "PSU login failed"
            );
            mark_authorisation_failed(deps, ctx).await;
            return ctx.error(ErrorType::AIS_401, MessageErrorCode::PsuCredentialsInvalid);
        }

        if self.is_one_factor_authorisation(&consent) {
            update_consent_status(deps, &consent.id, ConsentStatus::Valid).await;
            return UpdatePsuDataResponse::new(ScaStatus::Finalised, ctx, Some(psu_data));
        }

        if ctx.authorisation.chosen_sca_approach == ScaApproach::Decoupled {
            return decoupled::start_consent(deps, ctx, &consent, psu_data, None).await;
        }

        let response = deps
            .ais_consent_spi
            .request_available_sca_methods(&spi_ctx, &consent)
            .await;
        let methods = match take_payload(response, ctx) {
            Ok(available) => available.available_sca_methods,
            Err(failed) => return failed,
        };

        match methods.len() {
            0 => {
                update_consent_status(deps, &consent.id, ConsentStatus::Rejected).await;
                ctx.error(ErrorType::AIS_400, MessageErrorCode::ScaMethodUnknown)
            }
            1 => {
                save_sca_methods(deps, ctx, &methods).await;
                let method = methods[0].clone();

                if method.decoupled {
                    switch_to_decoupled(deps, ctx).await;
                    return decoupled::start_consent(deps, ctx, &consent, psu_data, Some(method))
                        .await;
                }

                let response = deps
                    .ais_consent_spi
                    .request_authorisation_code(&spi_ctx, &method.authentication_method_id, &consent)
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
}

#[async_trait]
impl ScaStage for ReceivedStage {
    fn name(&self) -> &'static str {
        if self.decoupled {
            "ais_decoupled_received"
        } else {
            "ais_received"
        }
    }

    async fn apply(&self, ctx: &StageContext) -> UpdatePsuDataResponse {
        if ctx.request.is_update_psu_identification() {
            return self.apply_identification(ctx);
        }
        self.apply_authorisation(ctx).await
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
        "ais_psu_authenticated"
    }

    async fn apply(&self, ctx: &StageContext) -> UpdatePsuDataResponse {
        let deps = &self.deps;
        let consent = match load_consent(deps, ctx).await {
            Ok(consent) => consent,
            Err(failed) => return failed,
        };
        let Some(method_id) = ctx.request.authentication_method_id.clone() else {
            return ctx.error(ErrorType::AIS_400, MessageErrorCode::FormatError);
        };
        let psu_data = extract_psu_data(&ctx.request.psu_data, &ctx.authorisation);

        if is_method_decoupled(deps, ctx, &method_id).await {
            switch_to_decoupled(deps, ctx).await;
            let method = stored_method(ctx, &method_id);
            return decoupled::start_consent(deps, ctx, &consent, psu_data, method).await;
        }

        let spi_ctx = spi_context(ctx, &psu_data, &consent.tpp_info);
        let response = deps
            .ais_consent_spi
            .request_authorisation_code(&spi_ctx, &method_id, &consent)
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
        "ais_sca_method_selected"
    }

    async fn apply(&self, ctx: &StageContext) -> UpdatePsuDataResponse {
        let deps = &self.deps;
        let consent = match load_consent(deps, ctx).await {
            Ok(consent) => consent,
            Err(failed) => return failed,
        };
        let Some(tan) = ctx.request.sca_authentication_data.clone() else {
            return ctx.error(ErrorType::AIS_400, MessageErrorCode::FormatError);
        };
        let psu_data = extract_psu_data(&ctx.request.psu_data, &ctx.authorisation);

        let confirmation = SpiScaConfirmation {
            parent_id: consent.id.clone(),
            authorisation_id: ctx.request.authorisation_id.clone(),
            psu_data: psu_data.clone(),
            tan,
        };
        let spi_ctx = spi_context(ctx, &psu_data, &consent.tpp_info);
        let response = deps
            .ais_consent_spi
            .verify_sca_authorisation(&spi_ctx, &confirmation, &consent)
            .await;

        if response.has_error() {
            let error = spi_error(&response, ctx.service_type());
            let attempt_failure = response.payload.as_ref().map(|p| p.authorisation_status)
                == Some(SpiAuthorisationStatus::AttemptFailure);

            if attempt_failure {
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

        let verified = match take_payload(response, ctx) {
            Ok(verified) => verified,
            Err(failed) => return failed,
        };
        let consent_status = verified.consent_status;

        if consent_status == ConsentStatus::PartiallyAuthorised && !consent.multilevel_sca_required {
            let response = deps.cms.update_consent_multilevel_sca(&consent.id, true).await;
            if response.has_error() {
                tracing::warn!(consent_id = %consent.id, "Could not flag multilevel SCA");
            }
        }

        if consent.consent_status != consent_status {
            update_consent_status(deps, &consent.id, consent_status).await;
        }

        let response = deps.cms.terminate_old_consents(&consent.id).await;
        if response.has_error() {
            tracing::warn!(consent_id = %consent.id, "Could not terminate old consents");
        }

        tracing::info!(
            consent_id = %consent.id,
            consent_status = %consent_status,
            "Consent authorised"
        );

        UpdatePsuDataResponse::new(ScaStatus::Finalised, ctx, Some(psu_data))
    }
}
