use super::{
    ais, pis_cancellation, pis_initiation, ScaStage, ServiceKind, StageContext,
    StageDependencies, StageKey, UpdatePsuDataResponse,
};
use crate::error::{ErrorHolder, ErrorType, MessageErrorCode};
use async_trait::async_trait;
use service_core::cms::{ScaApproach, ScaStatus};
use std::collections::HashMap;
use std::sync::Arc;

/// Lookup table from (kind, approach, status) to the stage that advances it.
pub struct StageRegistry {
    stages: HashMap<StageKey, Arc<dyn ScaStage>>,
}

impl StageRegistry {
    pub fn new(deps: StageDependencies) -> Self {
        let stages = StageKey::all()
            .map(|key| (key, build_stage(key, &deps)))
            .collect();

        Self { stages }
    }

    pub fn resolve(&self, key: StageKey) -> Option<Arc<dyn ScaStage>> {
        self.stages.get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

fn build_stage(key: StageKey, deps: &StageDependencies) -> Arc<dyn ScaStage> {
    use ScaStatus::*;

    match (key.kind, key.status) {
        (_, Finalised) => Arc::new(StatusStage(Finalised)),
        (_, Started | Failed) => Arc::new(UnsupportedStage(key)),

        (ServiceKind::PisInitiation, Received | PsuIdentified) => {
            Arc::new(pis_initiation::ReceivedStage::new(deps.clone()))
        }
        (ServiceKind::PisInitiation, PsuAuthenticated) => {
            Arc::new(pis_initiation::PsuAuthenticatedStage::new(deps.clone()))
        }
        (ServiceKind::PisInitiation, ScaMethodSelected) => {
            Arc::new(pis_initiation::ScaMethodSelectedStage::new(deps.clone()))
        }
        (ServiceKind::PisInitiation, Exempted) => Arc::new(StatusStage(Exempted)),

        (ServiceKind::PisCancellation, Received | PsuIdentified) => {
            Arc::new(pis_cancellation::ReceivedStage::new(deps.clone()))
        }
        (ServiceKind::PisCancellation, PsuAuthenticated) => {
            Arc::new(pis_cancellation::PsuAuthenticatedStage::new(deps.clone()))
        }
        (ServiceKind::PisCancellation, ScaMethodSelected) => {
            Arc::new(pis_cancellation::ScaMethodSelectedStage::new(deps.clone()))
        }
        (ServiceKind::PisCancellation, Exempted) => Arc::new(UnsupportedStage(key)),

        (ServiceKind::Ais, Received | PsuIdentified) => {
            if key.approach == ScaApproach::Decoupled {
                Arc::new(ais::ReceivedStage::decoupled(deps.clone()))
            } else {
                Arc::new(ais::ReceivedStage::new(deps.clone()))
            }
        }
        (ServiceKind::Ais, PsuAuthenticated) => Arc::new(ais::PsuAuthenticatedStage::new(deps.clone())),
        (ServiceKind::Ais, ScaMethodSelected) => {
            Arc::new(ais::ScaMethodSelectedStage::new(deps.clone()))
        }
        (ServiceKind::Ais, Exempted) => Arc::new(UnsupportedStage(key)),
    }
}

/// Terminal stage that reports its status again without side effects.
struct StatusStage(ScaStatus);

#[async_trait]
impl ScaStage for StatusStage {
    fn name(&self) -> &'static str {
        match self.0 {
            ScaStatus::Exempted => "exempted",
            _ => "finalised",
        }
    }

    async fn apply(&self, ctx: &StageContext) -> UpdatePsuDataResponse {
        UpdatePsuDataResponse::new(self.0, ctx, ctx.authorisation.psu_data.clone())
    }
}

/// Statuses from which no PSU-data update is possible.
struct UnsupportedStage(StageKey);

#[async_trait]
impl ScaStage for UnsupportedStage {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    async fn apply(&self, ctx: &StageContext) -> UpdatePsuDataResponse {
        let StageKey {
            kind,
            approach,
            status,
        } = self.0;
        tracing::warn!(
            kind = %kind,
            approach = %approach,
            sca_status = %status,
            authorisation_id = %ctx.request.authorisation_id,
            "PSU data update in a status that does not accept it"
        );

        let error_type = ErrorType::from_code(ctx.service_type(), MessageErrorCode::StatusInvalid);
        UpdatePsuDataResponse::failed(
            ErrorHolder::with_text(
                error_type,
                MessageErrorCode::StatusInvalid,
                format!("Authorisation in status {} cannot be updated", status.value()),
            ),
            ctx,
        )
    }
}
