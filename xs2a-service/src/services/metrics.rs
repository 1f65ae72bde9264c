use crate::authorisation::ServiceKind;
use crate::error::ErrorType;
use metrics::counter;
use service_core::cms::ScaStatus;

/// Count a successful move of an authorisation from one SCA status to the next.
pub fn record_stage_transition(kind: ServiceKind, from: ScaStatus, to: ScaStatus) {
    counter!(
        "sca_stage_transitions_total",
        "kind" => kind.as_str(),
        "from" => from.value(),
        "to" => to.value()
    )
    .increment(1);
}

pub fn record_stage_error(kind: ServiceKind, status: ScaStatus, error_type: ErrorType) {
    counter!(
        "sca_stage_errors_total",
        "kind" => kind.as_str(),
        "status" => status.value(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}
