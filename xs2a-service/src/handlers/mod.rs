//! HTTP handlers for the XS2A interface.

pub mod consent_authorisations;
pub mod payment_authorisations;

use crate::authorisation::UpdatePsuDataRequest;
use crate::dtos::UpdatePsuAuthenticationRequest;
use crate::error::{ErrorHolder, ErrorType, MessageErrorCode, ServiceType};
use crate::middleware::PsuContext;
use axum::{body::Bytes, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::observability::render_metrics;

pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "xs2a-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

pub async fn readiness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}

pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        render_metrics(),
    )
}

/// Body of a PSU-data update. Only an absent or blank body means "identify the PSU";
/// anything else has to parse.
pub(crate) fn parse_psu_data_body(
    body: &Bytes,
    service_type: ServiceType,
) -> Result<Option<UpdatePsuAuthenticationRequest>, ErrorHolder> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    serde_json::from_slice(body).map(Some).map_err(|e| {
        tracing::warn!(error = %e, "Malformed PSU-data update body");
        ErrorHolder::new(
            ErrorType::from_code(service_type, MessageErrorCode::FormatError),
            MessageErrorCode::FormatError,
        )
    })
}

/// Merge the PSU headers and the optional body of a PSU-data update.
pub(crate) fn psu_data_request(
    parent_id: String,
    authorisation_id: String,
    psu: PsuContext,
    body: Option<UpdatePsuAuthenticationRequest>,
) -> UpdatePsuDataRequest {
    let body = body.unwrap_or_default();

    UpdatePsuDataRequest {
        parent_id,
        authorisation_id,
        psu_data: psu.psu_data,
        password: body.password(),
        authentication_method_id: body.authentication_method_id,
        sca_authentication_data: body.sca_authentication_data,
        request_id: psu.request_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_body_is_an_identification_update() {
        assert!(matches!(
            parse_psu_data_body(&Bytes::new(), ServiceType::Pis),
            Ok(None)
        ));
        assert!(matches!(
            parse_psu_data_body(&Bytes::from_static(b"  \n"), ServiceType::Ais),
            Ok(None)
        ));
    }

    #[test]
    fn truncated_json_is_a_format_error() {
        let error = parse_psu_data_body(
            &Bytes::from_static(br#"{"psuData": {"password": "#),
            ServiceType::Ais,
        )
        .unwrap_err();

        assert_eq!(error.error_type, ErrorType::AIS_400);
        assert_eq!(error.first_error_code(), Some(MessageErrorCode::FormatError));
    }

    #[test]
    fn empty_object_still_parses() {
        let body = parse_psu_data_body(&Bytes::from_static(b"{}"), ServiceType::Pis)
            .unwrap()
            .unwrap();
        assert!(body.password().is_none());
    }
}
