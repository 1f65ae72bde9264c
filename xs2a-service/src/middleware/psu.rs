//! PSU identification headers sent by the TPP.
//!
//! All headers are optional: a TPP may start an authorisation without knowing
//! the PSU and identify them later with a PSU-data update.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use service_core::cms::PsuIdData;
use service_core::observability::REQUEST_ID_HEADER;
use std::convert::Infallible;

pub const PSU_ID_HEADER: &str = "PSU-ID";
pub const PSU_ID_TYPE_HEADER: &str = "PSU-ID-Type";
pub const PSU_CORPORATE_ID_HEADER: &str = "PSU-Corporate-ID";
pub const PSU_CORPORATE_ID_TYPE_HEADER: &str = "PSU-Corporate-ID-Type";

#[derive(Debug, Clone, Default)]
pub struct PsuContext {
    pub psu_data: PsuIdData,
    /// `X-Request-ID` of the call, as set or minted by the request id middleware.
    pub request_id: Option<String>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for PsuContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let psu_data = PsuIdData {
            psu_id: header(&parts.headers, PSU_ID_HEADER),
            psu_id_type: header(&parts.headers, PSU_ID_TYPE_HEADER),
            psu_corporate_id: header(&parts.headers, PSU_CORPORATE_ID_HEADER),
            psu_corporate_id_type: header(&parts.headers, PSU_CORPORATE_ID_TYPE_HEADER),
        };
        let request_id = header(&parts.headers, REQUEST_ID_HEADER);

        if let Some(psu_id) = psu_data.psu_id.as_deref() {
            tracing::Span::current().record("psu_id", psu_id);
        }

        Ok(PsuContext {
            psu_data,
            request_id,
        })
    }
}
