//! Header extractors of the ASPSP and PSU APIs.

use crate::services::PageRequest;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use service_core::cms::PsuIdData;
use service_core::config::DEFAULT_SERVICE_INSTANCE_ID;
use service_core::error::AppError;
use std::convert::Infallible;

pub const INSTANCE_ID_HEADER: &str = "instance-id";
pub const TPP_AUTHORISATION_NUMBER_HEADER: &str = "tpp-authorisation-number";
pub const PSU_ID_HEADER: &str = "psu-id";
pub const PSU_ID_TYPE_HEADER: &str = "psu-id-type";
pub const PSU_CORPORATE_ID_HEADER: &str = "psu-corporate-id";
pub const PSU_CORPORATE_ID_TYPE_HEADER: &str = "psu-corporate-id-type";
pub const PAGE_INDEX_HEADER: &str = "page-index";
pub const ITEMS_PER_PAGE_HEADER: &str = "items-per-page";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// CMS tenant addressed by the caller, `UNDEFINED` when not sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for InstanceId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let instance_id = header(&parts.headers, INSTANCE_ID_HEADER)
            .unwrap_or_else(|| DEFAULT_SERVICE_INSTANCE_ID.to_string());
        Ok(InstanceId(instance_id))
    }
}

/// `None` when no PSU header was sent at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsuHeaders(pub Option<PsuIdData>);

#[async_trait]
impl<S> FromRequestParts<S> for PsuHeaders
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let psu = PsuIdData {
            psu_id: header(&parts.headers, PSU_ID_HEADER),
            psu_id_type: header(&parts.headers, PSU_ID_TYPE_HEADER),
            psu_corporate_id: header(&parts.headers, PSU_CORPORATE_ID_HEADER),
            psu_corporate_id_type: header(&parts.headers, PSU_CORPORATE_ID_TYPE_HEADER),
        };
        let any_sent = psu != PsuIdData::default();
        Ok(PsuHeaders(any_sent.then_some(psu)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TppAuthorisationNumber(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for TppAuthorisationNumber
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header(&parts.headers, TPP_AUTHORISATION_NUMBER_HEADER)
            .map(TppAuthorisationNumber)
            .ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "Missing {} header",
                    TPP_AUTHORISATION_NUMBER_HEADER
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeaders(pub PageRequest);

#[async_trait]
impl<S> FromRequestParts<S> for PageHeaders
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let number = |name: &str| -> Result<Option<usize>, AppError> {
            header(&parts.headers, name)
                .map(|v| {
                    v.parse::<usize>().map_err(|_| {
                        AppError::BadRequest(anyhow::anyhow!("Invalid {} header: {}", name, v))
                    })
                })
                .transpose()
        };

        Ok(PageHeaders(PageRequest {
            page_index: number(PAGE_INDEX_HEADER)?,
            items_per_page: number(ITEMS_PER_PAGE_HEADER)?,
        }))
    }
}
