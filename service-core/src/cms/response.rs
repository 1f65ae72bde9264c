use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body marker a CMS puts in its `error` field when a consent checksum check fails.
pub const CHECKSUM_ERROR_MARKER: &str = "CHECKSUM_ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CmsError {
    /// Transport failure, timeout, 5xx or an unreadable body.
    #[error("CMS technical error")]
    TechnicalError,
    /// The CMS answered but refused the operation (unknown id, invalid transition).
    #[error("CMS logical error")]
    LogicalError,
    #[error("consent checksum verification failed")]
    ChecksumError,
}

/// Outcome of a single CMS call. Client methods never return `Err`; failures are
/// folded into [`CmsResponse::Failure`].
#[derive(Debug, Clone, PartialEq)]
pub enum CmsResponse<T> {
    Success(T),
    Failure(CmsError),
}

impl<T> CmsResponse<T> {
    pub fn is_successful(&self) -> bool {
        matches!(self, CmsResponse::Success(_))
    }

    pub fn has_error(&self) -> bool {
        !self.is_successful()
    }

    pub fn error(&self) -> Option<CmsError> {
        match self {
            CmsResponse::Success(_) => None,
            CmsResponse::Failure(e) => Some(*e),
        }
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            CmsResponse::Success(payload) => Some(payload),
            CmsResponse::Failure(_) => None,
        }
    }

    pub fn into_payload(self) -> Option<T> {
        match self {
            CmsResponse::Success(payload) => Some(payload),
            CmsResponse::Failure(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, CmsError> {
        match self {
            CmsResponse::Success(payload) => Ok(payload),
            CmsResponse::Failure(e) => Err(e),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CmsResponse<U> {
        match self {
            CmsResponse::Success(payload) => CmsResponse::Success(f(payload)),
            CmsResponse::Failure(e) => CmsResponse::Failure(e),
        }
    }
}

impl<T> From<Result<T, CmsError>> for CmsResponse<T> {
    fn from(result: Result<T, CmsError>) -> Self {
        match result {
            Ok(payload) => CmsResponse::Success(payload),
            Err(e) => CmsResponse::Failure(e),
        }
    }
}
