//! PSD2 error taxonomy rendered to TPPs as `{"tppMessages":[...]}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceType {
    Ais,
    Pis,
}

/// Berlin Group message codes used by the authorisation flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageErrorCode {
    FormatError,
    FormatErrorNoPsu,
    PsuCredentialsInvalid,
    ScaMethodUnknown,
    ScaInvalid,
    ConsentUnknown400,
    ConsentUnknown403,
    ConsentInvalid,
    ConsentExpired,
    ResourceUnknown403,
    ResourceUnknown404,
    ProductUnknown,
    StatusInvalid,
    ServiceBlocked,
    ServiceInvalid405,
    CancellationInvalid,
    PaymentFailed,
    AccessExceeded,
    InternalServerError,
}

impl MessageErrorCode {
    /// Code as it appears in the `code` field; some codes share a name across HTTP statuses.
    pub fn name(&self) -> &'static str {
        match self {
            MessageErrorCode::FormatError | MessageErrorCode::FormatErrorNoPsu => "FORMAT_ERROR",
            MessageErrorCode::PsuCredentialsInvalid => "PSU_CREDENTIALS_INVALID",
            MessageErrorCode::ScaMethodUnknown => "SCA_METHOD_UNKNOWN",
            MessageErrorCode::ScaInvalid => "SCA_INVALID",
            MessageErrorCode::ConsentUnknown400 | MessageErrorCode::ConsentUnknown403 => {
                "CONSENT_UNKNOWN"
            }
            MessageErrorCode::ConsentInvalid => "CONSENT_INVALID",
            MessageErrorCode::ConsentExpired => "CONSENT_EXPIRED",
            MessageErrorCode::ResourceUnknown403 | MessageErrorCode::ResourceUnknown404 => {
                "RESOURCE_UNKNOWN"
            }
            MessageErrorCode::ProductUnknown => "PRODUCT_UNKNOWN",
            MessageErrorCode::StatusInvalid => "STATUS_INVALID",
            MessageErrorCode::ServiceBlocked => "SERVICE_BLOCKED",
            MessageErrorCode::ServiceInvalid405 => "SERVICE_INVALID",
            MessageErrorCode::CancellationInvalid => "CANCELLATION_INVALID",
            MessageErrorCode::PaymentFailed => "PAYMENT_FAILED",
            MessageErrorCode::AccessExceeded => "ACCESS_EXCEEDED",
            MessageErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn http_code(&self) -> u16 {
        match self {
            MessageErrorCode::FormatError
            | MessageErrorCode::FormatErrorNoPsu
            | MessageErrorCode::ScaMethodUnknown
            | MessageErrorCode::ScaInvalid
            | MessageErrorCode::ConsentUnknown400
            | MessageErrorCode::PaymentFailed => 400,
            MessageErrorCode::PsuCredentialsInvalid
            | MessageErrorCode::ConsentInvalid
            | MessageErrorCode::ConsentExpired => 401,
            MessageErrorCode::ConsentUnknown403
            | MessageErrorCode::ResourceUnknown403
            | MessageErrorCode::ServiceBlocked => 403,
            MessageErrorCode::ResourceUnknown404 | MessageErrorCode::ProductUnknown => 404,
            MessageErrorCode::ServiceInvalid405 | MessageErrorCode::CancellationInvalid => 405,
            MessageErrorCode::StatusInvalid => 409,
            MessageErrorCode::AccessExceeded => 429,
            MessageErrorCode::InternalServerError => 500,
        }
    }

    pub fn default_text(&self) -> &'static str {
        match self {
            MessageErrorCode::FormatError => "Format of certain request fields are not matching the XS2A requirements",
            MessageErrorCode::FormatErrorNoPsu => "Please provide the PSU identification data",
            MessageErrorCode::PsuCredentialsInvalid => "The PSU-ID cannot be matched by the addressed ASPSP or is blocked, or a password resp. OTP was not correct",
            MessageErrorCode::ScaMethodUnknown => "Addressed SCA method in the Authentication Method Select Request is unknown or cannot be matched by the ASPSP with the PSU",
            MessageErrorCode::ScaInvalid => "Application of the SCA method selected by the PSU is not supported",
            MessageErrorCode::ConsentUnknown400 | MessageErrorCode::ConsentUnknown403 => "The consent-ID cannot be matched by the ASPSP relative to the TPP",
            MessageErrorCode::ConsentInvalid => "The consent was created by this TPP but is not valid for the addressed service/resource",
            MessageErrorCode::ConsentExpired => "The consent was created by this TPP but has expired and needs to be renewed",
            MessageErrorCode::ResourceUnknown403 | MessageErrorCode::ResourceUnknown404 => "The addressed resource is unknown relative to the TPP",
            MessageErrorCode::ProductUnknown => "The addressed payment product is not available for the PSU",
            MessageErrorCode::StatusInvalid => "The addressed resource does not allow additional authorisation",
            MessageErrorCode::ServiceBlocked => "This service is not reachable for the addressed PSU due to a channel independent blocking by the ASPSP",
            MessageErrorCode::ServiceInvalid405 => "The addressed service is not valid for the addressed resources",
            MessageErrorCode::CancellationInvalid => "The addressed payment is not cancellable",
            MessageErrorCode::PaymentFailed => "The payment initiation POST request failed during the initial process",
            MessageErrorCode::AccessExceeded => "The access on the account has been exceeding the consented multiplicity per day",
            MessageErrorCode::InternalServerError => "Internal server error",
        }
    }
}

impl fmt::Display for MessageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for MessageErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// The (service, HTTP status) pair an error is reported under, e.g. `PIS_401`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorType {
    pub service_type: ServiceType,
    pub status: StatusCode,
}

impl ErrorType {
    pub const PIS_400: ErrorType = ErrorType::new(ServiceType::Pis, StatusCode::BAD_REQUEST);
    pub const PIS_401: ErrorType = ErrorType::new(ServiceType::Pis, StatusCode::UNAUTHORIZED);
    pub const PIS_403: ErrorType = ErrorType::new(ServiceType::Pis, StatusCode::FORBIDDEN);
    pub const PIS_404: ErrorType = ErrorType::new(ServiceType::Pis, StatusCode::NOT_FOUND);
    pub const PIS_409: ErrorType = ErrorType::new(ServiceType::Pis, StatusCode::CONFLICT);
    pub const PIS_500: ErrorType =
        ErrorType::new(ServiceType::Pis, StatusCode::INTERNAL_SERVER_ERROR);
    pub const AIS_400: ErrorType = ErrorType::new(ServiceType::Ais, StatusCode::BAD_REQUEST);
    pub const AIS_401: ErrorType = ErrorType::new(ServiceType::Ais, StatusCode::UNAUTHORIZED);
    pub const AIS_403: ErrorType = ErrorType::new(ServiceType::Ais, StatusCode::FORBIDDEN);
    pub const AIS_404: ErrorType = ErrorType::new(ServiceType::Ais, StatusCode::NOT_FOUND);
    pub const AIS_409: ErrorType = ErrorType::new(ServiceType::Ais, StatusCode::CONFLICT);
    pub const AIS_500: ErrorType =
        ErrorType::new(ServiceType::Ais, StatusCode::INTERNAL_SERVER_ERROR);

    pub const fn new(service_type: ServiceType, status: StatusCode) -> Self {
        Self {
            service_type,
            status,
        }
    }

    /// Error type for `code` under `service_type`; unknown HTTP codes degrade to 500.
    pub fn from_code(service_type: ServiceType, code: MessageErrorCode) -> Self {
        let status = StatusCode::from_u16(code.http_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(service_type, status)
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.service_type {
            ServiceType::Ais => "AIS",
            ServiceType::Pis => "PIS",
        };
        write!(f, "{}_{}", prefix, self.status.as_u16())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageCategory {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TppMessage {
    pub category: MessageCategory,
    pub code: MessageErrorCode,
    pub text: String,
}

impl TppMessage {
    pub fn error(code: MessageErrorCode) -> Self {
        Self::error_with_text(code, code.default_text())
    }

    pub fn error_with_text(code: MessageErrorCode, text: impl Into<String>) -> Self {
        Self {
            category: MessageCategory::Error,
            code,
            text: text.into(),
        }
    }
}

/// A TPP-visible failure: one error type and the messages reported under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorHolder {
    pub error_type: ErrorType,
    pub tpp_messages: Vec<TppMessage>,
}

impl ErrorHolder {
    pub fn new(error_type: ErrorType, code: MessageErrorCode) -> Self {
        Self::with_messages(error_type, vec![TppMessage::error(code)])
    }

    pub fn with_text(error_type: ErrorType, code: MessageErrorCode, text: impl Into<String>) -> Self {
        Self::with_messages(error_type, vec![TppMessage::error_with_text(code, text)])
    }

    pub fn with_messages(error_type: ErrorType, tpp_messages: Vec<TppMessage>) -> Self {
        Self {
            error_type,
            tpp_messages,
        }
    }

    pub fn internal(service_type: ServiceType) -> Self {
        Self::new(
            ErrorType::from_code(service_type, MessageErrorCode::InternalServerError),
            MessageErrorCode::InternalServerError,
        )
    }

    pub fn first_error_code(&self) -> Option<MessageErrorCode> {
        self.tpp_messages.first().map(|m| m.code)
    }
}

impl fmt::Display for ErrorHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.tpp_messages.iter().map(|m| m.code.name()).collect();
        write!(f, "{} [{}]", self.error_type, codes.join(", "))
    }
}

impl std::error::Error for ErrorHolder {}

impl IntoResponse for ErrorHolder {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct TppErrorResponse {
            tpp_messages: Vec<TppMessage>,
        }

        (
            self.error_type.status,
            Json(TppErrorResponse {
                tpp_messages: self.tpp_messages,
            }),
        )
            .into_response()
    }
}
