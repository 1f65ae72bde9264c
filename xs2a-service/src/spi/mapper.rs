use crate::error::{ErrorHolder, ErrorType, MessageErrorCode, ServiceType, TppMessage};

/// Turn the messages of a failed SPI call into a TPP error. The error type is
/// taken from the HTTP status of the first message code.
pub fn map_spi_errors(errors: &[TppMessage], service_type: ServiceType) -> ErrorHolder {
    match errors.first() {
        Some(first) => ErrorHolder::with_messages(
            ErrorType::from_code(service_type, first.code),
            errors.to_vec(),
        ),
        None => ErrorHolder::with_messages(
            ErrorType::from_code(service_type, MessageErrorCode::InternalServerError),
            vec![TppMessage::error(MessageErrorCode::InternalServerError)],
        ),
    }
}
