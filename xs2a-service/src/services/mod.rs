pub mod authorisation;
pub mod metrics;

pub use authorisation::{AuthorisationService, CreatedAuthorisation, Parent, PaymentTarget};
pub use metrics::{record_stage_error, record_stage_transition};
