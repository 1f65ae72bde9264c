//! The contract between the XS2A layer and the Consent Management System:
//! shared domain types, the `CmsResponse` envelope and the HTTP client.

pub mod client;
pub mod model;
pub mod response;

pub use client::CmsClient;
pub use model::*;
pub use response::{CmsError, CmsResponse, CHECKSUM_ERROR_MARKER};
