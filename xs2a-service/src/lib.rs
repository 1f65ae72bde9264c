//! xs2a-service: PSD2 access-to-account interface driving the SCA flows of
//! payment initiation, payment cancellation and account information consents.

pub mod authorisation;
pub mod cms;
pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod spi;
pub mod startup;

pub use startup::{AppState, Application};
