//! cms-service: PSD2 consent management system.
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod store;

pub use startup::{AppState, Application};
