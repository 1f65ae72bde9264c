pub mod psu;

pub use psu::PsuContext;
