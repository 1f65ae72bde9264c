pub mod headers;

pub use headers::{InstanceId, PageHeaders, PsuHeaders, TppAuthorisationNumber};
