use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Settings shared by every service. Service configs embed it with `#[serde(flatten)]`.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_instance_id")]
    pub service_instance_id: String,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Instance id used when an ASPSP runs a single CMS tenant.
pub const DEFAULT_SERVICE_INSTANCE_ID: &str = "UNDEFINED";

fn default_instance_id() -> String {
    DEFAULT_SERVICE_INSTANCE_ID.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            log_level: default_log_level(),
            otlp_endpoint: None,
            service_instance_id: default_instance_id(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        load_from_sources("configuration")
    }
}

/// Load any deserializable settings type from the optional `{file_name}` file
/// overlaid with `APP__`-prefixed environment variables.
pub fn load_from_sources<T: DeserializeOwned>(file_name: &str) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let config = Cfg::builder()
        .add_source(File::with_name(file_name).required(false))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;

    Ok(config.try_deserialize()?)
}
