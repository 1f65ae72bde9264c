use secrecy::Secret;
use serde::Deserialize;
use service_core::config::{self as core_config, load_from_sources};
use service_core::error::AppError;

#[derive(Debug, Clone)]
pub struct CmsConfig {
    pub common: core_config::Config,
    pub storage: StorageSettings,
    pub security: SecuritySettings,
    pub export: ExportSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_database_url")]
    pub database_url: Secret<String>,
    #[serde(default = "default_database_name")]
    pub database_name: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_url: default_database_url(),
            database_name: default_database_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecuritySettings {
    /// Key of the HMAC tag appended to external consent and payment ids.
    #[serde(default = "default_encryption_key")]
    pub encryption_key: Secret<String>,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            encryption_key: default_encryption_key(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportSettings {
    /// Page size used when `page-index` is sent without `items-per-page`.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CmsSettings {
    #[serde(default)]
    storage: StorageSettings,
    #[serde(default)]
    security: SecuritySettings,
    #[serde(default)]
    export: ExportSettings,
}

fn default_backend() -> StorageBackend {
    StorageBackend::Memory
}

fn default_database_url() -> Secret<String> {
    Secret::new("mongodb://localhost:27017".to_string())
}

fn default_database_name() -> String {
    "consent_db".to_string()
}

pub const DEVELOPMENT_ENCRYPTION_KEY: &str = "cms-development-key";

fn default_encryption_key() -> Secret<String> {
    Secret::new(DEVELOPMENT_ENCRYPTION_KEY.to_string())
}

fn default_page_size() -> usize {
    20
}

impl CmsConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let settings: CmsSettings = load_from_sources("configuration")?;

        if settings.export.default_page_size == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "export.default_page_size must be greater than zero"
            )));
        }

        Ok(Self {
            common,
            storage: settings.storage,
            security: settings.security,
            export: settings.export,
        })
    }
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            storage: StorageSettings::default(),
            security: SecuritySettings::default(),
            export: ExportSettings::default(),
        }
    }
}
