use serde::Deserialize;
use service_core::cms::ScaApproach;
use service_core::config::{self as core_config, load_from_sources};
use service_core::error::AppError;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Xs2aConfig {
    pub common: core_config::Config,
    pub cms: CmsSettings,
    pub sca: ScaSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CmsSettings {
    #[serde(default = "default_cms_url")]
    pub base_url: String,
    #[serde(default = "default_cms_timeout_ms")]
    pub timeout_ms: u64,
}

impl CmsSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for CmsSettings {
    fn default() -> Self {
        Self {
            base_url: default_cms_url(),
            timeout_ms: default_cms_timeout_ms(),
        }
    }
}

/// ASPSP profile values the SCA flows depend on.
#[derive(Debug, Clone, Deserialize)]
pub struct ScaSettings {
    #[serde(default = "default_approach")]
    pub default_approach: ScaApproach,
    /// When false, a one-off "available accounts" consent is valid after PSU login alone.
    #[serde(default)]
    pub sca_required_for_one_time_available_accounts: bool,
}

impl Default for ScaSettings {
    fn default() -> Self {
        Self {
            default_approach: default_approach(),
            sca_required_for_one_time_available_accounts: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Xs2aSettings {
    #[serde(default)]
    cms: CmsSettings,
    #[serde(default)]
    sca: ScaSettings,
}

fn default_cms_url() -> String {
    "http://localhost:38080".to_string()
}

fn default_cms_timeout_ms() -> u64 {
    30_000
}

fn default_approach() -> ScaApproach {
    ScaApproach::Embedded
}

impl Xs2aConfig {
    pub fn load() -> Result<Self, AppError> {
        // Common config (handles .env and APP__ prefix)
        let common = core_config::Config::load()?;
        let settings: Xs2aSettings = load_from_sources("configuration")?;

        Ok(Self {
            common,
            cms: settings.cms,
            sca: settings.sca,
        })
    }
}

impl Default for Xs2aConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            cms: CmsSettings::default(),
            sca: ScaSettings::default(),
        }
    }
}
