//! Berlin Group request and response bodies of the authorisation endpoints.

use crate::authorisation::UpdatePsuDataResponse;
use serde::{Deserialize, Serialize};
use service_core::cms::{AuthenticationObject, ChallengeData, ScaStatus};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PsuData {
    pub password: Option<String>,
}

/// Body of `PUT .../authorisations/{authorisation-id}`. Exactly one of the
/// three fields is expected per call, matching the stage the TPP is in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePsuAuthenticationRequest {
    pub psu_data: Option<PsuData>,
    pub authentication_method_id: Option<String>,
    pub sca_authentication_data: Option<String>,
}

impl UpdatePsuAuthenticationRequest {
    pub fn password(&self) -> Option<String> {
        self.psu_data.as_ref().and_then(|d| d.password.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Href {
    pub href: String,
}

impl Href {
    fn new(href: impl Into<String>) -> Option<Self> {
        Some(Self { href: href.into() })
    }
}

/// Hypermedia links telling the TPP which call comes next.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Links {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sca_status: Option<Href>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_psu_authentication: Option<Href>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select_authentication_method: Option<Href>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorise_transaction: Option<Href>,
}

impl Links {
    /// Links for an authorisation at `authorisation_path` in status `sca_status`.
    pub fn for_status(authorisation_path: &str, sca_status: ScaStatus, decoupled: bool) -> Self {
        let mut links = Links {
            sca_status: Href::new(authorisation_path),
            ..Links::default()
        };

        match sca_status {
            ScaStatus::Received | ScaStatus::PsuIdentified => {
                links.update_psu_authentication = Href::new(authorisation_path);
            }
            ScaStatus::PsuAuthenticated => {
                links.select_authentication_method = Href::new(authorisation_path);
            }
            ScaStatus::ScaMethodSelected if !decoupled => {
                links.authorise_transaction = Href::new(authorisation_path);
            }
            _ => {}
        }

        links
    }
}

/// Returned when an authorisation sub-resource is created.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartScaProcessResponse {
    pub sca_status: &'static str,
    pub authorisation_id: String,
    #[serde(rename = "_links")]
    pub links: Links,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationMethod {
    pub authentication_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_version: Option<String>,
    pub authentication_method_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl From<&AuthenticationObject> for AuthenticationMethod {
    fn from(method: &AuthenticationObject) -> Self {
        Self {
            authentication_type: method.authentication_type.clone(),
            authentication_version: method.authentication_version.clone(),
            authentication_method_id: method.authentication_method_id.clone(),
            name: method.name.clone(),
            explanation: method.explanation.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePsuAuthenticationResponse {
    pub sca_status: &'static str,
    pub authorisation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psu_message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sca_methods: Vec<AuthenticationMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen_sca_method: Option<AuthenticationMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_data: Option<ChallengeData>,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl UpdatePsuAuthenticationResponse {
    pub fn from_stage(response: UpdatePsuDataResponse, authorisation_path: &str) -> Self {
        let decoupled = response
            .chosen_sca_method
            .as_ref()
            .map(|m| m.decoupled)
            .unwrap_or(false);

        Self {
            sca_status: response.sca_status.value(),
            links: Links::for_status(authorisation_path, response.sca_status, decoupled),
            authorisation_id: response.authorisation_id,
            psu_message: response.psu_message,
            sca_methods: response
                .available_sca_methods
                .iter()
                .map(AuthenticationMethod::from)
                .collect(),
            chosen_sca_method: response.chosen_sca_method.as_ref().map(AuthenticationMethod::from),
            challenge_data: response.challenge_data,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaStatusResponse {
    pub sca_status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorisationsResponse {
    pub authorisation_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationsResponse {
    pub cancellation_ids: Vec<String>,
}
