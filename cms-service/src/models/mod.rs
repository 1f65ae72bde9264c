//! Persistent records of the consent management system.
//!
//! Records are keyed by internal ids. The opaque external ids handed to TPPs
//! and the XS2A layer are produced by [`crate::services::IdCodec`] at the
//! service boundary and never stored.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use service_core::cms::{
    AuthorisationType, CmsAuthorisation, CmsConsent, CmsPayment, ConsentStatus, PsuIdData,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub tpp_authorisation_number: String,
    pub instance_id: String,
    /// Held with `consent.id` set to the internal id.
    pub consent: CmsConsent,
    /// SHA-256 of the access definition, taken when the consent became valid.
    #[serde(default)]
    pub checksum: Option<String>,
}

impl ConsentRecord {
    pub fn new(consent: CmsConsent) -> Self {
        Self {
            id: consent.id.clone(),
            tpp_authorisation_number: consent.tpp_info.authorisation_number.clone(),
            instance_id: consent.instance_id.clone(),
            consent,
            checksum: None,
        }
    }

    pub fn status(&self) -> ConsentStatus {
        self.consent.consent_status
    }

    pub fn set_status(&mut self, status: ConsentStatus) {
        self.consent.consent_status = status;
        self.consent.status_change_timestamp = Some(Utc::now());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub tpp_authorisation_number: String,
    pub instance_id: String,
    /// Held with `payment.payment_id` set to the internal id.
    pub payment: CmsPayment,
}

impl PaymentRecord {
    pub fn new(payment: CmsPayment) -> Self {
        Self {
            id: payment.payment_id.clone(),
            tpp_authorisation_number: payment.tpp_info.authorisation_number.clone(),
            instance_id: payment.instance_id.clone(),
            payment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorisationRecord {
    #[serde(rename = "_id")]
    pub id: String,
    /// Internal id of the owning consent or payment.
    pub parent_id: String,
    pub authorisation_type: AuthorisationType,
    pub authorisation: CmsAuthorisation,
}

impl AuthorisationRecord {
    pub fn new(authorisation: CmsAuthorisation) -> Self {
        Self {
            id: authorisation.authorisation_id.clone(),
            parent_id: authorisation.parent_id.clone(),
            authorisation_type: authorisation.authorisation_type,
            authorisation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TppStatus {
    Blocked,
    Enabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TppStopListEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub tpp_authorisation_number: String,
    pub instance_id: String,
    pub status: TppStatus,
    #[serde(default)]
    pub blocking_expiration: Option<DateTime<Utc>>,
}

impl TppStopListEntry {
    pub fn key(tpp_authorisation_number: &str, instance_id: &str) -> String {
        format!("{}:{}", instance_id, tpp_authorisation_number)
    }

    pub fn enabled(tpp_authorisation_number: &str, instance_id: &str) -> Self {
        Self {
            id: Self::key(tpp_authorisation_number, instance_id),
            tpp_authorisation_number: tpp_authorisation_number.to_string(),
            instance_id: instance_id.to_string(),
            status: TppStatus::Enabled,
            blocking_expiration: None,
        }
    }

    /// Blocked and the lock, if time-limited, has not run out yet.
    pub fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        self.status == TppStatus::Blocked
            && self.blocking_expiration.map_or(true, |until| until > now)
    }
}

/// Stop-list record as the ASPSP API returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TppStopListRecord {
    pub tpp_authorisation_number: String,
    pub instance_id: String,
    pub status: TppStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking_expiration_timestamp: Option<DateTime<Utc>>,
}

impl TppStopListRecord {
    pub fn from_entry(entry: &TppStopListEntry, now: DateTime<Utc>) -> Self {
        let blocked = entry.is_blocked(now);
        Self {
            tpp_authorisation_number: entry.tpp_authorisation_number.clone(),
            instance_id: entry.instance_id.clone(),
            status: if blocked { TppStatus::Blocked } else { TppStatus::Enabled },
            blocking_expiration_timestamp: entry.blocking_expiration.filter(|_| blocked),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    CreateConsent,
    UpdateConsentStatus,
    UpdateConsentMultilevelSca,
    TerminateOldConsents,
    RevokeConsent,
    CreatePayment,
    UpdatePaymentStatus,
    UpdatePaymentMultilevelSca,
    StartAuthorisation,
    UpdateAuthorisation,
    UpdateAuthorisationStatus,
    UpdateScaApproach,
    SaveAuthenticationMethods,
    BlockTpp,
    UnblockTpp,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CreateConsent => "create_consent",
            EventType::UpdateConsentStatus => "update_consent_status",
            EventType::UpdateConsentMultilevelSca => "update_consent_multilevel_sca",
            EventType::TerminateOldConsents => "terminate_old_consents",
            EventType::RevokeConsent => "revoke_consent",
            EventType::CreatePayment => "create_payment",
            EventType::UpdatePaymentStatus => "update_payment_status",
            EventType::UpdatePaymentMultilevelSca => "update_payment_multilevel_sca",
            EventType::StartAuthorisation => "start_authorisation",
            EventType::UpdateAuthorisation => "update_authorisation",
            EventType::UpdateAuthorisationStatus => "update_authorisation_status",
            EventType::UpdateScaApproach => "update_sca_approach",
            EventType::SaveAuthenticationMethods => "save_authentication_methods",
            EventType::BlockTpp => "block_tpp",
            EventType::UnblockTpp => "unblock_tpp",
        }
    }
}

/// Which API caused an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventOrigin {
    Aspsp,
    Tpp,
    Psu,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmsEvent {
    #[serde(rename = "_id")]
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// External consent id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_id: Option<String>,
    /// External payment id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub event_type: EventType,
    pub event_origin: EventOrigin,
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Criteria of the ASPSP export queries. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub instance_id: String,
    pub tpp_authorisation_number: Option<String>,
    pub psu: Option<PsuIdData>,
    pub aspsp_account_id: Option<String>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
}

impl RecordFilter {
    pub fn for_instance(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Self::default()
        }
    }

    fn created_within(&self, created: DateTime<Utc>) -> bool {
        let day = created.date_naive();
        self.created_from.map_or(true, |from| day >= from)
            && self.created_to.map_or(true, |to| day <= to)
    }

    fn tpp_matches(&self, tpp_authorisation_number: &str) -> bool {
        self.tpp_authorisation_number
            .as_deref()
            .map_or(true, |tpp| tpp == tpp_authorisation_number)
    }

    fn psu_matches(&self, psus: &[PsuIdData]) -> bool {
        match &self.psu {
            Some(query) => psus.iter().any(|psu| psu_fields_match(query, psu)),
            None => true,
        }
    }

    pub fn matches_consent(&self, record: &ConsentRecord) -> bool {
        record.instance_id == self.instance_id
            && self.tpp_matches(&record.tpp_authorisation_number)
            && self.created_within(record.consent.creation_timestamp)
            && self.psu_matches(&record.consent.psu_id_data_list)
            && self.aspsp_account_id.as_deref().map_or(true, |account| {
                record
                    .consent
                    .access
                    .references()
                    .any(|r| r.aspsp_account_id.as_deref() == Some(account))
            })
    }

    pub fn matches_payment(&self, record: &PaymentRecord) -> bool {
        record.instance_id == self.instance_id
            && self.tpp_matches(&record.tpp_authorisation_number)
            && self.created_within(record.payment.creation_timestamp)
            && self.psu_matches(&record.payment.psu_data)
            && self.aspsp_account_id.as_deref().map_or(true, |account| {
                record
                    .payment
                    .debtor_account
                    .as_ref()
                    .and_then(|r| r.aspsp_account_id.as_deref())
                    == Some(account)
            })
    }
}

/// Every field present in `query` must equal the stored one.
fn psu_fields_match(query: &PsuIdData, stored: &PsuIdData) -> bool {
    fn field(query: &Option<String>, stored: &Option<String>) -> bool {
        query.is_none() || query == stored
    }

    field(&query.psu_id, &stored.psu_id)
        && field(&query.psu_id_type, &stored.psu_id_type)
        && field(&query.psu_corporate_id, &stored.psu_corporate_id)
        && field(&query.psu_corporate_id_type, &stored.psu_corporate_id_type)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub instance_id: String,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub consent_id: Option<String>,
    pub payment_id: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, event: &CmsEvent) -> bool {
        event.instance_id == self.instance_id
            && self.from.map_or(true, |from| event.timestamp >= from)
            && self.to.map_or(true, |to| event.timestamp <= to)
            && (self.consent_id.is_none() || event.consent_id == self.consent_id)
            && (self.payment_id.is_none() || event.payment_id == self.payment_id)
    }
}
