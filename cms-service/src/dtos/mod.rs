use crate::models::{CmsEvent, EventOrigin, EventType};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct MultilevelScaQuery {
    #[serde(rename = "multilevel-sca")]
    pub multilevel_sca: bool,
}

/// Inclusive creation-date window of an export.
#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    #[serde(rename = "start-date")]
    pub start_date: Option<NaiveDate>,
    #[serde(rename = "end-date")]
    pub end_date: Option<NaiveDate>,
}

/// Event as the ASPSP API returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub event_type: EventType,
    pub event_origin: EventOrigin,
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl From<CmsEvent> for EventResponse {
    fn from(event: CmsEvent) -> Self {
        Self {
            id: event.id,
            timestamp: event.timestamp,
            consent_id: event.consent_id,
            payment_id: event.payment_id,
            event_type: event.event_type,
            event_origin: event.event_origin,
            instance_id: event.instance_id,
            payload: event.payload,
        }
    }
}
