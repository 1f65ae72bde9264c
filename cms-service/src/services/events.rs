use crate::models::{CmsEvent, EventFilter, EventOrigin, EventType};
use crate::store::CmsStore;
use chrono::Utc;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

/// Subject of an audit event, by external id.
#[derive(Debug, Clone)]
pub enum EventSubject {
    Consent(String),
    Payment(String),
    Tpp,
}

/// Audit trail of CMS state changes.
#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn CmsStore>,
}

impl EventService {
    pub fn new(store: Arc<dyn CmsStore>) -> Self {
        Self { store }
    }

    /// Store an event. Failing to store one never fails the change it describes.
    pub async fn record(
        &self,
        event_type: EventType,
        origin: EventOrigin,
        subject: EventSubject,
        instance_id: &str,
        payload: Option<serde_json::Value>,
    ) {
        let (consent_id, payment_id) = match subject {
            EventSubject::Consent(id) => (Some(id), None),
            EventSubject::Payment(id) => (None, Some(id)),
            EventSubject::Tpp => (None, None),
        };

        let event = CmsEvent {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            consent_id,
            payment_id,
            event_type,
            event_origin: origin,
            instance_id: instance_id.to_string(),
            payload,
        };

        metrics::counter!("cms_events_total", "type" => event_type.as_str()).increment(1);

        if let Err(e) = self.store.insert_event(event).await {
            tracing::warn!(event_type = event_type.as_str(), error = %e, "Failed to store CMS event");
        }
    }

    pub async fn find(&self, filter: &EventFilter) -> Result<Vec<CmsEvent>, AppError> {
        self.store
            .find_events(filter)
            .await
            .map_err(AppError::DatabaseError)
    }
}
