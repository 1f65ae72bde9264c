use super::CmsStore;
use crate::models::{
    AuthorisationRecord, CmsEvent, ConsentRecord, EventFilter, PaymentRecord, RecordFilter,
    TppStopListEntry,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use service_core::cms::AuthorisationType;

/// Store used in development and tests. Records live as long as the process.
#[derive(Default)]
pub struct InMemoryStore {
    consents: DashMap<String, ConsentRecord>,
    payments: DashMap<String, PaymentRecord>,
    authorisations: DashMap<String, AuthorisationRecord>,
    stop_list: DashMap<String, TppStopListEntry>,
    events: DashMap<String, CmsEvent>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CmsStore for InMemoryStore {
    async fn insert_consent(&self, record: ConsentRecord) -> Result<()> {
        if self.consents.contains_key(&record.id) {
            bail!("consent {} already exists", record.id);
        }
        self.consents.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get_consent(&self, id: &str) -> Result<Option<ConsentRecord>> {
        Ok(self.consents.get(id).map(|r| r.value().clone()))
    }

    async fn save_consent(&self, record: ConsentRecord) -> Result<()> {
        self.consents.insert(record.id.clone(), record);
        Ok(())
    }

    async fn find_consents(&self, filter: &RecordFilter) -> Result<Vec<ConsentRecord>> {
        let mut records: Vec<ConsentRecord> = self
            .consents
            .iter()
            .filter(|r| filter.matches_consent(r.value()))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| {
            (a.consent.creation_timestamp, &a.id).cmp(&(b.consent.creation_timestamp, &b.id))
        });
        Ok(records)
    }

    async fn insert_payment(&self, record: PaymentRecord) -> Result<()> {
        if self.payments.contains_key(&record.id) {
            bail!("payment {} already exists", record.id);
        }
        self.payments.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get_payment(&self, id: &str) -> Result<Option<PaymentRecord>> {
        Ok(self.payments.get(id).map(|r| r.value().clone()))
    }

    async fn save_payment(&self, record: PaymentRecord) -> Result<()> {
        self.payments.insert(record.id.clone(), record);
        Ok(())
    }

    async fn find_payments(&self, filter: &RecordFilter) -> Result<Vec<PaymentRecord>> {
        let mut records: Vec<PaymentRecord> = self
            .payments
            .iter()
            .filter(|r| filter.matches_payment(r.value()))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| {
            (a.payment.creation_timestamp, &a.id).cmp(&(b.payment.creation_timestamp, &b.id))
        });
        Ok(records)
    }

    async fn insert_authorisation(&self, record: AuthorisationRecord) -> Result<()> {
        if self.authorisations.contains_key(&record.id) {
            bail!("authorisation {} already exists", record.id);
        }
        self.authorisations.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get_authorisation(&self, id: &str) -> Result<Option<AuthorisationRecord>> {
        Ok(self.authorisations.get(id).map(|r| r.value().clone()))
    }

    async fn save_authorisation(&self, record: AuthorisationRecord) -> Result<()> {
        self.authorisations.insert(record.id.clone(), record);
        Ok(())
    }

    async fn find_authorisations(
        &self,
        parent_id: &str,
        authorisation_type: AuthorisationType,
    ) -> Result<Vec<AuthorisationRecord>> {
        let mut records: Vec<AuthorisationRecord> = self
            .authorisations
            .iter()
            .filter(|r| r.parent_id == parent_id && r.authorisation_type == authorisation_type)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| {
            (a.authorisation.creation_timestamp, &a.id)
                .cmp(&(b.authorisation.creation_timestamp, &b.id))
        });
        Ok(records)
    }

    async fn get_stop_list_entry(
        &self,
        tpp_authorisation_number: &str,
        instance_id: &str,
    ) -> Result<Option<TppStopListEntry>> {
        let key = TppStopListEntry::key(tpp_authorisation_number, instance_id);
        Ok(self.stop_list.get(&key).map(|r| r.value().clone()))
    }

    async fn save_stop_list_entry(&self, entry: TppStopListEntry) -> Result<()> {
        self.stop_list.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn insert_event(&self, event: CmsEvent) -> Result<()> {
        self.events.insert(event.id.clone(), event);
        Ok(())
    }

    async fn find_events(&self, filter: &EventFilter) -> Result<Vec<CmsEvent>> {
        let mut events: Vec<CmsEvent> = self
            .events
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        events.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
        Ok(events)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
