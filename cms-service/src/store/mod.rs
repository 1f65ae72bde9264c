//! Storage port of the CMS. Implementations only persist and look up records;
//! status rules, id encoding and checksums live in the services.

pub mod memory;
pub mod mongo;

use crate::models::{
    AuthorisationRecord, CmsEvent, ConsentRecord, EventFilter, PaymentRecord, RecordFilter,
    TppStopListEntry,
};
use anyhow::Result;
use async_trait::async_trait;
use service_core::cms::AuthorisationType;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

#[async_trait]
pub trait CmsStore: Send + Sync {
    async fn insert_consent(&self, record: ConsentRecord) -> Result<()>;
    async fn get_consent(&self, id: &str) -> Result<Option<ConsentRecord>>;
    async fn save_consent(&self, record: ConsentRecord) -> Result<()>;
    /// Matching consents, oldest first.
    async fn find_consents(&self, filter: &RecordFilter) -> Result<Vec<ConsentRecord>>;

    async fn insert_payment(&self, record: PaymentRecord) -> Result<()>;
    async fn get_payment(&self, id: &str) -> Result<Option<PaymentRecord>>;
    async fn save_payment(&self, record: PaymentRecord) -> Result<()>;
    /// Matching payments, oldest first.
    async fn find_payments(&self, filter: &RecordFilter) -> Result<Vec<PaymentRecord>>;

    async fn insert_authorisation(&self, record: AuthorisationRecord) -> Result<()>;
    async fn get_authorisation(&self, id: &str) -> Result<Option<AuthorisationRecord>>;
    async fn save_authorisation(&self, record: AuthorisationRecord) -> Result<()>;
    /// Authorisations of one parent and type, oldest first.
    async fn find_authorisations(
        &self,
        parent_id: &str,
        authorisation_type: AuthorisationType,
    ) -> Result<Vec<AuthorisationRecord>>;

    async fn get_stop_list_entry(
        &self,
        tpp_authorisation_number: &str,
        instance_id: &str,
    ) -> Result<Option<TppStopListEntry>>;
    async fn save_stop_list_entry(&self, entry: TppStopListEntry) -> Result<()>;

    async fn insert_event(&self, event: CmsEvent) -> Result<()>;
    /// Matching events, oldest first.
    async fn find_events(&self, filter: &EventFilter) -> Result<Vec<CmsEvent>>;

    /// Whether the backing database answers.
    async fn ping(&self) -> Result<()>;
}
