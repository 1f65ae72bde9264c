use super::CmsStore;
use crate::models::{
    AuthorisationRecord, CmsEvent, ConsentRecord, EventFilter, PaymentRecord, RecordFilter,
    TppStopListEntry,
};
use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::options::{IndexOptions, ReplaceOptions};
use mongodb::{
    bson::{doc, Document},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::cms::{wire_name, AuthorisationType};

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
    consents: Collection<ConsentRecord>,
    payments: Collection<PaymentRecord>,
    authorisations: Collection<AuthorisationRecord>,
    stop_list: Collection<TppStopListEntry>,
    events: Collection<CmsEvent>,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            e
        })?;
        tracing::info!(database = %database, "Connected to MongoDB");
        Ok(Self::new(&client.database(database)))
    }

    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            consents: db.collection("consents"),
            payments: db.collection("payments"),
            authorisations: db.collection("authorisations"),
            stop_list: db.collection("tpp_stop_list"),
            events: db.collection("events"),
        }
    }

    /// Indexes backing the export, authorisation and event lookups.
    pub async fn init_indexes(&self) -> Result<()> {
        // Exports are always scoped to an instance and usually to a TPP
        let consent_tpp_index = IndexModel::builder()
            .keys(doc! { "instance_id": 1, "tpp_authorisation_number": 1 })
            .options(
                IndexOptions::builder()
                    .name("consent_instance_tpp_idx".to_string())
                    .build(),
            )
            .build();
        self.consents.create_indexes([consent_tpp_index], None).await?;

        let payment_tpp_index = IndexModel::builder()
            .keys(doc! { "instance_id": 1, "tpp_authorisation_number": 1 })
            .options(
                IndexOptions::builder()
                    .name("payment_instance_tpp_idx".to_string())
                    .build(),
            )
            .build();
        self.payments.create_indexes([payment_tpp_index], None).await?;

        let parent_index = IndexModel::builder()
            .keys(doc! { "parent_id": 1, "authorisation_type": 1 })
            .options(
                IndexOptions::builder()
                    .name("authorisation_parent_idx".to_string())
                    .build(),
            )
            .build();
        self.authorisations.create_indexes([parent_index], None).await?;

        let event_index = IndexModel::builder()
            .keys(doc! { "instanceId": 1, "timestamp": 1 })
            .options(
                IndexOptions::builder()
                    .name("event_instance_timestamp_idx".to_string())
                    .build(),
            )
            .build();
        self.events.create_indexes([event_index], None).await?;

        tracing::info!("CMS indexes initialized");
        Ok(())
    }

    fn scope(filter: &RecordFilter) -> Document {
        let mut scope = doc! { "instance_id": &filter.instance_id };
        if let Some(tpp) = &filter.tpp_authorisation_number {
            scope.insert("tpp_authorisation_number", tpp);
        }
        scope
    }

    fn upsert() -> ReplaceOptions {
        ReplaceOptions::builder().upsert(true).build()
    }
}

#[async_trait]
impl CmsStore for MongoStore {
    async fn insert_consent(&self, record: ConsentRecord) -> Result<()> {
        self.consents.insert_one(record, None).await?;
        Ok(())
    }

    async fn get_consent(&self, id: &str) -> Result<Option<ConsentRecord>> {
        Ok(self.consents.find_one(doc! { "_id": id }, None).await?)
    }

    async fn save_consent(&self, record: ConsentRecord) -> Result<()> {
        self.consents
            .replace_one(doc! { "_id": &record.id }, &record, Self::upsert())
            .await?;
        Ok(())
    }

    async fn find_consents(&self, filter: &RecordFilter) -> Result<Vec<ConsentRecord>> {
        let cursor = self.consents.find(Self::scope(filter), None).await?;
        let mut records: Vec<ConsentRecord> = cursor.try_collect().await?;
        records.retain(|r| filter.matches_consent(r));
        records.sort_by(|a, b| {
            (a.consent.creation_timestamp, &a.id).cmp(&(b.consent.creation_timestamp, &b.id))
        });
        Ok(records)
    }

    async fn insert_payment(&self, record: PaymentRecord) -> Result<()> {
        self.payments.insert_one(record, None).await?;
        Ok(())
    }

    async fn get_payment(&self, id: &str) -> Result<Option<PaymentRecord>> {
        Ok(self.payments.find_one(doc! { "_id": id }, None).await?)
    }

    async fn save_payment(&self, record: PaymentRecord) -> Result<()> {
        self.payments
            .replace_one(doc! { "_id": &record.id }, &record, Self::upsert())
            .await?;
        Ok(())
    }

    async fn find_payments(&self, filter: &RecordFilter) -> Result<Vec<PaymentRecord>> {
        let cursor = self.payments.find(Self::scope(filter), None).await?;
        let mut records: Vec<PaymentRecord> = cursor.try_collect().await?;
        records.retain(|r| filter.matches_payment(r));
        records.sort_by(|a, b| {
            (a.payment.creation_timestamp, &a.id).cmp(&(b.payment.creation_timestamp, &b.id))
        });
        Ok(records)
    }

    async fn insert_authorisation(&self, record: AuthorisationRecord) -> Result<()> {
        self.authorisations.insert_one(record, None).await?;
        Ok(())
    }

    async fn get_authorisation(&self, id: &str) -> Result<Option<AuthorisationRecord>> {
        Ok(self.authorisations.find_one(doc! { "_id": id }, None).await?)
    }

    async fn save_authorisation(&self, record: AuthorisationRecord) -> Result<()> {
        self.authorisations
            .replace_one(doc! { "_id": &record.id }, &record, Self::upsert())
            .await?;
        Ok(())
    }

    async fn find_authorisations(
        &self,
        parent_id: &str,
        authorisation_type: AuthorisationType,
    ) -> Result<Vec<AuthorisationRecord>> {
        let filter = doc! {
            "parent_id": parent_id,
            "authorisation_type": wire_name(&authorisation_type),
        };
        let cursor = self.authorisations.find(filter, None).await?;
        let mut records: Vec<AuthorisationRecord> = cursor.try_collect().await?;
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
        Ok(self.stop_list.find_one(doc! { "_id": key }, None).await?)
    }

    async fn save_stop_list_entry(&self, entry: TppStopListEntry) -> Result<()> {
        self.stop_list
            .replace_one(doc! { "_id": &entry.id }, &entry, Self::upsert())
            .await?;
        Ok(())
    }

    async fn insert_event(&self, event: CmsEvent) -> Result<()> {
        self.events.insert_one(event, None).await?;
        Ok(())
    }

    async fn find_events(&self, filter: &EventFilter) -> Result<Vec<CmsEvent>> {
        let cursor = self
            .events
            .find(doc! { "instanceId": &filter.instance_id }, None)
            .await?;
        let mut events: Vec<CmsEvent> = cursor.try_collect().await?;
        events.retain(|e| filter.matches(e));
        events.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
        Ok(events)
    }

    async fn ping(&self) -> Result<()> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}
