use super::events::{EventService, EventSubject};
use super::id_codec::IdCodec;
use super::stop_list::TppStopListService;
use crate::models::{EventOrigin, EventType, PaymentRecord};
use crate::store::CmsStore;
use chrono::Utc;
use serde_json::json;
use service_core::cms::{
    CmsPayment, CreatePaymentRequest, CreatePaymentResponse, PsuIdData, TransactionStatus,
};
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn CmsStore>,
    codec: IdCodec,
    events: EventService,
    stop_list: TppStopListService,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn CmsStore>,
        codec: IdCodec,
        events: EventService,
        stop_list: TppStopListService,
    ) -> Self {
        Self {
            store,
            codec,
            events,
            stop_list,
        }
    }

    pub async fn create(
        &self,
        request: CreatePaymentRequest,
        instance_id: &str,
    ) -> Result<CreatePaymentResponse, AppError> {
        self.stop_list
            .ensure_not_blocked(&request.tpp_info.authorisation_number, instance_id)
            .await?;

        request.validate()?;

        let internal_id = Uuid::new_v4().to_string();
        let payment = CmsPayment {
            payment_id: internal_id.clone(),
            payment_type: request.payment_type,
            payment_product: request.payment_product,
            transaction_status: TransactionStatus::Rcvd,
            debtor_account: request.debtor_account,
            creditor_account: request.creditor_account,
            instructed_amount: request.instructed_amount,
            creditor_name: request.creditor_name,
            remittance_information: request.remittance_information,
            psu_data: request.psu_data.into_iter().filter(|p| p.is_not_empty()).collect(),
            tpp_info: request.tpp_info,
            multilevel_sca_required: false,
            creation_timestamp: Utc::now(),
            status_change_timestamp: None,
            instance_id: instance_id.to_string(),
        };

        self.store
            .insert_payment(PaymentRecord::new(payment))
            .await
            .map_err(AppError::DatabaseError)?;

        let payment_id = self.codec.encode(&internal_id)?;
        tracing::info!(payment_id = %payment_id, "Payment created");
        self.record(EventType::CreatePayment, EventOrigin::Tpp, &payment_id, instance_id, None)
            .await;

        Ok(CreatePaymentResponse { payment_id })
    }

    pub async fn get(&self, payment_id: &str) -> Result<CmsPayment, AppError> {
        let record = self.load(payment_id).await?;
        self.to_external(&record)
    }

    pub async fn update_status(
        &self,
        payment_id: &str,
        status: TransactionStatus,
    ) -> Result<(), AppError> {
        let record = self.load(payment_id).await?;
        if record.payment.transaction_status.is_finalised_status() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Payment is already {}",
                record.payment.transaction_status
            )));
        }
        self.apply_status(record, payment_id, status, EventOrigin::Tpp).await
    }

    /// Status change requested by the ASPSP back office. `false` when the
    /// payment is unknown to `instance_id` or already finalised.
    pub async fn update_status_by_aspsp(
        &self,
        payment_id: &str,
        status: TransactionStatus,
        instance_id: &str,
    ) -> Result<bool, AppError> {
        let record = match self.load(payment_id).await {
            Ok(record) => record,
            Err(AppError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        if record.instance_id != instance_id
            || record.payment.transaction_status.is_finalised_status()
        {
            return Ok(false);
        }

        self.apply_status(record, payment_id, status, EventOrigin::Aspsp)
            .await?;
        Ok(true)
    }

    pub async fn update_multilevel_sca(
        &self,
        payment_id: &str,
        multilevel: bool,
    ) -> Result<(), AppError> {
        let mut record = self.load(payment_id).await?;
        record.payment.multilevel_sca_required = multilevel;
        let instance_id = record.instance_id.clone();
        self.save(record).await?;

        self.record(
            EventType::UpdatePaymentMultilevelSca,
            EventOrigin::Tpp,
            payment_id,
            &instance_id,
            Some(json!({ "multilevelScaRequired": multilevel })),
        )
        .await;
        Ok(())
    }

    pub async fn get_psu_data(&self, payment_id: &str) -> Result<Vec<PsuIdData>, AppError> {
        Ok(self.load(payment_id).await?.payment.psu_data)
    }

    async fn apply_status(
        &self,
        mut record: PaymentRecord,
        payment_id: &str,
        status: TransactionStatus,
        origin: EventOrigin,
    ) -> Result<(), AppError> {
        let previous = record.payment.transaction_status;
        record.payment.transaction_status = status;
        record.payment.status_change_timestamp = Some(Utc::now());
        let instance_id = record.instance_id.clone();
        self.save(record).await?;

        tracing::info!(
            payment_id = %payment_id,
            from = %previous,
            to = %status,
            "Payment status updated"
        );
        self.record(
            EventType::UpdatePaymentStatus,
            origin,
            payment_id,
            &instance_id,
            Some(json!({ "status": status })),
        )
        .await;
        Ok(())
    }

    pub(crate) async fn load(&self, payment_id: &str) -> Result<PaymentRecord, AppError> {
        let internal_id = self
            .codec
            .decode(payment_id)
            .ok_or_else(|| unknown_payment(payment_id))?;

        self.store
            .get_payment(&internal_id)
            .await
            .map_err(AppError::DatabaseError)?
            .ok_or_else(|| unknown_payment(payment_id))
    }

    pub(crate) async fn save(&self, record: PaymentRecord) -> Result<(), AppError> {
        self.store
            .save_payment(record)
            .await
            .map_err(AppError::DatabaseError)
    }

    pub(crate) fn to_external(&self, record: &PaymentRecord) -> Result<CmsPayment, AppError> {
        let mut payment = record.payment.clone();
        payment.payment_id = self.codec.encode(&record.id)?;
        Ok(payment)
    }

    async fn record(
        &self,
        event_type: EventType,
        origin: EventOrigin,
        payment_id: &str,
        instance_id: &str,
        payload: Option<serde_json::Value>,
    ) {
        self.events
            .record(
                event_type,
                origin,
                EventSubject::Payment(payment_id.to_string()),
                instance_id,
                payload,
            )
            .await;
    }
}

fn unknown_payment(payment_id: &str) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Payment {} not found", payment_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use secrecy::Secret;
    use service_core::cms::{PaymentType, TppInfo};

    fn service() -> PaymentService {
        let store: Arc<dyn CmsStore> = Arc::new(InMemoryStore::new());
        let events = EventService::new(store.clone());
        let stop_list = TppStopListService::new(store.clone(), events.clone());
        let codec = IdCodec::new(&Secret::new("test-key".to_string())).unwrap();
        PaymentService::new(store, codec, events, stop_list)
    }

    fn request() -> CreatePaymentRequest {
        CreatePaymentRequest {
            payment_type: PaymentType::Single,
            payment_product: "sepa-credit-transfers".into(),
            debtor_account: None,
            creditor_account: None,
            instructed_amount: None,
            creditor_name: Some("Merchant".into()),
            remittance_information: None,
            psu_data: Some(PsuIdData::new("psu-1")),
            tpp_info: TppInfo {
                authorisation_number: "PSDDE-FAKENCA-87B2AC".into(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn aspsp_status_update_reports_success_as_bool() {
        let service = service();
        let created = service.create(request(), "UNDEFINED").await.unwrap();

        assert!(!service
            .update_status_by_aspsp(&created.payment_id, TransactionStatus::Accc, "bank-2")
            .await
            .unwrap());
        assert!(service
            .update_status_by_aspsp(&created.payment_id, TransactionStatus::Accc, "UNDEFINED")
            .await
            .unwrap());
        // ACCC is final
        assert!(!service
            .update_status_by_aspsp(&created.payment_id, TransactionStatus::Rjct, "UNDEFINED")
            .await
            .unwrap());
        assert!(!service
            .update_status_by_aspsp("unknown", TransactionStatus::Acsp, "UNDEFINED")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn external_id_hides_the_internal_one() {
        let service = service();
        let created = service.create(request(), "UNDEFINED").await.unwrap();
        let payment = service.get(&created.payment_id).await.unwrap();

        assert_eq!(payment.payment_id, created.payment_id);
        assert_eq!(payment.transaction_status, TransactionStatus::Rcvd);
        assert_eq!(
            service.get_psu_data(&created.payment_id).await.unwrap(),
            vec![PsuIdData::new("psu-1")]
        );
    }
}
