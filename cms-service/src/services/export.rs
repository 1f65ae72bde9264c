use super::consent::ConsentService;
use super::payment::PaymentService;
use crate::models::RecordFilter;
use crate::store::CmsStore;
use chrono::NaiveDate;
use service_core::cms::{CmsConsent, CmsPayment, PsuIdData};
use service_core::error::AppError;
use std::sync::Arc;

/// `page-index` / `items-per-page` of an export request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page_index: Option<usize>,
    pub items_per_page: Option<usize>,
}

impl PageRequest {
    /// Without either header the whole result is one page.
    pub fn apply<T>(&self, items: Vec<T>, default_page_size: usize) -> Vec<T> {
        if self.page_index.is_none() && self.items_per_page.is_none() {
            return items;
        }

        let size = self.items_per_page.unwrap_or(default_page_size).max(1);
        let skip = self.page_index.unwrap_or(0).saturating_mul(size);
        items.into_iter().skip(skip).take(size).collect()
    }
}

/// Creation-date window and instance of an export.
#[derive(Debug, Clone)]
pub struct ExportCriteria {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub instance_id: String,
    pub page: PageRequest,
}

impl ExportCriteria {
    fn filter(&self) -> RecordFilter {
        RecordFilter {
            created_from: self.start_date,
            created_to: self.end_date,
            ..RecordFilter::for_instance(self.instance_id.clone())
        }
    }
}

/// Back-office exports of consents and payments for the ASPSP.
#[derive(Clone)]
pub struct ExportService {
    store: Arc<dyn CmsStore>,
    consents: ConsentService,
    payments: PaymentService,
    default_page_size: usize,
}

impl ExportService {
    pub fn new(
        store: Arc<dyn CmsStore>,
        consents: ConsentService,
        payments: PaymentService,
        default_page_size: usize,
    ) -> Self {
        Self {
            store,
            consents,
            payments,
            default_page_size,
        }
    }

    pub async fn consents_by_tpp(
        &self,
        tpp_authorisation_number: &str,
        psu: Option<PsuIdData>,
        criteria: &ExportCriteria,
    ) -> Result<Vec<CmsConsent>, AppError> {
        if tpp_authorisation_number.trim().is_empty() {
            tracing::info!("Consent export by TPP without TPP id");
            return Ok(Vec::new());
        }

        let filter = RecordFilter {
            tpp_authorisation_number: Some(tpp_authorisation_number.to_string()),
            psu: psu.filter(|p| p.is_not_empty()),
            ..criteria.filter()
        };
        self.export_consents(filter, criteria.page).await
    }

    pub async fn consents_by_psu(
        &self,
        psu: Option<PsuIdData>,
        criteria: &ExportCriteria,
    ) -> Result<Vec<CmsConsent>, AppError> {
        let Some(psu) = psu.filter(|p| p.is_not_empty()) else {
            tracing::info!("Consent export by PSU without PSU data");
            return Ok(Vec::new());
        };

        let filter = RecordFilter {
            psu: Some(psu),
            ..criteria.filter()
        };
        self.export_consents(filter, criteria.page).await
    }

    pub async fn consents_by_account(
        &self,
        aspsp_account_id: &str,
        criteria: &ExportCriteria,
    ) -> Result<Vec<CmsConsent>, AppError> {
        if aspsp_account_id.trim().is_empty() {
            return Ok(Vec::new());
        }

        let filter = RecordFilter {
            aspsp_account_id: Some(aspsp_account_id.to_string()),
            ..criteria.filter()
        };
        self.export_consents(filter, criteria.page).await
    }

    pub async fn payments_by_tpp(
        &self,
        tpp_authorisation_number: &str,
        psu: Option<PsuIdData>,
        criteria: &ExportCriteria,
    ) -> Result<Vec<CmsPayment>, AppError> {
        if tpp_authorisation_number.trim().is_empty() {
            tracing::info!("Payment export by TPP without TPP id");
            return Ok(Vec::new());
        }

        let filter = RecordFilter {
            tpp_authorisation_number: Some(tpp_authorisation_number.to_string()),
            psu: psu.filter(|p| p.is_not_empty()),
            ..criteria.filter()
        };
        self.export_payments(filter, criteria.page).await
    }

    pub async fn payments_by_psu(
        &self,
        psu: Option<PsuIdData>,
        criteria: &ExportCriteria,
    ) -> Result<Vec<CmsPayment>, AppError> {
        let Some(psu) = psu.filter(|p| p.is_not_empty()) else {
            tracing::info!("Payment export by PSU without PSU data");
            return Ok(Vec::new());
        };

        let filter = RecordFilter {
            psu: Some(psu),
            ..criteria.filter()
        };
        self.export_payments(filter, criteria.page).await
    }

    pub async fn payments_by_account(
        &self,
        aspsp_account_id: &str,
        criteria: &ExportCriteria,
    ) -> Result<Vec<CmsPayment>, AppError> {
        if aspsp_account_id.trim().is_empty() {
            return Ok(Vec::new());
        }

        let filter = RecordFilter {
            aspsp_account_id: Some(aspsp_account_id.to_string()),
            ..criteria.filter()
        };
        self.export_payments(filter, criteria.page).await
    }

    async fn export_consents(
        &self,
        filter: RecordFilter,
        page: PageRequest,
    ) -> Result<Vec<CmsConsent>, AppError> {
        let records = self
            .store
            .find_consents(&filter)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(page
            .apply(records, self.default_page_size)
            .iter()
            .map(|r| self.consents.to_external(r))
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn export_payments(
        &self,
        filter: RecordFilter,
        page: PageRequest,
    ) -> Result<Vec<CmsPayment>, AppError> {
        let records = self
            .store
            .find_payments(&filter)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(page
            .apply(records, self.default_page_size)
            .iter()
            .map(|r| self.payments.to_external(r))
            .collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_paging_headers_return_everything() {
        let items: Vec<u32> = (0..45).collect();
        assert_eq!(PageRequest::default().apply(items, 20).len(), 45);
    }

    #[test]
    fn pages_are_cut_by_index_and_size() {
        let items: Vec<u32> = (0..45).collect();
        let page = PageRequest {
            page_index: Some(2),
            items_per_page: Some(20),
        };
        assert_eq!(page.apply(items.clone(), 20), (40..45).collect::<Vec<_>>());

        let index_only = PageRequest {
            page_index: Some(1),
            items_per_page: None,
        };
        assert_eq!(index_only.apply(items, 10), (10..20).collect::<Vec<_>>());
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let page = PageRequest {
            page_index: Some(9),
            items_per_page: Some(5),
        };
        assert!(page.apply(vec![1, 2, 3], 20).is_empty());
    }
}
