pub mod authorisation;
pub mod checksum;
pub mod consent;
pub mod events;
pub mod export;
pub mod id_codec;
pub mod payment;
pub mod stop_list;

pub use authorisation::AuthorisationService;
pub use consent::ConsentService;
pub use events::{EventService, EventSubject};
pub use export::{ExportCriteria, ExportService, PageRequest};
pub use id_codec::IdCodec;
pub use payment::PaymentService;
pub use stop_list::TppStopListService;

use crate::store::CmsStore;
use std::sync::Arc;

/// Every CMS service, wired over one store and one id codec.
#[derive(Clone)]
pub struct CmsServices {
    pub consents: ConsentService,
    pub payments: PaymentService,
    pub authorisations: AuthorisationService,
    pub exports: ExportService,
    pub stop_list: TppStopListService,
    pub events: EventService,
    store: Arc<dyn CmsStore>,
}

impl CmsServices {
    pub fn new(store: Arc<dyn CmsStore>, codec: IdCodec, default_page_size: usize) -> Self {
        let events = EventService::new(store.clone());
        let stop_list = TppStopListService::new(store.clone(), events.clone());
        let consents =
            ConsentService::new(store.clone(), codec.clone(), events.clone(), stop_list.clone());
        let payments =
            PaymentService::new(store.clone(), codec.clone(), events.clone(), stop_list.clone());
        let authorisations = AuthorisationService::new(
            store.clone(),
            codec,
            consents.clone(),
            payments.clone(),
            events.clone(),
        );
        let exports = ExportService::new(
            store.clone(),
            consents.clone(),
            payments.clone(),
            default_page_size,
        );

        Self {
            consents,
            payments,
            authorisations,
            exports,
            stop_list,
            events,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn CmsStore> {
        &self.store
    }
}
