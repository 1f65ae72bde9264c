use crate::config::{CmsConfig, StorageBackend, DEVELOPMENT_ENCRYPTION_KEY};
use crate::handlers::{self, aspsp, authorisations, consents, payments, psu};
use crate::services::{CmsServices, IdCodec};
use crate::store::{CmsStore, InMemoryStore, MongoStore};
use axum::{
    middleware::from_fn,
    routing::{delete, get, post, put},
    Extension, Router,
};
use secrecy::ExposeSecret;
use service_core::cms::AuthorisationType;
use service_core::error::AppError;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: CmsConfig,
    pub services: CmsServices,
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

/// Authorisation collection of one parent kind.
fn authorisation_routes(authorisation_type: AuthorisationType) -> Router<AppState> {
    Router::new()
        .route(
            "/:parent_id/authorisations",
            post(authorisations::create_authorisation).get(authorisations::get_authorisation_ids),
        )
        .layer(Extension(authorisation_type))
}

fn xs2a_routes() -> Router<AppState> {
    Router::new()
        .route("/ais/consent", post(consents::create_consent))
        .route("/ais/consent/:consent_id", get(consents::get_consent))
        .route(
            "/ais/consent/:consent_id/status",
            get(consents::get_consent_status),
        )
        .route(
            "/ais/consent/:consent_id/status/:status",
            put(consents::update_consent_status),
        )
        .route(
            "/ais/consent/:consent_id/multilevel-sca",
            put(consents::update_multilevel_sca),
        )
        .route(
            "/ais/consent/:consent_id/old-consents",
            delete(consents::terminate_old_consents),
        )
        .route("/pis/common-payments", post(payments::create_payment))
        .route("/pis/common-payments/:payment_id", get(payments::get_payment))
        .route(
            "/pis/common-payments/:payment_id/status/:status",
            put(payments::update_payment_status),
        )
        .route(
            "/pis/common-payments/:payment_id/multilevel-sca",
            put(payments::update_multilevel_sca),
        )
        .route(
            "/pis/common-payments/:payment_id/authorisation/psus",
            get(payments::get_psu_data),
        )
        .nest("/AIS", authorisation_routes(AuthorisationType::Ais))
        .nest("/PIS_CREATION", authorisation_routes(AuthorisationType::PisCreation))
        .nest(
            "/PIS_CANCELLATION",
            authorisation_routes(AuthorisationType::PisCancellation),
        )
        .route(
            "/authorisations/:authorisation_id",
            get(authorisations::get_authorisation).put(authorisations::update_authorisation),
        )
        .route(
            "/authorisations/:authorisation_id/status/:status",
            put(authorisations::update_authorisation_status),
        )
        .route(
            "/authorisations/:authorisation_id/sca-approach/:approach",
            put(authorisations::update_sca_approach),
        )
        .route(
            "/authorisations/:authorisation_id/authentication-methods",
            post(authorisations::save_authentication_methods),
        )
        .route(
            "/authorisations/:authorisation_id/authentication-methods/:authentication_method_id",
            get(authorisations::is_authentication_method_decoupled),
        )
}

fn aspsp_routes() -> Router<AppState> {
    Router::new()
        .route("/ais/consents/tpp/:tpp_id", get(aspsp::consents_by_tpp))
        .route("/ais/consents/psu", get(aspsp::consents_by_psu))
        .route(
            "/ais/consents/account/:account_id",
            get(aspsp::consents_by_account),
        )
        .route("/pis/payments/tpp/:tpp_id", get(aspsp::payments_by_tpp))
        .route("/pis/payments/psu", get(aspsp::payments_by_psu))
        .route(
            "/pis/payments/account/:account_id",
            get(aspsp::payments_by_account),
        )
        .route(
            "/pis/transaction-status/:payment_id/status/:status",
            put(aspsp::update_payment_status),
        )
        .route("/psu/consent/all", delete(aspsp::close_all_consents))
        .route("/tpp/stop-list", get(aspsp::get_stop_list_record))
        .route("/tpp/stop-list/block", put(aspsp::block_tpp))
        .route("/tpp/stop-list/unblock", delete(aspsp::unblock_tpp))
        .route("/events/", get(aspsp::get_events))
        .route("/events/consent/:consent_id", get(aspsp::get_consent_events))
        .route("/events/payment/:payment_id", get(aspsp::get_payment_events))
}

fn psu_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/ais/consent/:consent_id/authorisation/:authorisation_id/status/:status",
            put(psu::update_consent_authorisation_status),
        )
        .route(
            "/ais/consent/:consent_id/revoke-consent",
            put(psu::revoke_consent),
        )
        .route(
            "/payment/:payment_id/authorisation/:authorisation_id/status/:status",
            put(psu::update_payment_authorisation_status),
        )
}

impl Application {
    /// Build with the store selected by `storage.backend`.
    pub async fn build(config: CmsConfig) -> Result<Self, AppError> {
        let store: Arc<dyn CmsStore> = match config.storage.backend {
            StorageBackend::Mongo => {
                let store = MongoStore::connect(
                    config.storage.database_url.expose_secret(),
                    &config.storage.database_name,
                )
                .await
                .map_err(AppError::DatabaseError)?;
                store.init_indexes().await.map_err(|e| {
                    tracing::error!("Failed to initialize MongoDB indexes: {}", e);
                    AppError::DatabaseError(e)
                })?;
                Arc::new(store)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                Arc::new(InMemoryStore::new())
            }
        };

        Self::build_with_store(config, store).await
    }

    pub async fn build_with_store(
        config: CmsConfig,
        store: Arc<dyn CmsStore>,
    ) -> Result<Self, AppError> {
        if config.security.encryption_key.expose_secret() == DEVELOPMENT_ENCRYPTION_KEY {
            tracing::warn!("Using the development id encryption key");
        }
        let codec = IdCodec::new(&config.security.encryption_key)?;
        let services = CmsServices::new(store, codec, config.export.default_page_size);

        let state = AppState {
            config: config.clone(),
            services,
        };

        let app = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics))
            .nest("/api/v1", xs2a_routes())
            .nest("/aspsp-api/v1", aspsp_routes())
            .nest("/psu-api/v1", psu_routes())
            .layer(from_fn(metrics_middleware))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .with_state(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            backend = ?config.storage.backend,
            "Listening on {}",
            port
        );

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
