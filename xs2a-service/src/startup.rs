use crate::authorisation::StageDependencies;
use crate::config::Xs2aConfig;
use crate::handlers::{self, consent_authorisations as consents, payment_authorisations as payments};
use crate::services::AuthorisationService;
use crate::spi::MockAspspSpi;
use axum::{
    middleware::from_fn,
    routing::{get, post, put},
    Extension, Router,
};
use service_core::cms::{CmsClient, PaymentType};
use service_core::error::AppError;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Xs2aConfig,
    pub service: AuthorisationService,
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

/// Routes of one payment service; `payment_type` is handed to the handlers.
fn payment_routes(payment_type: PaymentType) -> Router<AppState> {
    Router::new()
        .route(
            "/:payment_product/:payment_id/authorisations",
            post(payments::start_authorisation).get(payments::get_authorisation_ids),
        )
        .route(
            "/:payment_product/:payment_id/authorisations/:authorisation_id",
            put(payments::update_psu_data).get(payments::get_sca_status),
        )
        .route(
            "/:payment_product/:payment_id/cancellation-authorisations",
            post(payments::start_cancellation_authorisation).get(payments::get_cancellation_ids),
        )
        .route(
            "/:payment_product/:payment_id/cancellation-authorisations/:authorisation_id",
            put(payments::update_cancellation_psu_data).get(payments::get_cancellation_sca_status),
        )
        .layer(Extension(payment_type))
}

fn consent_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:consent_id/authorisations",
            post(consents::start_authorisation).get(consents::get_authorisation_ids),
        )
        .route(
            "/:consent_id/authorisations/:authorisation_id",
            put(consents::update_psu_data).get(consents::get_sca_status),
        )
}

impl Application {
    /// Build against the configured CMS with the bundled mock ASPSP behind the SPI.
    pub async fn build(config: Xs2aConfig) -> Result<Self, AppError> {
        let cms = CmsClient::new(&config.cms.base_url, config.cms.timeout()).map_err(|e| {
            tracing::error!("Failed to create CMS client for {}: {}", config.cms.base_url, e);
            e
        })?;
        let spi = Arc::new(MockAspspSpi::new());

        let deps = StageDependencies {
            cms: Arc::new(cms),
            payment_spi: spi.clone(),
            payment_authorisation_spi: spi.clone(),
            payment_cancellation_spi: spi.clone(),
            ais_consent_spi: spi,
            sca_required_for_one_time_available_accounts: config
                .sca
                .sca_required_for_one_time_available_accounts,
        };

        Self::build_with_dependencies(config, deps).await
    }

    pub async fn build_with_dependencies(
        config: Xs2aConfig,
        deps: StageDependencies,
    ) -> Result<Self, AppError> {
        let service = AuthorisationService::new(deps, config.sca.default_approach);
        tracing::info!(
            stages = service.registry().len(),
            default_approach = %config.sca.default_approach,
            "SCA stage registry ready"
        );

        let state = AppState {
            config: config.clone(),
            service,
        };

        let app = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics))
            .nest("/v1/payments", payment_routes(PaymentType::Single))
            .nest("/v1/periodic-payments", payment_routes(PaymentType::Periodic))
            .nest("/v1/bulk-payments", payment_routes(PaymentType::Bulk))
            .nest("/v1/consents", consent_routes())
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
                        psu_id = tracing::field::Empty,
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

        tracing::info!("Listening on {}", port);

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
