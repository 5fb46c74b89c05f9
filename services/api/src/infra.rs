use axum::http::HeaderValue;
use metrics_exporter_prometheus::PrometheusHandle;
use orryin::config::AppConfig;
use orryin::error::AppError;
use orryin::integrations::{build_client, DriveWealthClient, SumsubClient, WiseClient};
use orryin::store::{EntityStore, InMemoryEntityStore, SqliteEntityStore};
use orryin::workflows::onboarding::{OnboardingServices, WebhookSettings};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Opens the configured store and wires every provider client around it.
pub(crate) async fn build_services(config: &AppConfig) -> Result<OnboardingServices, AppError> {
    let store: Arc<dyn EntityStore> = if config.database.is_memory() {
        info!("using in-memory entity store");
        Arc::new(InMemoryEntityStore::new())
    } else {
        info!(url = %config.database.url, "opening sqlite entity store");
        Arc::new(SqliteEntityStore::connect(&config.database.url).await?)
    };

    let providers = &config.providers;
    let client = build_client(providers.timeout)?;
    let sumsub = SumsubClient::new(client.clone(), &providers.sumsub);
    let wise = WiseClient::new(client, &providers.wise);
    let drivewealth = DriveWealthClient::new(&providers.drivewealth);
    if !drivewealth.is_mock() {
        warn!("DriveWealth live mode is not wired; brokerage onboarding will fail");
    }

    Ok(OnboardingServices::new(
        store,
        Arc::new(sumsub),
        Arc::new(wise),
        Arc::new(drivewealth),
        WebhookSettings::from_config(&providers.sumsub),
    ))
}

/// CORS for the configured browser origins. A `*` entry opens every origin,
/// in which case credentials cannot be allowed.
pub(crate) fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "skipping invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
