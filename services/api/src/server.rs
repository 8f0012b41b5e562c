use crate::cli::ServeArgs;
use crate::infra::{
    default_registry, AccountDirectory, AppState, CredentialVault, TracingNotificationSink,
};
use crate::routes::{with_moderation_routes, IntakeState};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use jobboard::config::AppConfig;
use jobboard::error::AppError;
use jobboard::moderation::{ApprovalEngine, MemorySubmissionStore};
use jobboard::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(MemorySubmissionStore::default());
    let accounts = Arc::new(AccountDirectory::default());
    let vault = Arc::new(CredentialVault::default());
    let registry = Arc::new(default_registry(accounts, vault)?);
    let engine = Arc::new(ApprovalEngine::new(
        store.clone(),
        registry.clone(),
        Arc::new(TracingNotificationSink),
    ));

    let app = with_moderation_routes(engine, IntakeState { store, registry })
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "moderation service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
