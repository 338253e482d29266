use crate::cli::ServeArgs;
use crate::infra::{seed_sandbox, AppState, InMemoryDirectory, InMemorySchedulingStore, LoggingNotifier};
use crate::routes::with_scheduling_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use visit_scheduler::config::AppConfig;
use visit_scheduler::error::AppError;
use visit_scheduler::scheduling::SchedulingOrchestrator;
use visit_scheduler::telemetry;

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

    let store = Arc::new(InMemorySchedulingStore::default());
    let directory = Arc::new(InMemoryDirectory::default());
    let notifier = Arc::new(LoggingNotifier::default());
    seed_sandbox(&store, &directory);

    let orchestrator = Arc::new(SchedulingOrchestrator::new(
        store,
        directory,
        notifier,
        config.scheduler.clone(),
    ));

    let app = with_scheduling_routes(orchestrator)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "visit scheduling service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
