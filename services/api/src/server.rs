use crate::cli::ServeArgs;
use crate::infra::{
    build_reporting_api, seed_demo_region, AppState, InMemoryReportStore, StaticTokenResolver,
};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use sampurasun::config::{AppConfig, ConfigError};
use sampurasun::error::AppError;
use sampurasun::telemetry;
use sampurasun::workflows::reporting::{DailySchedule, ReportingError, SweepScheduler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let store = Arc::new(InMemoryReportStore::default());
    if args.seed_demo {
        let seeded = seed_demo_region(&store, Utc::now()).map_err(ReportingError::from)?;
        info!(reports = seeded, "demo region loaded");
    }

    let resolver = StaticTokenResolver::from_config(&config.auth);
    if resolver.is_empty() {
        warn!("APP_ADMIN_TOKENS is empty; admin endpoints will reject every request");
    }
    let api = build_reporting_api(&config, store, Arc::new(resolver));

    let shutdown = CancellationToken::new();
    let scheduler = if config.sweep.enabled {
        let schedule = DailySchedule::new(config.sweep.hour, config.sweep.minute).ok_or(
            ConfigError::InvalidSweepTime {
                hour: config.sweep.hour,
                minute: config.sweep.minute,
            },
        )?;
        let scheduler = SweepScheduler::new(Arc::clone(&api.sweep), schedule);
        Some(tokio::spawn(scheduler.run(shutdown.clone())))
    } else {
        info!("compliance sweep scheduler disabled");
        None
    };

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_operational_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "tourism reporting service ready");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(handle) = scheduler {
        handle.await?;
    }
    info!("tourism reporting service stopped");
    Ok(())
}
