use crate::cli::ServeArgs;
use crate::infra::{AppState, CannedScoringService, DemoIdentityProvider};
use crate::routes::with_dashboard_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chemrisk::assessment::{AssessmentService, DashboardState, HttpScoringClient, ScoringService};
use chemrisk::config::AppConfig;
use chemrisk::error::AppError;
use chemrisk::session::{IdentityProvider, RemoteIdentityProvider, SessionManager};
use chemrisk::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

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

    let (scoring, identity): (Arc<dyn ScoringService>, Arc<dyn IdentityProvider>) =
        if args.offline {
            warn!("offline mode: canned scoring replies, any credentials accepted");
            (
                Arc::new(CannedScoringService::default()),
                Arc::new(DemoIdentityProvider),
            )
        } else {
            (
                Arc::new(HttpScoringClient::new(&config.scoring)?),
                Arc::new(
                    RemoteIdentityProvider::new(&config.scoring)
                        .map_err(chemrisk::session::SessionError::from)?,
                ),
            )
        };

    let state = DashboardState {
        assessments: Arc::new(AssessmentService::new(
            scoring,
            config.scoring.explanation_features,
        )),
        sessions: Arc::new(SessionManager::new(identity)),
    };

    let app = with_dashboard_routes(state)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        scoring = %config.scoring.base_url,
        "chemical risk dashboard ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
