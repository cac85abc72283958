use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::signal;
use tracing::info;

use cloud_policy_daemon::cache::ResourceCache;
use cloud_policy_daemon::controller::Controller;
use cloud_policy_daemon::engine::Engine;
use cloud_policy_daemon::events::LoggingEventSink;
use cloud_policy_daemon::metrics::{self, PrometheusMetricSink};
use cloud_policy_daemon::policy::load_policies;
use cloud_policy_daemon::provider::{AwsResourceProvider, AzureResourceProvider, ResourceProvider};
use cloud_policy_daemon::scheduler::Scheduler;
use cloud_policy_daemon::state::StateStore;

use crate::cli::{ProviderKind, RunArgs};

struct DaemonState {
    ready: AtomicBool,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    println!("Starting cloud policy compliance daemon...\n");

    let policies = load_policies(&args.policy_file)
        .await
        .context("Failed to load policy file")?;
    println!("  Policies loaded .............. {}", policies.len());

    let provider: Arc<dyn ResourceProvider> = match args.provider {
        ProviderKind::Azure => Arc::new(AzureResourceProvider::new()),
        ProviderKind::Aws => Arc::new(AwsResourceProvider::new()),
    };

    let cache = Arc::new(ResourceCache::new(Duration::from_secs(args.cache_ttl_secs)));
    let engine = Arc::new(Engine::new(provider.clone(), cache));

    let state = Arc::new(StateStore::load(&args.state_file).await);
    let controller = Arc::new(Controller::new(
        provider,
        state,
        Arc::new(LoggingEventSink),
        Arc::new(PrometheusMetricSink),
    ));

    metrics::force_init();

    let daemon_state = Arc::new(DaemonState {
        ready: AtomicBool::new(false),
    });

    println!("  Account ...................... {}", args.account_id);
    println!("  Metrics server ............... http://{}", args.bind_addr);
    println!();
    println!("  Available endpoints:");
    println!("    GET /healthz .............. Liveness probe (always 200 OK)");
    println!("    GET /readyz ............... Readiness probe (503 until scheduler starts)");
    println!("    GET /metrics .............. Prometheus metrics scrape endpoint");
    println!();
    println!("Daemon running. Press Ctrl+C to stop.\n");

    info!(account_id = %args.account_id, policies = policies.len(), "policy_daemon_started");

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let http_shutdown = shutdown_tx.subscribe();
    let http_state = daemon_state.clone();
    let http_handle = tokio::spawn(async move {
        start_metrics_server(http_state, http_shutdown, args.bind_addr).await
    });

    let mut scheduler = Scheduler::new(engine, controller);
    scheduler.start(policies);
    daemon_state.ready.store(true, Ordering::SeqCst);

    signal::ctrl_c().await.context("failed to listen for ctrl_c")?;
    info!("shutdown_signal_received");
    println!("\nShutdown signal received. Stopping daemon...");

    scheduler.stop().await;
    let _ = shutdown_tx.send(());
    let _ = http_handle.await?;

    info!("policy_daemon_stopped");
    println!("Daemon stopped.");

    Ok(())
}

async fn start_metrics_server(
    state: Arc<DaemonState>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind metrics server")?;

    info!(addr = %addr, "metrics_server_started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}

fn build_router(state: Arc<DaemonState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get({
            let state = state.clone();
            move || readyz_handler(state.clone())
        }))
        .route("/metrics", get(metrics_handler))
}

async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readyz_handler(state: Arc<DaemonState>) -> impl IntoResponse {
    if state.ready.load(Ordering::SeqCst) {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_text() {
        Ok(body) => (StatusCode::OK, body),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "metrics encoding error".to_string(),
        ),
    }
}
