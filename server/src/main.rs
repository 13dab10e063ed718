use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ringchat_server::applier::Applier;
use ringchat_server::config::NodeConfig;
use ringchat_server::node::Node;
use ringchat_server::{election, handlers, health, heartbeat, metrics, storage::Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            "info".to_string()
        }
        #[cfg(not(debug_assertions))]
        {
            "warn".to_string()
        }
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&log_level))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = NodeConfig::from_env()?;
    tracing::info!(server_id = config.server_id, bind_addr = %config.bind_addr, "starting node");

    let storage = Storage::open(&config.db_path).await?;
    tracing::info!(db_path = %config.db_path, "storage opened");

    let request_ids = storage.load_request_ids().await?;
    tracing::info!(count = request_ids.len(), "reloaded request ids from commit log");

    let applier = Applier::new(storage, request_ids);
    let bind_addr = config.bind_addr.clone();
    let enable_metrics = config.enable_metrics;
    let node = Node::new(config, applier);

    tracing::info!("running initial commit synchronization");
    election::synchronize_commits(&node).await;

    let heartbeat_handle = heartbeat::spawn(node.clone());
    tracing::info!("heartbeat monitor started");

    let mut app = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/rpc/execute", post(handlers::execute::execute))
        .route("/rpc/heartbeat", post(handlers::peer::heartbeat))
        .route("/rpc/election", post(handlers::peer::election_rpc))
        .route("/rpc/coordinator", post(handlers::peer::coordinator))
        .route("/rpc/commits", get(handlers::peer::get_commits))
        .route("/stats", get(handlers::stats::stats))
        .layer(TraceLayer::new_for_http())
        .with_state(node.clone());

    if enable_metrics {
        let recorder = metrics::MetricsRecorder::new();
        let handle = recorder.handle().clone();
        let metrics_router = Router::new()
            .route("/metrics", get(metrics::metrics_handler))
            .with_state((node.clone(), handle));
        app = app.merge(metrics_router);
        tracing::info!("metrics endpoint enabled at /metrics");
    }

    let addr: SocketAddr = bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    node.shutdown.store(true, Ordering::SeqCst);
    if let Err(e) = heartbeat_handle.await {
        tracing::warn!(error = %e, "heartbeat task did not join cleanly");
    }
    tracing::info!("node stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
