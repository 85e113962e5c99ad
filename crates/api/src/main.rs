//! API server entry point.

use api::config::{Config, StorageBackend};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{InMemoryBackend, KeyValueBackend, RedisBackend};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<B: KeyValueBackend + 'static>(
    backend: B,
    config: &Config,
    metrics_handle: PrometheusHandle,
) {
    let state = api::create_state(backend, config);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, index_set = %config.index_set, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Connect the storage backend and serve
    match config.storage {
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; orders are lost on shutdown");
            serve(InMemoryBackend::new(), &config, metrics_handle).await;
        }
        StorageBackend::Redis => {
            let backend = match RedisBackend::connect(&config.redis_url).await {
                Ok(backend) => backend,
                Err(err) => {
                    tracing::error!(error = %err, "redis is unreachable");
                    std::process::exit(1);
                }
            };
            serve(backend, &config, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
