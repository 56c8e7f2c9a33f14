//! API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use auth::{AuthService, TokenService};
use cache::{CachedOrders, RedisOrderCache};
use domain::Order;
use limiter::RedisRateLimiter;
use pipeline::{
    Dispatcher, Fulfillment, FulfillmentError, Publisher, RedisStreamBroker, RetryPolicy,
    TaskExecutor,
};
use sqlx::postgres::PgPoolOptions;
use store::PostgresOrderStore;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use api::config::Config;
use api::routes::orders::AppState;

const WORKER_QUEUE_DEPTH: usize = 256;

/// Stand-in fulfillment hook; a real deployment would call the payment
/// provider here.
struct AutoApprove;

#[async_trait]
impl Fulfillment for AutoApprove {
    async fn fulfill(&self, _order: &Order) -> Result<(), FulfillmentError> {
        Ok(())
    }
}

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

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Durable store and migrations
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to Postgres");
    let store = Arc::new(PostgresOrderStore::new(pool));
    store.run_migrations().await.expect("migrations failed");

    // 4. Cache, rate limiter, broker
    let cache = RedisOrderCache::connect(&config.cache_url)
        .await
        .expect("failed to connect to cache Redis");
    let limiter = RedisRateLimiter::connect(&config.ratelimit_url)
        .await
        .expect("failed to connect to rate-limit Redis");
    let broker = Arc::new(
        RedisStreamBroker::connect(&config.broker_url)
            .await
            .expect("failed to connect to broker Redis"),
    );

    // 5. Services
    let tokens = TokenService::from_pem_files(
        &config.jwt_private_key_path,
        &config.jwt_public_key_path,
    )
    .expect("failed to load JWT keypair");
    let auth = Arc::new(AuthService::new(store.clone(), tokens));
    let orders = Arc::new(CachedOrders::new(store, Arc::new(cache)));
    let publisher = Arc::new(Publisher::new(broker.clone()));

    // 6. Background pipeline: dispatcher feeds the executor over a
    // bounded channel; acks happen after the handoff.
    let (event_tx, event_rx) = tokio::sync::mpsc::channel(WORKER_QUEUE_DEPTH);
    let dispatcher = Dispatcher::new(broker);
    let consumer = format!("worker-{}", std::process::id());
    tokio::spawn(async move { dispatcher.supervise(&consumer, event_tx).await });
    let executor = TaskExecutor::new(orders.clone(), Arc::new(AutoApprove), RetryPolicy::default());
    tokio::spawn(async move { executor.run(event_rx).await });

    // 7. Build and start the server
    let state = Arc::new(AppState {
        orders,
        auth,
        limiter: Arc::new(limiter),
        publisher,
    });
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");

    tracing::info!("server shut down gracefully");
}
