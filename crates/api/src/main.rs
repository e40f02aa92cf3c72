use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use goldrush_api::config::{ServerConfig, StoreBackend};
use goldrush_api::router::build_app_router;
use goldrush_api::services::BackgroundServices;
use goldrush_api::state::AppState;
use goldrush_db::{DbPool, PgAccountStore, PgJobStore, PgLedger};
use goldrush_engine::recovery::recover;
use goldrush_engine::{Engine, EngineConfig, PlanService, Stores};
use goldrush_provider::{build_provider, ProviderConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "goldrush_api=debug,goldrush_engine=debug,goldrush_worker=debug,tower_http=debug".into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let engine_config = EngineConfig::from_env();
    let provider_config = ProviderConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        backend = ?config.store_backend,
        workers = engine_config.worker_count,
        queue_capacity = engine_config.queue_capacity,
        "Loaded server configuration",
    );

    // --- Stores ---
    let (stores, pool) = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory stores; all state is lost on restart");
            (Stores::in_memory(), None)
        }
        StoreBackend::Postgres => {
            let pool = connect_database(&config).await;
            let stores = Stores {
                accounts: Arc::new(PgAccountStore::new(pool.clone())),
                ledger: Arc::new(PgLedger::new(pool.clone())),
                jobs: Arc::new(PgJobStore::new(pool.clone())),
            };
            (stores, Some(pool))
        }
    };

    // --- Engine ---
    let plans = PlanService::load(engine_config.plans_path.as_deref())
        .expect("Failed to load subscription plans");
    let engine = Engine::new(stores, plans, &engine_config);

    if pool.is_some() {
        let report = recover(&engine.stores, &engine.dispatcher, &engine.events)
            .await
            .expect("Startup recovery failed");
        tracing::info!(
            requeued = report.requeued,
            failed = report.failed,
            left_queued = report.left_queued,
            "Startup recovery complete",
        );
    }

    // --- Background services ---
    let provider = build_provider(&provider_config);
    let services = BackgroundServices::start(&engine, provider, &engine_config);

    // --- App state ---
    let state = AppState {
        engine,
        pool,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, draining background services");
    services
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    tracing::info!("Graceful shutdown complete");
}

async fn connect_database(config: &ServerConfig) -> DbPool {
    let database_url = config
        .database_url
        .as_deref()
        .expect("DATABASE_URL must be set");

    let pool = goldrush_db::create_pool(database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    goldrush_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    goldrush_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    pool
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
