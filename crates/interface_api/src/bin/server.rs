//! Payment Ledger - API Server Binary
//!
//! # Usage
//!
//! ```bash
//! # In-memory ledger with default settings
//! API_JWT_SECRET=local-development-secret cargo run --bin ledger-api
//!
//! # PostgreSQL-backed ledger with VNPAY enabled
//! API_STORAGE=postgres API_DATABASE__URL=postgres://... \
//! API_GATEWAY__TMN_CODE=... API_GATEWAY__HASH_SECRET=... \
//! API_GATEWAY__PAYMENT_URL=... API_GATEWAY__RETURN_URL=... \
//! cargo run --bin ledger-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret, at least 16 characters
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `API_LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! * `API_STORAGE` - `memory` or `postgres` (default: memory)
//! * `API_DATABASE__URL` - PostgreSQL connection string
//! * `API_LEDGER__GATEWAY_EXPIRY_MINUTES` - Age at which pending gateway payments expire
//! * `API_LEDGER__SWEEP_INTERVAL_SECS` - Expiry sweep interval, 0 disables it

use anyhow::Context;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_billing::{
    DocumentStore, InMemoryDocumentStore, InMemoryLedgerStore, LedgerStore, PaymentService,
    VnpayGateway,
};
use infra_db::{create_pool, PostgresDocumentStore, PostgresLedgerStore};
use interface_api::config::{ApiConfig, LogFormat, StorageBackend};
use interface_api::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config.log_level, config.log_format);
    config.validate().context("invalid configuration")?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        storage = ?config.storage,
        gateway = config.gateway.is_some(),
        "Starting payment ledger API server"
    );

    let service = build_service(&config).await?;
    let state = AppState::new(service, config.clone());

    let sweep = spawn_expiry_sweep(state.service.clone(), config.ledger.sweep_interval_secs);

    let app = create_router(state);
    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .context("invalid server address")?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweep) = sweep {
        sweep.abort();
    }
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging
fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
    }
}

/// Wires the storage backend and the optional payment gateway
async fn build_service(config: &ApiConfig) -> anyhow::Result<PaymentService> {
    let (ledger, documents): (Arc<dyn LedgerStore>, Arc<dyn DocumentStore>) = match config.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; ledger data is lost on restart");
            (
                Arc::new(InMemoryLedgerStore::new()),
                Arc::new(InMemoryDocumentStore::new()),
            )
        }
        StorageBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let pool = create_pool(config.database.clone())
                .await
                .context("failed to connect to database")?;
            tracing::info!("Database ready");
            (
                Arc::new(PostgresLedgerStore::new(pool.clone())),
                Arc::new(PostgresDocumentStore::new(pool)),
            )
        }
    };

    let mut service = PaymentService::new(ledger, documents, config.ledger_config()?);
    if let Some(gateway_config) = &config.gateway {
        let gateway = VnpayGateway::new(gateway_config.clone());
        let verifier = Arc::new(gateway.verifier());
        service = service.with_gateway(Arc::new(gateway), verifier);
    } else {
        tracing::warn!("No payment gateway configured; gateway checkout is disabled");
    }
    Ok(service)
}

/// Runs the gateway expiry sweep on a fixed interval
fn spawn_expiry_sweep(
    service: Arc<PaymentService>,
    interval_secs: u64,
) -> Option<tokio::task::JoinHandle<()>> {
    if interval_secs == 0 {
        tracing::info!("Expiry sweep disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = service.expire_stale_gateway_transactions(Utc::now()).await {
                tracing::error!(error = %e, "Expiry sweep failed");
            }
        }
    }))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
