//! PostgreSQL implementations of the domain_billing storage ports
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::{PostgresDocumentStore, PostgresLedgerStore};
//!
//! let ledger = Arc::new(PostgresLedgerStore::new(pool.clone()));
//! let documents = Arc::new(PostgresDocumentStore::new(pool));
//! let service = PaymentService::new(ledger, documents, LedgerConfig::default());
//! ```

pub mod document;
pub mod ledger;

pub use document::PostgresDocumentStore;
pub use ledger::PostgresLedgerStore;

use chrono::Utc;
use sqlx::PgPool;

use core_kernel::{AdapterHealth, HealthCheckResult};

/// Runs `SELECT 1` and reports the round-trip latency
pub(crate) async fn ping(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();
    let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let (status, message) = match result {
        Ok(_) => (AdapterHealth::Healthy, None),
        Err(e) => (AdapterHealth::Unhealthy, Some(format!("Database error: {}", e))),
    };

    HealthCheckResult {
        adapter_id: adapter_id.to_string(),
        status,
        latency_ms,
        message,
        checked_at: Utc::now(),
    }
}
