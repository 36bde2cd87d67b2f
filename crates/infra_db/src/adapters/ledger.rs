//! PostgreSQL Ledger Adapter
//!
//! Implements [`LedgerStore`] over the `document_ledgers` and
//! `payment_transactions` tables.
//!
//! # Versioning
//!
//! `document_ledgers.version` is bumped inside the same database transaction
//! as the write it guards, with a `WHERE version = $expected` predicate. A
//! writer that read a stale version matches no row and gets
//! `PortError::Conflict`; the domain ledger then reloads and retries.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, PostgresLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::new(url)).await?;
//! let store: Arc<dyn LedgerStore> = Arc::new(PostgresLedgerStore::new(pool));
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use core_kernel::{
    DocumentId, DomainPort, HealthCheckResult, HealthCheckable, PortError, TransactionId,
};
use domain_billing::{DocumentLedger, LedgerStore, Transaction};

use crate::adapters::ping;
use crate::error::DatabaseError;
use crate::rows::{transaction_from_row, TRANSACTION_COLUMNS};

/// PostgreSQL-backed [`LedgerStore`]
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_ledger(&self, document_id: DocumentId) -> Result<DocumentLedger, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM document_ledgers WHERE document_id = $1")
                .bind(document_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM payment_transactions WHERE document_id = $1 ORDER BY seq",
            TRANSACTION_COLUMNS
        ))
        .bind(document_id.as_uuid())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let transactions = rows
            .iter()
            .map(transaction_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DocumentLedger {
            document_id,
            version: version.map_or(0, |v| v as u64),
            transactions,
        })
    }

    async fn write(
        &self,
        expected_version: u64,
        transaction: &Transaction,
        is_new: bool,
    ) -> Result<u64, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let version = bump_version(&mut tx, transaction.document_id, expected_version).await?;

        if is_new {
            insert_transaction(&mut tx, transaction).await?;
        } else {
            let affected = update_transaction(&mut tx, transaction).await?;
            if affected == 0 {
                return Err(DatabaseError::not_found("Transaction", transaction.id));
            }
        }

        tx.commit().await?;
        Ok(version)
    }
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-ledger-store").await
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self), fields(document_id = %document_id))]
    async fn load(&self, document_id: DocumentId) -> Result<DocumentLedger, PortError> {
        let ledger = self.load_ledger(document_id).await?;
        debug!(
            version = ledger.version,
            count = ledger.transactions.len(),
            "Loaded document ledger"
        );
        Ok(ledger)
    }

    #[instrument(skip(self), fields(transaction_id = %id))]
    async fn find_transaction(&self, id: TransactionId) -> Result<Transaction, PortError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_transactions WHERE transaction_id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| DatabaseError::not_found("Transaction", id))?;

        Ok(transaction_from_row(&row)?)
    }

    #[instrument(
        skip(self, transaction),
        fields(transaction_id = %transaction.id, document_id = %transaction.document_id)
    )]
    async fn append(&self, expected_version: u64, transaction: &Transaction) -> Result<u64, PortError> {
        let version = self.write(expected_version, transaction, true).await?;
        debug!(version, "Appended transaction");
        Ok(version)
    }

    #[instrument(
        skip(self, transaction),
        fields(transaction_id = %transaction.id, state = %transaction.state)
    )]
    async fn update(&self, expected_version: u64, transaction: &Transaction) -> Result<u64, PortError> {
        let version = self.write(expected_version, transaction, false).await?;
        debug!(version, "Updated transaction");
        Ok(version)
    }

    #[instrument(skip(self))]
    async fn list_pending_gateway(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>, PortError> {
        // Bare PENDING is a legacy label for the settlement kind's initial state
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payment_transactions \
             WHERE settlement_kind = 'GATEWAY' \
               AND status IN ('PENDING_GATEWAY', 'PENDING') \
               AND created_at < $1 \
             ORDER BY created_at",
            TRANSACTION_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        let transactions = rows
            .iter()
            .map(transaction_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transactions)
    }
}

type PgTransaction<'a> = sqlx::Transaction<'a, Postgres>;

/// Moves the document's version from `expected` to `expected + 1`
async fn bump_version(
    tx: &mut PgTransaction<'_>,
    document_id: DocumentId,
    expected: u64,
) -> Result<u64, DatabaseError> {
    let expected = i64::try_from(expected)
        .map_err(|_| DatabaseError::Conflict(format!("version {} out of range", expected)))?;

    let bumped: Option<i64> = if expected == 0 {
        sqlx::query_scalar(
            "INSERT INTO document_ledgers (document_id, version) VALUES ($1, 1) \
             ON CONFLICT (document_id) DO NOTHING \
             RETURNING version",
        )
        .bind(document_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?
    } else {
        sqlx::query_scalar(
            "UPDATE document_ledgers SET version = version + 1, updated_at = NOW() \
             WHERE document_id = $1 AND version = $2 \
             RETURNING version",
        )
        .bind(document_id.as_uuid())
        .bind(expected)
        .fetch_optional(&mut **tx)
        .await?
    };

    match bumped {
        Some(version) => Ok(version as u64),
        None => {
            warn!(document_id = %document_id, expected, "Stale ledger version");
            Err(DatabaseError::Conflict(format!(
                "document {} is no longer at version {}",
                document_id, expected
            )))
        }
    }
}

async fn insert_transaction(tx: &mut PgTransaction<'_>, t: &Transaction) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO payment_transactions (
            transaction_id, document_id, document_kind, amount, currency, method_id,
            settlement_kind, status, requested_by, requested_role, created_at, updated_at,
            confirmed_at, confirmed_by, rejected_by, failure_reason, gateway_ref, notes
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
    )
    .bind(t.id.as_uuid())
    .bind(t.document_id.as_uuid())
    .bind(t.document_kind.as_str())
    .bind(t.amount.amount())
    .bind(t.amount.currency().code())
    .bind(t.method_id.as_uuid())
    .bind(t.settlement_kind.as_str())
    .bind(t.state.as_str())
    .bind(t.requested_by.user_id.as_uuid())
    .bind(t.requested_by.role.as_str())
    .bind(t.created_at)
    .bind(t.updated_at)
    .bind(t.confirmed_at)
    .bind(t.confirmed_by.map(Uuid::from))
    .bind(t.rejected_by.map(Uuid::from))
    .bind(t.failure_reason.as_deref())
    .bind(t.gateway_ref.as_deref())
    .bind(t.notes.as_deref())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Writes the mutable columns; amount, method and requester never change
async fn update_transaction(tx: &mut PgTransaction<'_>, t: &Transaction) -> Result<u64, DatabaseError> {
    let result = sqlx::query(
        "UPDATE payment_transactions SET
            status = $3, updated_at = $4, confirmed_at = $5, confirmed_by = $6,
            rejected_by = $7, failure_reason = $8, gateway_ref = $9, notes = $10
         WHERE transaction_id = $1 AND document_id = $2",
    )
    .bind(t.id.as_uuid())
    .bind(t.document_id.as_uuid())
    .bind(t.state.as_str())
    .bind(t.updated_at)
    .bind(t.confirmed_at)
    .bind(t.confirmed_by.map(Uuid::from))
    .bind(t.rejected_by.map(Uuid::from))
    .bind(t.failure_reason.as_deref())
    .bind(t.gateway_ref.as_deref())
    .bind(t.notes.as_deref())
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}
