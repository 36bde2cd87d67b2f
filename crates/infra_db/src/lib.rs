//! Infrastructure Database Layer
//!
//! PostgreSQL storage for the payment reconciliation ledger, using SQLx
//! runtime queries.
//!
//! # Tables
//!
//! - `billable_documents`: order and invoice snapshots
//! - `document_ledgers`: one version counter per document with transactions
//! - `payment_transactions`: every payment attempt, ordered by `seq`
//!
//! The schema lives in the workspace `migrations/` directory and is applied
//! by [`create_pool`] unless disabled in [`DatabaseConfig`].
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, PostgresDocumentStore, PostgresLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/ledger")).await?;
//! let ledger = PostgresLedgerStore::new(pool.clone());
//! let documents = PostgresDocumentStore::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
mod rows;

pub use adapters::{PostgresDocumentStore, PostgresLedgerStore};
pub use error::DatabaseError;
pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
