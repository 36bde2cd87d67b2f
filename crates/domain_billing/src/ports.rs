//! Billing Domain Ports
//!
//! Storage seams for the ledger. The application service only ever talks to
//! these traits; adapters decide where the data lives.
//!
//! # Available Adapters
//!
//! - **In-memory**: [`crate::adapters::InMemoryLedgerStore`] and
//!   [`crate::adapters::InMemoryDocumentStore`], the default backend and the
//!   one used by tests
//! - **PostgreSQL**: `infra_db::PostgresLedgerStore` and
//!   `infra_db::PostgresDocumentStore`
//!
//! # Versioning
//!
//! Each document's transaction set carries a version number that starts at 0
//! and increases by one on every write. Writers pass the version they read;
//! a store that sees a different current version must refuse the write with
//! [`PortError::Conflict`]. This is what keeps two writers on different
//! processes from admitting payments that together overshoot the total.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{DocumentId, DomainPort, HealthCheckable, PortError, TransactionId};

use crate::document::{BillableDocument, OwnerKind, OwnerRef};
use crate::transaction::Transaction;

/// A document's transactions as of one version
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLedger {
    pub document_id: DocumentId,
    pub version: u64,
    /// In creation order
    pub transactions: Vec<Transaction>,
}

impl DocumentLedger {
    pub fn empty(document_id: DocumentId) -> Self {
        Self {
            document_id,
            version: 0,
            transactions: Vec::new(),
        }
    }
}

/// Persistence for transaction records
#[async_trait]
pub trait LedgerStore: DomainPort + HealthCheckable {
    /// Loads every transaction of a document; unknown documents load empty
    async fn load(&self, document_id: DocumentId) -> Result<DocumentLedger, PortError>;

    /// Finds a transaction by id
    async fn find_transaction(&self, id: TransactionId) -> Result<Transaction, PortError>;

    /// Appends a new transaction, returning the new version
    ///
    /// # Errors
    ///
    /// `Conflict` if the document's version is not `expected_version`
    async fn append(&self, expected_version: u64, transaction: &Transaction) -> Result<u64, PortError>;

    /// Replaces an existing transaction, returning the new version
    ///
    /// # Errors
    ///
    /// `Conflict` if the document's version is not `expected_version`,
    /// `NotFound` if the transaction does not exist
    async fn update(&self, expected_version: u64, transaction: &Transaction) -> Result<u64, PortError>;

    /// Gateway transactions still pending that were created before `cutoff`
    async fn list_pending_gateway(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>, PortError>;
}

/// Read access to billable documents owned by the order and invoice subsystems
#[async_trait]
pub trait DocumentStore: DomainPort + HealthCheckable {
    async fn get_document(&self, id: DocumentId) -> Result<BillableDocument, PortError>;

    /// Ids of all documents owed by `owner`
    async fn list_by_owner(&self, owner: &OwnerRef) -> Result<Vec<DocumentId>, PortError>;

    /// Every owner of the given kind with at least one document
    async fn list_owners(&self, kind: OwnerKind) -> Result<Vec<OwnerRef>, PortError>;

    /// Inserts or replaces a document snapshot pushed by its owning subsystem
    async fn save_document(&self, document: &BillableDocument) -> Result<(), PortError>;
}
