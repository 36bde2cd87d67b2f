//! In-memory stores
//!
//! Everything sits behind a single `tokio::sync::RwLock` per store, so each
//! version check and write happens under one write guard.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use core_kernel::{
    DocumentId, DomainPort, HealthCheckResult, HealthCheckable, PortError, TransactionId,
};

use crate::document::{BillableDocument, OwnerKind, OwnerRef};
use crate::method::SettlementKind;
use crate::ports::{DocumentLedger, DocumentStore, LedgerStore};
use crate::transaction::{Transaction, TransactionState};

#[derive(Debug, Default)]
struct LedgerTables {
    ledgers: HashMap<DocumentId, DocumentLedger>,
    index: HashMap<TransactionId, DocumentId>,
}

impl LedgerTables {
    fn check_version(&self, document_id: DocumentId, expected: u64) -> Result<(), PortError> {
        let current = self.ledgers.get(&document_id).map_or(0, |l| l.version);
        if current != expected {
            return Err(PortError::conflict(format!(
                "document {} is at version {}, expected {}",
                document_id, current, expected
            )));
        }
        Ok(())
    }
}

/// In-memory [`LedgerStore`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    tables: Arc<RwLock<LedgerTables>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DomainPort for InMemoryLedgerStore {}

#[async_trait]
impl HealthCheckable for InMemoryLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("memory-ledger-store")
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn load(&self, document_id: DocumentId) -> Result<DocumentLedger, PortError> {
        let tables = self.tables.read().await;
        Ok(tables
            .ledgers
            .get(&document_id)
            .cloned()
            .unwrap_or_else(|| DocumentLedger::empty(document_id)))
    }

    async fn find_transaction(&self, id: TransactionId) -> Result<Transaction, PortError> {
        let tables = self.tables.read().await;
        tables
            .index
            .get(&id)
            .and_then(|doc| tables.ledgers.get(doc))
            .and_then(|ledger| ledger.transactions.iter().find(|tx| tx.id == id))
            .cloned()
            .ok_or_else(|| PortError::not_found("Transaction", id))
    }

    async fn append(&self, expected_version: u64, transaction: &Transaction) -> Result<u64, PortError> {
        let mut tables = self.tables.write().await;
        tables.check_version(transaction.document_id, expected_version)?;
        if tables.index.contains_key(&transaction.id) {
            return Err(PortError::conflict(format!(
                "transaction {} already exists",
                transaction.id
            )));
        }

        let ledger = tables
            .ledgers
            .entry(transaction.document_id)
            .or_insert_with(|| DocumentLedger::empty(transaction.document_id));
        ledger.transactions.push(transaction.clone());
        ledger.version += 1;
        let version = ledger.version;

        tables.index.insert(transaction.id, transaction.document_id);
        Ok(version)
    }

    async fn update(&self, expected_version: u64, transaction: &Transaction) -> Result<u64, PortError> {
        let mut tables = self.tables.write().await;
        tables.check_version(transaction.document_id, expected_version)?;

        let ledger = tables
            .ledgers
            .get_mut(&transaction.document_id)
            .ok_or_else(|| PortError::not_found("Transaction", transaction.id))?;
        let slot = ledger
            .transactions
            .iter_mut()
            .find(|tx| tx.id == transaction.id)
            .ok_or_else(|| PortError::not_found("Transaction", transaction.id))?;

        *slot = transaction.clone();
        ledger.version += 1;
        Ok(ledger.version)
    }

    async fn list_pending_gateway(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>, PortError> {
        let tables = self.tables.read().await;
        let mut stale: Vec<Transaction> = tables
            .ledgers
            .values()
            .flat_map(|ledger| ledger.transactions.iter())
            .filter(|tx| {
                tx.settlement_kind == SettlementKind::Gateway
                    && tx.state == TransactionState::PendingGateway
                    && tx.created_at < cutoff
            })
            .cloned()
            .collect();
        stale.sort_by_key(|tx| tx.created_at);
        Ok(stale)
    }
}

#[derive(Debug, Default)]
struct DocumentTables {
    documents: HashMap<DocumentId, BillableDocument>,
    by_owner: HashMap<OwnerRef, BTreeSet<DocumentId>>,
}

/// In-memory [`DocumentStore`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    tables: Arc<RwLock<DocumentTables>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates the store
    pub async fn with_documents(documents: Vec<BillableDocument>) -> Result<Self, PortError> {
        let store = Self::new();
        for document in &documents {
            store.save_document(document).await?;
        }
        Ok(store)
    }
}

impl DomainPort for InMemoryDocumentStore {}

#[async_trait]
impl HealthCheckable for InMemoryDocumentStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("memory-document-store")
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_document(&self, id: DocumentId) -> Result<BillableDocument, PortError> {
        self.tables
            .read()
            .await
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Document", id))
    }

    async fn list_by_owner(&self, owner: &OwnerRef) -> Result<Vec<DocumentId>, PortError> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_owner
            .get(owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn list_owners(&self, kind: OwnerKind) -> Result<Vec<OwnerRef>, PortError> {
        let tables = self.tables.read().await;
        let mut owners: Vec<OwnerRef> = tables
            .by_owner
            .iter()
            .filter(|(owner, ids)| owner.kind() == kind && !ids.is_empty())
            .map(|(owner, _)| *owner)
            .collect();
        owners.sort();
        Ok(owners)
    }

    async fn save_document(&self, document: &BillableDocument) -> Result<(), PortError> {
        let mut tables = self.tables.write().await;
        let id = document.id();

        if let Some(previous) = tables.documents.get(&id) {
            check_resync(previous, document)?;
        }

        tables.by_owner.entry(document.owner()).or_default().insert(id);
        tables.documents.insert(id, document.clone());
        Ok(())
    }
}

/// A re-sync may refresh a document's details but never its kind, owner or total
fn check_resync(previous: &BillableDocument, incoming: &BillableDocument) -> Result<(), PortError> {
    let id = previous.id();
    if previous.kind() != incoming.kind() {
        return Err(PortError::validation(format!(
            "document {} is a {} and cannot become a {}",
            id,
            previous.kind(),
            incoming.kind()
        )));
    }
    if previous.owner() != incoming.owner() {
        return Err(PortError::validation(format!(
            "document {} belongs to {} and cannot move to {}",
            id,
            previous.owner(),
            incoming.owner()
        )));
    }
    if previous.total_amount() != incoming.total_amount() {
        return Err(PortError::validation(format!(
            "document {} has a fixed total of {}, got {}",
            id,
            previous.total_amount(),
            incoming.total_amount()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::CustomerOrder;
    use crate::test_support::{order, tx_in_state, vnd};
    use core_kernel::CustomerId;

    #[tokio::test]
    async fn test_append_checks_version() {
        let store = InMemoryLedgerStore::new();
        let tx = tx_in_state(vnd(1_000), TransactionState::PendingConfirmation);

        assert_eq!(store.append(0, &tx).await.unwrap(), 1);

        let mut second = tx_in_state(vnd(2_000), TransactionState::PendingConfirmation);
        second.document_id = tx.document_id;
        let stale = store.append(0, &second).await;
        assert!(matches!(stale, Err(PortError::Conflict { .. })));

        let ledger = store.load(tx.document_id).await.unwrap();
        assert_eq!(ledger.version, 1);
        assert_eq!(ledger.transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_update_replaces_transaction() {
        let store = InMemoryLedgerStore::new();
        let mut tx = tx_in_state(vnd(1_000), TransactionState::PendingConfirmation);
        let v1 = store.append(0, &tx).await.unwrap();

        tx.state = TransactionState::Success;
        let v2 = store.update(v1, &tx).await.unwrap();
        assert_eq!(v2, 2);

        let found = store.find_transaction(tx.id).await.unwrap();
        assert_eq!(found.state, TransactionState::Success);
    }

    #[tokio::test]
    async fn test_unknown_document_loads_empty() {
        let store = InMemoryLedgerStore::new();
        let ledger = store.load(DocumentId::new()).await.unwrap();
        assert_eq!(ledger.version, 0);
        assert!(ledger.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_pending_gateway_listing_respects_cutoff() {
        let store = InMemoryLedgerStore::new();
        let mut old = tx_in_state(vnd(1_000), TransactionState::PendingGateway);
        old.created_at = Utc::now() - chrono::Duration::hours(2);
        let fresh = tx_in_state(vnd(1_000), TransactionState::PendingGateway);
        store.append(0, &old).await.unwrap();
        store.append(0, &fresh).await.unwrap();

        let stale = store
            .list_pending_gateway(Utc::now() - chrono::Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old.id);
    }

    #[tokio::test]
    async fn test_document_owner_index() {
        let doc = order(500_000);
        let owner = doc.owner();
        let store = InMemoryDocumentStore::with_documents(vec![doc.clone()]).await.unwrap();

        assert_eq!(store.list_by_owner(&owner).await.unwrap(), vec![doc.id()]);
        assert_eq!(store.list_owners(OwnerKind::Customer).await.unwrap(), vec![owner]);
        assert!(store.list_owners(OwnerKind::Dealer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resync_keeps_total_and_owner() {
        let doc = order(500_000);
        let store = InMemoryDocumentStore::with_documents(vec![doc.clone()]).await.unwrap();

        store.save_document(&doc).await.unwrap();

        let BillableDocument::CustomerOrder(original) = doc.clone() else {
            panic!("expected an order");
        };
        let raised: BillableDocument = CustomerOrder {
            total_amount: vnd(2_000_000),
            ..original.clone()
        }
        .into();
        assert!(matches!(
            store.save_document(&raised).await,
            Err(PortError::Validation { .. })
        ));

        let moved: BillableDocument = CustomerOrder {
            customer_id: CustomerId::new(),
            ..original
        }
        .into();
        assert!(matches!(
            store.save_document(&moved).await,
            Err(PortError::Validation { .. })
        ));

        let stored = store.get_document(doc.id()).await.unwrap();
        assert_eq!(stored.total_amount(), vnd(500_000));
        assert_eq!(store.list_by_owner(&doc.owner()).await.unwrap(), vec![doc.id()]);
        assert!(store.list_by_owner(&moved.owner()).await.unwrap().is_empty());
    }
}
