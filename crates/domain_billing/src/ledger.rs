//! Transaction ledger
//!
//! The ledger is the only writer of transaction records. All writes for one
//! document are serialized: in-process by a per-document mutex, and across
//! processes by the store's version check, with conflicts retried by
//! [`RetryPolicy`].
//!
//! # Invariants
//!
//! - A transaction is stored together with its initial state in one write
//! - Pending and settled transactions together never exceed the document
//!   total, unless the overpayment override was used
//! - A terminal transaction is never modified again

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use core_kernel::{DocumentId, Money, TransactionId};

use crate::derivation::admission_headroom;
use crate::document::BillableDocument;
use crate::error::BillingError;
use crate::identity::Actor;
use crate::method::{PaymentMethod, SettlementKind};
use crate::ports::LedgerStore;
use crate::transaction::{Transaction, Transition};
use crate::workflow::Decision;

/// Bounded exponential backoff for `ConcurrentModification`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 10,
        }
    }
}

impl RetryPolicy {
    /// Runs `operation`, retrying it while it fails with a version conflict
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T, BillingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BillingError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match attempt_fn().await {
                Err(BillingError::ConcurrentModification(reason)) if attempt < max_attempts => {
                    let delay_ms = self.base_delay_ms.saturating_mul(1u64 << (attempt - 1).min(16));
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms,
                        reason = %reason,
                        "Concurrent modification, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(BillingError::ConcurrentModification(reason)) => {
                    tracing::error!(operation, attempt, reason = %reason, "Retries exhausted");
                    return Err(BillingError::ConcurrentModification(reason));
                }
                other => return other,
            }
        }
    }
}

/// Input to [`TransactionLedger::record`]
#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub document: BillableDocument,
    pub amount: Money,
    pub method: PaymentMethod,
    pub requested_by: Actor,
    /// Admit the payment even if it exceeds the remaining headroom
    pub allow_overpayment: bool,
    pub notes: Option<String>,
}

/// Result of a ledger write
#[derive(Debug, Clone)]
pub struct LedgerWrite {
    pub transaction: Transaction,
    /// The document's transactions right after the write, in creation order
    pub transactions: Vec<Transaction>,
    /// False when the write was an idempotent no-op
    pub changed: bool,
}

/// Serialized writer of transaction records
pub struct TransactionLedger {
    store: Arc<dyn LedgerStore>,
    locks: Mutex<HashMap<DocumentId, Arc<Mutex<()>>>>,
    retry: RetryPolicy,
}

impl TransactionLedger {
    pub fn new(store: Arc<dyn LedgerStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            retry,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Records a new payment attempt in its method's initial state
    ///
    /// # Errors
    ///
    /// - `Validation` for a non-positive amount, a currency different from
    ///   the document's, or a method that cannot be used on the document
    /// - `Unauthorized` if the requester may not enter manual payments or
    ///   override the overpayment check
    /// - `OverpaymentRejected` if the amount exceeds the remaining headroom
    pub async fn record(&self, request: RecordPayment) -> Result<LedgerWrite, BillingError> {
        validate_record(&request)?;

        let document_id = request.document.id();
        let guard = self.lock_document(document_id).await;
        let result = self.retry.run("record", || self.try_record(&request)).await;
        drop(guard);
        self.release_document(document_id).await;

        result
    }

    /// Applies `transition` to a transaction
    ///
    /// Re-applying the terminal state the transaction already holds returns
    /// the current record unchanged.
    pub async fn transition(
        &self,
        id: TransactionId,
        transition: Transition,
    ) -> Result<LedgerWrite, BillingError> {
        self.transition_with(id, move |_| Ok(Decision::Transition(transition.clone())))
            .await
    }

    /// Decides and applies a transition on freshly loaded data
    ///
    /// `decide` runs under the document lock, against the transaction as
    /// currently stored, and again on every retry.
    pub async fn transition_with<F>(&self, id: TransactionId, decide: F) -> Result<LedgerWrite, BillingError>
    where
        F: Fn(&Transaction) -> Result<Decision, BillingError> + Send + Sync,
    {
        let document_id = self.find(id).await?.document_id;

        let guard = self.lock_document(document_id).await;
        let result = self
            .retry
            .run("transition", || self.try_transition(document_id, id, &decide))
            .await;
        drop(guard);
        self.release_document(document_id).await;

        result
    }

    /// Transactions of a document in creation order
    pub async fn list_by_document(&self, document_id: DocumentId) -> Result<Vec<Transaction>, BillingError> {
        Ok(self.store.load(document_id).await?.transactions)
    }

    pub async fn find(&self, id: TransactionId) -> Result<Transaction, BillingError> {
        self.store.find_transaction(id).await.map_err(|e| {
            if e.is_not_found() {
                BillingError::TransactionNotFound(id.to_string())
            } else {
                e.into()
            }
        })
    }

    /// Gateway transactions still pending that were created before `cutoff`
    pub async fn pending_gateway_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>, BillingError> {
        Ok(self.store.list_pending_gateway(cutoff).await?)
    }

    async fn try_record(&self, request: &RecordPayment) -> Result<LedgerWrite, BillingError> {
        let document = &request.document;
        let ledger = self.store.load(document.id()).await?;

        let headroom = admission_headroom(document.total_amount(), &ledger.transactions)?;
        if request.amount > headroom {
            if !request.allow_overpayment {
                tracing::info!(
                    document_id = %document.id(),
                    requested = %request.amount,
                    headroom = %headroom,
                    "Payment rejected as overpayment"
                );
                return Err(BillingError::OverpaymentRejected {
                    requested: request.amount,
                    remaining: headroom,
                });
            }
            tracing::warn!(
                document_id = %document.id(),
                requested = %request.amount,
                headroom = %headroom,
                user_id = %request.requested_by.user_id,
                "Overpayment admitted by override"
            );
        }

        let transaction = Transaction::new(
            document,
            request.amount,
            &request.method,
            request.requested_by,
            request.notes.clone(),
        );
        self.store.append(ledger.version, &transaction).await?;

        tracing::info!(
            transaction_id = %transaction.id,
            document_id = %document.id(),
            amount = %transaction.amount,
            method = %request.method.name,
            state = %transaction.state,
            "Payment recorded"
        );

        let mut transactions = ledger.transactions;
        transactions.push(transaction.clone());
        Ok(LedgerWrite {
            transaction,
            transactions,
            changed: true,
        })
    }

    async fn try_transition<F>(
        &self,
        document_id: DocumentId,
        id: TransactionId,
        decide: &F,
    ) -> Result<LedgerWrite, BillingError>
    where
        F: Fn(&Transaction) -> Result<Decision, BillingError> + Send + Sync,
    {
        let mut ledger = self.store.load(document_id).await?;
        let position = ledger
            .transactions
            .iter()
            .position(|tx| tx.id == id)
            .ok_or_else(|| BillingError::TransactionNotFound(id.to_string()))?;
        let current = &ledger.transactions[position];

        let transition = match decide(current)? {
            Decision::Transition(transition) => transition,
            Decision::NoChange | Decision::AlreadyFinal => {
                tracing::debug!(transaction_id = %id, state = %current.state, "No state change");
                return Ok(LedgerWrite {
                    transaction: current.clone(),
                    transactions: ledger.transactions,
                    changed: false,
                });
            }
        };

        let mut updated = current.clone();
        let from = updated.state;
        let changed = updated.apply(&transition, Utc::now())?;
        if changed {
            self.store.update(ledger.version, &updated).await?;
            tracing::info!(
                transaction_id = %id,
                document_id = %document_id,
                from = %from,
                to = %updated.state,
                "Transaction state changed"
            );
            ledger.transactions[position] = updated.clone();
        }

        Ok(LedgerWrite {
            transaction: updated,
            transactions: ledger.transactions,
            changed,
        })
    }

    async fn lock_document(&self, document_id: DocumentId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(document_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drops the document's lock entry once nobody holds or awaits it
    async fn release_document(&self, document_id: DocumentId) {
        let mut locks = self.locks.lock().await;
        if locks.get(&document_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&document_id);
        }
    }
}

fn validate_record(request: &RecordPayment) -> Result<(), BillingError> {
    let document = &request.document;

    if !request.amount.is_positive() {
        return Err(BillingError::validation(format!(
            "payment amount must be positive, got {}",
            request.amount
        )));
    }
    if request.amount.currency() != document.total_amount().currency() {
        return Err(BillingError::validation(format!(
            "payment currency {} does not match document currency {}",
            request.amount.currency(),
            document.total_amount().currency()
        )));
    }

    request.method.ensure_usable_for(document.channel())?;

    let role = request.requested_by.role;
    if request.method.settlement_kind == SettlementKind::Manual && !role.can_enter_manual_payments() {
        return Err(BillingError::unauthorized(format!(
            "role {} cannot enter manual payments",
            role
        )));
    }
    if request.allow_overpayment && !role.can_override_overpayment() {
        return Err(BillingError::unauthorized(format!(
            "role {} cannot override the overpayment check",
            role
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryLedgerStore;
    use crate::identity::Role;
    use crate::test_support::{order, staff, standard_method, vnd};
    use crate::transaction::TransactionState;
    use async_trait::async_trait;
    use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, PortError, UserId};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ledger() -> TransactionLedger {
        TransactionLedger::new(Arc::new(InMemoryLedgerStore::new()), RetryPolicy::default())
    }

    fn cash(document: &BillableDocument, amount: i64) -> RecordPayment {
        RecordPayment {
            document: document.clone(),
            amount: vnd(amount),
            method: standard_method(SettlementKind::Manual),
            requested_by: staff(),
            allow_overpayment: false,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_record_starts_in_method_state() {
        let ledger = ledger();
        let doc = order(30_000_000);

        let write = ledger.record(cash(&doc, 30_000_000)).await.unwrap();
        assert_eq!(write.transaction.state, TransactionState::PendingConfirmation);
        assert_eq!(write.transactions.len(), 1);

        let mut gateway = cash(&doc, 1);
        gateway.method = standard_method(SettlementKind::Gateway);
        gateway.allow_overpayment = true;
        gateway.requested_by = Actor::new(UserId::new(), Role::DealerManager);
        let write = ledger.record(gateway).await.unwrap();
        assert_eq!(write.transaction.state, TransactionState::PendingGateway);
    }

    #[tokio::test]
    async fn test_record_rejects_non_positive_amount() {
        let ledger = ledger();
        let doc = order(500_000);
        let result = ledger.record(cash(&doc, 0)).await;
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_pending_amount_reserves_headroom() {
        let ledger = ledger();
        let doc = order(500_000);

        ledger.record(cash(&doc, 400_000)).await.unwrap();
        let result = ledger.record(cash(&doc, 200_000)).await;

        match result {
            Err(BillingError::OverpaymentRejected { remaining, .. }) => {
                assert_eq!(remaining, vnd(100_000))
            }
            other => panic!("expected overpayment rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_equal_to_remaining_is_admitted() {
        let ledger = ledger();
        let doc = order(500_000);
        ledger.record(cash(&doc, 200_000)).await.unwrap();
        assert!(ledger.record(cash(&doc, 300_000)).await.is_ok());
    }

    #[tokio::test]
    async fn test_override_requires_manager() {
        let ledger = ledger();
        let doc = order(500_000);
        let mut request = cash(&doc, 600_000);
        request.allow_overpayment = true;

        let result = ledger.record(request.clone()).await;
        assert!(matches!(result, Err(BillingError::Unauthorized(_))));

        request.requested_by = Actor::new(UserId::new(), Role::DealerManager);
        assert!(ledger.record(request).await.is_ok());
    }

    #[tokio::test]
    async fn test_customer_cannot_enter_cash() {
        let ledger = ledger();
        let doc = order(500_000);
        let mut request = cash(&doc, 100_000);
        request.requested_by = Actor::new(UserId::new(), Role::Customer);
        assert!(matches!(ledger.record(request).await, Err(BillingError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_transition_is_idempotent_for_success() {
        let ledger = ledger();
        let doc = order(500_000);
        let tx = ledger.record(cash(&doc, 500_000)).await.unwrap().transaction;

        let first = ledger.transition(tx.id, Transition::succeed()).await.unwrap();
        assert!(first.changed);

        let second = ledger.transition(tx.id, Transition::succeed()).await.unwrap();
        assert!(!second.changed);
        assert_eq!(second.transaction, first.transaction);

        let stored = ledger.list_by_document(doc.id()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].state, TransactionState::Success);
    }

    #[tokio::test]
    async fn test_unknown_transaction() {
        let result = ledger().transition(TransactionId::new(), Transition::succeed()).await;
        assert!(matches!(result, Err(BillingError::TransactionNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_never_overshoot_total() {
        let ledger = Arc::new(ledger());
        let doc = order(500_000);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let ledger = Arc::clone(&ledger);
            let request = cash(&doc, 100_000);
            handles.push(tokio::spawn(async move { ledger.record(request).await }));
        }

        let mut admitted = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(BillingError::OverpaymentRejected { .. }) => rejected += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(admitted, 5);
        assert_eq!(rejected, 5);
        assert_eq!(ledger.list_by_document(doc.id()).await.unwrap().len(), 5);
    }

    /// Fails the first `conflicts` appends with a version conflict
    struct ConflictingStore {
        inner: InMemoryLedgerStore,
        conflicts: AtomicU32,
    }

    impl DomainPort for ConflictingStore {}

    #[async_trait]
    impl HealthCheckable for ConflictingStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("conflicting-store")
        }
    }

    #[async_trait]
    impl LedgerStore for ConflictingStore {
        async fn load(&self, document_id: DocumentId) -> Result<crate::ports::DocumentLedger, PortError> {
            self.inner.load(document_id).await
        }

        async fn find_transaction(&self, id: TransactionId) -> Result<Transaction, PortError> {
            self.inner.find_transaction(id).await
        }

        async fn append(&self, expected_version: u64, transaction: &Transaction) -> Result<u64, PortError> {
            let left = self.conflicts.load(Ordering::SeqCst);
            if left > 0 {
                self.conflicts.store(left - 1, Ordering::SeqCst);
                return Err(PortError::conflict("simulated concurrent writer"));
            }
            self.inner.append(expected_version, transaction).await
        }

        async fn update(&self, expected_version: u64, transaction: &Transaction) -> Result<u64, PortError> {
            self.inner.update(expected_version, transaction).await
        }

        async fn list_pending_gateway(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>, PortError> {
            self.inner.list_pending_gateway(cutoff).await
        }
    }

    #[tokio::test]
    async fn test_conflicts_are_retried_then_surfaced() {
        let retry = RetryPolicy { max_attempts: 3, base_delay_ms: 1 };
        let doc = order(500_000);

        let store = ConflictingStore { inner: InMemoryLedgerStore::new(), conflicts: AtomicU32::new(2) };
        let ledger = TransactionLedger::new(Arc::new(store), retry);
        assert!(ledger.record(cash(&doc, 100_000)).await.is_ok());

        let store = ConflictingStore { inner: InMemoryLedgerStore::new(), conflicts: AtomicU32::new(3) };
        let ledger = TransactionLedger::new(Arc::new(store), retry);
        let result = ledger.record(cash(&doc, 100_000)).await;
        assert!(matches!(result, Err(BillingError::ConcurrentModification(_))));
    }
}
