//! Payment service
//!
//! The application layer over the ledger. Every mutating call returns the
//! authoritative document status recomputed right after the write, so
//! callers never need to derive it themselves.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use core_kernel::{
    Currency, DealerId, DocumentId, HealthCheckResult, Money, PaymentMethodId, PortError,
    TransactionId,
};

use crate::aggregation::{AgingReport, DebtAggregator, DebtSummaryRow, OwnerPortfolio, Page, PageRequest};
use crate::derivation::{derive, DerivedStatus, PaymentStatus};
use crate::document::{BillableDocument, Channel, DocumentKind, OwnerKind, OwnerRef};
use crate::error::BillingError;
use crate::gateway::{
    CallbackRejection, CallbackVerifier, CheckoutRequest, GatewayCallback, PaymentGateway,
    ReconciliationOutcome,
};
use crate::identity::Actor;
use crate::ledger::{LedgerWrite, RecordPayment, RetryPolicy, TransactionLedger};
use crate::method::{MethodUpdate, PaymentMethod, PaymentMethodRegistry, SettlementKind};
use crate::ports::{DocumentStore, LedgerStore};
use crate::transaction::{Transaction, TransactionState, Transition};
use crate::workflow::{ConfirmationWorkflow, WorkflowEvent};

/// Ledger-wide settings
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub currency: Currency,
    pub retry: RetryPolicy,
    /// Age after which a PENDING_GATEWAY transaction is expired by the sweep
    pub gateway_expiry: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            currency: Currency::VND,
            retry: RetryPolicy::default(),
            gateway_expiry: Duration::minutes(30),
        }
    }
}

/// Payment status of one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentStatus {
    pub document_id: DocumentId,
    pub document_kind: DocumentKind,
    pub owner: OwnerRef,
    pub status: PaymentStatus,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub pending_amount: Money,
    pub remaining_amount: Money,
}

impl DocumentStatus {
    fn new(document: &BillableDocument, derived: DerivedStatus) -> Self {
        Self {
            document_id: document.id(),
            document_kind: document.kind(),
            owner: document.owner(),
            status: derived.status,
            total_amount: derived.total_amount,
            paid_amount: derived.paid_amount,
            pending_amount: derived.pending_amount,
            remaining_amount: derived.remaining_amount,
        }
    }
}

/// Result of every mutating call
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub transaction: Transaction,
    pub document_status: DocumentStatus,
}

/// Result of starting a gateway checkout
#[derive(Debug, Clone, Serialize)]
pub struct GatewayCheckout {
    pub redirect_url: String,
    pub transaction: Transaction,
    pub document_status: DocumentStatus,
}

/// Input to [`PaymentService::record_payment`]
#[derive(Debug, Clone)]
pub struct RecordPaymentCommand {
    pub document_id: DocumentId,
    pub amount: Money,
    pub method_id: PaymentMethodId,
    pub allow_overpayment: bool,
    pub notes: Option<String>,
}

/// Input to [`PaymentService::start_gateway_checkout`]
#[derive(Debug, Clone)]
pub struct CheckoutCommand {
    pub document_id: DocumentId,
    pub amount: Money,
    pub method_id: PaymentMethodId,
    pub return_url: Option<String>,
    pub client_ip: String,
}

/// Facade over the ledger, workflow, registry and aggregator
pub struct PaymentService {
    ledger: TransactionLedger,
    documents: Arc<dyn DocumentStore>,
    methods: RwLock<PaymentMethodRegistry>,
    workflow: ConfirmationWorkflow,
    aggregator: DebtAggregator,
    gateway: Option<Arc<dyn PaymentGateway>>,
    verifier: Option<Arc<dyn CallbackVerifier>>,
    config: LedgerConfig,
}

impl PaymentService {
    /// Creates a service with the standard payment methods and no gateway
    pub fn new(
        ledger_store: Arc<dyn LedgerStore>,
        documents: Arc<dyn DocumentStore>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            ledger: TransactionLedger::new(ledger_store, config.retry),
            documents,
            methods: RwLock::new(PaymentMethodRegistry::with_standard_methods()),
            workflow: ConfirmationWorkflow::new(),
            aggregator: DebtAggregator::new(config.currency),
            gateway: None,
            verifier: None,
            config,
        }
    }

    pub fn with_methods(mut self, registry: PaymentMethodRegistry) -> Self {
        self.methods = RwLock::new(registry);
        self
    }

    pub fn with_gateway(
        mut self,
        gateway: Arc<dyn PaymentGateway>,
        verifier: Arc<dyn CallbackVerifier>,
    ) -> Self {
        self.gateway = Some(gateway);
        self.verifier = Some(verifier);
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ---------------------------------------------------------------
    // Documents
    // ---------------------------------------------------------------

    /// Stores a document snapshot pushed by the order or invoice subsystem
    ///
    /// Re-pushing a known id may refresh its details. A changed kind, owner
    /// or total is refused with `Validation`.
    pub async fn register_document(&self, document: BillableDocument) -> Result<DocumentStatus, BillingError> {
        let total = document.total_amount();
        if !total.is_positive() {
            return Err(BillingError::validation(format!(
                "document total must be positive, got {}",
                total
            )));
        }
        if total.currency() != self.config.currency {
            return Err(BillingError::validation(format!(
                "document currency {} does not match ledger currency {}",
                total.currency(),
                self.config.currency
            )));
        }

        self.documents.save_document(&document).await?;
        tracing::info!(
            document_id = %document.id(),
            kind = %document.kind(),
            owner = %document.owner(),
            total = %total,
            "Document registered"
        );
        self.get_document_status(document.id()).await
    }

    pub async fn get_document_status(&self, document_id: DocumentId) -> Result<DocumentStatus, BillingError> {
        let document = self.load_document(document_id).await?;
        let transactions = self.ledger.list_by_document(document_id).await?;
        self.status_of(&document, &transactions)
    }

    /// Transactions of a document in creation order
    pub async fn list_transactions(&self, document_id: DocumentId) -> Result<Vec<Transaction>, BillingError> {
        self.load_document(document_id).await?;
        self.ledger.list_by_document(document_id).await
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, BillingError> {
        self.ledger.find(id).await
    }

    // ---------------------------------------------------------------
    // Payments
    // ---------------------------------------------------------------

    /// Records a payment against a document
    pub async fn record_payment(
        &self,
        actor: Actor,
        command: RecordPaymentCommand,
    ) -> Result<PaymentOutcome, BillingError> {
        let document = self.load_document(command.document_id).await?;
        let method = self
            .methods
            .read()
            .await
            .resolve_for(command.method_id, document.channel())?;

        let write = self
            .ledger
            .record(RecordPayment {
                document: document.clone(),
                amount: command.amount,
                method,
                requested_by: actor,
                allow_overpayment: command.allow_overpayment,
                notes: command.notes,
            })
            .await?;

        self.outcome(&document, write)
    }

    /// Approves a manual payment
    pub async fn confirm_transaction(
        &self,
        approver: Actor,
        id: TransactionId,
    ) -> Result<PaymentOutcome, BillingError> {
        self.resolve_manual(id, WorkflowEvent::Approve { approver }).await
    }

    /// Rejects a manual payment
    pub async fn reject_transaction(
        &self,
        approver: Actor,
        id: TransactionId,
        reason: Option<String>,
    ) -> Result<PaymentOutcome, BillingError> {
        self.resolve_manual(id, WorkflowEvent::Reject { approver, reason }).await
    }

    async fn resolve_manual(&self, id: TransactionId, event: WorkflowEvent) -> Result<PaymentOutcome, BillingError> {
        let write = self
            .ledger
            .transition_with(id, |tx| self.workflow.decide(tx, &event))
            .await
            .inspect_err(|e| {
                tracing::warn!(transaction_id = %id, error = %e, "Manual resolution refused");
            })?;

        let document = self.load_document(write.transaction.document_id).await?;
        self.outcome(&document, write)
    }

    // ---------------------------------------------------------------
    // Gateway
    // ---------------------------------------------------------------

    /// Records a gateway payment and builds the provider redirect URL
    pub async fn start_gateway_checkout(
        &self,
        actor: Actor,
        command: CheckoutCommand,
    ) -> Result<GatewayCheckout, BillingError> {
        let gateway = self
            .gateway
            .clone()
            .ok_or_else(|| BillingError::validation("no payment gateway is configured"))?;

        let settlement = self.methods.read().await.get(command.method_id)?.settlement_kind;
        if settlement != SettlementKind::Gateway {
            return Err(BillingError::validation(format!(
                "method {} is not a gateway method",
                command.method_id
            )));
        }

        let outcome = self
            .record_payment(
                actor,
                RecordPaymentCommand {
                    document_id: command.document_id,
                    amount: command.amount,
                    method_id: command.method_id,
                    allow_overpayment: false,
                    notes: None,
                },
            )
            .await?;

        let initiated = gateway.initiate(&CheckoutRequest {
            transaction_id: outcome.transaction.id,
            document_id: command.document_id,
            amount: command.amount,
            return_url: command.return_url,
            client_ip: command.client_ip,
            created_at: outcome.transaction.created_at,
        });
        let redirect_url = match initiated {
            Ok(url) => url,
            Err(e) => {
                // Release the reserved headroom; the provider never saw this transaction
                tracing::warn!(
                    transaction_id = %outcome.transaction.id,
                    document_id = %command.document_id,
                    error = %e,
                    "Gateway checkout failed"
                );
                self.ledger
                    .transition(outcome.transaction.id, Transition::fail("checkout failed"))
                    .await?;
                return Err(e);
            }
        };

        tracing::info!(
            transaction_id = %outcome.transaction.id,
            document_id = %command.document_id,
            gateway = gateway.name(),
            "Gateway checkout started"
        );

        Ok(GatewayCheckout {
            redirect_url,
            transaction: outcome.transaction,
            document_status: outcome.document_status,
        })
    }

    /// Handles the provider's IPN callback
    ///
    /// Never fails: every problem becomes a `Rejected` outcome, whose
    /// acknowledgement is what the provider gets back. Nothing is credited
    /// unless the signature, fields and amount all check out.
    pub async fn handle_gateway_callback(&self, params: &BTreeMap<String, String>) -> ReconciliationOutcome {
        let outcome = self.reconcile(params).await;
        match &outcome {
            ReconciliationOutcome::Rejected(rejection) => {
                tracing::warn!(reason = %rejection, "Gateway callback rejected");
            }
            other => {
                tracing::info!(outcome = ?other, "Gateway callback handled");
            }
        }
        outcome
    }

    async fn reconcile(&self, params: &BTreeMap<String, String>) -> ReconciliationOutcome {
        let Some(verifier) = self.verifier.as_ref() else {
            return ReconciliationOutcome::Rejected(CallbackRejection::Unprocessable(
                "no payment gateway is configured".to_string(),
            ));
        };
        if let Err(rejection) = verifier.verify(params) {
            return ReconciliationOutcome::Rejected(rejection);
        }

        let callback = match GatewayCallback::parse(params) {
            Ok(callback) => callback,
            Err(rejection) => return ReconciliationOutcome::Rejected(rejection),
        };
        let transaction_id = callback.transaction_id;

        let transaction = match self.ledger.find(transaction_id).await {
            Ok(tx) if tx.settlement_kind == SettlementKind::Gateway => tx,
            Ok(_) | Err(BillingError::TransactionNotFound(_)) => {
                return ReconciliationOutcome::Rejected(CallbackRejection::UnknownTransaction(
                    transaction_id.to_string(),
                ))
            }
            Err(e) => return ReconciliationOutcome::Rejected(CallbackRejection::Unprocessable(e.to_string())),
        };
        if let Err(rejection) = callback.check_amount(&transaction.amount) {
            return ReconciliationOutcome::Rejected(rejection);
        }

        let event = WorkflowEvent::GatewayResult(callback.verdict());
        let result = self
            .ledger
            .transition_with(transaction_id, |tx| self.workflow.decide(tx, &event))
            .await;

        match result {
            Ok(write) if write.changed => match write.transaction.state {
                TransactionState::Success => ReconciliationOutcome::Settled { transaction_id },
                _ => ReconciliationOutcome::Failed { transaction_id },
            },
            Ok(write) if write.transaction.state.is_terminal() => {
                ReconciliationOutcome::AlreadyFinal { transaction_id }
            }
            Ok(_) => ReconciliationOutcome::Pending { transaction_id },
            Err(BillingError::InvalidTransactionState { from, to }) => {
                tracing::warn!(
                    transaction_id = %transaction_id,
                    from = %from,
                    to = %to,
                    "Callback contradicts final transaction state"
                );
                ReconciliationOutcome::AlreadyFinal { transaction_id }
            }
            Err(e) => ReconciliationOutcome::Rejected(CallbackRejection::Unprocessable(e.to_string())),
        }
    }

    /// Fails PENDING_GATEWAY transactions older than the configured expiry
    ///
    /// Returns the transactions that were expired. Transactions the provider
    /// resolved in the meantime are left alone.
    pub async fn expire_stale_gateway_transactions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, BillingError> {
        let cutoff = now - self.config.gateway_expiry;
        let stale = self.ledger.pending_gateway_before(cutoff).await?;
        let mut expired = Vec::new();

        for tx in stale {
            let result = self
                .ledger
                .transition_with(tx.id, |current| self.workflow.decide(current, &WorkflowEvent::Expire))
                .await;
            match result {
                Ok(write) if write.changed => expired.push(write.transaction),
                Ok(_) | Err(BillingError::InvalidTransactionState { .. }) => {}
                Err(e) => {
                    tracing::error!(transaction_id = %tx.id, error = %e, "Failed to expire transaction");
                }
            }
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), cutoff = %cutoff, "Expired stale gateway transactions");
        }
        Ok(expired)
    }

    // ---------------------------------------------------------------
    // Debt
    // ---------------------------------------------------------------

    pub async fn get_owner_debt_summary(&self, owner: OwnerRef) -> Result<DebtSummaryRow, BillingError> {
        let portfolio = self.portfolio(owner).await?;
        self.aggregator
            .summarize(&portfolio.owner, &portfolio.documents, &portfolio.transactions)
    }

    /// Debt rows of every owner of `kind`, largest balance first
    pub async fn summarize_all(
        &self,
        kind: OwnerKind,
        page: PageRequest,
    ) -> Result<Page<DebtSummaryRow>, BillingError> {
        let owners = self.documents.list_owners(kind).await?;
        let mut portfolios = Vec::with_capacity(owners.len());
        for owner in owners {
            portfolios.push(self.portfolio(owner).await?);
        }
        self.aggregator.summarize_all(&portfolios, page)
    }

    pub async fn dealer_aging(&self, dealer: DealerId, today: NaiveDate) -> Result<AgingReport, BillingError> {
        let portfolio = self.portfolio(OwnerRef::Dealer(dealer)).await?;
        self.aggregator
            .aging(dealer, &portfolio.documents, &portfolio.transactions, today)
    }

    async fn portfolio(&self, owner: OwnerRef) -> Result<OwnerPortfolio, BillingError> {
        let ids = self.documents.list_by_owner(&owner).await?;
        let mut documents = Vec::with_capacity(ids.len());
        let mut transactions = HashMap::with_capacity(ids.len());

        for id in ids {
            documents.push(self.load_document(id).await?);
            transactions.insert(id, self.ledger.list_by_document(id).await?);
        }

        Ok(OwnerPortfolio {
            owner,
            documents,
            transactions,
        })
    }

    // ---------------------------------------------------------------
    // Payment methods
    // ---------------------------------------------------------------

    pub async fn list_methods(&self, channel: Option<Channel>) -> Vec<PaymentMethod> {
        self.methods.read().await.list_for(channel)
    }

    pub async fn register_method(&self, actor: Actor, method: PaymentMethod) -> Result<PaymentMethod, BillingError> {
        ensure_can_manage_methods(&actor)?;
        let mut registry = self.methods.write().await;
        registry.register(method.clone())?;
        Ok(method)
    }

    /// Edits a method; existing transactions keep their recorded settlement kind
    pub async fn update_method(
        &self,
        actor: Actor,
        id: PaymentMethodId,
        update: MethodUpdate,
    ) -> Result<PaymentMethod, BillingError> {
        ensure_can_manage_methods(&actor)?;
        let updated = self.methods.write().await.update(id, update)?;
        tracing::info!(
            method_id = %id,
            active = updated.active,
            settlement_kind = %updated.settlement_kind,
            user_id = %actor.user_id,
            "Payment method updated"
        );
        Ok(updated)
    }

    // ---------------------------------------------------------------
    // Health
    // ---------------------------------------------------------------

    pub async fn health_check(&self) -> Vec<HealthCheckResult> {
        vec![
            self.ledger.store().health_check().await,
            self.documents.health_check().await,
        ]
    }

    // ---------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------

    async fn load_document(&self, id: DocumentId) -> Result<BillableDocument, BillingError> {
        self.documents.get_document(id).await.map_err(|e| match e {
            PortError::NotFound { .. } => BillingError::DocumentNotFound(id.to_string()),
            other => other.into(),
        })
    }

    fn status_of(
        &self,
        document: &BillableDocument,
        transactions: &[Transaction],
    ) -> Result<DocumentStatus, BillingError> {
        let derived = derive(document.total_amount(), transactions)?;
        Ok(DocumentStatus::new(document, derived))
    }

    fn outcome(&self, document: &BillableDocument, write: LedgerWrite) -> Result<PaymentOutcome, BillingError> {
        let document_status = self.status_of(document, &write.transactions)?;
        Ok(PaymentOutcome {
            transaction: write.transaction,
            document_status,
        })
    }
}

fn ensure_can_manage_methods(actor: &Actor) -> Result<(), BillingError> {
    if !actor.role.can_manage_methods() {
        return Err(BillingError::unauthorized(format!(
            "role {} cannot manage payment methods",
            actor.role
        )));
    }
    Ok(())
}
