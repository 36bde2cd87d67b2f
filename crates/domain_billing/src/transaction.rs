//! Payment transactions and their state machine
//!
//! A transaction is created in one of two pending states depending on the
//! settlement kind of its method, and moves exactly once to a terminal
//! state. Re-applying the terminal state it already holds is a no-op, which
//! is what makes repeated gateway callbacks and double-clicked approvals safe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{DocumentId, Money, PaymentMethodId, TransactionId, UserId};

use crate::document::{BillableDocument, DocumentKind};
use crate::error::BillingError;
use crate::identity::Actor;
use crate::method::{PaymentMethod, SettlementKind};

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    /// Awaiting the gateway's asynchronous result
    PendingGateway,
    /// Awaiting approval by an authorized staff member
    PendingConfirmation,
    /// Settled; counts toward the paid amount
    Success,
    /// Rejected, declined, or expired; never counts
    Failed,
}

impl TransactionState {
    /// State a new transaction starts in
    pub fn initial_for(kind: SettlementKind) -> Self {
        match kind {
            SettlementKind::Gateway => TransactionState::PendingGateway,
            SettlementKind::Manual => TransactionState::PendingConfirmation,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Success | TransactionState::Failed)
    }

    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether the state machine allows moving from `self` to `target`
    pub fn can_transition_to(&self, target: TransactionState) -> bool {
        self.is_pending() && target.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::PendingGateway => "PENDING_GATEWAY",
            TransactionState::PendingConfirmation => "PENDING_CONFIRMATION",
            TransactionState::Success => "SUCCESS",
            TransactionState::Failed => "FAILED",
        }
    }

    /// Normalizes a legacy status label
    ///
    /// Older records use free-text labels. Success synonyms and failure
    /// synonyms collapse onto the two terminal states; a bare `PENDING`
    /// becomes the initial state of the transaction's settlement kind.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for labels with no known meaning
    pub fn from_label(label: &str, kind: SettlementKind) -> Result<Self, BillingError> {
        match label.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" | "CONFIRMED" | "COMPLETED" | "PAID" => Ok(TransactionState::Success),
            "FAILED" | "REJECTED" | "CANCELLED" | "CANCELED" => Ok(TransactionState::Failed),
            "PENDING" => Ok(TransactionState::initial_for(kind)),
            "PENDING_GATEWAY" => Ok(TransactionState::PendingGateway),
            "PENDING_CONFIRMATION" => Ok(TransactionState::PendingConfirmation),
            other => Err(BillingError::validation(format!(
                "unknown transaction status label: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionState {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING_GATEWAY" => Ok(TransactionState::PendingGateway),
            "PENDING_CONFIRMATION" => Ok(TransactionState::PendingConfirmation),
            "SUCCESS" => Ok(TransactionState::Success),
            "FAILED" => Ok(TransactionState::Failed),
            other => Err(BillingError::validation(format!(
                "unknown transaction state: {}",
                other
            ))),
        }
    }
}

/// A single payment attempt against one billable document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub document_id: DocumentId,
    pub document_kind: DocumentKind,
    pub amount: Money,
    pub method_id: PaymentMethodId,
    /// Settlement kind of the method when the transaction was recorded
    pub settlement_kind: SettlementKind,
    pub state: TransactionState,
    pub requested_by: Actor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set only when the transaction reaches SUCCESS
    pub confirmed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<UserId>,
    pub rejected_by: Option<UserId>,
    pub failure_reason: Option<String>,
    /// Provider-side reference from the gateway callback
    pub gateway_ref: Option<String>,
    pub notes: Option<String>,
}

impl Transaction {
    /// Creates a pending transaction for `document` paid with `method`
    pub fn new(
        document: &BillableDocument,
        amount: Money,
        method: &PaymentMethod,
        requested_by: Actor,
        notes: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new_v7(),
            document_id: document.id(),
            document_kind: document.kind(),
            amount,
            method_id: method.id,
            settlement_kind: method.settlement_kind,
            state: TransactionState::initial_for(method.settlement_kind),
            requested_by,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            confirmed_by: None,
            rejected_by: None,
            failure_reason: None,
            gateway_ref: None,
            notes,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == TransactionState::Success
    }

    /// Applies a transition
    ///
    /// Returns `Ok(false)` when the transaction already holds the target
    /// terminal state; nothing is modified in that case.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransactionState` for any move the state machine
    /// forbids, including SUCCESS to FAILED and back.
    pub fn apply(&mut self, transition: &Transition, at: DateTime<Utc>) -> Result<bool, BillingError> {
        if self.state == transition.target && self.state.is_terminal() {
            return Ok(false);
        }
        if !self.state.can_transition_to(transition.target) {
            return Err(BillingError::InvalidTransactionState {
                from: self.state,
                to: transition.target,
            });
        }

        self.state = transition.target;
        self.updated_at = at;

        match transition.target {
            TransactionState::Success => {
                self.confirmed_at = Some(at);
                self.confirmed_by = transition.actor;
            }
            TransactionState::Failed => {
                self.rejected_by = transition.actor;
                self.failure_reason = transition.reason.clone();
            }
            _ => {}
        }
        if transition.gateway_ref.is_some() {
            self.gateway_ref = transition.gateway_ref.clone();
        }

        Ok(true)
    }
}

/// A requested state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub target: TransactionState,
    /// Approver, for manual settlements
    pub actor: Option<UserId>,
    pub gateway_ref: Option<String>,
    pub reason: Option<String>,
}

impl Transition {
    pub fn succeed() -> Self {
        Self {
            target: TransactionState::Success,
            actor: None,
            gateway_ref: None,
            reason: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            target: TransactionState::Failed,
            actor: None,
            gateway_ref: None,
            reason: Some(reason.into()),
        }
    }

    pub fn by(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_gateway_ref(mut self, gateway_ref: impl Into<String>) -> Self {
        self.gateway_ref = Some(gateway_ref.into());
        self
    }
}
