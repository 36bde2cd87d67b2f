//! Confirmation workflow
//!
//! Decides which transition, if any, an external event causes. The workflow
//! holds no state: the ledger applies the resulting [`Transition`] under the
//! document's write lock.

use crate::error::BillingError;
use crate::identity::{authorize_approval, Actor};
use crate::method::SettlementKind;
use crate::transaction::{Transaction, Transition};

/// What the gateway reported about a payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayVerdict {
    /// Both provider codes matched the success sentinel
    Success { gateway_ref: Option<String> },
    /// The provider explicitly reported failure
    Failure { code: String },
    /// Accepted but not final (still processing, unknown status)
    Inconclusive { code: String },
}

/// An event that may resolve a pending transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    GatewayResult(GatewayVerdict),
    Approve { approver: Actor },
    Reject { approver: Actor, reason: Option<String> },
    /// Operator or sweep timeout for a gateway payment
    Expire,
}

/// Outcome of evaluating an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Apply this transition
    Transition(Transition),
    /// Leave the transaction pending
    NoChange,
    /// The transaction already holds the state the event asks for
    AlreadyFinal,
}

/// Maps workflow events onto state transitions
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmationWorkflow;

impl ConfirmationWorkflow {
    pub fn new() -> Self {
        Self
    }

    /// Evaluates `event` against the current state of `tx`
    ///
    /// # Errors
    ///
    /// - `Validation` if the event does not apply to the transaction's settlement kind
    /// - `Unauthorized` if an approver may not settle this transaction
    /// - `InvalidTransactionState` if the transaction is already in the opposite
    ///   terminal state
    pub fn decide(&self, tx: &Transaction, event: &WorkflowEvent) -> Result<Decision, BillingError> {
        match event {
            WorkflowEvent::GatewayResult(verdict) => {
                self.require_kind(tx, SettlementKind::Gateway, "gateway result")?;
                match verdict {
                    GatewayVerdict::Success { gateway_ref } => {
                        let mut transition = Transition::succeed();
                        transition.gateway_ref = gateway_ref.clone();
                        settle(tx, transition)
                    }
                    GatewayVerdict::Failure { code } => settle(
                        tx,
                        Transition::fail(format!("gateway response code {}", code)),
                    ),
                    GatewayVerdict::Inconclusive { .. } if tx.state.is_terminal() => {
                        Ok(Decision::AlreadyFinal)
                    }
                    GatewayVerdict::Inconclusive { .. } => Ok(Decision::NoChange),
                }
            }
            WorkflowEvent::Approve { approver } => {
                self.require_kind(tx, SettlementKind::Manual, "approval")?;
                authorize_approval(&tx.requested_by, approver, tx.document_kind.channel())?;
                settle(tx, Transition::succeed().by(approver.user_id))
            }
            WorkflowEvent::Reject { approver, reason } => {
                self.require_kind(tx, SettlementKind::Manual, "rejection")?;
                authorize_approval(&tx.requested_by, approver, tx.document_kind.channel())?;
                let reason = reason.clone().unwrap_or_else(|| "rejected".to_string());
                settle(tx, Transition::fail(reason).by(approver.user_id))
            }
            WorkflowEvent::Expire => {
                self.require_kind(tx, SettlementKind::Gateway, "expiry")?;
                settle(tx, Transition::fail("expired"))
            }
        }
    }

    fn require_kind(
        &self,
        tx: &Transaction,
        expected: SettlementKind,
        event: &str,
    ) -> Result<(), BillingError> {
        if tx.settlement_kind != expected {
            return Err(BillingError::validation(format!(
                "{} does not apply to {} transaction {}",
                event, tx.settlement_kind, tx.id
            )));
        }
        Ok(())
    }
}

fn settle(tx: &Transaction, transition: Transition) -> Result<Decision, BillingError> {
    if tx.state == transition.target {
        return Ok(Decision::AlreadyFinal);
    }
    if !tx.state.can_transition_to(transition.target) {
        return Err(BillingError::InvalidTransactionState {
            from: tx.state,
            to: transition.target,
        });
    }
    Ok(Decision::Transition(transition))
}
