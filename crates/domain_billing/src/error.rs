//! Billing domain errors

use thiserror::Error;

use core_kernel::{Money, MoneyError, PortError};

use crate::gateway::CallbackRejection;
use crate::transaction::TransactionState;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Bad amount, missing or unusable method, malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Amount exceeds what the document can still accept
    #[error("Overpayment rejected: requested {requested}, remaining {remaining}")]
    OverpaymentRejected {
        requested: Money,
        remaining: Money,
    },

    /// Transition not allowed by the transaction state machine
    #[error("Invalid transaction state transition from {from} to {to}")]
    InvalidTransactionState {
        from: TransactionState,
        to: TransactionState,
    },

    /// Actor is not allowed to perform the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Billable document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Transaction not found
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Payment method not found
    #[error("Payment method not found: {0}")]
    MethodNotFound(String),

    /// Gateway callback failed signature or field validation
    #[error("Gateway callback rejected: {0}")]
    GatewayCallbackRejected(CallbackRejection),

    /// Serialization conflict on a document's ledger
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Money arithmetic failed (currency mismatch, overflow)
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Storage adapter failure
    #[error("Storage error: {0}")]
    Storage(PortError),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        BillingError::Unauthorized(message.into())
    }
}

impl From<PortError> for BillingError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::Conflict { message } => BillingError::ConcurrentModification(message),
            PortError::Validation { message, .. } => BillingError::Validation(message),
            other => BillingError::Storage(other),
        }
    }
}
