//! Billing Domain - Payment and Debt Reconciliation Ledger
//!
//! Tracks payments against two kinds of billable documents: customer orders
//! (dealer to end customer, B2C) and dealer invoices (manufacturer to
//! dealer, B2B).
//!
//! # Components
//!
//! - **Transaction ledger** ([`TransactionLedger`]): the only writer of
//!   transaction records, serialized per document
//! - **Status derivation** ([`derive`]): the single pure function that turns
//!   a document total plus its transactions into UNPAID, PARTIALLY_PAID or PAID
//! - **Confirmation workflow** ([`ConfirmationWorkflow`]): moves pending
//!   transactions to SUCCESS or FAILED on gateway results and approvals
//! - **Method registry** ([`PaymentMethodRegistry`]): configured methods with
//!   their settlement kind and channel scope
//! - **Debt aggregation** ([`DebtAggregator`]): per-owner summaries and
//!   dealer invoice aging
//! - **Gateway adapter** ([`gateway`]): VNPAY checkout URLs and IPN callback
//!   reconciliation
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{PaymentService, RecordPaymentCommand, StandardMethods};
//!
//! let outcome = service
//!     .record_payment(cashier, RecordPaymentCommand {
//!         document_id: order.order_id,
//!         amount: Money::parse("30000000", Currency::VND)?,
//!         method_id: StandardMethods::CASH,
//!         allow_overpayment: false,
//!         notes: None,
//!     })
//!     .await?;
//!
//! // Cash waits for a manager
//! assert_eq!(outcome.document_status.status, PaymentStatus::Unpaid);
//! service.confirm_transaction(manager, outcome.transaction.id).await?;
//! ```

pub mod adapters;
pub mod aggregation;
pub mod derivation;
pub mod document;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod ledger;
pub mod method;
pub mod ports;
pub mod service;
pub mod transaction;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use adapters::{InMemoryDocumentStore, InMemoryLedgerStore};
pub use aggregation::{
    AgingBuckets, AgingReport, DebtAggregator, DebtSummaryRow, OwnerPortfolio, Page, PageRequest,
};
pub use derivation::{admission_headroom, derive, DerivedStatus, PaymentStatus};
pub use document::{
    BillableDocument, Channel, CustomerOrder, DealerInvoice, DocumentKind, OwnerKind, OwnerRef,
};
pub use error::BillingError;
pub use gateway::{
    CallbackRejection, CallbackVerifier, HmacSha512Verifier, PaymentGateway, ProviderAck,
    ReconciliationOutcome, VnpayConfig, VnpayGateway,
};
pub use identity::{authorize_approval, Actor, Role};
pub use ledger::{LedgerWrite, RecordPayment, RetryPolicy, TransactionLedger};
pub use method::{
    MethodScope, MethodUpdate, PaymentMethod, PaymentMethodRegistry, SettlementKind,
    StandardMethods,
};
pub use ports::{DocumentLedger, DocumentStore, LedgerStore};
pub use service::{
    CheckoutCommand, DocumentStatus, GatewayCheckout, LedgerConfig, PaymentOutcome,
    PaymentService, RecordPaymentCommand,
};
pub use transaction::{Transaction, TransactionState, Transition};
pub use workflow::{ConfirmationWorkflow, Decision, GatewayVerdict, WorkflowEvent};
