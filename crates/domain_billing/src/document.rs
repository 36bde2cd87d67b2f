//! Billable documents
//!
//! Customer orders and dealer invoices are owned by their originating
//! subsystems. The ledger only references them by id and reads their fixed
//! total; it never mutates them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{CustomerId, DealerId, DocumentId, Money};

use crate::error::BillingError;

/// Sales channel a document belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    /// Dealer to end customer
    B2C,
    /// Manufacturer to dealer
    B2B,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::B2C => f.write_str("B2C"),
            Channel::B2B => f.write_str("B2B"),
        }
    }
}

/// Which kind of billable document a transaction is recorded against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    CustomerOrder,
    DealerInvoice,
}

impl DocumentKind {
    pub fn channel(&self) -> Channel {
        match self {
            DocumentKind::CustomerOrder => Channel::B2C,
            DocumentKind::DealerInvoice => Channel::B2B,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::CustomerOrder => "CUSTOMER_ORDER",
            DocumentKind::DealerInvoice => "DEALER_INVOICE",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CUSTOMER_ORDER" | "ORDER" | "ORDERS" => Ok(DocumentKind::CustomerOrder),
            "DEALER_INVOICE" | "INVOICE" | "INVOICES" => Ok(DocumentKind::DealerInvoice),
            other => Err(BillingError::validation(format!("unknown document kind: {}", other))),
        }
    }
}

/// Kind of debt owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerKind {
    Customer,
    Dealer,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::Customer => "CUSTOMER",
            OwnerKind::Dealer => "DEALER",
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerKind {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CUSTOMER" | "CUSTOMERS" => Ok(OwnerKind::Customer),
            "DEALER" | "DEALERS" => Ok(OwnerKind::Dealer),
            other => Err(BillingError::validation(format!("unknown owner kind: {}", other))),
        }
    }
}

/// The party that owes a document's balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerRef {
    Customer(CustomerId),
    Dealer(DealerId),
}

impl OwnerRef {
    pub fn kind(&self) -> OwnerKind {
        match self {
            OwnerRef::Customer(_) => OwnerKind::Customer,
            OwnerRef::Dealer(_) => OwnerKind::Dealer,
        }
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        match self {
            OwnerRef::Customer(id) => id.as_uuid(),
            OwnerRef::Dealer(id) => id.as_uuid(),
        }
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerRef::Customer(id) => write!(f, "{}", id),
            OwnerRef::Dealer(id) => write!(f, "{}", id),
        }
    }
}

/// A vehicle order placed by an end customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerOrder {
    pub order_id: DocumentId,
    pub customer_id: CustomerId,
    /// Selling dealership, if the order went through one
    pub dealer_id: Option<DealerId>,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

impl CustomerOrder {
    /// Creates an order with a fresh id
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the total is not positive
    pub fn new(customer_id: CustomerId, total_amount: Money) -> Result<Self, BillingError> {
        ensure_positive_total(&total_amount)?;
        Ok(Self {
            order_id: DocumentId::new_v7(),
            customer_id,
            dealer_id: None,
            total_amount,
            created_at: Utc::now(),
        })
    }

    pub fn with_id(mut self, order_id: DocumentId) -> Self {
        self.order_id = order_id;
        self
    }

    pub fn sold_by(mut self, dealer_id: DealerId) -> Self {
        self.dealer_id = Some(dealer_id);
        self
    }
}

/// An invoice issued by the manufacturer to a dealer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealerInvoice {
    pub invoice_id: DocumentId,
    pub dealer_id: DealerId,
    pub total_amount: Money,
    pub due_date: NaiveDate,
    pub issued_at: DateTime<Utc>,
}

impl DealerInvoice {
    /// Creates an invoice with a fresh id
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the total is not positive
    pub fn new(
        dealer_id: DealerId,
        total_amount: Money,
        due_date: NaiveDate,
    ) -> Result<Self, BillingError> {
        ensure_positive_total(&total_amount)?;
        Ok(Self {
            invoice_id: DocumentId::new_v7(),
            dealer_id,
            total_amount,
            due_date,
            issued_at: Utc::now(),
        })
    }

    pub fn with_id(mut self, invoice_id: DocumentId) -> Self {
        self.invoice_id = invoice_id;
        self
    }
}

/// A document whose total is paid down by ledger transactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillableDocument {
    CustomerOrder(CustomerOrder),
    DealerInvoice(DealerInvoice),
}

impl BillableDocument {
    pub fn id(&self) -> DocumentId {
        match self {
            BillableDocument::CustomerOrder(o) => o.order_id,
            BillableDocument::DealerInvoice(i) => i.invoice_id,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            BillableDocument::CustomerOrder(_) => DocumentKind::CustomerOrder,
            BillableDocument::DealerInvoice(_) => DocumentKind::DealerInvoice,
        }
    }

    pub fn channel(&self) -> Channel {
        self.kind().channel()
    }

    pub fn total_amount(&self) -> Money {
        match self {
            BillableDocument::CustomerOrder(o) => o.total_amount,
            BillableDocument::DealerInvoice(i) => i.total_amount,
        }
    }

    pub fn owner(&self) -> OwnerRef {
        match self {
            BillableDocument::CustomerOrder(o) => OwnerRef::Customer(o.customer_id),
            BillableDocument::DealerInvoice(i) => OwnerRef::Dealer(i.dealer_id),
        }
    }

    /// Only dealer invoices carry a due date
    pub fn due_date(&self) -> Option<NaiveDate> {
        match self {
            BillableDocument::CustomerOrder(_) => None,
            BillableDocument::DealerInvoice(i) => Some(i.due_date),
        }
    }
}

impl From<CustomerOrder> for BillableDocument {
    fn from(order: CustomerOrder) -> Self {
        BillableDocument::CustomerOrder(order)
    }
}

impl From<DealerInvoice> for BillableDocument {
    fn from(invoice: DealerInvoice) -> Self {
        BillableDocument::DealerInvoice(invoice)
    }
}

fn ensure_positive_total(total: &Money) -> Result<(), BillingError> {
    if !total.is_positive() {
        return Err(BillingError::validation(format!(
            "document total must be positive, got {}",
            total
        )));
    }
    Ok(())
}
