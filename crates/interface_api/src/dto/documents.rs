//! Document sync DTOs

use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use core_kernel::{Currency, CustomerId, DealerId, DocumentId};
use domain_billing::{BillableDocument, CustomerOrder, DealerInvoice, DocumentKind};

use super::AmountInput;
use crate::error::ApiError;

/// Snapshot of an order or invoice pushed by its owning subsystem
#[derive(Debug, Deserialize, Validate)]
pub struct SyncDocumentRequest {
    /// Keeps the originating subsystem's id; a new one is minted if absent
    pub id: Option<Uuid>,
    pub kind: DocumentKind,
    /// Customer id for orders, dealer id for invoices
    pub owner_id: Uuid,
    /// Selling dealer of a customer order
    pub dealer_id: Option<Uuid>,
    pub total_amount: AmountInput,
    /// Required for dealer invoices
    pub due_date: Option<NaiveDate>,
}

impl SyncDocumentRequest {
    pub fn into_document(self, currency: Currency) -> Result<BillableDocument, ApiError> {
        let total = self.total_amount.to_money(currency)?;

        let document = match self.kind {
            DocumentKind::CustomerOrder => {
                let mut order = CustomerOrder::new(CustomerId::from(self.owner_id), total)?;
                if let Some(id) = self.id {
                    order = order.with_id(DocumentId::from(id));
                }
                if let Some(dealer) = self.dealer_id {
                    order = order.sold_by(DealerId::from(dealer));
                }
                BillableDocument::CustomerOrder(order)
            }
            DocumentKind::DealerInvoice => {
                let due_date = self
                    .due_date
                    .ok_or_else(|| ApiError::validation("due_date is required for dealer invoices"))?;
                let mut invoice = DealerInvoice::new(DealerId::from(self.owner_id), total, due_date)?;
                if let Some(id) = self.id {
                    invoice = invoice.with_id(DocumentId::from(id));
                }
                BillableDocument::DealerInvoice(invoice)
            }
        };
        Ok(document)
    }
}
