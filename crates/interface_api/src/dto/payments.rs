//! Payment DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_billing::{DocumentStatus, GatewayCheckout, PaymentOutcome, Transaction};

use super::{amount, AmountInput};

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub amount: AmountInput,
    pub method_id: Uuid,
    #[serde(default)]
    pub allow_overpayment: bool,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GatewayCheckoutRequest {
    pub amount: AmountInput,
    /// Defaults to the standard VNPAY method
    pub method_id: Option<Uuid>,
    #[validate(url)]
    pub return_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RejectRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub document_kind: String,
    pub amount: String,
    pub currency: String,
    pub method_id: Uuid,
    pub settlement_kind: String,
    pub state: String,
    pub requested_by: Uuid,
    pub requested_role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<Uuid>,
    pub rejected_by: Option<Uuid>,
    pub failure_reason: Option<String>,
    pub gateway_ref: Option<String>,
    pub notes: Option<String>,
}

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.into(),
            document_id: tx.document_id.into(),
            document_kind: tx.document_kind.to_string(),
            amount: amount(&tx.amount),
            currency: tx.amount.currency().code().to_string(),
            method_id: tx.method_id.into(),
            settlement_kind: tx.settlement_kind.to_string(),
            state: tx.state.to_string(),
            requested_by: tx.requested_by.user_id.into(),
            requested_role: tx.requested_by.role.to_string(),
            created_at: tx.created_at,
            updated_at: tx.updated_at,
            confirmed_at: tx.confirmed_at,
            confirmed_by: tx.confirmed_by.map(Uuid::from),
            rejected_by: tx.rejected_by.map(Uuid::from),
            failure_reason: tx.failure_reason.clone(),
            gateway_ref: tx.gateway_ref.clone(),
            notes: tx.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStatusResponse {
    pub document_id: Uuid,
    pub document_kind: String,
    pub owner_kind: String,
    pub owner_id: Uuid,
    pub status: String,
    pub currency: String,
    pub total_amount: String,
    pub paid_amount: String,
    pub pending_amount: String,
    pub remaining_amount: String,
}

impl From<&DocumentStatus> for DocumentStatusResponse {
    fn from(status: &DocumentStatus) -> Self {
        Self {
            document_id: status.document_id.into(),
            document_kind: status.document_kind.to_string(),
            owner_kind: status.owner.kind().to_string(),
            owner_id: *status.owner.as_uuid(),
            status: status.status.to_string(),
            currency: status.total_amount.currency().code().to_string(),
            total_amount: amount(&status.total_amount),
            paid_amount: amount(&status.paid_amount),
            pending_amount: amount(&status.pending_amount),
            remaining_amount: amount(&status.remaining_amount),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOutcomeResponse {
    pub transaction: TransactionResponse,
    pub document_status: DocumentStatusResponse,
}

impl From<&PaymentOutcome> for PaymentOutcomeResponse {
    fn from(outcome: &PaymentOutcome) -> Self {
        Self {
            transaction: (&outcome.transaction).into(),
            document_status: (&outcome.document_status).into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCheckoutResponse {
    pub redirect_url: String,
    pub transaction: TransactionResponse,
    pub document_status: DocumentStatusResponse,
}

impl From<&GatewayCheckout> for GatewayCheckoutResponse {
    fn from(checkout: &GatewayCheckout) -> Self {
        Self {
            redirect_url: checkout.redirect_url.clone(),
            transaction: (&checkout.transaction).into(),
            document_status: (&checkout.document_status).into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpireResponse {
    pub count: usize,
    pub expired: Vec<TransactionResponse>,
}
