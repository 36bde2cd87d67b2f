//! Payment handlers

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use core_kernel::{DocumentId, PaymentMethodId, TransactionId};
use domain_billing::{
    Actor, CheckoutCommand, DocumentKind, DocumentStatus, RecordPaymentCommand, Role,
    StandardMethods,
};

use crate::dto::payments::*;
use crate::{error::ApiError, AppState};

const FALLBACK_CLIENT_IP: &str = "127.0.0.1";

/// Records a payment against an order or invoice
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentOutcomeResponse>), ApiError> {
    request.validate()?;
    let document_id = resolve_document(&state, &kind, id).await?.document_id;
    let amount = request.amount.to_money(state.service.config().currency)?;

    let outcome = state
        .service
        .record_payment(
            actor,
            RecordPaymentCommand {
                document_id,
                amount,
                method_id: PaymentMethodId::from(request.method_id),
                allow_overpayment: request.allow_overpayment,
                notes: request.notes,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json((&outcome).into())))
}

/// Gets the derived payment status of a document
pub async fn get_status(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<DocumentStatusResponse>, ApiError> {
    let status = resolve_document(&state, &kind, id).await?;
    Ok(Json((&status).into()))
}

/// Lists a document's transactions in creation order
pub async fn list_transactions(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<Vec<TransactionResponse>>, ApiError> {
    let status = resolve_document(&state, &kind, id).await?;
    let transactions = state.service.list_transactions(status.document_id).await?;
    Ok(Json(transactions.iter().map(TransactionResponse::from).collect()))
}

/// Starts a gateway payment and returns the provider redirect URL
pub async fn gateway_checkout(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(request): Json<GatewayCheckoutRequest>,
) -> Result<(StatusCode, Json<GatewayCheckoutResponse>), ApiError> {
    request.validate()?;
    let document_id = resolve_document(&state, &kind, id).await?.document_id;
    let amount = request.amount.to_money(state.service.config().currency)?;

    let checkout = state
        .service
        .start_gateway_checkout(
            actor,
            CheckoutCommand {
                document_id,
                amount,
                method_id: request
                    .method_id
                    .map(PaymentMethodId::from)
                    .unwrap_or(StandardMethods::VNPAY),
                return_url: request.return_url,
                client_ip: client_ip(&headers),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json((&checkout).into())))
}

/// Gets a single transaction
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let transaction = state.service.get_transaction(TransactionId::from(id)).await?;
    Ok(Json((&transaction).into()))
}

/// Approves a pending manual payment
pub async fn confirm(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentOutcomeResponse>, ApiError> {
    let outcome = state
        .service
        .confirm_transaction(actor, TransactionId::from(id))
        .await?;
    Ok(Json((&outcome).into()))
}

/// Rejects a pending manual payment
pub async fn reject(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    request: Option<Json<RejectRequest>>,
) -> Result<Json<PaymentOutcomeResponse>, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;

    let outcome = state
        .service
        .reject_transaction(actor, TransactionId::from(id), request.reason)
        .await?;
    Ok(Json((&outcome).into()))
}

/// Runs the gateway expiry sweep on demand
pub async fn expire_gateway(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ExpireResponse>, ApiError> {
    if actor.role.rank() < Role::ManufacturerStaff.rank() {
        return Err(ApiError::Forbidden(format!(
            "role {} cannot run the expiry sweep",
            actor.role
        )));
    }

    let expired = state
        .service
        .expire_stale_gateway_transactions(Utc::now())
        .await?;
    tracing::info!(count = expired.len(), user_id = %actor.user_id, "Expiry sweep run by operator");

    Ok(Json(ExpireResponse {
        count: expired.len(),
        expired: expired.iter().map(TransactionResponse::from).collect(),
    }))
}

/// Loads a document's status and checks it is of the kind named in the path
async fn resolve_document(
    state: &AppState,
    kind: &str,
    id: Uuid,
) -> Result<DocumentStatus, ApiError> {
    let kind: DocumentKind = kind
        .parse()
        .map_err(|_| ApiError::NotFound(format!("unknown document kind: {}", kind)))?;
    let status = state
        .service
        .get_document_status(DocumentId::from(id))
        .await?;

    if status.document_kind != kind {
        return Err(ApiError::NotFound(format!("{} {} not found", kind, id)));
    }
    Ok(status)
}

/// First address of `X-Forwarded-For`, or loopback when absent
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(FALLBACK_CLIENT_IP)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_takes_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_falls_back_to_loopback() {
        assert_eq!(client_ip(&HeaderMap::new()), FALLBACK_CLIENT_IP);
    }
}
