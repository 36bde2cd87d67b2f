//! Payment gateway callback handler

use axum::{
    extract::{Query, State},
    Json,
};
use std::collections::BTreeMap;

use domain_billing::ProviderAck;

use crate::AppState;

/// VNPAY IPN endpoint
///
/// Always answers 200 with the provider's `{RspCode, Message}` body; the
/// outcome of the reconciliation is carried in `RspCode`.
pub async fn vnpay_ipn(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Json<ProviderAck> {
    let outcome = state.service.handle_gateway_callback(&params).await;
    Json(outcome.acknowledgement())
}
