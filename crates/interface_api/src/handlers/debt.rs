//! Debt handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use core_kernel::{CustomerId, DealerId};
use domain_billing::{OwnerKind, OwnerRef};

use crate::dto::debt::*;
use crate::{error::ApiError, AppState};

/// Debt position of one customer or dealer
pub async fn owner_summary(
    State(state): State<AppState>,
    Path((owner_kind, owner_id)): Path<(String, Uuid)>,
) -> Result<Json<DebtSummaryResponse>, ApiError> {
    let owner = match parse_owner_kind(&owner_kind)? {
        OwnerKind::Customer => OwnerRef::Customer(CustomerId::from(owner_id)),
        OwnerKind::Dealer => OwnerRef::Dealer(DealerId::from(owner_id)),
    };
    let row = state.service.get_owner_debt_summary(owner).await?;
    Ok(Json((&row).into()))
}

/// Paged debt rows of every owner of one kind, largest balance first
pub async fn summarize_all(
    State(state): State<AppState>,
    Path(owner_kind): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageResponse<DebtSummaryResponse>>, ApiError> {
    let kind = parse_owner_kind(&owner_kind)?;
    let page = state.service.summarize_all(kind, query.to_request()).await?;
    Ok(Json((&page).into()))
}

/// Aging of a dealer's invoices; only dealers have an aging report
pub async fn dealer_aging(
    State(state): State<AppState>,
    Path((owner_kind, dealer_id)): Path<(String, Uuid)>,
    Query(query): Query<AgingQuery>,
) -> Result<Json<AgingResponse>, ApiError> {
    if parse_owner_kind(&owner_kind)? != OwnerKind::Dealer {
        return Err(ApiError::NotFound("aging is only reported for dealers".to_string()));
    }
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());

    let report = state
        .service
        .dealer_aging(DealerId::from(dealer_id), as_of)
        .await?;
    Ok(Json((&report).into()))
}

fn parse_owner_kind(raw: &str) -> Result<OwnerKind, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("unknown owner kind: {}", raw)))
}
