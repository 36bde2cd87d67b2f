//! Payment method handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::PaymentMethodId;
use domain_billing::Actor;

use crate::dto::methods::*;
use crate::{error::ApiError, AppState};

/// Lists active methods, optionally only those usable on one channel
pub async fn list_methods(
    State(state): State<AppState>,
    Query(query): Query<MethodsQuery>,
) -> Json<Vec<MethodResponse>> {
    let methods = state.service.list_methods(query.channel).await;
    Json(methods.iter().map(MethodResponse::from).collect())
}

/// Registers a new payment method
pub async fn create_method(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateMethodRequest>,
) -> Result<(StatusCode, Json<MethodResponse>), ApiError> {
    request.validate()?;
    let method = state
        .service
        .register_method(actor, request.into_method())
        .await?;
    Ok((StatusCode::CREATED, Json((&method).into())))
}

/// Edits or deactivates a payment method
pub async fn update_method(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateMethodRequest>,
) -> Result<Json<MethodResponse>, ApiError> {
    request.validate()?;
    let method = state
        .service
        .update_method(actor, PaymentMethodId::from(id), request.into())
        .await?;
    Ok(Json((&method).into()))
}
