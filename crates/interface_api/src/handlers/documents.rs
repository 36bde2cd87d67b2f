//! Document sync handler

use axum::{extract::State, http::StatusCode, Extension, Json};
use validator::Validate;

use domain_billing::{Actor, Role};

use crate::dto::documents::SyncDocumentRequest;
use crate::dto::payments::DocumentStatusResponse;
use crate::{error::ApiError, AppState};

/// Stores or refreshes a document snapshot pushed by its owning subsystem
///
/// Returns the document's status as derived from the ledger.
pub async fn sync_document(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<SyncDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentStatusResponse>), ApiError> {
    if actor.role.rank() < Role::DealerStaff.rank() {
        return Err(ApiError::Forbidden(format!(
            "role {} cannot sync documents",
            actor.role
        )));
    }
    request.validate()?;

    let document = request.into_document(state.service.config().currency)?;
    let status = state.service.register_document(document).await?;

    tracing::info!(
        document_id = %status.document_id,
        kind = %status.document_kind,
        user_id = %actor.user_id,
        "Document synced"
    );
    Ok((StatusCode::OK, Json((&status).into())))
}
